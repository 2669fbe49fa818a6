//! 比特流写入器.
//!
//! 与 [`BitReader`](crate::bitreader::BitReader) 位序相同.
//! 参考算术编码器通过它输出 PutBit 产生的位以及 I_PCM 原始样本.

/// 比特流写入器
///
/// # 示例
/// ```
/// use avc_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b1011, 4);
/// bw.write_bit(1);
/// assert_eq!(bw.finish(), vec![0b10111000]);
/// ```
#[derive(Default)]
pub struct BitWriter {
    out: Vec<u8>,
    /// 右对齐的未满字节累加器
    acc: u32,
    /// 累加器中的位数 (0..8)
    pending: u32,
}

impl BitWriter {
    /// 创建写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.out.len() * 8 + self.pending as usize
    }

    pub fn write_bit(&mut self, bit: u32) {
        self.write_bits(bit & 1, 1);
    }

    /// 写入 value 的低 n 位 (n <= 24), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 24, "write_bits: n={} 超过 24 位", n);
        let mask = if n == 0 { 0 } else { u32::MAX >> (32 - n) };
        self.acc = (self.acc << n) | (value & mask);
        self.pending += n;
        while self.pending >= 8 {
            self.pending -= 8;
            self.out.push((self.acc >> self.pending) as u8);
        }
        self.acc &= (1 << self.pending) - 1;
    }

    /// 用 0 补齐到字节边界
    pub fn align_to_byte(&mut self) {
        if self.pending > 0 {
            self.write_bits(0, 8 - self.pending);
        }
    }

    /// 写入完整字节序列
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.pending == 0 {
            self.out.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_bits(u32::from(b), 8);
            }
        }
    }

    /// 补齐并返回输出
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_write_bits_cross_byte() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_bits(0b1_0000_0001, 9);
        assert_eq!(bw.bits_written(), 12);
        assert_eq!(bw.finish(), vec![0b10110000, 0b00010000]);
    }

    #[test]
    fn test_unaligned_bytes_after_bits() {
        let mut bw = BitWriter::new();
        bw.write_bit(1);
        bw.write_bytes(&[0xFF]);
        bw.align_to_byte();
        bw.write_bytes(&[0x12, 0x34]);
        assert_eq!(bw.finish(), vec![0xFF, 0x80, 0x12, 0x34]);
    }

    #[test]
    fn test_pcm_samples_read_back() {
        let mut bw = BitWriter::new();
        for s in [0x2ABu32, 0x3FF, 0x001] {
            bw.write_bits(s, 10);
        }
        let data = bw.finish();
        assert_eq!(data.len(), 4);

        let mut br = BitReader::new(&data);
        for s in [0x2ABu32, 0x3FF, 0x001] {
            assert_eq!(br.read_bits(10).unwrap(), s);
        }
    }
}
