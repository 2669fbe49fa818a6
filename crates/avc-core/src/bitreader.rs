//! 定长字段读取器.
//!
//! 按 MSB first 位序从字节切片中取出 1..=32 位字段, 内部用 64 位缓存
//! 按需补充. I_PCM 宏块用它读取 8..=14 位的原始样本.

use crate::{AvcError, AvcResult};

/// 定长字段读取器
///
/// # 示例
/// ```
/// use avc_core::bitreader::BitReader;
///
/// let data = [0b10110001, 0b01010101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(12).unwrap(), 0b0001_0101_0101);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 下一个装入缓存的字节
    next: usize,
    /// 左对齐的位缓存
    cache: u64,
    /// 缓存中的有效位数
    cached: u32,
}

impl<'a> BitReader<'a> {
    /// 创建读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            next: 0,
            cache: 0,
            cached: 0,
        }
    }

    /// 已消费的位数
    pub fn bits_read(&self) -> usize {
        self.next * 8 - self.cached as usize
    }

    fn refill(&mut self) {
        while self.cached <= 56 {
            let Some(&byte) = self.data.get(self.next) else {
                break;
            };
            self.cache |= u64::from(byte) << (56 - self.cached);
            self.cached += 8;
            self.next += 1;
        }
    }

    /// 读取 n 位 (n <= 32), 不足时返回 [`AvcError::Eof`] 且不移动位置
    pub fn read_bits(&mut self, n: u32) -> AvcResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(AvcError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n
            )));
        }
        if self.cached < n {
            self.refill();
            if self.cached < n {
                return Err(AvcError::Eof);
            }
        }
        let value = (self.cache >> (64 - n)) as u32;
        self.cache <<= n;
        self.cached -= n;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bits_mixed_widths() {
        let data = [0b10110001, 0b01010101];
        let mut br = BitReader::new(&data);

        assert_eq!(br.read_bits(1).unwrap(), 1);
        assert_eq!(br.read_bits(3).unwrap(), 0b011);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert_eq!(br.read_bits(8).unwrap(), 0b01010101);
        assert_eq!(br.bits_read(), 16);
    }

    #[test]
    fn test_read_high_bit_depth_samples() {
        // 三个 14 位样本跨越缓存补充边界
        let samples = [0x3FFFu32, 0x0001, 0x2AAA];
        let mut packed = 0u64;
        for s in samples {
            packed = (packed << 14) | u64::from(s);
        }
        packed <<= 64 - 42;
        let data = packed.to_be_bytes();

        let mut br = BitReader::new(&data[..6]);
        for s in samples {
            assert_eq!(br.read_bits(14).unwrap(), s);
        }
        assert_eq!(br.bits_read(), 42);
    }

    #[test]
    fn test_read_past_end_is_eof() {
        let data = [0xAB];
        let mut br = BitReader::new(&data);
        assert!(matches!(br.read_bits(9), Err(AvcError::Eof)));
        assert_eq!(br.read_bits(8).unwrap(), 0xAB, "失败的读取不应移动位置");
        assert!(matches!(br.read_bits(1), Err(AvcError::Eof)));
        assert!(matches!(br.read_bits(33), Err(AvcError::InvalidArgument(_))));
    }

    #[test]
    fn test_long_run_of_32_bit_fields() {
        let data: Vec<u8> = (0u8..40).collect();
        let mut br = BitReader::new(&data);
        for chunk in data.chunks(4) {
            let expected = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            assert_eq!(br.read_bits(32).unwrap(), expected);
        }
    }
}
