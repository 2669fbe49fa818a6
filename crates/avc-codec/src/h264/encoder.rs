//! 参考 CABAC 算术编码器 (9.3.4).
//!
//! 与解码器互为逆过程, 用于合成一致性码流以及按 bin 轨迹重新编码.

use avc_core::bitwriter::BitWriter;

use super::cabac::{BinTrace, CabacCtx};
use super::tables::{RANGE_TAB_LPS, STATE_TRANSITION};

/// CABAC 算术编码器
pub struct CabacEncoder {
    writer: BitWriter,
    low: u32,
    range: u32,
    bits_outstanding: u32,
    first_bit: bool,
}

impl CabacEncoder {
    /// 创建编码器并初始化编码引擎
    pub fn new() -> Self {
        Self {
            writer: BitWriter::new(),
            low: 0,
            range: 510,
            bits_outstanding: 0,
            first_bit: true,
        }
    }

    /// 编码一个常规 bin
    pub fn encode_decision(&mut self, ctx: &mut CabacCtx, bin: u32) {
        let state = ctx.to_byte() as usize;
        let q = ((self.range >> 6) & 3) as usize;
        let lps = u32::from(RANGE_TAB_LPS[state >> 1][q]);
        self.range -= lps;
        let is_lps = usize::from((bin & 1) != u32::from(ctx.val_mps()));
        if is_lps == 1 {
            self.low += self.range;
            self.range = lps;
        }
        *ctx = CabacCtx::new(
            STATE_TRANSITION[is_lps][state] >> 1,
            STATE_TRANSITION[is_lps][state] & 1,
        );
        self.renorm();
    }

    /// 编码一个旁路 bin
    pub fn encode_bypass(&mut self, bin: u32) {
        self.low <<= 1;
        if bin & 1 == 1 {
            self.low += self.range;
        }
        if self.low >= 1024 {
            self.put_bit(1);
            self.low -= 1024;
        } else if self.low < 512 {
            self.put_bit(0);
        } else {
            self.low -= 512;
            self.bits_outstanding += 1;
        }
    }

    /// 编码终止 bin; 值为 1 时执行 EncodeFlush
    pub fn encode_terminate(&mut self, bin: u32) {
        self.range -= 2;
        if bin & 1 == 1 {
            self.low += self.range;
            self.flush();
        } else {
            self.renorm();
        }
    }

    fn flush(&mut self) {
        self.range = 2;
        self.renorm();
        self.put_bit((self.low >> 9) & 1);
        self.writer.write_bits(((self.low >> 7) & 3) | 1, 2);
    }

    fn renorm(&mut self) {
        while self.range < 256 {
            if self.low < 256 {
                self.put_bit(0);
            } else if self.low >= 512 {
                self.low -= 512;
                self.put_bit(1);
            } else {
                self.low -= 256;
                self.bits_outstanding += 1;
            }
            self.range <<= 1;
            self.low <<= 1;
        }
    }

    fn put_bit(&mut self, bit: u32) {
        if self.first_bit {
            self.first_bit = false;
        } else {
            self.writer.write_bit(bit);
        }
        while self.bits_outstanding > 0 {
            self.writer.write_bit(1 - bit);
            self.bits_outstanding -= 1;
        }
    }

    /// 写入 I_PCM 样本: 用 0 对齐到字节后写原始字节, 再重新初始化编码引擎
    ///
    /// 调用前必须已用 `encode_terminate(1)` 结束算术码.
    pub fn write_pcm_bytes(&mut self, bytes: &[u8]) {
        self.writer.align_to_byte();
        self.writer.write_bytes(bytes);
        self.low = 0;
        self.range = 510;
        self.bits_outstanding = 0;
        self.first_bit = true;
    }

    /// 已输出的位数
    pub fn bits_written(&self) -> usize {
        self.writer.bits_written()
    }

    /// 按解码器记录的 bin 轨迹重新编码
    pub fn replay(&mut self, trace: &[BinTrace]) {
        for entry in trace {
            match entry {
                BinTrace::Decision { state, bin } => {
                    let mut ctx = *state;
                    self.encode_decision(&mut ctx, *bin);
                }
                BinTrace::Bypass(bin) => self.encode_bypass(*bin),
                BinTrace::Terminate(bin) => self.encode_terminate(*bin),
                BinTrace::PcmBytes(bytes) => self.write_pcm_bytes(bytes),
            }
        }
    }

    /// 结束 slice 数据: 终止 bin 最后写出的 1 即 rbsp_stop_one_bit, 其后补 0 对齐
    ///
    /// 调用前必须已用 `encode_terminate(1)` 编码 end_of_slice_flag.
    pub fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }
}

impl Default for CabacEncoder {
    fn default() -> Self {
        Self::new()
    }
}
