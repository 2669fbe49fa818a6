//! CABAC 二进制算术解码引擎.
//!
//! 按标准 9 位 codIRange/codIOffset 语义实现, 重归一化的移位量由前导零计数一次求出,
//! MPS/LPS 的选择使用无分支掩码. 读取越过缓冲区末尾时返回 0xFF, 与安全区填充等价,
//! 因此任何输入都不会越界访问.

use avc_core::{AvcError, AvcResult};

use super::tables::{RANGE_TAB_LPS, STATE_TRANSITION};

/// slice 数据末尾必须追加的安全区字节数 (全 1)
pub const SAFE_ZONE_LEN: usize = 131;

/// end_of_slice_flag / I_PCM 判定使用的终止上下文索引
pub const CTX_TERMINATE: usize = 276;

// ============================================================
// 上下文状态
// ============================================================

/// 单个上下文的概率状态, 编码为 `pStateIdx << 1 | valMPS`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CabacCtx(u8);

impl CabacCtx {
    /// 由 (pStateIdx, valMPS) 构造
    pub fn new(state_idx: u8, val_mps: u8) -> Self {
        Self((state_idx.min(63) << 1) | (val_mps & 1))
    }

    /// 自适应概率索引 pStateIdx
    pub fn state_idx(self) -> u8 {
        self.0 >> 1
    }

    /// 最可能符号 valMPS
    pub fn val_mps(self) -> u8 {
        self.0 & 1
    }

    /// 原始状态字节
    pub fn to_byte(self) -> u8 {
        self.0
    }
}

// ============================================================
// bin 轨迹 (可选观察钩子)
// ============================================================

/// 一次 bin 解码的记录
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BinTrace {
    /// 常规 bin: 解码前的上下文状态与解码值
    Decision { state: CabacCtx, bin: u32 },
    /// 旁路 bin
    Bypass(u32),
    /// 终止 bin
    Terminate(u32),
    /// I_PCM 原始字节 (已字节对齐)
    PcmBytes(Vec<u8>),
}

// ============================================================
// 解码器
// ============================================================

/// CABAC 算术解码器
pub struct CabacDecoder<'a> {
    data: &'a [u8],
    /// 声明的 slice 数据字节数 (不含安全区)
    declared_len: usize,
    /// 下一个待装入缓存的字节索引
    byte_pos: usize,
    /// 位缓存, 低 `cache_bits` 位有效
    cache: u64,
    cache_bits: u32,
    /// codIRange, 9 位有效 [256, 510]
    range: u32,
    /// codIOffset, 始终小于 range
    offset: u32,
    trace: Option<Vec<BinTrace>>,
}

impl<'a> CabacDecoder<'a> {
    /// 创建解码器并完成引擎初始化 (读取 9 位 codIOffset)
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_declared_len(data, data.len())
    }

    /// 创建解码器, `declared_len` 为不含安全区的 slice 数据长度
    pub fn with_declared_len(data: &'a [u8], declared_len: usize) -> Self {
        let mut dec = Self {
            data,
            declared_len: declared_len.min(data.len()),
            byte_pos: 0,
            cache: 0,
            cache_bits: 0,
            range: 510,
            offset: 0,
            trace: None,
        };
        dec.init_engine();
        dec
    }

    /// 初始化算术解码引擎 (9.3.1.2)
    pub fn init_engine(&mut self) {
        self.range = 510;
        self.offset = self.read_bits(9);
    }

    /// 开启 bin 轨迹记录
    pub fn enable_trace(&mut self) {
        if self.trace.is_none() {
            self.trace = Some(Vec::new());
        }
    }

    /// 取出已记录的 bin 轨迹
    pub fn take_trace(&mut self) -> Vec<BinTrace> {
        self.trace.as_mut().map(std::mem::take).unwrap_or_default()
    }

    /// 解码一个常规 bin, 更新对应上下文
    #[inline]
    pub fn decode_decision(&mut self, ctx: &mut CabacCtx) -> u32 {
        let before = *ctx;
        let state = ctx.0 as usize;
        let q = ((self.range >> 6) & 3) as usize;
        let lps = u32::from(RANGE_TAB_LPS[state >> 1][q]);
        let mps_range = self.range - lps;

        // offset >= mps_range 时掩码全 1, 走 LPS 路径
        let mask = 0u32.wrapping_sub(u32::from(self.offset >= mps_range));
        self.offset -= mps_range & mask;
        self.range = mps_range ^ ((mps_range ^ lps) & mask);

        let is_lps = (mask & 1) as usize;
        let bin = (state as u32 & 1) ^ (mask & 1);
        ctx.0 = STATE_TRANSITION[is_lps][state];

        self.renormalize();
        self.record(|| BinTrace::Decision { state: before, bin });
        bin
    }

    /// 解码一个旁路 bin
    #[inline]
    pub fn decode_bypass(&mut self) -> u32 {
        self.offset = (self.offset << 1) | self.read_bits(1);
        let mask = 0u32.wrapping_sub(u32::from(self.offset >= self.range));
        self.offset -= self.range & mask;
        let bin = mask & 1;
        self.record(|| BinTrace::Bypass(bin));
        bin
    }

    /// 解码终止 bin (end_of_slice_flag, I_PCM 判定)
    ///
    /// 返回 1 时不做重归一化, 调用方必须立即结束当前循环.
    pub fn decode_terminate(&mut self) -> u32 {
        self.range -= 2;
        let bin = if self.offset >= self.range {
            1
        } else {
            self.renormalize();
            0
        };
        self.record(|| BinTrace::Terminate(bin));
        bin
    }

    /// 重归一化: 一次性左移到 range 恢复 9 位有效
    #[inline]
    fn renormalize(&mut self) {
        let shift = self.range.leading_zeros().saturating_sub(23);
        if shift > 0 {
            self.range <<= shift;
            self.offset = (self.offset << shift) | self.read_bits(shift);
        }
    }

    /// 从位缓存读取 n 位 (n <= 9), 越过数据末尾时补 1
    #[inline]
    fn read_bits(&mut self, n: u32) -> u32 {
        while self.cache_bits < n {
            let byte = self.data.get(self.byte_pos).copied().unwrap_or(0xFF);
            self.byte_pos += 1;
            self.cache = (self.cache << 8) | u64::from(byte);
            self.cache_bits += 8;
        }
        self.cache_bits -= n;
        ((self.cache >> self.cache_bits) & ((1u64 << n) - 1)) as u32
    }

    fn record(&mut self, entry: impl FnOnce() -> BinTrace) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(entry());
        }
    }

    /// 当前 codIRange
    pub fn range(&self) -> u32 {
        self.range
    }

    /// 当前 codIOffset
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// 已装入 codIOffset 的总位数
    pub fn bits_consumed(&self) -> usize {
        self.byte_pos * 8 - self.cache_bits as usize
    }

    /// 声明的 slice 数据字节数
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// 位游标是否越过声明长度加安全区
    pub fn is_overrun(&self) -> bool {
        self.bits_consumed() > (self.declared_len + SAFE_ZONE_LEN) * 8
    }

    /// 校验引擎不变量: range 9 位有效, offset 小于 range
    pub fn check_invariant(&self) -> AvcResult<()> {
        if !(256..=510).contains(&self.range) || self.offset >= self.range {
            return Err(AvcError::EntropyDesync(format!(
                "H264: CABAC 引擎不变量被破坏, range={}, offset={}, bits={}",
                self.range,
                self.offset,
                self.bits_consumed()
            )));
        }
        if self.is_overrun() {
            return Err(AvcError::EntropyDesync(format!(
                "H264: CABAC 位游标越过安全区, bits={}, declared_len={}",
                self.bits_consumed(),
                self.declared_len
            )));
        }
        Ok(())
    }

    /// I_PCM 样本起始字节 (终止 bin 返回 1 后的下一个字节边界)
    pub fn pcm_byte_position(&self) -> usize {
        self.bits_consumed().div_ceil(8)
    }

    /// 底层数据 (含安全区)
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// 在指定字节处重启引擎 (I_PCM 之后)
    pub fn restart_engine_at(&mut self, byte_pos: usize) {
        self.byte_pos = byte_pos;
        self.cache = 0;
        self.cache_bits = 0;
        self.init_engine();
    }

    /// 记录 I_PCM 原始字节到轨迹
    pub(crate) fn record_pcm(&mut self, bytes: &[u8]) {
        self.record(|| BinTrace::PcmBytes(bytes.to_vec()));
    }
}
