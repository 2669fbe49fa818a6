//! 宏块邻居上下文存储.
//!
//! 物理上是两行宽度为 `width + 2` 的环形缓冲, 左右各留一列哨兵,
//! 按固定相对偏移寻址 left/above/above-left/above-right.
//! 任何查询 (包括图像边缘和 slice 起点之前) 都返回有效记录, 不可用位置返回哨兵.

/// 单个宏块供邻居推导上下文使用的记录
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MbContext {
    /// 宏块是否可用 (已在当前 slice 中解码)
    pub available: bool,
    /// mb_skip_flag 条件项: 可用且非 skip 时为 1
    pub skip_inc: u8,
    /// I 宏块 mb_type 前缀条件项: 可用且非 I_NxN 时为 1
    pub mb_type_i_inc: u8,
    /// B 宏块 mb_type 条件项: 可用且非 B_Skip/B_Direct_16x16 时为 1
    pub mb_type_b_inc: u8,
    /// intra_chroma_pred_mode 条件项: 帧内非 PCM 且色度模式非 DC 时为 1
    pub chroma_pred_inc: u8,
    /// transform_size_8x8_flag
    pub transform_8x8: u8,
    /// 帧内预测时不可作为参考 (不可用, 或受限帧内预测下的帧间宏块)
    pub intra_pred_unavailable: bool,
    /// 16 个 4x4 块的帧内预测模式 (光栅序), 非 NxN 宏块为 2 (DC)
    pub intra_modes: [u8; 16],
    /// CodedBlockPatternLuma, 不可用与 I_PCM 为 0x0F
    pub cbp_luma: u8,
    /// CodedBlockPatternChroma, I_PCM 为 2
    pub cbp_chroma: u8,
    /// 每平面 4x4 块 coded_block_flag 位图 (光栅序, 色度 4:2:x 时宽 2)
    pub cbf_4x4: [u16; 3],
    /// 每平面 8x8 块 coded_block_flag 位图, 仅 8x8 变换宏块置位
    pub cbf_8x8: [u8; 3],
    /// DC 块 coded_block_flag, 位 0..=2 对应 Y/Cb/Cr
    pub cbf_dc: u8,
}

impl MbContext {
    /// 不可用位置的哨兵记录
    pub const UNAVAILABLE: MbContext = MbContext {
        available: false,
        skip_inc: 0,
        mb_type_i_inc: 0,
        mb_type_b_inc: 0,
        chroma_pred_inc: 0,
        transform_8x8: 0,
        intra_pred_unavailable: true,
        intra_modes: [2; 16],
        cbp_luma: 0x0F,
        cbp_chroma: 0,
        cbf_4x4: [0; 3],
        cbf_8x8: [0; 3],
        cbf_dc: 0,
    };

    /// 当前宏块解析前的初始记录
    pub fn seeded(constrained_intra_pred: bool) -> Self {
        Self {
            available: true,
            skip_inc: 1,
            mb_type_i_inc: 1,
            mb_type_b_inc: 1,
            intra_pred_unavailable: constrained_intra_pred,
            cbp_luma: 0,
            ..Self::UNAVAILABLE
        }
    }

    /// I_PCM 宏块: 所有块视为已编码
    pub fn mark_pcm(&mut self) {
        self.mb_type_i_inc = 1;
        self.chroma_pred_inc = 0;
        self.transform_8x8 = 0;
        self.intra_pred_unavailable = false;
        self.intra_modes = [2; 16];
        self.cbp_luma = 0x0F;
        self.cbp_chroma = 2;
        self.cbf_4x4 = [0xFFFF; 3];
        self.cbf_8x8 = [0x0F; 3];
        self.cbf_dc = 0x07;
    }

    /// P_Skip / B_Skip 宏块
    pub fn mark_skip(&mut self) {
        self.skip_inc = 0;
        self.mb_type_b_inc = 0;
        self.cbp_luma = 0;
        self.cbp_chroma = 0;
    }

    /// 4x4 块 coded_block_flag
    pub fn cbf_4x4_bit(&self, plane: usize, bx: usize, by: usize, width: usize) -> usize {
        usize::from((self.cbf_4x4[plane] >> (by * width + bx)) & 1)
    }

    /// 8x8 块 coded_block_flag
    pub fn cbf_8x8_bit(&self, plane: usize, b8x: usize, b8y: usize) -> usize {
        usize::from((self.cbf_8x8[plane] >> (b8y * 2 + b8x)) & 1)
    }
}

/// 滚动窗口宏块上下文网格
pub struct NeighborGrid {
    width: usize,
    stride: usize,
    slots: Vec<MbContext>,
    cur_x: usize,
    cur_y: usize,
    constrained_intra_pred: bool,
}

impl NeighborGrid {
    /// 创建空网格, 使用前需调用 [`reset`](Self::reset)
    pub fn new() -> Self {
        Self {
            width: 0,
            stride: 2,
            slots: Vec::new(),
            cur_x: 0,
            cur_y: 0,
            constrained_intra_pred: false,
        }
    }

    /// slice 起始: 所有槽位填充哨兵
    pub fn reset(&mut self, width_in_mbs: usize, constrained_intra_pred: bool) {
        self.width = width_in_mbs;
        self.stride = width_in_mbs + 2;
        self.slots.clear();
        self.slots.resize(self.stride * 2, MbContext::UNAVAILABLE);
        self.cur_x = 0;
        self.cur_y = 0;
        self.constrained_intra_pred = constrained_intra_pred;
    }

    fn slot(&self, mb_x: usize, mb_y: usize) -> usize {
        (mb_y & 1) * self.stride + mb_x + 1
    }

    /// 定位到当前宏块并返回其初始记录
    pub fn seed(&mut self, mb_x: usize, mb_y: usize) -> MbContext {
        self.cur_x = mb_x;
        self.cur_y = mb_y;
        MbContext::seeded(self.constrained_intra_pred)
    }

    /// 写回当前宏块记录, 覆盖两行之前同列的槽位
    pub fn commit(&mut self, record: MbContext) {
        let idx = self.slot(self.cur_x, self.cur_y);
        if let Some(slot) = self.slots.get_mut(idx) {
            *slot = record;
        }
    }

    /// 相对当前宏块查找, dx 取 -1..=1, dy 取 -1..=0
    fn lookup(&self, dx: isize, dy: isize) -> &MbContext {
        let x = self.cur_x as isize + dx;
        let y = self.cur_y as isize + dy;
        if y < 0 || x < -1 || x > self.width as isize {
            return &MbContext::UNAVAILABLE;
        }
        let idx = (y as usize & 1) * self.stride + (x + 1) as usize;
        self.slots.get(idx).unwrap_or(&MbContext::UNAVAILABLE)
    }

    /// 左邻 (A)
    pub fn left(&self) -> &MbContext {
        self.lookup(-1, 0)
    }

    /// 上邻 (B)
    pub fn above(&self) -> &MbContext {
        self.lookup(0, -1)
    }

    /// 左上邻 (D)
    pub fn above_left(&self) -> &MbContext {
        self.lookup(-1, -1)
    }

    /// 右上邻 (C)
    pub fn above_right(&self) -> &MbContext {
        self.lookup(1, -1)
    }

    /// 按绝对坐标查询最近两行内已提交的记录
    ///
    /// 诊断接口, 供调用方在 slice 解码后检查提交的上下文; 解码路径只使用
    /// `left`/`above` 等相对查询. 窗口外或尚未解码的位置返回哨兵.
    pub fn get(&self, mb_x: usize, mb_y: usize) -> &MbContext {
        let ahead = mb_y == self.cur_y && mb_x > self.cur_x;
        if ahead || mb_x >= self.width || mb_y > self.cur_y || mb_y + 1 < self.cur_y {
            return &MbContext::UNAVAILABLE;
        }
        self.slots
            .get(self.slot(mb_x, mb_y))
            .unwrap_or(&MbContext::UNAVAILABLE)
    }
}

impl Default for NeighborGrid {
    fn default() -> Self {
        Self::new()
    }
}
