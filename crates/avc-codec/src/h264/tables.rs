//! H.264 CABAC 固定查找表.
//!
//! 所有表均为进程生命周期内的不可变常量, 可在线程间安全共享.

// ============================================================
// 算术解码引擎
// ============================================================

/// rangeTabLPS[pStateIdx][qCodIRangeIdx]
#[rustfmt::skip]
pub(crate) const RANGE_TAB_LPS: [[u8; 4]; 64] = [
    [128, 176, 208, 240], [128, 167, 197, 227], [128, 158, 187, 216], [123, 150, 178, 205],
    [116, 142, 169, 195], [111, 135, 160, 185], [105, 128, 152, 175], [100, 122, 144, 166],
    [95, 116, 137, 158],  [90, 110, 130, 150],  [85, 104, 123, 142],  [81, 99, 117, 135],
    [77, 94, 111, 128],   [73, 89, 105, 122],   [69, 85, 100, 116],   [66, 80, 95, 110],
    [62, 76, 90, 104],    [59, 72, 86, 99],     [56, 69, 81, 94],     [53, 65, 77, 89],
    [51, 62, 73, 85],     [48, 59, 69, 80],     [46, 56, 66, 76],     [43, 53, 63, 72],
    [41, 50, 59, 69],     [39, 48, 56, 65],     [37, 45, 54, 62],     [35, 43, 51, 59],
    [33, 41, 48, 56],     [32, 39, 46, 53],     [30, 37, 43, 50],     [29, 35, 41, 48],
    [27, 33, 39, 45],     [26, 31, 37, 43],     [24, 30, 35, 41],     [23, 28, 33, 39],
    [22, 27, 32, 37],     [21, 26, 30, 35],     [20, 24, 29, 33],     [19, 23, 27, 31],
    [18, 22, 26, 30],     [17, 21, 25, 28],     [16, 20, 23, 27],     [15, 19, 22, 25],
    [14, 18, 21, 24],     [14, 17, 20, 23],     [13, 16, 19, 22],     [12, 15, 18, 21],
    [12, 14, 17, 20],     [11, 14, 16, 19],     [11, 13, 15, 18],     [10, 12, 15, 17],
    [10, 12, 14, 16],     [9, 11, 13, 15],      [9, 11, 12, 14],      [8, 10, 12, 14],
    [8, 9, 11, 13],       [7, 9, 11, 12],       [7, 9, 10, 12],       [7, 8, 10, 11],
    [6, 8, 9, 11],        [6, 7, 9, 10],        [6, 7, 8, 9],         [2, 2, 2, 2],
];

/// transIdxLPS[pStateIdx]
#[rustfmt::skip]
const TRANS_IDX_LPS: [u8; 64] = [
    0, 0, 1, 2, 2, 4, 4, 5, 6, 7, 8, 9, 9, 11, 11, 12,
    13, 13, 15, 15, 16, 16, 18, 18, 19, 19, 21, 21, 22, 22, 23, 24,
    24, 25, 26, 26, 27, 27, 28, 29, 29, 30, 30, 30, 31, 32, 32, 33,
    33, 33, 34, 34, 35, 35, 35, 36, 36, 36, 37, 37, 37, 38, 38, 63,
];

/// 状态字节转移表, 状态字节编码为 `pStateIdx << 1 | valMPS`.
///
/// 第一维为 0 时表示解出 MPS, 为 1 时表示解出 LPS.
/// LPS 路径在 pStateIdx 为 0 时翻转 valMPS.
pub(crate) static STATE_TRANSITION: [[u8; 128]; 2] = build_state_transition();

const fn build_state_transition() -> [[u8; 128]; 2] {
    let mut table = [[0u8; 128]; 2];
    let mut state = 0;
    while state < 128 {
        let p = state >> 1;
        let mps = state & 1;
        // pStateIdx 62 为 MPS 路径上限, 63 保留给 end_of_slice 上下文
        let next_mps = if p < 62 { p + 1 } else { p };
        table[0][state] = ((next_mps << 1) | mps) as u8;
        let flipped = if p == 0 { mps ^ 1 } else { mps };
        table[1][state] = ((TRANS_IDX_LPS[p] as usize) << 1 | flipped) as u8;
        state += 1;
    }
    table
}

// ============================================================
// 反扫描表 (值为块内光栅位置 y * w + x)
// ============================================================

/// 4x4 帧扫描 (zig-zag)
#[rustfmt::skip]
pub(crate) const ZIGZAG_4X4: [u8; 16] = [
    0, 1, 4, 8, 5, 2, 3, 6, 9, 12, 13, 10, 7, 11, 14, 15,
];

/// 4x4 场扫描
#[rustfmt::skip]
pub(crate) const FIELD_SCAN_4X4: [u8; 16] = [
    0, 4, 1, 8, 12, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15,
];

/// 8x8 帧扫描 (zig-zag)
#[rustfmt::skip]
pub(crate) const ZIGZAG_8X8: [u8; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5,
    12, 19, 26, 33, 40, 48, 41, 34, 27, 20, 13, 6, 7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// 8x8 场扫描
#[rustfmt::skip]
pub(crate) const FIELD_SCAN_8X8: [u8; 64] = [
    0, 8, 16, 1, 9, 24, 32, 17, 2, 25, 40, 48, 56, 33, 10, 3,
    18, 41, 49, 57, 26, 11, 4, 19, 34, 42, 50, 58, 27, 12, 5, 20,
    35, 43, 51, 59, 28, 13, 6, 21, 36, 44, 52, 60, 29, 14, 22, 37,
    45, 53, 61, 30, 7, 15, 38, 46, 54, 62, 23, 31, 39, 47, 55, 63,
];

/// 4:2:0 色度 DC 扫描 (2x2)
pub(crate) const CHROMA_DC_SCAN_420: [u8; 4] = [0, 1, 2, 3];

/// 4:2:2 色度 DC 扫描 (2 列 x 4 行)
pub(crate) const CHROMA_DC_SCAN_422: [u8; 8] = [0, 2, 1, 4, 6, 3, 5, 7];

/// 8x8 块 significant_coeff_flag 上下文增量, 帧编码
#[rustfmt::skip]
pub(crate) const SIG_CTX_INC_8X8_FRAME: [u8; 63] = [
    0, 1, 2, 3, 4, 5, 5, 4, 4, 3, 3, 4, 4, 4, 5, 5,
    4, 4, 4, 4, 3, 3, 6, 7, 7, 7, 8, 9, 10, 9, 8, 7,
    7, 6, 11, 12, 13, 11, 6, 7, 8, 9, 14, 10, 9, 8, 6, 11,
    12, 13, 11, 6, 9, 14, 10, 9, 11, 12, 13, 11, 14, 10, 12,
];

/// 8x8 块 significant_coeff_flag 上下文增量, 场编码
#[rustfmt::skip]
pub(crate) const SIG_CTX_INC_8X8_FIELD: [u8; 63] = [
    0, 1, 1, 2, 2, 3, 3, 4, 5, 6, 7, 7, 7, 8, 4, 5,
    6, 9, 10, 10, 8, 11, 12, 11, 9, 9, 10, 10, 8, 11, 12, 11,
    9, 9, 10, 10, 8, 11, 12, 11, 9, 9, 10, 10, 8, 13, 13, 9,
    9, 10, 10, 8, 13, 13, 9, 9, 10, 10, 14, 14, 14, 14, 14,
];

/// 8x8 块 last_significant_coeff_flag 上下文增量 (帧场共用)
#[rustfmt::skip]
pub(crate) const LAST_CTX_INC_8X8: [u8; 63] = [
    0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2,
    3, 3, 3, 3, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4,
    5, 5, 5, 5, 6, 6, 6, 6, 7, 7, 7, 7, 8, 8, 8,
];

// ============================================================
// 量化参数
// ============================================================

/// qPI >= 30 时的色度 QP 映射 (qPI 30..=51)
#[rustfmt::skip]
const CHROMA_QP_HIGH: [u8; 22] = [
    29, 30, 31, 32, 32, 33, 34, 34, 35, 35, 36, 36, 37, 37, 37, 38, 38, 38, 39, 39, 39, 39,
];

/// 由 qPI 查色度 QPc
pub(crate) fn chroma_qp_from_index(qpi: i32) -> i32 {
    if qpi < 30 {
        qpi
    } else {
        i32::from(CHROMA_QP_HIGH[(qpi.min(51) - 30) as usize])
    }
}
