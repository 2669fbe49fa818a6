//! H.264 CABAC 残差块解码.
//!
//! 包含 coded_block_flag, 显著性图, coeff_abs_level_minus1 (含旁路转义) 与符号的解码,
//! 解码结果经反扫描表写入调用方提供的系数槽位.

use avc_core::{AvcError, AvcResult};

use super::cabac::CabacDecoder;
use super::cabac_init::ContextModel;
use super::tables::{LAST_CTX_INC_8X8, SIG_CTX_INC_8X8_FIELD, SIG_CTX_INC_8X8_FRAME};

/// 转义后缀前导 1 的上限, 超过视为熵解码失步
const ESCAPE_MAX_K: u32 = 21;

// ============================================================
// 块类别定义
// ============================================================

/// 残差块类别 (ctxBlockCat) 及其上下文偏移
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockCat {
    /// ctxBlockCat, 0..=13
    pub cat: u8,
    /// coded_block_flag 上下文起点
    pub cbf_offset: usize,
    /// significant_coeff_flag 上下文起点 (帧 / 场)
    pub sig_offset: [usize; 2],
    /// last_significant_coeff_flag 上下文起点 (帧 / 场)
    pub last_offset: [usize; 2],
    /// coeff_abs_level_minus1 上下文起点
    pub abs_offset: usize,
    /// 最大系数数量, 色度 DC 为 4:2:0 时的值
    pub max_coeff: usize,
}

impl BlockCat {
    const fn new(cat: u8) -> Self {
        // 4:4:4 下 Cb/Cr 复用亮度语法, 类别 6..=9 与 10..=13 对应亮度 0, 1, 2, 5
        let kind = match cat {
            0..=5 => cat,
            6 | 10 => 0,
            7 | 11 => 1,
            8 | 12 => 2,
            _ => 5,
        };
        let plane = if cat < 6 {
            0
        } else if cat < 10 {
            1
        } else {
            2
        };

        let (cbf_base, sig_base, last_base, abs_base) = match (plane, kind == 5) {
            (0, false) => (85, [105, 277], [166, 338], 227),
            (0, true) => (1012, [402, 436], [417, 451], 426),
            (1, false) => (460, [484, 776], [572, 864], 952),
            (1, true) => (1012, [660, 675], [690, 699], 708),
            (_, false) => (472, [528, 820], [616, 908], 982),
            (_, true) => (1012, [718, 733], [748, 757], 766),
        };
        let cbf_cat = match kind {
            5 => 4 * plane,
            k => 4 * k as usize,
        };
        let (sig_cat, abs_cat) = match kind {
            0 => (0, 0),
            1 => (15, 10),
            2 => (29, 20),
            3 => (44, 30),
            4 => (47, 39),
            _ => (0, 0),
        };
        let max_coeff = match kind {
            0 | 2 => 16,
            1 | 4 => 15,
            3 => 4,
            _ => 64,
        };

        Self {
            cat,
            cbf_offset: cbf_base + cbf_cat,
            sig_offset: [sig_base[0] + sig_cat, sig_base[1] + sig_cat],
            last_offset: [last_base[0] + sig_cat, last_base[1] + sig_cat],
            abs_offset: abs_base + abs_cat,
            max_coeff,
        }
    }

    /// 是否为 8x8 块
    pub fn is_8x8(&self) -> bool {
        matches!(self.cat, 5 | 9 | 13)
    }

    /// 是否为色度 DC 块
    pub fn is_chroma_dc(&self) -> bool {
        self.cat == 3
    }
}

/// Intra16x16DCLevel
pub const CAT_LUMA_DC: BlockCat = BlockCat::new(0);
/// Intra16x16ACLevel
pub const CAT_LUMA_AC: BlockCat = BlockCat::new(1);
/// LumaLevel4x4
pub const CAT_LUMA_4X4: BlockCat = BlockCat::new(2);
/// ChromaDCLevel (4:2:0 / 4:2:2)
pub const CAT_CHROMA_DC: BlockCat = BlockCat::new(3);
/// ChromaACLevel
pub const CAT_CHROMA_AC: BlockCat = BlockCat::new(4);
/// LumaLevel8x8
pub const CAT_LUMA_8X8: BlockCat = BlockCat::new(5);

/// 4:4:4 下按平面取类别, 顺序为 DC, AC, 4x4, 8x8
pub const PLANE_CATS: [[BlockCat; 4]; 3] = [
    [CAT_LUMA_DC, CAT_LUMA_AC, CAT_LUMA_4X4, CAT_LUMA_8X8],
    [
        BlockCat::new(6),
        BlockCat::new(7),
        BlockCat::new(8),
        BlockCat::new(9),
    ],
    [
        BlockCat::new(10),
        BlockCat::new(11),
        BlockCat::new(12),
        BlockCat::new(13),
    ],
];

// ============================================================
// 扫描布局
// ============================================================

/// 系数列表到块内位置的映射
#[derive(Clone, Copy, Debug)]
pub struct BlockScan<'a> {
    /// 扫描位置 → 块内光栅位置
    pub scan: &'a [u8],
    /// 列表首元素对应的扫描位置, AC 块为 1
    pub start: usize,
    /// 系数列表长度 (maxNumCoeff)
    pub len: usize,
    /// 场编码 (选择场显著性上下文)
    pub field: bool,
    /// 色度 DC 的 NumC8x8
    pub num_c8x8: usize,
}

// ============================================================
// CABAC 残差块解码
// ============================================================

/// 通过 CABAC 解码一个残差块
///
/// `cbf_inc` 为 coded_block_flag 的上下文增量, `None` 表示该块不携带此标志 (推断为 1).
/// 非零系数按 `layout` 的反扫描表写入 `coeffs`, 返回非零系数数量, 0 表示 coded_block_flag 为 0.
pub fn decode_residual_block(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    cat: &BlockCat,
    cbf_inc: Option<usize>,
    layout: &BlockScan,
    coeffs: &mut [i32],
) -> AvcResult<usize> {
    if let Some(inc) = cbf_inc {
        let cbf = cabac.decode_decision(&mut ctxs[cat.cbf_offset + inc.min(3)]);
        log::trace!("H264: coded_block_flag cat={} value={}", cat.cat, cbf);
        if cbf == 0 {
            return Ok(0);
        }
    }

    let mut positions = [0u8; 64];
    let count = decode_significance_map(cabac, ctxs, cat, layout, &mut positions);
    decode_levels(cabac, ctxs, cat, layout, &positions[..count], coeffs)?;
    Ok(count)
}

/// 解码显著性图, 按升序写入 levelListIdx, 返回数量
fn decode_significance_map(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    cat: &BlockCat,
    layout: &BlockScan,
    positions: &mut [u8; 64],
) -> usize {
    let field = usize::from(layout.field);
    let sig_base = cat.sig_offset[field];
    let last_base = cat.last_offset[field];
    let last_idx = layout.len.min(64) - 1;
    let mut count = 0usize;

    for i in 0..last_idx {
        let (sig_inc, last_inc) = if cat.is_8x8() {
            let sig_table = if layout.field {
                &SIG_CTX_INC_8X8_FIELD
            } else {
                &SIG_CTX_INC_8X8_FRAME
            };
            (
                usize::from(sig_table[i]),
                usize::from(LAST_CTX_INC_8X8[i]),
            )
        } else if cat.is_chroma_dc() {
            let inc = (i / layout.num_c8x8.max(1)).min(2);
            (inc, inc)
        } else {
            (i, i)
        };

        if cabac.decode_decision(&mut ctxs[sig_base + sig_inc]) == 1 {
            positions[count] = i as u8;
            count += 1;
            if cabac.decode_decision(&mut ctxs[last_base + last_inc]) == 1 {
                return count;
            }
        }
    }
    // 扫描到最后一个位置仍未遇到 last, 该位置必为显著
    positions[count] = last_idx as u8;
    count + 1
}

/// 逆序解码系数绝对值与符号, 写入反扫描后的位置
fn decode_levels(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    cat: &BlockCat,
    layout: &BlockScan,
    positions: &[u8],
    coeffs: &mut [i32],
) -> AvcResult<()> {
    let mut num_eq1 = 0usize;
    let mut num_gt1 = 0usize;
    let gt1_cap = if cat.is_chroma_dc() { 3 } else { 4 };

    for &idx in positions.iter().rev() {
        let inc0 = if num_gt1 != 0 {
            0
        } else {
            (1 + num_eq1).min(4)
        };
        let inc_n = 5 + num_gt1.min(gt1_cap);
        let minus1 = decode_abs_level_minus1(cabac, ctxs, cat.abs_offset, inc0, inc_n)?;
        let sign = cabac.decode_bypass();

        let magnitude = minus1 as i32 + 1;
        let level = if sign == 1 { -magnitude } else { magnitude };
        let scan_pos = layout.start + usize::from(idx);
        let dst = layout.scan.get(scan_pos).map(|&d| usize::from(d));
        if let Some(slot) = dst.and_then(|d| coeffs.get_mut(d)) {
            *slot = level;
        }

        if minus1 == 0 {
            num_eq1 += 1;
        } else {
            num_gt1 += 1;
        }
    }
    Ok(())
}

/// 解码 coeff_abs_level_minus1: 截断一元前缀 (上限 14) 加 0 阶指数哥伦布旁路后缀
fn decode_abs_level_minus1(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    abs_offset: usize,
    inc0: usize,
    inc_n: usize,
) -> AvcResult<u32> {
    if cabac.decode_decision(&mut ctxs[abs_offset + inc0]) == 0 {
        return Ok(0);
    }
    let mut prefix = 1u32;
    while prefix < 14 {
        if cabac.decode_decision(&mut ctxs[abs_offset + inc_n]) == 0 {
            return Ok(prefix);
        }
        prefix += 1;
    }
    Ok(14 + decode_escape_suffix(cabac)?)
}

/// 旁路转义后缀: k 个前导 1, 再以 k 个二进制位从 1 开始倍增
fn decode_escape_suffix(cabac: &mut CabacDecoder) -> AvcResult<u32> {
    let mut k = 0u32;
    while cabac.decode_bypass() == 1 {
        k += 1;
        if k > ESCAPE_MAX_K {
            return Err(AvcError::EntropyDesync(format!(
                "H264: coeff_abs_level_minus1 转义前缀过长, bits={}",
                cabac.bits_consumed()
            )));
        }
    }
    let mut value = 1u32;
    for _ in 0..k {
        value = (value << 1) | cabac.decode_bypass();
    }
    Ok(value - 1)
}
