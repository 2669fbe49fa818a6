use super::*;

// ============================================================
// 上下文索引起点
// ============================================================

const CTX_MB_TYPE_I: usize = 3;
const CTX_MB_SKIP_P: usize = 11;
const CTX_MB_TYPE_P_PREFIX: usize = 14;
const CTX_MB_TYPE_P_INTRA: usize = 17;
const CTX_MB_SKIP_B: usize = 24;
const CTX_MB_TYPE_B: usize = 27;
const CTX_MB_TYPE_B_INTRA: usize = 32;
const CTX_MB_QP_DELTA: usize = 60;
const CTX_CHROMA_PRED: usize = 64;
const CTX_PREV_INTRA_PRED: usize = 68;
const CTX_REM_INTRA_PRED: usize = 69;
const CTX_CBP_LUMA: usize = 73;
const CTX_CBP_CHROMA: usize = 77;
const CTX_TRANSFORM_8X8: usize = 399;

/// I_PCM 的 mb_type 值 (I slice 编号)
pub(super) const MB_TYPE_I_PCM: u32 = 25;

// ============================================================
// 宏块类型
// ============================================================

/// 解码后的 mb_type 分类
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum MbTypeClass {
    /// 帧内宏块, 值为 I slice 编号 (0 = I_NxN, 1..=24 = I_16x16, 25 = I_PCM)
    Intra(u32),
    /// P 帧间分割, 值为 P slice 编号
    InterP(u32),
    /// B 帧间分割, 值为 B slice 编号 (0 = B_Direct_16x16)
    InterB(u32),
}

/// 解码 mb_skip_flag
pub(super) fn decode_mb_skip_flag(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    slice_type: SliceType,
    left: &MbContext,
    above: &MbContext,
) -> u32 {
    let base = if slice_type == SliceType::B {
        CTX_MB_SKIP_B
    } else {
        CTX_MB_SKIP_P
    };
    let inc = usize::from(left.skip_inc + above.skip_inc);
    cabac.decode_decision(&mut ctxs[base + inc])
}

/// 解码 I slice 的 mb_type
pub(super) fn decode_i_mb_type(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    left: &MbContext,
    above: &MbContext,
) -> u32 {
    let inc = usize::from(left.mb_type_i_inc + above.mb_type_i_inc);
    decode_intra_mb_type(cabac, ctxs, CTX_MB_TYPE_I, Some(inc))
}

/// 通用帧内 mb_type 解码
///
/// `prefix_inc` 为 `Some` 时按 I slice 规则 (邻居增量, 后缀起点 +2),
/// 为 `None` 时按 P/B slice 中的帧内前缀规则.
pub(super) fn decode_intra_mb_type(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    ctx_base: usize,
    prefix_inc: Option<usize>,
) -> u32 {
    let mut state_base = ctx_base;
    if let Some(inc) = prefix_inc {
        if cabac.decode_decision(&mut ctxs[state_base + inc]) == 0 {
            return 0;
        }
        state_base += 2;
    } else if cabac.decode_decision(&mut ctxs[state_base]) == 0 {
        return 0;
    }

    if cabac.decode_terminate() == 1 {
        return MB_TYPE_I_PCM;
    }

    decode_i_16x16_suffix_with_base(cabac, ctxs, state_base, prefix_inc.is_some())
}

/// 按上下文基址解码 I_16x16 后缀: 亮度 CBP, 色度 CBP, 预测模式
pub(super) fn decode_i_16x16_suffix_with_base(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    state_base: usize,
    intra_slice: bool,
) -> u32 {
    let intra = usize::from(intra_slice);
    let cbp_luma = cabac.decode_decision(&mut ctxs[state_base + 1]);
    let cbp_c0 = cabac.decode_decision(&mut ctxs[state_base + 2]);
    let cbp_chroma = if cbp_c0 == 0 {
        0
    } else {
        let cbp_c1 = cabac.decode_decision(&mut ctxs[state_base + 2 + intra]);
        1 + cbp_c1
    };
    let pm0 = cabac.decode_decision(&mut ctxs[state_base + 3 + intra]);
    let pm1 = cabac.decode_decision(&mut ctxs[state_base + 3 + intra * 2]);
    let pred_mode = pm0 * 2 + pm1;
    1 + pred_mode + 4 * cbp_chroma + 12 * cbp_luma
}

/// 解码 P slice 的 mb_type (非 skip)
pub(super) fn decode_p_mb_type(cabac: &mut CabacDecoder, ctxs: &mut ContextModel) -> MbTypeClass {
    if cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_P_PREFIX]) == 0 {
        let mb_type = if cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_P_PREFIX + 1]) == 0 {
            // 000: P_L0_16x16, 001: P_8x8
            3 * cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_P_PREFIX + 2])
        } else {
            // 011: P_L0_L0_16x8, 010: P_L0_L0_8x16
            2 - cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_P_PREFIX + 3])
        };
        return MbTypeClass::InterP(mb_type);
    }
    MbTypeClass::Intra(decode_intra_mb_type(
        cabac,
        ctxs,
        CTX_MB_TYPE_P_INTRA,
        None,
    ))
}

/// 解码 B slice 的 mb_type (非 skip)
pub(super) fn decode_b_mb_type(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    left: &MbContext,
    above: &MbContext,
) -> MbTypeClass {
    let inc = usize::from(left.mb_type_b_inc + above.mb_type_b_inc);
    if cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + inc]) == 0 {
        return MbTypeClass::InterB(0);
    }
    if cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + 3]) == 0 {
        return MbTypeClass::InterB(1 + cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + 5]));
    }

    let mut bits = cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + 4]) << 3;
    bits |= cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + 5]) << 2;
    bits |= cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + 5]) << 1;
    bits |= cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + 5]);
    match bits {
        0..=7 => MbTypeClass::InterB(bits + 3),
        13 => MbTypeClass::Intra(decode_intra_mb_type(
            cabac,
            ctxs,
            CTX_MB_TYPE_B_INTRA,
            None,
        )),
        14 => MbTypeClass::InterB(11),
        15 => MbTypeClass::InterB(22),
        _ => {
            bits = (bits << 1) | cabac.decode_decision(&mut ctxs[CTX_MB_TYPE_B + 5]);
            MbTypeClass::InterB(bits - 4)
        }
    }
}

// ============================================================
// 帧内预测模式
// ============================================================

/// 解码 prev_intra_pred_mode_flag 与 rem_intra_pred_mode, 返回最终模式
pub(super) fn decode_intra_pred_mode(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    pred_mode: u8,
) -> u8 {
    if cabac.decode_decision(&mut ctxs[CTX_PREV_INTRA_PRED]) == 1 {
        return pred_mode;
    }
    let rem = (cabac.decode_decision(&mut ctxs[CTX_REM_INTRA_PRED])
        | (cabac.decode_decision(&mut ctxs[CTX_REM_INTRA_PRED]) << 1)
        | (cabac.decode_decision(&mut ctxs[CTX_REM_INTRA_PRED]) << 2)) as u8;
    if rem < pred_mode { rem } else { rem + 1 }
}

/// 解码 intra_chroma_pred_mode (截断一元, 最大 3)
pub(super) fn decode_chroma_pred_mode(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    left: &MbContext,
    above: &MbContext,
) -> u8 {
    let inc = usize::from(left.chroma_pred_inc + above.chroma_pred_inc);
    if cabac.decode_decision(&mut ctxs[CTX_CHROMA_PRED + inc]) == 0 {
        return 0;
    }
    if cabac.decode_decision(&mut ctxs[CTX_CHROMA_PRED + 3]) == 0 {
        return 1;
    }
    if cabac.decode_decision(&mut ctxs[CTX_CHROMA_PRED + 3]) == 0 {
        return 2;
    }
    3
}

// ============================================================
// coded_block_pattern / transform_size_8x8_flag
// ============================================================

/// 解码 coded_block_pattern, 返回 (亮度 4 位, 色度 0..=2)
pub(super) fn decode_coded_block_pattern(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    left: &MbContext,
    above: &MbContext,
    has_chroma: bool,
) -> (u8, u8) {
    let mut luma = 0u8;
    for b8 in 0..4usize {
        // 左侧 / 上侧 8x8 块可能位于当前宏块内, 此时取已解码的位
        let bit_a = if b8 & 1 == 1 {
            (luma >> (b8 - 1)) & 1
        } else {
            (left.cbp_luma >> (b8 + 1)) & 1
        };
        let bit_b = if b8 >= 2 {
            (luma >> (b8 - 2)) & 1
        } else {
            (above.cbp_luma >> (b8 + 2)) & 1
        };
        let inc = usize::from(bit_a == 0) + 2 * usize::from(bit_b == 0);
        luma |= (cabac.decode_decision(&mut ctxs[CTX_CBP_LUMA + inc]) as u8) << b8;
    }

    if !has_chroma {
        return (luma, 0);
    }
    let inc = usize::from(left.cbp_chroma != 0) + 2 * usize::from(above.cbp_chroma != 0);
    if cabac.decode_decision(&mut ctxs[CTX_CBP_CHROMA + inc]) == 0 {
        return (luma, 0);
    }
    let inc = usize::from(left.cbp_chroma == 2) + 2 * usize::from(above.cbp_chroma == 2);
    let chroma = 1 + cabac.decode_decision(&mut ctxs[CTX_CBP_CHROMA + 4 + inc]) as u8;
    (luma, chroma)
}

/// 解码 transform_size_8x8_flag
pub(super) fn decode_transform_size_8x8_flag(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    left: &MbContext,
    above: &MbContext,
) -> bool {
    let inc = usize::from(left.transform_8x8 + above.transform_8x8);
    cabac.decode_decision(&mut ctxs[CTX_TRANSFORM_8X8 + inc]) == 1
}

// ============================================================
// mb_qp_delta
// ============================================================

/// 解码 mb_qp_delta (一元编码后按正负交替映射)
///
/// 结果超出 [-(26 + QpBdOffsetY/2), 25 + QpBdOffsetY/2] 时视为熵解码失步.
pub(super) fn decode_qp_delta(
    cabac: &mut CabacDecoder,
    ctxs: &mut ContextModel,
    prev_nz: bool,
    qp_bd_offset: i32,
) -> AvcResult<i32> {
    let max_val = 2 * (52 + qp_bd_offset as u32);
    let mut ctx_idx = usize::from(prev_nz);
    let mut val = 0u32;

    while cabac.decode_decision(&mut ctxs[CTX_MB_QP_DELTA + ctx_idx]) == 1 {
        ctx_idx = 2 + (ctx_idx >> 1);
        val += 1;
        if val > max_val {
            return Err(AvcError::EntropyDesync(format!(
                "H264: mb_qp_delta 一元码过长, bits={}",
                cabac.bits_consumed()
            )));
        }
    }

    let delta = if val & 1 == 1 {
        val.div_ceil(2) as i32
    } else {
        -((val / 2) as i32)
    };
    let limit = qp_bd_offset / 2;
    if delta < -(26 + limit) || delta > 25 + limit {
        return Err(AvcError::EntropyDesync(format!(
            "H264: mb_qp_delta 越界, delta={}, qp_bd_offset={}",
            delta, qp_bd_offset
        )));
    }
    Ok(delta)
}

/// 由 QP_Y 派生三个平面的 QP' (已加位深偏移)
pub(super) fn derive_plane_qps(qp_y: i32, pic: &PictureParams) -> [i32; 3] {
    let bd_y = pic.qp_bd_offset_luma();
    let bd_c = pic.qp_bd_offset_chroma();
    let chroma = |offset: i32| {
        chroma_qp_from_index((qp_y + offset).clamp(-bd_c, 51)) + bd_c
    };
    [
        qp_y + bd_y,
        chroma(pic.chroma_qp_index_offset),
        chroma(pic.second_chroma_qp_index_offset),
    ]
}

/// 应用 mb_qp_delta, 结果回绕到 [-QpBdOffsetY, 51]
pub(super) fn apply_qp_delta(qp_y: i32, delta: i32, qp_bd_offset: i32) -> i32 {
    (qp_y + delta + 52 + 2 * qp_bd_offset).rem_euclid(52 + qp_bd_offset) - qp_bd_offset
}
