use super::*;

/// luma4x4BlkIdx → 宏块内 4x4 块光栅坐标 (x, y)
pub(super) const BLK4X4_XY: [(usize, usize); 16] = [
    (0, 0),
    (1, 0),
    (0, 1),
    (1, 1),
    (2, 0),
    (3, 0),
    (2, 1),
    (3, 1),
    (0, 2),
    (1, 2),
    (0, 3),
    (1, 3),
    (2, 2),
    (3, 2),
    (2, 3),
    (3, 3),
];

impl SliceDecoder {
    /// 解码 I_NxN 的预测模式, 返回按 luma4x4BlkIdx 排列的 16 个模式
    ///
    /// 8x8 变换时每个 8x8 块只解码一次, 其模式复制到所含的 4 个 4x4 块.
    pub(super) fn decode_intra_nxn_modes(
        &mut self,
        cabac: &mut CabacDecoder,
        rec: &mut MbContext,
        left: &MbContext,
        above: &MbContext,
        transform_8x8: bool,
    ) -> [u8; 16] {
        let mut modes = [2u8; 16];
        let step = if transform_8x8 { 4 } else { 1 };

        for blk in (0..16).step_by(step) {
            let (bx, by) = BLK4X4_XY[blk];
            let pred_mode = predicted_intra_mode(rec, left, above, bx, by);
            let mode = decode_intra_pred_mode(cabac, &mut self.ctxs, pred_mode).min(8);
            trace!("H264: intra 预测模式 blk={} pred={} mode={}", blk, pred_mode, mode);

            for sub in blk..blk + step {
                let (sx, sy) = BLK4X4_XY[sub];
                modes[sub] = mode;
                rec.intra_modes[sy * 4 + sx] = mode;
            }
        }
        modes
    }

    /// 解码 I_PCM 样本: 对齐到终止 bin 之后的字节边界, 按位深读取原始样本, 再重启引擎
    pub(super) fn decode_pcm_samples(&self, cabac: &mut CabacDecoder) -> AvcResult<PcmSamples> {
        let start = cabac.pcm_byte_position();
        let chroma_len = self.pic.chroma_format.chroma_samples_per_mb();
        let bits_y = u32::from(self.pic.bit_depth_luma);
        let bits_c = u32::from(self.pic.bit_depth_chroma);
        let total_bits = 256 * bits_y as usize + 2 * chroma_len * bits_c as usize;
        let end = start + total_bits.div_ceil(8);

        let data = cabac.data();
        if end > cabac.declared_len() {
            return Err(AvcError::EntropyDesync(format!(
                "H264: I_PCM 样本越过 slice 末尾, start={}, end={}, declared_len={}",
                start,
                end,
                cabac.declared_len()
            )));
        }
        let raw = &data[start..end];
        let mut br = BitReader::new(raw);
        let mut read_plane = |len: usize, bits: u32| -> AvcResult<Vec<u16>> {
            (0..len)
                .map(|_| br.read_bits(bits).map(|v| v as u16))
                .collect()
        };
        let samples = PcmSamples {
            luma: read_plane(256, bits_y)?,
            cb: read_plane(chroma_len, bits_c)?,
            cr: read_plane(chroma_len, bits_c)?,
        };
        debug!(
            "H264: I_PCM 宏块, byte_range={}..{}, chroma_samples={}",
            start, end, chroma_len
        );

        cabac.record_pcm(raw);
        cabac.restart_engine_at(end);
        Ok(samples)
    }
}

/// 由左侧与上侧 4x4 块推导预测模式
///
/// 任一侧不可用 (含受限帧内预测下的帧间宏块) 时为 DC (2),
/// 否则取两者最小值, 非 NxN 宏块的记录值本身即为 2.
fn predicted_intra_mode(
    rec: &MbContext,
    left: &MbContext,
    above: &MbContext,
    bx: usize,
    by: usize,
) -> u8 {
    let mode_a = if bx > 0 {
        Some(rec.intra_modes[by * 4 + bx - 1])
    } else if left.intra_pred_unavailable {
        None
    } else {
        Some(left.intra_modes[by * 4 + 3])
    };
    let mode_b = if by > 0 {
        Some(rec.intra_modes[(by - 1) * 4 + bx])
    } else if above.intra_pred_unavailable {
        None
    } else {
        Some(above.intra_modes[12 + bx])
    };
    match (mode_a, mode_b) {
        (Some(a), Some(b)) => a.min(b),
        _ => 2,
    }
}
