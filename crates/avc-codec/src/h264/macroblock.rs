use super::*;

/// P slice 帧间 mb_type 名称
const P_MB_TYPE_NAMES: [&str; 5] = [
    "P_L0_16x16",
    "P_L0_L0_16x8",
    "P_L0_L0_8x16",
    "P_8x8",
    "P_8x8ref0",
];

/// B slice 帧间 mb_type 名称
const B_MB_TYPE_NAMES: [&str; 23] = [
    "B_Direct_16x16",
    "B_L0_16x16",
    "B_L1_16x16",
    "B_Bi_16x16",
    "B_L0_L0_16x8",
    "B_L0_L0_8x16",
    "B_L1_L1_16x8",
    "B_L1_L1_8x16",
    "B_L0_L1_16x8",
    "B_L0_L1_8x16",
    "B_L1_L0_16x8",
    "B_L1_L0_8x16",
    "B_L0_Bi_16x8",
    "B_L0_Bi_8x16",
    "B_L1_Bi_16x8",
    "B_L1_Bi_8x16",
    "B_Bi_L0_16x8",
    "B_Bi_L0_8x16",
    "B_Bi_L1_16x8",
    "B_Bi_L1_8x16",
    "B_Bi_Bi_16x8",
    "B_Bi_Bi_8x16",
    "B_8x8",
];

impl SliceDecoder {
    /// 解析一个宏块, 提交邻居记录并返回重建单元
    pub(super) fn decode_macroblock(
        &mut self,
        cabac: &mut CabacDecoder,
        mb_x: usize,
        mb_y: usize,
    ) -> AvcResult<MacroblockUnit> {
        let mut rec = self.grid.seed(mb_x, mb_y);
        let left = *self.grid.left();
        let above = *self.grid.above();
        let availability = self.intra_availability();

        let mb_type = match self.slice_type {
            SliceType::I => decode_i_mb_type(cabac, &mut self.ctxs, &left, &above),
            SliceType::P | SliceType::B => {
                let skip =
                    decode_mb_skip_flag(cabac, &mut self.ctxs, self.slice_type, &left, &above);
                trace!("H264: mb({}, {}) mb_skip_flag={}", mb_x, mb_y, skip);
                if skip == 1 {
                    return Ok(self.finish_skip_mb(rec, mb_x, mb_y, availability));
                }
                let class = if self.slice_type == SliceType::P {
                    decode_p_mb_type(cabac, &mut self.ctxs)
                } else {
                    decode_b_mb_type(cabac, &mut self.ctxs, &left, &above)
                };
                match class {
                    MbTypeClass::Intra(mb_type) => mb_type,
                    MbTypeClass::InterP(t) => {
                        return Err(unsupported_inter("P", &P_MB_TYPE_NAMES, t, mb_x, mb_y));
                    }
                    MbTypeClass::InterB(t) => {
                        return Err(unsupported_inter("B", &B_MB_TYPE_NAMES, t, mb_x, mb_y));
                    }
                }
            }
            other => {
                return Err(AvcError::UnsupportedFeature(format!(
                    "H264: slice 类型 {:?} 的宏块语法",
                    other
                )));
            }
        };
        trace!("H264: mb({}, {}) mb_type={}", mb_x, mb_y, mb_type);

        // 帧内宏块总可作为帧内预测参考
        rec.intra_pred_unavailable = false;
        if mb_type == MB_TYPE_I_PCM {
            let samples = self.decode_pcm_samples(cabac)?;
            rec.mark_pcm();
            self.prev_qp_delta_nz = false;
            self.grid.commit(rec);
            return Ok(MacroblockUnit {
                mb_x,
                mb_y,
                kind: MacroblockKind::Pcm { samples },
                availability,
                qp: derive_plane_qps(self.qp, &self.pic),
                transform_8x8: false,
                cbp_luma: 0x0F,
                cbp_chroma: 2,
                coeffs: Box::default(),
            });
        }

        let has_chroma_pred = self.pic.chroma_format.has_chroma_dc();
        let mut coeffs = Box::<MacroblockCoeffs>::default();

        let (kind, cbp_luma, cbp_chroma) = if mb_type == 0 {
            // I_NxN
            rec.mb_type_i_inc = 0;
            let transform_8x8 = self.pic.transform_8x8_mode
                && decode_transform_size_8x8_flag(cabac, &mut self.ctxs, &left, &above);
            rec.transform_8x8 = u8::from(transform_8x8);
            let raw_modes =
                self.decode_intra_nxn_modes(cabac, &mut rec, &left, &above, transform_8x8);
            let chroma = self.decode_chroma_mode(cabac, &mut rec, &left, &above, has_chroma_pred);
            let (luma, chroma_cbp) =
                decode_coded_block_pattern(cabac, &mut self.ctxs, &left, &above, has_chroma_pred);
            trace!(
                "H264: mb({}, {}) cbp_luma={:#x} cbp_chroma={}",
                mb_x,
                mb_y,
                luma,
                chroma_cbp
            );
            let kind = if transform_8x8 {
                let mut modes = [IntraNxNMode::Dc; 4];
                for (b8, mode) in modes.iter_mut().enumerate() {
                    *mode = IntraNxNMode::from_index(raw_modes[b8 * 4]);
                }
                MacroblockKind::Intra8x8 { modes, chroma }
            } else {
                MacroblockKind::Intra4x4 {
                    modes: raw_modes.map(IntraNxNMode::from_index),
                    chroma,
                }
            };
            (kind, luma, chroma_cbp)
        } else {
            // I_16x16: 预测模式与 CBP 由 mb_type 直接给出
            let sub = mb_type - 1;
            let mode = Intra16x16Mode::from_index(sub % 4);
            let chroma_cbp = ((sub / 4) % 3) as u8;
            let luma = if sub >= 12 { 0x0F } else { 0 };
            let chroma = self.decode_chroma_mode(cabac, &mut rec, &left, &above, has_chroma_pred);
            (MacroblockKind::Intra16x16 { mode, chroma }, luma, chroma_cbp)
        };
        rec.cbp_luma = cbp_luma;
        rec.cbp_chroma = cbp_chroma;

        let is_16x16 = matches!(kind, MacroblockKind::Intra16x16 { .. });
        if cbp_luma != 0 || cbp_chroma != 0 || is_16x16 {
            let delta = decode_qp_delta(
                cabac,
                &mut self.ctxs,
                self.prev_qp_delta_nz,
                self.pic.qp_bd_offset_luma(),
            )?;
            trace!("H264: mb({}, {}) mb_qp_delta={}", mb_x, mb_y, delta);
            self.prev_qp_delta_nz = delta != 0;
            self.qp = apply_qp_delta(self.qp, delta, self.pic.qp_bd_offset_luma());
            self.decode_mb_residual(cabac, &mut rec, &left, &above, is_16x16, &mut coeffs)?;
        } else {
            self.prev_qp_delta_nz = false;
        }

        self.grid.commit(rec);
        Ok(MacroblockUnit {
            mb_x,
            mb_y,
            kind,
            availability,
            qp: derive_plane_qps(self.qp, &self.pic),
            transform_8x8: rec.transform_8x8 != 0,
            cbp_luma,
            cbp_chroma,
            coeffs,
        })
    }

    /// P_Skip / B_Skip: 无残差, QP 不变
    fn finish_skip_mb(
        &mut self,
        mut rec: MbContext,
        mb_x: usize,
        mb_y: usize,
        availability: NeighborAvailability,
    ) -> MacroblockUnit {
        rec.mark_skip();
        self.prev_qp_delta_nz = false;
        self.grid.commit(rec);
        MacroblockUnit {
            mb_x,
            mb_y,
            kind: MacroblockKind::Skip,
            availability,
            qp: derive_plane_qps(self.qp, &self.pic),
            transform_8x8: false,
            cbp_luma: 0,
            cbp_chroma: 0,
            coeffs: Box::default(),
        }
    }

    /// 帧内预测可用的相邻宏块
    fn intra_availability(&self) -> NeighborAvailability {
        let mut flags = NeighborAvailability::empty();
        let neighbors = [
            (self.grid.left(), NeighborAvailability::LEFT),
            (self.grid.above(), NeighborAvailability::TOP),
            (self.grid.above_left(), NeighborAvailability::TOP_LEFT),
            (self.grid.above_right(), NeighborAvailability::TOP_RIGHT),
        ];
        for (ctx, flag) in neighbors {
            if !ctx.intra_pred_unavailable {
                flags |= flag;
            }
        }
        flags
    }

    /// 解码 intra_chroma_pred_mode 并记录条件项
    fn decode_chroma_mode(
        &mut self,
        cabac: &mut CabacDecoder,
        rec: &mut MbContext,
        left: &MbContext,
        above: &MbContext,
        has_chroma_pred: bool,
    ) -> ChromaPredMode {
        if !has_chroma_pred {
            return ChromaPredMode::Dc;
        }
        let mode = decode_chroma_pred_mode(cabac, &mut self.ctxs, left, above);
        rec.chroma_pred_inc = u8::from(mode != 0);
        ChromaPredMode::from_index(mode)
    }
}

fn unsupported_inter(
    slice: &str,
    names: &[&str],
    mb_type: u32,
    mb_x: usize,
    mb_y: usize,
) -> AvcError {
    let name = names.get(mb_type as usize).copied().unwrap_or("未知");
    AvcError::UnsupportedFeature(format!(
        "H264: {} 帧间宏块 {} (mb_type={}), mb=({}, {})",
        slice, name, mb_type, mb_x, mb_y
    ))
}
