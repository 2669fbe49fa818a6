use super::*;

use macroblock_intra::BLK4X4_XY;
use residual::PLANE_CATS;

/// 不可用邻居的 coded_block_flag 条件项.
/// 残差只在帧内宏块中解析, 此时不可用邻居按已编码处理.
const UNAVAILABLE_CBF_COND: usize = 1;

impl SliceDecoder {
    /// 按 CBP, 变换尺寸与色度格式解码一个宏块的全部残差块
    pub(super) fn decode_mb_residual(
        &mut self,
        cabac: &mut CabacDecoder,
        rec: &mut MbContext,
        left: &MbContext,
        above: &MbContext,
        is_16x16: bool,
        coeffs: &mut MacroblockCoeffs,
    ) -> AvcResult<()> {
        self.decode_luma_like_residual(cabac, rec, left, above, 0, is_16x16, coeffs)?;
        match self.pic.chroma_format {
            ChromaFormat::Monochrome => {}
            ChromaFormat::Yuv444 => {
                for plane in 1..3 {
                    self.decode_luma_like_residual(
                        cabac, rec, left, above, plane, is_16x16, coeffs,
                    )?;
                }
            }
            ChromaFormat::Yuv420 | ChromaFormat::Yuv422 => {
                self.decode_chroma_residual(cabac, rec, left, above, coeffs)?;
            }
        }
        Ok(())
    }

    /// 亮度残差, 4:4:4 时 Cb/Cr 也按此路径以各自的块类别解码
    #[allow(clippy::too_many_arguments)]
    fn decode_luma_like_residual(
        &mut self,
        cabac: &mut CabacDecoder,
        rec: &mut MbContext,
        left: &MbContext,
        above: &MbContext,
        plane: usize,
        is_16x16: bool,
        coeffs: &mut MacroblockCoeffs,
    ) -> AvcResult<()> {
        let [cat_dc, cat_ac, cat_4x4, cat_8x8] = PLANE_CATS[plane];
        let scan4: &[u8] = if self.field {
            &FIELD_SCAN_4X4
        } else {
            &ZIGZAG_4X4
        };

        if is_16x16 {
            let layout = self.block_scan(scan4, 0, 16);
            let inc = dc_cbf_inc(left, above, plane);
            let n = decode_residual_block(
                cabac,
                &mut self.ctxs,
                &cat_dc,
                Some(inc),
                &layout,
                &mut coeffs.dc[plane],
            )?;
            rec.cbf_dc |= u8::from(n > 0) << plane;
        }

        let transform_8x8 = rec.transform_8x8 != 0;
        for b8 in 0..4 {
            if rec.cbp_luma & (1 << b8) == 0 {
                continue;
            }
            if transform_8x8 {
                let scan8: &[u8] = if self.field {
                    &FIELD_SCAN_8X8
                } else {
                    &ZIGZAG_8X8
                };
                let layout = self.block_scan(scan8, 0, 64);
                // 非 4:4:4 时 8x8 块不携带 coded_block_flag
                let cbf_inc = (self.pic.chroma_format == ChromaFormat::Yuv444)
                    .then(|| cbf_8x8_inc(rec, left, above, plane, b8));
                let n = decode_residual_block(
                    cabac,
                    &mut self.ctxs,
                    &cat_8x8,
                    cbf_inc,
                    &layout,
                    &mut coeffs.planes[plane][b8 * 64..b8 * 64 + 64],
                )?;
                let coded = u16::from(n > 0);
                rec.cbf_8x8[plane] |= (coded as u8) << b8;
                for blk in b8 * 4..b8 * 4 + 4 {
                    let (bx, by) = BLK4X4_XY[blk];
                    rec.cbf_4x4[plane] |= coded << (by * 4 + bx);
                }
                continue;
            }

            for blk in b8 * 4..b8 * 4 + 4 {
                let (bx, by) = BLK4X4_XY[blk];
                let (cat, layout) = if is_16x16 {
                    (&cat_ac, self.block_scan(scan4, 1, 15))
                } else {
                    (&cat_4x4, self.block_scan(scan4, 0, 16))
                };
                let inc = cbf_4x4_inc(rec, left, above, plane, bx, by, 4, 4);
                let n = decode_residual_block(
                    cabac,
                    &mut self.ctxs,
                    cat,
                    Some(inc),
                    &layout,
                    &mut coeffs.planes[plane][blk * 16..blk * 16 + 16],
                )?;
                rec.cbf_4x4[plane] |= u16::from(n > 0) << (by * 4 + bx);
            }
        }
        Ok(())
    }

    /// 4:2:0 / 4:2:2 色度残差: 先两个平面的 DC, 再两个平面的 AC
    fn decode_chroma_residual(
        &mut self,
        cabac: &mut CabacDecoder,
        rec: &mut MbContext,
        left: &MbContext,
        above: &MbContext,
        coeffs: &mut MacroblockCoeffs,
    ) -> AvcResult<()> {
        let num_c8x8 = self.pic.chroma_format.num_c8x8();
        let num_blocks = 4 * num_c8x8;

        if rec.cbp_chroma & 3 != 0 {
            let dc_scan: &[u8] = if num_c8x8 == 1 {
                &CHROMA_DC_SCAN_420
            } else {
                &CHROMA_DC_SCAN_422
            };
            let layout = self.block_scan(dc_scan, 0, num_blocks);
            for plane in 1..3 {
                let inc = dc_cbf_inc(left, above, plane);
                let n = decode_residual_block(
                    cabac,
                    &mut self.ctxs,
                    &CAT_CHROMA_DC,
                    Some(inc),
                    &layout,
                    &mut coeffs.dc[plane],
                )?;
                rec.cbf_dc |= u8::from(n > 0) << plane;
            }
        }

        if rec.cbp_chroma & 2 != 0 {
            let scan4: &[u8] = if self.field {
                &FIELD_SCAN_4X4
            } else {
                &ZIGZAG_4X4
            };
            let layout = self.block_scan(scan4, 1, 15);
            let rows = 2 * num_c8x8;
            for plane in 1..3 {
                for blk in 0..num_blocks {
                    let (bx, by) = (blk % 2, blk / 2);
                    let inc = cbf_4x4_inc(rec, left, above, plane, bx, by, 2, rows);
                    let n = decode_residual_block(
                        cabac,
                        &mut self.ctxs,
                        &CAT_CHROMA_AC,
                        Some(inc),
                        &layout,
                        &mut coeffs.planes[plane][blk * 16..blk * 16 + 16],
                    )?;
                    rec.cbf_4x4[plane] |= u16::from(n > 0) << (by * 2 + bx);
                }
            }
        }
        Ok(())
    }

    fn block_scan<'s>(&self, scan: &'s [u8], start: usize, len: usize) -> BlockScan<'s> {
        BlockScan {
            scan,
            start,
            len,
            field: self.field,
            num_c8x8: self.pic.chroma_format.num_c8x8(),
        }
    }
}

// ============================================================
// coded_block_flag 上下文增量
// ============================================================

fn neighbor_cond(neighbor: &MbContext, bit: impl FnOnce(&MbContext) -> usize) -> usize {
    if neighbor.available {
        bit(neighbor)
    } else {
        UNAVAILABLE_CBF_COND
    }
}

/// DC 块: 邻居宏块同平面 DC 块的 coded_block_flag
fn dc_cbf_inc(left: &MbContext, above: &MbContext, plane: usize) -> usize {
    let dc_bit = |n: &MbContext| usize::from((n.cbf_dc >> plane) & 1);
    neighbor_cond(left, dc_bit) + 2 * neighbor_cond(above, dc_bit)
}

/// 4x4 块: 宏块内取已解码的相邻块, 宏块边界取邻居宏块的边缘块
#[allow(clippy::too_many_arguments)]
fn cbf_4x4_inc(
    rec: &MbContext,
    left: &MbContext,
    above: &MbContext,
    plane: usize,
    bx: usize,
    by: usize,
    width: usize,
    rows: usize,
) -> usize {
    let a = if bx > 0 {
        rec.cbf_4x4_bit(plane, bx - 1, by, width)
    } else {
        neighbor_cond(left, |n| n.cbf_4x4_bit(plane, width - 1, by, width))
    };
    let b = if by > 0 {
        rec.cbf_4x4_bit(plane, bx, by - 1, width)
    } else {
        neighbor_cond(above, |n| n.cbf_4x4_bit(plane, bx, rows - 1, width))
    };
    a + 2 * b
}

/// 8x8 块 (仅 4:4:4)
fn cbf_8x8_inc(
    rec: &MbContext,
    left: &MbContext,
    above: &MbContext,
    plane: usize,
    b8: usize,
) -> usize {
    let (b8x, b8y) = (b8 % 2, b8 / 2);
    let a = if b8x > 0 {
        rec.cbf_8x8_bit(plane, 0, b8y)
    } else {
        neighbor_cond(left, |n| n.cbf_8x8_bit(plane, 1, b8y))
    };
    let b = if b8y > 0 {
        rec.cbf_8x8_bit(plane, b8x, 0)
    } else {
        neighbor_cond(above, |n| n.cbf_8x8_bit(plane, b8x, 1))
    };
    a + 2 * b
}
