use avc_core::AvcResult;

use super::super::tables::{LAST_CTX_INC_8X8, SIG_CTX_INC_8X8_FIELD, SIG_CTX_INC_8X8_FRAME};
use super::super::{
    BlockCat, CabacEncoder, ContextModel, DecoderConfig, MacroblockUnit, PictureParams,
    SampleReconstruction, SliceData, SliceDecoder, SliceParams, SliceSummary,
};

/// 带独立上下文模型的合成码流写入器, 与解码器按同样的 (QP, 表编号) 初始化
pub struct SliceWriter {
    pub enc: CabacEncoder,
    pub ctxs: ContextModel,
    /// 场编码: 残差使用场显著性上下文
    pub field: bool,
}

impl SliceWriter {
    pub fn new(slice_qp: i32, init_idc: usize) -> Self {
        Self {
            enc: CabacEncoder::new(),
            ctxs: ContextModel::new(slice_qp, init_idc).expect("上下文初始化应成功"),
            field: false,
        }
    }

    pub fn field(slice_qp: i32, init_idc: usize) -> Self {
        Self {
            field: true,
            ..Self::new(slice_qp, init_idc)
        }
    }

    pub fn bin(&mut self, ctx: usize, bin: u32) {
        self.enc.encode_decision(&mut self.ctxs[ctx], bin);
    }

    pub fn bins(&mut self, seq: &[(usize, u32)]) {
        for &(ctx, bin) in seq {
            self.bin(ctx, bin);
        }
    }

    pub fn bypass(&mut self, bin: u32) {
        self.enc.encode_bypass(bin);
    }

    pub fn terminate(&mut self, bin: u32) {
        self.enc.encode_terminate(bin);
    }

    pub fn finish(self) -> Vec<u8> {
        self.enc.finish()
    }

    /// 一元码 mb_qp_delta
    pub fn qp_delta(&mut self, delta: i32, prev_nz: bool) {
        let k = if delta > 0 {
            (2 * delta - 1) as usize
        } else {
            (-2 * delta) as usize
        };
        let mut ctx = usize::from(prev_nz);
        for _ in 0..k {
            self.bin(60 + ctx, 1);
            ctx = 2 + (ctx >> 1);
        }
        self.bin(60 + ctx, 0);
    }

    /// 写入一个残差块
    ///
    /// `levels` 为 (levelListIdx, 值), 按升序排列; `num_c8x8` 仅色度 DC 使用.
    pub fn residual_block(
        &mut self,
        cat: &BlockCat,
        cbf_inc: Option<usize>,
        len: usize,
        num_c8x8: usize,
        levels: &[(usize, i32)],
    ) {
        if let Some(inc) = cbf_inc {
            self.bin(cat.cbf_offset + inc, u32::from(!levels.is_empty()));
            if levels.is_empty() {
                return;
            }
        }
        let last = levels.last().map(|&(i, _)| i).expect("块至少含一个系数");
        let f = usize::from(self.field);
        let sig_8x8 = if self.field {
            &SIG_CTX_INC_8X8_FIELD
        } else {
            &SIG_CTX_INC_8X8_FRAME
        };
        for i in 0..len - 1 {
            if i > last {
                break;
            }
            let (sig_inc, last_inc) = if cat.is_8x8() {
                (
                    usize::from(sig_8x8[i]),
                    usize::from(LAST_CTX_INC_8X8[i]),
                )
            } else if cat.is_chroma_dc() {
                let inc = (i / num_c8x8).min(2);
                (inc, inc)
            } else {
                (i, i)
            };
            let sig = levels.iter().any(|&(p, _)| p == i);
            self.bin(cat.sig_offset[f] + sig_inc, u32::from(sig));
            if sig {
                self.bin(cat.last_offset[f] + last_inc, u32::from(i == last));
            }
        }

        let gt1_cap = if cat.is_chroma_dc() { 3 } else { 4 };
        let mut num_eq1 = 0usize;
        let mut num_gt1 = 0usize;
        for &(_, value) in levels.iter().rev() {
            let minus1 = value.unsigned_abs() - 1;
            let inc0 = if num_gt1 != 0 {
                0
            } else {
                (1 + num_eq1).min(4)
            };
            let inc_n = 5 + num_gt1.min(gt1_cap);
            self.abs_level_minus1(cat.abs_offset, inc0, inc_n, minus1);
            self.bypass(u32::from(value < 0));
            if minus1 == 0 {
                num_eq1 += 1;
            } else {
                num_gt1 += 1;
            }
        }
    }

    fn abs_level_minus1(&mut self, abs_offset: usize, inc0: usize, inc_n: usize, minus1: u32) {
        self.bin(abs_offset + inc0, u32::from(minus1 > 0));
        if minus1 == 0 {
            return;
        }
        for prefix in 1..14 {
            let more = minus1 > prefix;
            self.bin(abs_offset + inc_n, u32::from(more));
            if !more {
                return;
            }
        }
        // 0 阶指数哥伦布后缀
        let value = minus1 - 14 + 1;
        let k = 31 - value.leading_zeros();
        for _ in 0..k {
            self.bypass(1);
        }
        self.bypass(0);
        for bit in (0..k).rev() {
            self.bypass((value >> bit) & 1);
        }
    }
}

/// 收集全部重建单元与行结束事件
#[derive(Default)]
pub struct CollectSink {
    pub units: Vec<MacroblockUnit>,
    pub rows: Vec<usize>,
}

impl SampleReconstruction for CollectSink {
    fn reconstruct_macroblock(&mut self, unit: &MacroblockUnit) -> AvcResult<()> {
        self.units.push(unit.clone());
        Ok(())
    }

    fn finish_row(&mut self, mb_y: usize) -> AvcResult<()> {
        self.rows.push(mb_y);
        Ok(())
    }
}

/// 以给定配置解码一个 slice
pub fn decode_with(
    pic: PictureParams,
    config: DecoderConfig,
    slice: &SliceParams,
    rbsp: &[u8],
) -> (AvcResult<SliceSummary>, CollectSink, SliceDecoder) {
    let mut dec = SliceDecoder::new(pic, config).expect("图像参数应有效");
    let mut sink = CollectSink::default();
    let result = dec.decode_slice(slice, &SliceData::from_rbsp(rbsp), &mut sink);
    (result, sink, dec)
}

/// 写入 I_16x16 (CBP 0, 色度预测 DC) 宏块的 mb_type 与 intra_chroma_pred_mode
///
/// 仅适用于 I slice 且左/上邻均不是 I_NxN 的位置.
pub fn write_i16x16_header(w: &mut SliceWriter, mb_type_inc: usize, pred_mode: u32) {
    w.bin(3 + mb_type_inc, 1);
    w.terminate(0);
    w.bin(6, 0); // 亮度 CBP
    w.bin(7, 0); // 色度 CBP
    w.bin(9, pred_mode >> 1);
    w.bin(10, pred_mode & 1);
}
