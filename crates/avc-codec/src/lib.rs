//! # avc-codec
//!
//! H.264/AVC CABAC 熵解码核心.
//!
//! 输入为一个 slice 的 RBSP (带 0xFF 安全区) 与只读参数块, 输出为逐宏块的
//! 预测模式, QP 与残差系数, 交给实现 [`SampleReconstruction`] 的下游重建.
//!
//! ## 使用示例
//!
//! ```rust
//! use avc_codec::{
//!     CabacEncoder, ContextModel, DecoderConfig, MacroblockUnit, PictureParams,
//!     SampleReconstruction, SliceData, SliceDecoder, SliceParams, SliceType,
//! };
//! use avc_core::AvcResult;
//!
//! struct Collect(Vec<MacroblockUnit>);
//!
//! impl SampleReconstruction for Collect {
//!     fn reconstruct_macroblock(&mut self, unit: &MacroblockUnit) -> AvcResult<()> {
//!         self.0.push(unit.clone());
//!         Ok(())
//!     }
//! }
//!
//! // 合成一个 I_16x16 (预测模式 0, CBP 0) 的单宏块 slice
//! let mut ctxs = ContextModel::new(26, 0).unwrap();
//! let mut enc = CabacEncoder::new();
//! enc.encode_decision(&mut ctxs[3], 1); // mb_type 前缀: 非 I_NxN
//! enc.encode_terminate(0); // 非 I_PCM
//! for ctx in [6, 7, 9, 10] {
//!     enc.encode_decision(&mut ctxs[ctx], 0);
//! }
//! enc.encode_decision(&mut ctxs[64], 0); // intra_chroma_pred_mode = 0
//! enc.encode_decision(&mut ctxs[60], 0); // mb_qp_delta = 0
//! enc.encode_decision(&mut ctxs[85 + 3], 0); // 亮度 DC coded_block_flag = 0
//! enc.encode_terminate(1); // end_of_slice_flag
//! let rbsp = enc.finish();
//!
//! let mut dec = SliceDecoder::new(PictureParams::new(1, 1), DecoderConfig::default()).unwrap();
//! let mut sink = Collect(Vec::new());
//! let summary = dec
//!     .decode_slice(
//!         &SliceParams::new(SliceType::I, 26),
//!         &SliceData::from_rbsp(&rbsp),
//!         &mut sink,
//!     )
//!     .unwrap();
//! assert_eq!(summary.mb_count, 1);
//! assert!(sink.0[0].coeffs.is_zero());
//! ```

pub mod h264;

// 重导出常用类型
pub use h264::{
    BinTrace, BlockCat, CabacCtx, CabacDecoder, CabacEncoder, ChromaFormat, ChromaPredMode,
    ContextModel, DecoderConfig, Intra16x16Mode, IntraNxNMode, MacroblockCoeffs, MacroblockKind,
    MacroblockUnit, MbContext, NeighborAvailability, NeighborGrid, PcmSamples, PictureDecoder,
    PictureParams, PictureStatus, PipelineConfig, SampleReconstruction, SliceData, SliceDecoder,
    SliceParams, SliceState, SliceSummary, SliceType,
};
