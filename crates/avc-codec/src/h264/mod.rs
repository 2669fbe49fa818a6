//! H.264/AVC CABAC 熵解码核心.
//!
//! 包含二进制算术解码引擎, 1024 个自适应上下文, 宏块邻居上下文网格,
//! 残差系数解码以及按 slice 驱动这些组件的宏块语法状态机.
//! 样本重建 (反变换, 帧内预测, 去块) 通过 [`SampleReconstruction`] 交给下游.
//! 帧间预测的 mb_type 分支明确返回 [`AvcError::UnsupportedFeature`].

mod cabac;
mod cabac_init;
mod cabac_init_table;
mod config;
mod encoder;
mod macroblock;
mod macroblock_intra;
mod macroblock_residual;
mod neighbor;
mod picture;
mod reconstruct;
mod residual;
mod slice_decode;
mod syntax;
mod tables;

use syntax::*;

use bytes::{Bytes, BytesMut};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use avc_core::bitreader::BitReader;
use avc_core::{AvcError, AvcResult};

use residual::{BlockScan, decode_residual_block};
use tables::{
    CHROMA_DC_SCAN_420, CHROMA_DC_SCAN_422, FIELD_SCAN_4X4, FIELD_SCAN_8X8, ZIGZAG_4X4,
    ZIGZAG_8X8, chroma_qp_from_index,
};

pub use cabac::{BinTrace, CTX_TERMINATE, CabacCtx, CabacDecoder, SAFE_ZONE_LEN};
pub use cabac_init::{ContextModel, NUM_CTX};
pub use config::{
    ChromaFormat, DecoderConfig, PictureParams, PipelineConfig, SliceData, SliceParams, SliceType,
};
pub use encoder::CabacEncoder;
pub use neighbor::{MbContext, NeighborGrid};
pub use picture::{PictureDecoder, PictureStatus};
pub use reconstruct::{
    ChromaPredMode, Intra16x16Mode, IntraNxNMode, MacroblockCoeffs, MacroblockKind,
    MacroblockUnit, NeighborAvailability, PcmSamples, SampleReconstruction,
};
pub use residual::{
    BlockCat, CAT_CHROMA_AC, CAT_CHROMA_DC, CAT_LUMA_4X4, CAT_LUMA_8X8, CAT_LUMA_AC, CAT_LUMA_DC,
};
pub use slice_decode::{SliceState, SliceSummary};

// ============================================================
// slice 解码器
// ============================================================

/// 单个 slice 的 CABAC 熵解码器
///
/// 同一图像的多个 slice 可依次复用同一个实例, 每个 slice 开始时
/// 上下文模型与邻居网格都会重新初始化.
pub struct SliceDecoder {
    /// 图像参数
    pic: PictureParams,
    /// 运行配置
    config: DecoderConfig,
    /// 上下文状态
    ctxs: ContextModel,
    /// 邻居上下文网格
    grid: NeighborGrid,
    /// 当前 slice 类型
    slice_type: SliceType,
    /// 场编码 (选择场扫描与场显著性上下文)
    field: bool,
    /// 当前 QP_Y
    qp: i32,
    /// 上一个宏块的 mb_qp_delta 是否非零 (mb_qp_delta 首个 bin 的上下文增量)
    prev_qp_delta_nz: bool,
    /// 最近一个 slice 的 bin 轨迹
    trace: Vec<BinTrace>,
}

impl SliceDecoder {
    /// 创建解码器, 校验图像参数
    pub fn new(pic: PictureParams, config: DecoderConfig) -> AvcResult<Self> {
        pic.validate()?;
        let mut grid = NeighborGrid::new();
        grid.reset(pic.width_in_mbs, pic.constrained_intra_pred);
        Ok(Self {
            pic,
            config,
            ctxs: ContextModel::new(26, 0)?,
            grid,
            slice_type: SliceType::I,
            field: false,
            qp: 26,
            prev_qp_delta_nz: false,
            trace: Vec::new(),
        })
    }

    /// 图像参数
    pub fn picture_params(&self) -> &PictureParams {
        &self.pic
    }

    /// 运行配置
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// 当前上下文状态
    pub fn context_model(&self) -> &ContextModel {
        &self.ctxs
    }

    /// 邻居上下文网格
    pub fn neighbors(&self) -> &NeighborGrid {
        &self.grid
    }

    /// 下一个宏块 mb_qp_delta 首个 bin 的上下文增量
    pub fn qp_delta_inc(&self) -> usize {
        usize::from(self.prev_qp_delta_nz)
    }

    /// 取出最近一个 slice 的 bin 轨迹 (需开启 `trace_bins`)
    pub fn take_trace(&mut self) -> Vec<BinTrace> {
        std::mem::take(&mut self.trace)
    }
}
