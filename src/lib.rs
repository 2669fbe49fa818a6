//! # AVC
//!
//! 纯 Rust 实现的 H.264/AVC CABAC 熵解码核心.
//!
//! 把一个 slice 的 RBSP 解析为逐宏块的预测模式, QP 与残差系数,
//! 样本重建 (反量化, 反变换, 帧内预测, 去块) 由调用方实现的
//! [`codec::SampleReconstruction`] 完成.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use avc::codec::{DecoderConfig, PictureParams, SliceDecoder};
//!
//! let pic = PictureParams::new(120, 68);
//! let decoder = SliceDecoder::new(pic, DecoderConfig::default()).unwrap();
//! println!("avc {} ready, {} MBs per picture", avc::version(), decoder.picture_params().total_mbs());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `avc-core` | 错误类型, 位流读写 |
//! | `avc-codec` | 算术解码引擎, 上下文模型, 宏块语法, slice 解码循环 |

/// 核心类型与工具
pub use avc_core as core;

/// CABAC 熵解码
pub use avc_codec as codec;

pub mod logging;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
