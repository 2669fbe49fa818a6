//! # avc-core
//!
//! AVC 熵解码核心库的基础设施: 统一错误类型与位流读写工具.

pub mod bitreader;
pub mod bitwriter;
pub mod error;

// 重导出常用类型
pub use error::{AvcError, AvcResult};
