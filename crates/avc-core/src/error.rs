//! 统一错误类型定义.
//!
//! 熵解码核心只区分三类故障: 结构性故障 (参数越界, 不应进入解码),
//! 熵解码失步 (算术引擎不变量被破坏), 以及有意未实现的语法分支.
//! 其余变体服务于位流读取等基础设施.

use thiserror::Error;

/// AVC 熵解码统一错误类型
#[derive(Debug, Error)]
pub enum AvcError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 已到达位流末尾
    #[error("已到达位流末尾")]
    Eof,

    /// 结构性故障: 参数集/slice 参数超出可索引范围
    #[error("结构性故障: {0}")]
    StructuralFault(String),

    /// 熵解码失步: 算术引擎不变量被破坏, 整个 slice 作废
    #[error("熵解码失步: {0}")]
    EntropyDesync(String),

    /// 有意未实现的语法分支 (帧间预测分区等)
    #[error("不支持的特性: {0}")]
    UnsupportedFeature(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

/// AVC 熵解码统一 Result 类型
pub type AvcResult<T> = Result<T, AvcError>;
