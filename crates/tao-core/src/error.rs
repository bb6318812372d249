//! 统一错误类型定义.
//!
//! 所有 Tao crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// Tao 框架统一错误类型
#[derive(Debug, Error)]
pub enum TaoError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的码流特性
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器错误 (未打开, 缺少码表资源等)
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 码流读取越界
    #[error("已到达流末尾")]
    Eof,

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

/// Tao 框架统一 Result 类型
pub type TaoResult<T> = Result<T, TaoError>;
