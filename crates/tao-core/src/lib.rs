//! # tao-core
//!
//! Tao 多媒体框架核心库, 提供位流读写、错误类型、像素格式与时间基等基础设施.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod pixel_format;
pub mod rational;
pub mod timestamp;

// 重导出常用类型
pub use bitreader::BitReader;
pub use bitwriter::BitWriter;
pub use error::{TaoError, TaoResult};
pub use pixel_format::PixelFormat;
pub use rational::Rational;
