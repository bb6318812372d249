//! # tao-codec
//!
//! Tao 多媒体框架编解码器库, 提供解码器框架、Packet/Frame 抽象与 VC-1 解码器.
//!
//! ## 支持的解码器
//!
//! - **VC-1 / WMV9**: Simple, Main (`wmv3`) 与 Advanced (`vc1`) 档次,
//!   渐进与隔行 (帧/场) 图像, 输出 YUV420P
//!
//! VLC 码表以 JSON 资源提供, 见 [`decoders::vc1::Vc1CodeBooks`].
//!
//! ## 使用示例
//!
//! ```rust
//! use tao_codec::{CodecId, CodecRegistry, Decoder};
//!
//! let mut reg = CodecRegistry::new();
//! tao_codec::register_all(&mut reg);
//!
//! let decoder = reg.create_decoder(CodecId::Wmv3).unwrap();
//! assert_eq!(decoder.name(), "wmv3");
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{CodecParameters, CodecParamsType, VideoCodecParams};
pub use decoder::Decoder;
pub use frame::{Frame, PictureType, VideoFrame};
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
}
