//! # Tao (道)
//!
//! 纯 Rust 实现的 VC-1 视频解码框架.
//!
//! - **编解码**: VC-1 (SMPTE 421M) Simple / Main / Advanced 档次, 以及 WMV9 (WMV3)
//! - **基础设施**: 位流读写, 错误类型, 像素格式, 时间基
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tao::codec::{CodecId, CodecParameters, Decoder};
//!
//! let registry = tao::default_codec_registry();
//! let mut decoder = registry.create_decoder(CodecId::Wmv3).expect("未注册 WMV3 解码器");
//! // STRUCT_C 来自容器 (ASF / RCV)
//! let params = CodecParameters::video(CodecId::Wmv3, 320, 240, vec![0x44, 0x00, 0x00, 0x01]);
//! decoder.open(&params).expect("打开失败, 需要设置 TAO_VC1_TABLES");
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `tao-core` | 核心类型与工具 |
//! | `tao-codec` | 解码器框架与 VC-1 解码器 |

/// 核心类型与工具
pub use tao_core as core;

/// 解码器框架
pub use tao_codec as codec;

/// 获取 Tao 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置解码器的注册表
pub fn default_codec_registry() -> tao_codec::CodecRegistry {
    let mut registry = tao_codec::CodecRegistry::new();
    tao_codec::register_all(&mut registry);
    registry
}
