//! 解码器实现模块.

pub mod vc1;

use crate::codec_id::CodecId;
use crate::registry::CodecRegistry;

/// 注册所有内置解码器
pub fn register_all_decoders(registry: &mut CodecRegistry) {
    registry.register_decoder(CodecId::Vc1, "vc1", vc1::Vc1Decoder::create);
    registry.register_decoder(CodecId::Wmv3, "wmv3", vc1::Vc1Decoder::create_wmv3);
}
