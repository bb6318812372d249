//! 编解码器注册表.
//!
//! 按 `CodecId` 查找解码器工厂并实例化.

use std::collections::HashMap;

use tao_core::{TaoError, TaoResult};

use crate::codec_id::CodecId;
use crate::decoder::Decoder;

/// 解码器工厂函数类型
pub type DecoderFactory = fn() -> TaoResult<Box<dyn Decoder>>;

/// 解码器注册条目
struct DecoderEntry {
    name: String,
    factory: DecoderFactory,
}

/// 编解码器注册表
#[derive(Default)]
pub struct CodecRegistry {
    decoders: HashMap<CodecId, Vec<DecoderEntry>>,
}

impl CodecRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个解码器, 同一 ID 先注册者优先
    pub fn register_decoder(
        &mut self,
        codec_id: CodecId,
        name: impl Into<String>,
        factory: DecoderFactory,
    ) {
        self.decoders
            .entry(codec_id)
            .or_default()
            .push(DecoderEntry {
                name: name.into(),
                factory,
            });
    }

    /// 创建指定编解码器 ID 的解码器实例
    pub fn create_decoder(&self, codec_id: CodecId) -> TaoResult<Box<dyn Decoder>> {
        let entry = self
            .decoders
            .get(&codec_id)
            .and_then(|entries| entries.first())
            .ok_or_else(|| TaoError::CodecNotFound(format!("未找到 {codec_id} 的解码器")))?;
        (entry.factory)()
    }

    /// 按名称创建解码器实例
    pub fn create_decoder_by_name(&self, name: &str) -> TaoResult<Box<dyn Decoder>> {
        self.decoders
            .values()
            .flatten()
            .find(|e| e.name == name)
            .ok_or_else(|| TaoError::CodecNotFound(format!("未找到名为 {name} 的解码器")))
            .and_then(|e| (e.factory)())
    }

    /// 所有已注册的解码器 (ID, 名称)
    pub fn list_decoders(&self) -> Vec<(CodecId, &str)> {
        let mut result: Vec<_> = self
            .decoders
            .iter()
            .flat_map(|(id, entries)| entries.iter().map(move |e| (*id, e.name.as_str())))
            .collect();
        result.sort_by_key(|&(_, name)| name);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_lists_vc1_family() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);
        assert_eq!(
            registry.list_decoders(),
            vec![(CodecId::Vc1, "vc1"), (CodecId::Wmv3, "wmv3")]
        );
    }

    #[test]
    fn test_create_decoder_by_id_and_name() {
        let mut registry = CodecRegistry::new();
        crate::register_all(&mut registry);
        for id in [CodecId::Vc1, CodecId::Wmv3] {
            let dec = registry.create_decoder(id).expect("创建解码器失败");
            assert_eq!(dec.codec_id(), id);
            assert_eq!(dec.name(), id.name());
        }
        let dec = registry.create_decoder_by_name("wmv3").expect("按名称创建失败");
        assert_eq!(dec.codec_id(), CodecId::Wmv3);
    }

    #[test]
    fn test_unregistered_codec_fails() {
        let registry = CodecRegistry::new();
        assert!(matches!(
            registry.create_decoder(CodecId::Vc1),
            Err(TaoError::CodecNotFound(_))
        ));
        assert!(registry.create_decoder_by_name("h264").is_err());
    }
}
