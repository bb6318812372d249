//! 编解码器标识符.

use std::fmt;

/// 编解码器标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// SMPTE VC-1 (Advanced 档次, 起始码分帧)
    Vc1,
    /// Windows Media Video 9 (VC-1 Simple/Main 档次)
    Wmv3,
}

impl CodecId {
    /// 编解码器名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Vc1 => "vc1",
            Self::Wmv3 => "wmv3",
        }
    }

    /// 按名称查找
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "vc1" | "vc-1" => Some(Self::Vc1),
            "wmv3" | "wmv9" => Some(Self::Wmv3),
            _ => None,
        }
    }

    /// 按 ASF/AVI 的 FourCC 查找
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match &fourcc.map(|b| b.to_ascii_uppercase()) {
            b"WMV3" => Some(Self::Wmv3),
            b"WVC1" | b"WMVA" => Some(Self::Vc1),
            _ => None,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_name_and_fourcc() {
        assert_eq!(CodecId::from_name("WMV3"), Some(CodecId::Wmv3));
        assert_eq!(CodecId::from_name("vc-1"), Some(CodecId::Vc1));
        assert_eq!(CodecId::from_name("h264"), None);
        assert_eq!(CodecId::from_fourcc(b"wvc1"), Some(CodecId::Vc1));
        assert_eq!(CodecId::from_fourcc(b"WMVA"), Some(CodecId::Vc1));
        assert_eq!(CodecId::from_fourcc(b"MP42"), None);
        assert_eq!(CodecId::from_fourcc(b"wmv3"), Some(CodecId::Wmv3));
        assert_eq!(CodecId::from_fourcc(b"WmvA"), Some(CodecId::Vc1));
        assert_eq!(CodecId::Wmv3.to_string(), "wmv3");
    }
}
