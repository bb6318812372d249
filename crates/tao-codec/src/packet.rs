//! 压缩数据包 (Packet).
//!
//! WMV3 的一个数据包是一帧裸码流,
//! VC-1 Advanced 的一个数据包是一个以起始码分隔的访问单元.

use bytes::Bytes;
use tao_core::Rational;
use tao_core::timestamp::NOPTS_VALUE;

/// 压缩数据包
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 解码时间戳 (DTS)
    pub dts: i64,
    /// 数据包时长 (以 time_base 为单位)
    pub duration: i64,
    /// 时间基
    pub time_base: Rational,
    /// 容器标记的关键帧
    pub is_keyframe: bool,
}

impl Packet {
    /// 创建空数据包, 送入解码器表示刷新
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            dts: NOPTS_VALUE,
            duration: 0,
            time_base: Rational::UNDEFINED,
            is_keyframe: false,
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包 (flush packet)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
