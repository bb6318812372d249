//! VC-1 / WMV3 解码器类型定义

use crate::frame::PictureType;

/// 档次
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(super) enum Profile {
    #[default]
    Simple,
    Main,
    /// WMV9 Complex, 不支持
    Complex,
    Advanced,
}

impl Profile {
    pub(super) fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::Simple,
            1 => Self::Main,
            2 => Self::Complex,
            _ => Self::Advanced,
        }
    }
}

/// 图像类型 (含 BI)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum Vc1PictureType {
    #[default]
    I,
    P,
    B,
    /// 以 I 语法编码的 B 帧, 不作参考
    BI,
}

impl Vc1PictureType {
    pub(super) fn is_intra(self) -> bool {
        matches!(self, Self::I | Self::BI)
    }

    pub(super) fn is_b(self) -> bool {
        matches!(self, Self::B | Self::BI)
    }

    pub(super) fn to_picture_type(self) -> PictureType {
        match self {
            Self::I => PictureType::I,
            Self::BI => PictureType::Bi,
            Self::P => PictureType::P,
            Self::B => PictureType::B,
        }
    }
}

/// 帧编码模式 (FCM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum FrameCodingMode {
    #[default]
    Progressive,
    InterlacedFrame,
    InterlacedField,
}

/// 序列级量化模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum QuantMode {
    #[default]
    FrameImplicit,
    FrameExplicit,
    NonUniform,
    Uniform,
}

impl QuantMode {
    pub(super) fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::FrameImplicit,
            1 => Self::FrameExplicit,
            2 => Self::NonUniform,
            _ => Self::Uniform,
        }
    }
}

/// 宏块量化可变范围 (DQPROFILE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum DqProfile {
    #[default]
    FourEdges,
    DoubleEdges,
    SingleEdge,
    AllMbs,
}

impl DqProfile {
    pub(super) fn from_bits(bits: u32) -> Self {
        match bits & 3 {
            0 => Self::FourEdges,
            1 => Self::DoubleEdges,
            2 => Self::SingleEdge,
            _ => Self::AllMbs,
        }
    }
}

/// P/B 帧运动向量模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum MvMode {
    OneMvHpelBilin,
    #[default]
    OneMv,
    OneMvHpel,
    MixedMv,
    IntensityComp,
}

/// 条件重叠平滑 (CONDOVER)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum Condover {
    #[default]
    None,
    All,
    Select,
}

/// 块变换类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub(super) enum TransformType {
    #[default]
    T8x8 = 0,
    T8x4Bottom = 1,
    T8x4Top = 2,
    /// 上下两半均编码
    T8x4 = 3,
    T4x8Right = 4,
    T4x8Left = 5,
    /// 左右两半均编码
    T4x8 = 6,
    T4x4 = 7,
}

impl TransformType {
    pub(super) fn from_index(v: u8) -> Self {
        match v & 7 {
            0 => Self::T8x8,
            1 => Self::T8x4Bottom,
            2 => Self::T8x4Top,
            3 => Self::T8x4,
            4 => Self::T4x8Right,
            5 => Self::T4x8Left,
            6 => Self::T4x8,
            _ => Self::T4x4,
        }
    }
}

/// B 帧运动向量类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum BmvType {
    #[default]
    Backward,
    Forward,
    Interpolated,
    Direct,
}

/// 隔行帧 P/B 宏块模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum IntfrMbMode {
    OneMv,
    TwoMvField,
    TwoMv,
    FourMvField,
    FourMv,
    Intra,
}

/// 隔行帧宏块模式表项: (模式, fieldtx, 是否有 MV 数据, 是否有 CBP)
#[derive(Debug, Clone, Copy)]
pub(super) struct IntfrMbModeEntry {
    pub mode: IntfrMbMode,
    pub fieldtx: bool,
    pub mvp: bool,
    pub cbp: bool,
}

/// 宏块解码路径, 每帧开始时确定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MbDecodePath {
    /// Simple/Main 档次 I 帧
    IProgressive,
    /// Advanced 档次 I/BI 帧 (含隔行)
    IAdvanced,
    PProgressive,
    PInterlacedFrame,
    PInterlacedField,
    BProgressive,
    BInterlacedFrame,
    BInterlacedField,
}

impl MbDecodePath {
    pub(super) fn select(
        profile: Profile,
        pict_type: Vc1PictureType,
        fcm: FrameCodingMode,
    ) -> Self {
        match pict_type {
            Vc1PictureType::I | Vc1PictureType::BI => {
                if profile == Profile::Advanced {
                    Self::IAdvanced
                } else {
                    Self::IProgressive
                }
            }
            Vc1PictureType::P => match fcm {
                FrameCodingMode::Progressive => Self::PProgressive,
                FrameCodingMode::InterlacedFrame => Self::PInterlacedFrame,
                FrameCodingMode::InterlacedField => Self::PInterlacedField,
            },
            Vc1PictureType::B => match fcm {
                FrameCodingMode::Progressive => Self::BProgressive,
                FrameCodingMode::InterlacedFrame => Self::BInterlacedFrame,
                FrameCodingMode::InterlacedField => Self::BInterlacedField,
            },
        }
    }
}

/// 运动向量 (亮度四分之一像素单位)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct MotionVector {
    pub x: i16,
    pub y: i16,
}

impl MotionVector {
    pub(super) const ZERO: Self = Self { x: 0, y: 0 };

    pub(super) fn new(x: i32, y: i32) -> Self {
        Self {
            x: x as i16,
            y: y as i16,
        }
    }
}

/// 环路滤波窗口的帧边界标志
pub(super) const LEFT_EDGE: u32 = 1 << 0;
pub(super) const RIGHT_EDGE: u32 = 1 << 1;
pub(super) const TOP_EDGE: u32 = 1 << 2;
pub(super) const BOTTOM_EDGE: u32 = 1 << 3;
