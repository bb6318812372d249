//! 解码后的帧数据 (Frame).

use tao_core::{PixelFormat, Rational};

/// 视频帧
///
/// 平面存储的解码图像, YUV420P 有 Y, U, V 三个平面.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 各平面的像素数据
    pub data: Vec<Vec<u8>>,
    /// 各平面的行字节数
    pub linesize: Vec<usize>,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 显示时间戳
    pub pts: i64,
    /// 时间基
    pub time_base: Rational,
    /// 帧时长 (以 time_base 为单位)
    pub duration: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 图片类型
    pub picture_type: PictureType,
    /// 采样宽高比 (SAR)
    pub sample_aspect_ratio: Rational,
    /// 部分宏块未能解码, 已由参考图像填补 (无参考时保持初始值)
    pub is_corrupt: bool,
}

impl VideoFrame {
    /// 创建空的视频帧, 平面数据由解码器填充
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let plane_count = pixel_format.plane_count() as usize;
        Self {
            data: vec![Vec::new(); plane_count],
            linesize: vec![0; plane_count],
            width,
            height,
            pixel_format,
            pts: tao_core::timestamp::NOPTS_VALUE,
            time_base: Rational::UNDEFINED,
            duration: 0,
            is_keyframe: false,
            picture_type: PictureType::None,
            sample_aspect_ratio: Rational::new(1, 1),
            is_corrupt: false,
        }
    }

    /// 指定平面的一行像素
    pub fn row(&self, plane: usize, y: usize) -> &[u8] {
        let ls = self.linesize[plane];
        &self.data[plane][y * ls..(y + 1) * ls]
    }
}

/// 解码器输出的帧
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Frame {
    /// 视频帧
    Video(VideoFrame),
}

impl Frame {
    /// 取出视频帧
    pub fn into_video(self) -> Option<VideoFrame> {
        match self {
            Self::Video(v) => Some(v),
        }
    }
}

/// 图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PictureType {
    /// 未指定
    #[default]
    None,
    /// I 帧 (关键帧, 帧内编码)
    I,
    /// P 帧 (前向预测)
    P,
    /// B 帧 (双向预测)
    B,
    /// BI 帧 (位于 B 帧位置的帧内编码图像)
    Bi,
}

impl PictureType {
    /// 单字符表示, 用于日志
    pub const fn as_char(&self) -> char {
        match self {
            Self::None => '?',
            Self::I => 'I',
            Self::P => 'P',
            Self::B => 'B',
            Self::Bi => 'b',
        }
    }
}
