//! 像素格式定义.
//!
//! VC-1 只产生 8 位 4:2:0 平面输出.

use std::fmt;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    #[default]
    None,
    /// YUV 4:2:0 平面格式, 8 位
    Yuv420p,
}

impl PixelFormat {
    /// 平面数量
    pub const fn plane_count(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Yuv420p => 3,
        }
    }

    /// 色度子采样 (log2 水平, log2 垂直)
    pub const fn chroma_subsampling(&self) -> (u32, u32) {
        match self {
            Self::None => (0, 0),
            Self::Yuv420p => (1, 1),
        }
    }

    /// 指定平面在给定图像尺寸下的 (宽, 高)
    pub const fn plane_dimensions(&self, plane: usize, width: u32, height: u32) -> (u32, u32) {
        if plane == 0 {
            return (width, height);
        }
        let (sx, sy) = self.chroma_subsampling();
        (width.div_ceil(1 << sx), height.div_ceil(1 << sy))
    }

    /// 格式名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Yuv420p => "yuv420p",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420p_plane_dimensions() {
        let fmt = PixelFormat::Yuv420p;
        assert_eq!(fmt.plane_count(), 3);
        assert_eq!(fmt.plane_dimensions(0, 33, 17), (33, 17));
        assert_eq!(fmt.plane_dimensions(1, 33, 17), (17, 9));
        assert_eq!(fmt.to_string(), "yuv420p");
    }
}
