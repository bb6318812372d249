//! 图像缓冲与按宏块组织的辅助网格
//!
//! - [`Grid`]: 二维网格, 越界读取返回默认值, 越界写入被忽略
//! - [`RowRing`]: 仅保留最近 3 行宏块的行环, 以 (行槽, 列) 寻址
//! - [`BlockRing`]: 延迟输出的系数块环, 供重叠平滑跨宏块访问
//! - [`Picture`]: 解码后的参考图像, 含运动向量等附带信息

use super::types::{MotionVector, Vc1PictureType};

// ============================================================
// 网格
// ============================================================

#[derive(Debug, Clone)]
pub(super) struct Grid<T> {
    data: Vec<T>,
    width: usize,
    height: usize,
}

impl<T: Copy + Default> Grid<T> {
    pub(super) fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![T::default(); width * height],
            width,
            height,
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(y as usize * self.width + x as usize)
    }

    #[inline]
    pub(super) fn get(&self, x: i32, y: i32) -> T {
        self.index(x, y).map(|i| self.data[i]).unwrap_or_default()
    }

    #[inline]
    pub(super) fn set(&mut self, x: i32, y: i32, v: T) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = v;
        }
    }

    pub(super) fn fill(&mut self, v: T) {
        self.data.fill(v);
    }

    /// 清零一行
    pub(super) fn clear_row(&mut self, y: i32) {
        if y >= 0 && (y as usize) < self.height {
            let start = y as usize * self.width;
            self.data[start..start + self.width].fill(T::default());
        }
    }

    pub(super) fn width(&self) -> usize {
        self.width
    }

    pub(super) fn height(&self) -> usize {
        self.height
    }
}

// ============================================================
// 行环
// ============================================================

/// 最近 3 行宏块的状态
///
/// `back` = 0 为当前行, 1 为上一行, 2 为上上行. 每行有 1 个填充位置,
/// 因此列 -1 落在上一行末尾的填充处, 读出默认值.
#[derive(Debug, Clone)]
pub(super) struct RowRing<T> {
    data: Vec<T>,
    stride: usize,
}

impl<T: Copy + Default> RowRing<T> {
    pub(super) fn new(mb_width: usize) -> Self {
        let stride = mb_width + 1;
        Self {
            data: vec![T::default(); stride * 3],
            stride,
        }
    }

    #[inline]
    fn index(&self, back: usize, x: i32) -> Option<usize> {
        let i = (2 - back.min(2)) as i32 * self.stride as i32 + x;
        (i >= 0 && (i as usize) < self.data.len()).then_some(i as usize)
    }

    #[inline]
    pub(super) fn get(&self, back: usize, x: i32) -> T {
        self.index(back, x).map(|i| self.data[i]).unwrap_or_default()
    }

    #[inline]
    pub(super) fn set(&mut self, x: i32, v: T) {
        if let Some(i) = self.index(0, x) {
            self.data[i] = v;
        }
    }

    /// 行结束: 整体上移一行, 当前行保留旧值直至被覆盖
    pub(super) fn advance(&mut self) {
        self.data.copy_within(self.stride.., 0);
    }

    pub(super) fn clear(&mut self) {
        self.data.fill(T::default());
    }
}

// ============================================================
// 系数块环
// ============================================================

/// 每个宏块 6 个块 x 64 系数, 内部块序为 左上, 左下, 右上, 右下, Cb, Cr
pub(super) const MB_BLOCK_LEN: usize = 6 * 64;

/// 宏块系数块环, 容量为宏块列数 + 2
///
/// 当前宏块之前 1 个为左邻, 之前 `mb_width` 个为上邻, 再前 1 个为左上邻.
#[derive(Debug, Clone)]
pub(super) struct BlockRing {
    pub buf: Vec<i16>,
    slots: usize,
    pub cur: usize,
    pub left: usize,
    pub top: usize,
    pub topleft: usize,
}

impl BlockRing {
    pub(super) fn new(mb_width: usize) -> Self {
        let slots = mb_width + 2;
        let mut ring = Self {
            buf: vec![0; slots * MB_BLOCK_LEN],
            slots,
            cur: 0,
            left: 0,
            top: 0,
            topleft: 0,
        };
        ring.reset();
        ring
    }

    pub(super) fn reset(&mut self) {
        self.cur = 0;
        self.left = self.slots - 1;
        self.topleft = 1 % self.slots;
        self.top = 2 % self.slots;
    }

    /// 块 `blk` (内部序) 在缓冲中的起点
    #[inline]
    pub(super) fn block(&self, slot: usize, blk: usize) -> usize {
        slot * MB_BLOCK_LEN + blk * 64
    }

    pub(super) fn clear_cur(&mut self) {
        let start = self.cur * MB_BLOCK_LEN;
        self.buf[start..start + MB_BLOCK_LEN].fill(0);
    }

    pub(super) fn advance(&mut self) {
        let n = self.slots;
        self.cur = (self.cur + 1) % n;
        self.left = (self.left + 1) % n;
        self.topleft = (self.topleft + 1) % n;
        self.top = (self.top + 1) % n;
    }
}

// ============================================================
// 图像
// ============================================================

/// 解码图像 (按宏块对齐的缓冲), 解码完成后以 `Arc` 共享作参考
#[derive(Debug, Clone)]
pub(super) struct Picture {
    pub planes: [Vec<u8>; 3],
    /// 各平面的帧行跨度
    pub linesize: [usize; 3],
    pub mb_width: usize,
    /// 宏块行数 (隔行时按 2 对齐)
    pub mb_height: usize,
    /// [前向, 后向] 每个 8x8 亮度块的运动向量 (整帧坐标)
    pub motion_val: [Grid<MotionVector>; 2],
    /// [前向, 后向] 每个 8x8 亮度块的 MV 是否指向相反极性场
    pub mv_f: [Grid<bool>; 2],
    pub mb_intra: Grid<bool>,
    pub pict_type: Vc1PictureType,
    /// 按场编码
    pub field_picture: bool,
    pub pts: i64,
    pub duration: i64,
    /// 输出时的 [亮度, 色度] 范围映射系数
    pub range_map: [Option<u32>; 2],
    /// 未能解码的宏块数
    pub lost_mbs: usize,
}

impl Picture {
    pub(super) fn new(mb_width: usize, mb_height: usize) -> Self {
        let lw = mb_width * 16;
        let lh = mb_height * 16;
        let cw = mb_width * 8;
        let ch = mb_height * 8;
        let b8w = mb_width * 2;
        let b8h = mb_height * 2;
        Self {
            planes: [vec![0; lw * lh], vec![128; cw * ch], vec![128; cw * ch]],
            linesize: [lw, cw, cw],
            mb_width,
            mb_height,
            motion_val: [Grid::new(b8w, b8h), Grid::new(b8w, b8h)],
            mv_f: [Grid::new(b8w, b8h), Grid::new(b8w, b8h)],
            mb_intra: Grid::new(mb_width, mb_height),
            pict_type: Vc1PictureType::I,
            field_picture: false,
            pts: 0,
            duration: 0,
            range_map: [None, None],
            lost_mbs: 0,
        }
    }

    /// 平面高度 (样本行数)
    pub(super) fn plane_height(&self, plane: usize) -> usize {
        if plane == 0 {
            self.mb_height * 16
        } else {
            self.mb_height * 8
        }
    }

    /// 复制另一图像的全部样本 (用于跳过帧)
    pub(super) fn copy_samples_from(&mut self, other: &Picture) {
        for p in 0..3 {
            if self.planes[p].len() == other.planes[p].len() {
                self.planes[p].copy_from_slice(&other.planes[p]);
            }
        }
    }

    /// 从同尺寸图像复制一个方块 (`size` x `size`, 起点 `origin`, 行跨度 `stride`)
    pub(super) fn copy_square_from(
        &mut self,
        src: &Picture,
        plane: usize,
        origin: usize,
        stride: usize,
        size: usize,
    ) {
        let (dst, src) = (&mut self.planes[plane], &src.planes[plane]);
        if dst.len() != src.len() {
            return;
        }
        for j in 0..size {
            let o = origin + j * stride;
            if o + size > dst.len() {
                break;
            }
            dst[o..o + size].copy_from_slice(&src[o..o + size]);
        }
    }
}

/// 参考窗口取样参数
#[derive(Debug, Clone, Copy)]
pub(super) struct FetchWindow {
    /// 平面内首行起点 (底场为 1 行)
    pub start: usize,
    /// 相邻取样行之间的跨度
    pub row_stride: usize,
    /// 窗口左上角坐标 (以取样行为单位)
    pub x: i32,
    pub y: i32,
    pub w: usize,
    pub h: usize,
    /// 窗口内相邻行对应的取样行间隔
    pub row_step: i32,
    /// 有效区域宽高, 越界坐标钳位到边缘
    pub edge_w: i32,
    pub edge_h: i32,
}

/// 取参考窗口, 越界样本复制最近的边缘样本
pub(super) fn fetch_window(plane: &[u8], win: &FetchWindow, out: &mut Vec<u8>) {
    out.clear();
    out.reserve(win.w * win.h);
    let max_x = (win.edge_w - 1).max(0);
    let max_y = (win.edge_h - 1).max(0);
    for j in 0..win.h as i32 {
        let y = (win.y + j * win.row_step).clamp(0, max_y) as usize;
        let row = win.start + y * win.row_stride;
        for i in 0..win.w as i32 {
            let x = (win.x + i).clamp(0, max_x) as usize;
            out.push(plane.get(row + x).copied().unwrap_or(128));
        }
    }
}
