//! 宏块循环的解码现场
//!
//! [`Vc1Context`] 保存跨宏块的状态 (DC/AC 预测值, 块类型, 环路滤波所需的行环等),
//! 由解码器长期持有并在尺寸变化时重建. [`PictureDecoder`] 把它与本图像的
//! 码表, 头信息, 参考图像以及比特读取器绑定在一起, 各宏块解码函数都实现在它上面.

use tao_core::BitReader;

use super::config::Vc1Config;
use super::header::{IcState, PictureHeader, SequenceHeader};
use super::picture::{BlockRing, Grid, Picture, RowRing};
use super::types::{BmvType, MotionVector};
use super::vlc::Vc1Tables;

/// 平面视图: 场图像时起点偏移一行 (底场), 行跨度加倍
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct PlaneView {
    pub start: usize,
    pub stride: usize,
}

/// AC 转义模式 3 的长度, 每帧首次出现时读取
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Esc3Lengths {
    pub level: u32,
    pub run: u32,
}

/// 跨宏块保留的解码状态
#[derive(Debug, Clone)]
pub(super) struct Vc1Context {
    pub mb_width: usize,
    /// 图像宏块行数 (隔行序列按 2 对齐)
    pub mb_height: usize,
    /// 编码尺寸 (高级档次的运动向量裁剪边界)
    pub coded_width: i32,
    pub coded_height: i32,
    pub mb_x: usize,
    pub mb_y: usize,
    /// 当前切片的宏块行范围 [start, end)
    pub start_mb_y: usize,
    pub end_mb_y: usize,
    /// 切片首行 (上方邻块不可用)
    pub first_line: bool,
    /// 第二场在 b8 网格中的行偏移
    pub field_b8_off: i32,
    /// 第二场在宏块网格中的行偏移
    pub field_mb_off: i32,
    pub views: [PlaneView; 3],

    /// 每宏块量化参数, 负值表示不使用 halfpq
    pub qscale: Grid<i8>,
    /// 隔行帧宏块的场变换标志
    pub fieldtx: Grid<bool>,
    /// 每个 8x8 亮度块是否帧内
    pub blk_intra: Grid<bool>,
    /// 宏块色度块是否帧内
    pub chroma_intra: Grid<bool>,
    /// Simple/Main I 帧的编码块预测
    pub coded_block: Grid<bool>,
    /// 隔行帧 b8 的 MV 是否为场 MV
    pub blk_mv_type: Grid<bool>,
    /// [亮度 b8, Cb, Cr] 的量化 DC 预测值
    pub dc_val: [Grid<i16>; 3],
    /// [亮度 b8, Cb, Cr] 的 AC 预测值: [1..8] 首列, [9..16] 首行
    pub ac_val: [Grid<[i16; 16]>; 3],

    /// 每宏块各块的编码模式 (每块 4 位)
    pub cbp: RowRing<u32>,
    /// 每宏块各块的变换类型 (每块 4 位)
    pub ttblk: RowRing<u32>,
    /// 每宏块各块的帧内标志 (每块 1 位)
    pub is_intra: RowRing<u8>,
    /// 每宏块的色度 MV (以亮度单位的一半表示)
    pub luma_mv: RowRing<MotionVector>,
    pub blocks: BlockRing,

    /// 当前宏块整体帧内
    pub mb_intra: bool,
    /// 当前宏块 [前向, 后向] 各 b8 的最终 MV
    pub cur_mv: [[MotionVector; 4]; 2],
    pub esc3: Esc3Lengths,
    pub codingset: usize,
    pub codingset2: usize,
    pub bmvtype: BmvType,
    /// 运动补偿的参考窗口缓冲
    pub win: [Vec<u8>; 3],
}

impl Vc1Context {
    pub(super) fn new(mb_width: usize, mb_height: usize) -> Self {
        let (b8w, b8h) = (mb_width * 2, mb_height * 2);
        Self {
            mb_width,
            mb_height,
            coded_width: (mb_width * 16) as i32,
            coded_height: (mb_height * 16) as i32,
            mb_x: 0,
            mb_y: 0,
            start_mb_y: 0,
            end_mb_y: mb_height,
            first_line: true,
            field_b8_off: 0,
            field_mb_off: 0,
            views: [PlaneView::default(); 3],
            qscale: Grid::new(mb_width, mb_height),
            fieldtx: Grid::new(mb_width, mb_height),
            blk_intra: Grid::new(b8w, b8h),
            chroma_intra: Grid::new(mb_width, mb_height),
            coded_block: Grid::new(b8w, b8h),
            blk_mv_type: Grid::new(b8w, b8h),
            dc_val: [
                Grid::new(b8w, b8h),
                Grid::new(mb_width, mb_height),
                Grid::new(mb_width, mb_height),
            ],
            ac_val: [
                Grid::new(b8w, b8h),
                Grid::new(mb_width, mb_height),
                Grid::new(mb_width, mb_height),
            ],
            cbp: RowRing::new(mb_width),
            ttblk: RowRing::new(mb_width),
            is_intra: RowRing::new(mb_width),
            luma_mv: RowRing::new(mb_width),
            blocks: BlockRing::new(mb_width),
            mb_intra: false,
            cur_mv: [[MotionVector::ZERO; 4]; 2],
            esc3: Esc3Lengths::default(),
            codingset: 0,
            codingset2: 0,
            bmvtype: BmvType::default(),
            win: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// 块 `n` 在其平面网格中的坐标: 亮度为 b8 坐标, 色度为宏块坐标
    #[inline]
    pub(super) fn block_xy(&self, n: usize) -> (usize, i32, i32) {
        let (x, y) = (self.mb_x as i32, self.mb_y as i32);
        if n < 4 {
            (0, 2 * x + (n & 1) as i32, 2 * y + (n >> 1) as i32)
        } else {
            (n - 3, x, y)
        }
    }

    /// 当前宏块块 `n` 的 b8 坐标 (场内)
    #[inline]
    pub(super) fn b8(&self, n: usize) -> (i32, i32) {
        (
            (2 * self.mb_x + (n & 1)) as i32,
            (2 * self.mb_y + ((n >> 1) & 1)) as i32,
        )
    }

    /// 以 b8 行跨度 (2 * mb_width + 1) 做线性偏移
    ///
    /// 越过行首时落到上一行末尾, 行末的填充列读出默认值.
    #[inline]
    pub(super) fn b8_offset(&self, (x, y): (i32, i32), off: i32) -> (i32, i32) {
        let wrap = 2 * self.mb_width as i32 + 1;
        let idx = y * wrap + x + off;
        (idx.rem_euclid(wrap), idx.div_euclid(wrap))
    }

    /// 场内 b8 坐标转换为图像 b8 坐标
    #[inline]
    pub(super) fn pic_b8(&self, (x, y): (i32, i32)) -> (i32, i32) {
        (x, y + self.field_b8_off)
    }

    /// 当前宏块在平面 `plane` 中的左上角位置
    #[inline]
    pub(super) fn mb_dest(&self, plane: usize) -> usize {
        self.mb_origin(plane, self.mb_x, self.mb_y)
    }

    /// 宏块 (x, y) 在平面 `plane` 中的左上角位置
    #[inline]
    pub(super) fn mb_origin(&self, plane: usize, x: usize, y: usize) -> usize {
        let size = if plane == 0 { 16 } else { 8 };
        let v = self.views[plane];
        v.start + y * size * v.stride + x * size
    }

    /// 宏块 (x, y) 中块 `n` 的 (平面, 起点, 行跨度), 按帧变换排列
    #[inline]
    pub(super) fn block_origin(&self, x: usize, y: usize, n: usize) -> (usize, usize, usize) {
        if n < 4 {
            let ls = self.views[0].stride;
            (0, self.mb_origin(0, x, y) + (n & 2) * 4 * ls + (n & 1) * 8, ls)
        } else {
            let plane = n - 3;
            (plane, self.mb_origin(plane, x, y), self.views[plane].stride)
        }
    }

    /// 切片开始: 设置宏块行范围并清空行环
    pub(super) fn begin_slice(&mut self, start_mb_y: usize, end_mb_y: usize) {
        self.start_mb_y = start_mb_y;
        self.end_mb_y = end_mb_y;
        self.mb_x = 0;
        self.mb_y = start_mb_y;
        self.first_line = true;
        self.blocks.reset();
        self.cbp.clear();
        self.ttblk.clear();
        self.is_intra.clear();
        self.luma_mv.clear();
    }

    /// 设置当前场 (或帧) 的平面视图与网格偏移
    pub(super) fn set_field(&mut self, pic: &Picture, field_mode: bool, bottom: bool, second: bool) {
        for p in 0..3 {
            let ls = pic.linesize[p];
            self.views[p] = if field_mode {
                PlaneView {
                    start: if bottom { ls } else { 0 },
                    stride: ls * 2,
                }
            } else {
                PlaneView { start: 0, stride: ls }
            };
        }
        if field_mode && second {
            self.field_b8_off = self.mb_height as i32;
            self.field_mb_off = (self.mb_height / 2) as i32;
        } else {
            self.field_b8_off = 0;
            self.field_mb_off = 0;
        }
    }
}

/// 参考图像来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RefSource {
    Last,
    Next,
    /// 第二场以第一场为参考
    Current,
}

/// 单个图像 (帧或场) 的宏块解码现场
pub(super) struct PictureDecoder<'a> {
    pub t: &'a Vc1Tables,
    pub seq: &'a SequenceHeader,
    pub hdr: &'a mut PictureHeader,
    pub luts: &'a IcState,
    pub cfg: &'a Vc1Config,
    pub last: Option<&'a Picture>,
    pub next: Option<&'a Picture>,
    pub cur: &'a mut Picture,
    pub st: &'a mut Vc1Context,
    pub br: BitReader<'a>,
}

impl PictureDecoder<'_> {
    /// 参考图像是否可用
    pub(super) fn ref_exists(&self, src: RefSource) -> bool {
        match src {
            RefSource::Last => self.last.is_some(),
            RefSource::Next => self.next.is_some(),
            RefSource::Current => true,
        }
    }

    /// 当前宏块在宏块网格中的图像坐标 (含第二场偏移)
    #[inline]
    pub(super) fn pic_mb(&self) -> (i32, i32) {
        (self.st.mb_x as i32, self.st.mb_y as i32 + self.st.field_mb_off)
    }

    /// 写入当前图像 b8 的 MV
    #[inline]
    pub(super) fn set_mv(&mut self, dir: usize, xy: (i32, i32), mv: MotionVector) {
        let (x, y) = self.st.pic_b8(xy);
        self.cur.motion_val[dir].set(x, y, mv);
    }

    #[inline]
    pub(super) fn get_mv(&self, dir: usize, xy: (i32, i32)) -> MotionVector {
        let (x, y) = self.st.pic_b8(xy);
        self.cur.motion_val[dir].get(x, y)
    }

    #[inline]
    pub(super) fn set_mv_f(&mut self, dir: usize, xy: (i32, i32), f: bool) {
        let (x, y) = self.st.pic_b8(xy);
        self.cur.mv_f[dir].set(x, y, f);
    }

    #[inline]
    pub(super) fn get_mv_f(&self, dir: usize, xy: (i32, i32)) -> bool {
        let (x, y) = self.st.pic_b8(xy);
        self.cur.mv_f[dir].get(x, y)
    }

    /// 记录当前宏块是否帧内 (图像中的记录供后续 B 帧的直接模式使用)
    #[inline]
    pub(super) fn set_mb_intra(&mut self, intra: bool) {
        self.st.mb_intra = intra;
        let (x, y) = self.pic_mb();
        self.cur.mb_intra.set(x, y, intra);
    }

    /// 当前宏块的量化参数
    #[inline]
    pub(super) fn set_qscale(&mut self, q: i32) {
        let (x, y) = (self.st.mb_x as i32, self.st.mb_y as i32);
        self.st.qscale.set(x, y, q as i8);
    }

    /// 已消耗的位数
    #[inline]
    pub(super) fn bits_read(&self) -> usize {
        self.br.bits_read()
    }
}
