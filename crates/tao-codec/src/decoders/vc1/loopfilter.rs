//! 重叠平滑, 系数块写回与去块滤波
//!
//! 重叠平滑直接作用于系数块环中的反变换结果, 因此写回像素比解码滞后一列,
//! 渐进图像还滞后一行. 去块滤波按宏块行进行: 一行的全部水平边界 (V) 先于
//! 该行的垂直边界 (H). 行调度见 [`PictureDecoder::loop_filter_row_done`]
//! 与 [`PictureDecoder::loop_filter_flush`].

use super::context::{PictureDecoder, Vc1Context};
use super::dsp;
use super::picture::{BlockRing, Grid, MB_BLOCK_LEN};
use super::tables::BLOCK_MAP;
use super::types::{Condover, FrameCodingMode, MotionVector, TransformType, Vc1PictureType};

/// 去块滤波的边界判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LoopFilterKind {
    /// 全部 8x8 块边界 (I/BI 以及渐进 B)
    Intra,
    /// 按帧内标志, 运动向量与子块编码模式判定 (渐进与场 P)
    Inter,
    /// 隔行帧 P/B, 按场分别滤波
    InterlacedFrame,
    /// 场 B
    FieldB,
}

impl LoopFilterKind {
    pub(super) fn select(pict_type: Vc1PictureType, fcm: FrameCodingMode) -> Self {
        match (pict_type, fcm) {
            (Vc1PictureType::I | Vc1PictureType::BI, _) => Self::Intra,
            (_, FrameCodingMode::InterlacedFrame) => Self::InterlacedFrame,
            (Vc1PictureType::P, _) => Self::Inter,
            (Vc1PictureType::B, FrameCodingMode::InterlacedField) => Self::FieldB,
            (Vc1PictureType::B, FrameCodingMode::Progressive) => Self::Intra,
        }
    }
}

// ============================================================
// 重叠平滑
// ============================================================

/// 跨垂直边界平滑, `n` 为编码块序
///
/// 隔行帧中左右宏块的场变换标志不同时, 一侧按场行 (跨度 16) 取样.
fn h_overlap(ring: &mut BlockRing, l: usize, r: usize, lf: bool, rf: bool, n: usize) {
    let cross = |f: bool| if lf != rf { 16 - 8 * usize::from(f) } else { 8 };
    let lb = |b: usize| l * MB_BLOCK_LEN + b * 64;
    let rb = |b: usize| r * MB_BLOCK_LEN + b * 64;
    let buf = &mut ring.buf;
    match n {
        0 => dsp::h_s_overlap(buf, lb(2), rb(0), cross(lf), cross(rf), u32::from(!(lf || rf))),
        1 => dsp::h_s_overlap(buf, rb(0), rb(2), 8, 8, u32::from(!rf)),
        2 => {
            let left = if !lf && rf { lb(2) + 8 } else { lb(3) };
            let right = if lf && !rf { rb(0) + 8 } else { rb(1) };
            let flags = if lf || rf { 2 } else { 1 };
            dsp::h_s_overlap(buf, left, right, cross(lf), cross(rf), flags);
        }
        3 => dsp::h_s_overlap(buf, rb(1), rb(3), 8, 8, if rf { 2 } else { 1 }),
        _ => dsp::h_s_overlap(buf, lb(n), rb(n), 8, 8, 1),
    }
}

/// 跨水平边界平滑, `n` 为编码块序
fn v_overlap(ring: &mut BlockRing, t: usize, b: usize, n: usize) {
    let tb = |k: usize| ring.block(t, k);
    let bb = |k: usize| ring.block(b, k);
    let (top, bottom) = match n {
        0 => (tb(1), bb(0)),
        1 => (tb(3), bb(2)),
        2 => (bb(0), bb(1)),
        3 => (bb(2), bb(3)),
        _ => (tb(n), bb(n)),
    };
    dsp::v_s_overlap(&mut ring.buf, top, bottom);
}

impl PictureDecoder<'_> {
    /// I/BI 宏块的重叠平滑 (pq >= 9 时全部块, 否则按 CONDOVER 与重叠标志)
    pub(super) fn i_overlap_filter(&mut self) {
        let hdr = &*self.hdr;
        let st = &mut *self.st;
        let (x, y) = (st.mb_x, st.mb_y);
        let adv = self.seq.is_advanced();
        let intfr = hdr.fcm == FrameCodingMode::InterlacedFrame;
        let pq9 = hdr.pq >= 9;
        let all = hdr.condover == Condover::All;
        let over = |xx: usize, yy: usize| hdr.over_flags_plane.get(xx, yy);
        let xl = x.wrapping_sub(1);
        let lf = intfr && x > 0 && st.fieldtx.get(xl as i32, y as i32);
        let rf = intfr && st.fieldtx.get(x as i32, y as i32);
        let ring = &mut st.blocks;
        let (cur, left, top, topleft) = (ring.cur, ring.left, ring.top, ring.topleft);

        for i in 0..6 {
            if x == 0 && (i & 5) != 1 {
                continue;
            }
            if pq9 || (adv && (all || (over(x, y) && ((i & 5) == 1 || over(xl, y))))) {
                h_overlap(ring, if x > 0 { left } else { cur }, cur, lf, rf, i);
            }
        }
        if intfr {
            return;
        }
        let first_line = st.first_line;
        let last_col = x + 1 == st.mb_width;
        let yu = y.wrapping_sub(1);
        for i in 0..6 {
            if first_line && i & 2 == 0 {
                continue;
            }
            if x > 0 && (pq9 || (adv && (all || (over(xl, y) && (i & 2 != 0 || over(xl, yu))))))
            {
                v_overlap(ring, if first_line { left } else { topleft }, left, i);
            }
            if last_col && (pq9 || (adv && (all || (over(x, y) && (i & 2 != 0 || over(x, yu))))))
            {
                v_overlap(ring, if first_line { cur } else { top }, cur, i);
            }
        }
    }

    /// P 宏块的重叠平滑: 仅在相邻两块都为帧内时进行
    pub(super) fn p_overlap_filter(&mut self) {
        let intfr = self.hdr.fcm == FrameCodingMode::InterlacedFrame;
        let st = &mut *self.st;
        let (x, y) = (st.mb_x as i32, st.mb_y as i32);
        let intra = |st: &Vc1Context, n: usize, dx: i32, dy: i32| {
            if n < 4 {
                let (bx, by) = st.b8(n);
                st.blk_intra.get(bx + dx, by + dy)
            } else {
                st.chroma_intra.get(x + dx.signum(), y + dy)
            }
        };
        let lf = intfr && x > 0 && st.fieldtx.get(x - 1, y);
        let rf = intfr && st.fieldtx.get(x, y);
        let (cur, left, top, topleft) = (st.blocks.cur, st.blocks.left, st.blocks.top, st.blocks.topleft);

        for i in 0..6 {
            if x == 0 && (i & 5) != 1 {
                continue;
            }
            if intra(st, i, 0, 0) && intra(st, i, -1, 0) {
                h_overlap(&mut st.blocks, if x > 0 { left } else { cur }, cur, lf, rf, i);
            }
        }
        if intfr {
            return;
        }
        let first_line = st.first_line;
        let last_col = st.mb_x + 1 == st.mb_width;
        for i in 0..6 {
            if first_line && i & 2 == 0 {
                continue;
            }
            if x > 0 && intra(st, i, -2, 0) && intra(st, i, -2, -1) {
                v_overlap(&mut st.blocks, if first_line { left } else { topleft }, left, i);
            }
            if last_col && intra(st, i, 0, 0) && intra(st, i, 0, -1) {
                v_overlap(&mut st.blocks, if first_line { cur } else { top }, cur, i);
            }
        }
    }

    /// 写回已完成重叠平滑的帧内块
    ///
    /// 渐进图像写回左上邻 (以及行末的上邻), 切片末行再写回左邻与当前宏块;
    /// 隔行帧没有垂直方向的平滑, 每次写回左邻 (以及行末的当前宏块).
    pub(super) fn put_blocks_clamped(&mut self, put_signed: bool) {
        let intfr = self.hdr.fcm == FrameCodingMode::InterlacedFrame;
        let st = &*self.st;
        let (x, y) = (st.mb_x, st.mb_y);
        let last_col = x + 1 == st.mb_width;
        let ring = &st.blocks;
        let mut jobs: [Option<(usize, usize, usize, bool)>; 4] = [None; 4];
        if !st.first_line && !intfr {
            if x > 0 {
                jobs[0] = Some((ring.topleft, x - 1, y - 1, false));
            }
            if last_col {
                jobs[1] = Some((ring.top, x, y - 1, false));
            }
        }
        if y + 1 == st.end_mb_y || intfr {
            if x > 0 {
                let ftx = intfr && st.fieldtx.get(x as i32 - 1, y as i32);
                jobs[2] = Some((ring.left, x - 1, y, ftx));
            }
            if last_col {
                let ftx = intfr && st.fieldtx.get(x as i32, y as i32);
                jobs[3] = Some((ring.cur, x, y, ftx));
            }
        }
        for (slot, mx, my, ftx) in jobs.into_iter().flatten() {
            self.put_mb(slot, mx, my, ftx, put_signed);
        }
    }

    /// 切片提前结束时写回行环中已解码但尚未输出的宏块
    ///
    /// 行环保存当前宏块之前的 `mb_width + 1` 个宏块, 即上一行 `x - 1` 起与当前行 `x` 之前.
    pub(super) fn flush_pending_blocks(&mut self, put_signed: bool) {
        let intfr = self.hdr.fcm == FrameCodingMode::InterlacedFrame;
        let st = &*self.st;
        let (x, y, w) = (st.mb_x, st.mb_y, st.mb_width);
        let n = w + 2;
        let cur = st.blocks.cur;
        let mut jobs = Vec::with_capacity(w + 1);
        if !st.first_line && y > 0 {
            for mx in x.saturating_sub(1)..w {
                jobs.push(((cur + 2 + mx + n - x) % n, mx, y - 1));
            }
        }
        for mx in 0..x {
            jobs.push(((cur + n - (x - mx)) % n, mx, y));
        }
        let jobs: Vec<_> = jobs
            .into_iter()
            .map(|(slot, mx, my)| (slot, mx, my, intfr && st.fieldtx.get(mx as i32, my as i32)))
            .collect();
        for (slot, mx, my, ftx) in jobs {
            self.put_mb(slot, mx, my, ftx, put_signed);
        }
    }

    fn put_mb(&mut self, slot: usize, x: usize, y: usize, fieldtx: bool, put_signed: bool) {
        let st = &*self.st;
        let planes = &mut self.cur.planes;
        for i in 0..6 {
            let intra = if i < 4 {
                st.blk_intra.get((2 * x + (i & 1)) as i32, (2 * y + (i >> 1)) as i32)
            } else {
                st.chroma_intra.get(x as i32, y as i32)
            };
            if !intra {
                continue;
            }
            let (plane, pos, stride) = if i < 4 && fieldtx {
                let ls = st.views[0].stride;
                (0, st.mb_origin(0, x, y) + ((i & 2) >> 1) * ls + (i & 1) * 8, ls * 2)
            } else {
                st.block_origin(x, y, i)
            };
            let off = st.blocks.block(slot, BLOCK_MAP[i]);
            let block = &st.blocks.buf[off..off + 64];
            if put_signed {
                dsp::put_signed_pixels_clamped(block, &mut planes[plane], pos, stride);
            } else {
                dsp::put_pixels_clamped(block, &mut planes[plane], pos, stride);
            }
        }
    }
}

// ============================================================
// 去块滤波
// ============================================================

/// 待滤波的一行宏块
#[derive(Debug, Clone, Copy)]
struct FilterRow {
    /// 行环中的位置
    back: usize,
    y: usize,
    top: bool,
    bottom: bool,
}

struct Edges<'p> {
    planes: &'p mut [Vec<u8>; 3],
    pq: i32,
}

impl Edges<'_> {
    #[inline]
    fn v(&mut self, plane: usize, pos: usize, stride: usize, len: usize) {
        dsp::v_loop_filter(&mut self.planes[plane], pos, stride, len, self.pq);
    }

    #[inline]
    fn h(&mut self, plane: usize, pos: usize, stride: usize, len: usize) {
        dsp::h_loop_filter(&mut self.planes[plane], pos, stride, len, self.pq);
    }
}

/// 帧间边界判定所需的只读状态
struct InterState<'s> {
    st: &'s Vc1Context,
    mv: &'s Grid<MotionVector>,
    mv_f: &'s Grid<bool>,
    field: bool,
}

impl InterState<'_> {
    fn tt(&self, back: usize, x: usize, n: usize) -> TransformType {
        TransformType::from_index(((self.st.ttblk.get(back, x as i32) >> (4 * n)) & 0xF) as u8)
    }

    fn cbp(&self, back: usize, x: usize, n: usize) -> u32 {
        self.st.cbp.get(back, x as i32) >> (4 * n)
    }

    fn intra(&self, back: usize, x: usize, n: usize) -> bool {
        self.st.is_intra.get(back, x as i32) & (1 << n) != 0
    }

    /// 两个 b8 位置 (场内坐标) 的 MV 是否不同
    fn b8_differ(&self, a: (i32, i32), b: (i32, i32)) -> bool {
        let (pa, pb) = (self.st.pic_b8(a), self.st.pic_b8(b));
        self.mv.get(pa.0, pa.1) != self.mv.get(pb.0, pb.1)
            || (self.field && self.mv_f.get(pa.0, pa.1) != self.mv_f.get(pb.0, pb.1))
    }
}

fn is_t48_v(tt: TransformType) -> bool {
    matches!(tt, TransformType::T4x4 | TransformType::T8x4)
}

fn is_t48_h(tt: TransformType) -> bool {
    matches!(tt, TransformType::T4x4 | TransformType::T4x8)
}

// ---------- I ----------

fn intra_v_block(st: &Vc1Context, e: &mut Edges, intfr: bool, x: usize, y: usize, n: usize) {
    let (plane, dst, ls) = st.block_origin(x, y, n);
    let len = if n > 3 { 8 } else { 16 };
    if intfr {
        e.v(plane, dst, 2 * ls, len);
        e.v(plane, dst + ls, 2 * ls, len);
    } else {
        e.v(plane, dst, ls, len);
    }
}

fn intra_h_block(st: &Vc1Context, e: &mut Edges, intfr: bool, x: usize, y: usize, n: usize) {
    let (plane, dst, ls) = st.block_origin(x, y, n);
    if intfr {
        let len = if n > 3 { 4 } else { 8 };
        e.h(plane, dst, 2 * ls, len);
        e.h(plane, dst + ls, 2 * ls, len);
    } else {
        e.h(plane, dst, ls, if n > 3 { 8 } else { 16 });
    }
}

/// 行 `r` 的内部水平边界, 以及下一行宏块的上边界
fn intra_v_row(st: &Vc1Context, e: &mut Edges, intfr: bool, r: FilterRow) {
    for x in 0..st.mb_width {
        if !intfr || !st.fieldtx.get(x as i32, r.y as i32) {
            intra_v_block(st, e, intfr, x, r.y, 2);
        }
        if !r.bottom {
            for n in [0, 4, 5] {
                intra_v_block(st, e, intfr, x, r.y + 1, n);
            }
        }
    }
}

fn intra_h_row(st: &Vc1Context, e: &mut Edges, intfr: bool, r: FilterRow) {
    for x in 0..st.mb_width {
        for n in [0, 1, 4, 5] {
            if x == 0 && n != 1 {
                continue;
            }
            intra_h_block(st, e, intfr, x, r.y, n);
        }
    }
}

// ---------- P ----------

fn inter_v_block(s: &InterState, e: &mut Edges, r: FilterRow, x: usize, n: usize) {
    let (plane, dst, ls) = s.st.block_origin(x, r.y, n);
    let below = r.back.saturating_sub(1);
    let top_cbp = s.cbp(r.back, x, n);
    if !r.bottom || n < 2 {
        let top_intra = s.intra(r.back, x, n);
        let (bottom_intra, bottom_cbp) = if n > 3 {
            (s.intra(below, x, n), s.cbp(below, x, n))
        } else if n < 2 {
            (s.intra(r.back, x, n + 2), s.cbp(r.back, x, n + 2))
        } else {
            (s.intra(below, x, n - 2), s.cbp(below, x, n - 2))
        };
        let differ = if n > 3 {
            s.st.luma_mv.get(r.back, x as i32) != s.st.luma_mv.get(below, x as i32)
        } else {
            let a = (
                (2 * x + (n & 1)) as i32,
                (2 * r.y + (n >> 1)) as i32,
            );
            s.b8_differ(a, (a.0, a.1 + 1))
        };
        if top_intra || bottom_intra || differ {
            e.v(plane, dst + 8 * ls, ls, 8);
        } else {
            let idx = (top_cbp | (bottom_cbp >> 2)) & 3;
            if idx & 1 != 0 {
                e.v(plane, dst + 8 * ls + 4, ls, 4);
            }
            if idx & 2 != 0 {
                e.v(plane, dst + 8 * ls, ls, 4);
            }
        }
    }
    if is_t48_v(s.tt(r.back, x, n)) {
        if top_cbp & 5 != 0 {
            e.v(plane, dst + 4 * ls + 4, ls, 4);
        }
        if top_cbp & 10 != 0 {
            e.v(plane, dst + 4 * ls, ls, 4);
        }
    }
}

fn inter_h_block(s: &InterState, e: &mut Edges, r: FilterRow, x: usize, n: usize) {
    let (plane, dst, ls) = s.st.block_origin(x, r.y, n);
    let right = x + 1 == s.st.mb_width;
    let left_cbp = s.cbp(r.back, x, n);
    if !right || n & 5 == 0 {
        let left_intra = s.intra(r.back, x, n);
        let (right_intra, right_cbp) = if n > 3 {
            (s.intra(r.back, x + 1, n), s.cbp(r.back, x + 1, n))
        } else if n & 1 != 0 {
            (s.intra(r.back, x + 1, n - 1), s.cbp(r.back, x + 1, n - 1))
        } else {
            (s.intra(r.back, x, n + 1), s.cbp(r.back, x, n + 1))
        };
        let differ = if n > 3 {
            s.st.luma_mv.get(r.back, x as i32) != s.st.luma_mv.get(r.back, x as i32 + 1)
        } else {
            let a = (
                (2 * x + (n & 1)) as i32,
                (2 * r.y + (n >> 1)) as i32,
            );
            s.b8_differ(a, (a.0 + 1, a.1))
        };
        if left_intra || right_intra || differ {
            e.h(plane, dst + 8, ls, 8);
        } else {
            let idx = (left_cbp | (right_cbp >> 1)) & 5;
            if idx & 1 != 0 {
                e.h(plane, dst + 4 * ls + 8, ls, 4);
            }
            if idx & 4 != 0 {
                e.h(plane, dst + 8, ls, 4);
            }
        }
    }
    if is_t48_h(s.tt(r.back, x, n)) {
        if left_cbp & 3 != 0 {
            e.h(plane, dst + 4 * ls + 4, ls, 4);
        }
        if left_cbp & 12 != 0 {
            e.h(plane, dst + 4, ls, 4);
        }
    }
}

// ---------- 隔行帧 ----------

fn intfr_v_block(s: &InterState, e: &mut Edges, r: FilterRow, x: usize, n: usize) {
    let (plane, origin, _) = s.st.block_origin(x, r.y, n);
    let ls = s.st.views[plane].stride;
    let dst = if n < 4 { s.st.mb_origin(0, x, r.y) + (n & 1) * 8 } else { origin };
    let t48 = is_t48_v(s.tt(r.back, x, n));
    let fieldtx = s.st.fieldtx.get(x as i32, r.y as i32);
    let mut v = |off: usize| e.v(plane, dst + off * ls, 2 * ls, 8);
    if n < 4 {
        if fieldtx {
            if n < 2 {
                if t48 {
                    v(8);
                }
                if !r.bottom {
                    v(16);
                }
            } else {
                if t48 {
                    v(9);
                }
                if !r.bottom {
                    v(17);
                }
            }
        } else if n < 2 {
            if !r.top && t48 {
                v(4);
                v(5);
            }
            v(8);
            v(9);
        } else if !r.bottom {
            if t48 {
                v(12);
                v(13);
            }
            v(16);
            v(17);
        }
    } else if !r.bottom {
        if !r.top && t48 {
            v(4);
            v(5);
        }
        v(8);
        v(9);
    }
}

fn intfr_h_block(s: &InterState, e: &mut Edges, r: FilterRow, x: usize, n: usize) {
    let (plane, dst, ls) = s.st.block_origin(x, r.y, n);
    let right = x + 1 == s.st.mb_width;
    let t48 = is_t48_h(s.tt(r.back, x, n));
    let fieldtx = s.st.fieldtx.get(x as i32, r.y as i32);
    if n < 4 && fieldtx {
        // 场变换: 块 2/3 为底场, 起点位于宏块第 1 行
        let base = if n < 2 { dst } else { dst + ls - 8 * ls };
        if t48 {
            e.h(plane, base + 4, 2 * ls, 8);
        }
        if !right || n == 0 || n == 2 {
            e.h(plane, base + 8, 2 * ls, 8);
        }
    } else if n < 4 {
        if t48 {
            e.h(plane, dst + 4, 2 * ls, 4);
            e.h(plane, dst + ls + 4, 2 * ls, 4);
        }
        if !right || n & 5 == 0 {
            e.h(plane, dst + 8, 2 * ls, 4);
            e.h(plane, dst + ls + 8, 2 * ls, 4);
        }
    } else {
        if t48 {
            e.h(plane, dst + 4, 2 * ls, 4);
            e.h(plane, dst + ls + 4, 2 * ls, 4);
        }
        if !right {
            e.h(plane, dst + 8, 2 * ls, 4);
            e.h(plane, dst + ls + 8, 2 * ls, 4);
        }
    }
}

// ---------- 场 B ----------

fn field_b_v_block(s: &InterState, e: &mut Edges, r: FilterRow, x: usize, n: usize) {
    let (plane, dst, ls) = s.st.block_origin(x, r.y, n);
    let cbp = s.cbp(r.back, x, n);
    if !r.bottom || n < 2 {
        e.v(plane, dst + 8 * ls, ls, 8);
    }
    if is_t48_v(s.tt(r.back, x, n)) {
        let idx = (cbp | (cbp >> 2)) & 3;
        if idx & 1 != 0 {
            e.v(plane, dst + 4 * ls + 4, ls, 4);
        }
        if idx & 2 != 0 {
            e.v(plane, dst + 4 * ls, ls, 4);
        }
    }
}

fn field_b_h_block(s: &InterState, e: &mut Edges, r: FilterRow, x: usize, n: usize) {
    let (plane, dst, ls) = s.st.block_origin(x, r.y, n);
    let right = x + 1 == s.st.mb_width;
    let cbp = s.cbp(r.back, x, n);
    if !right || n & 5 == 0 {
        e.h(plane, dst + 8, ls, 8);
    }
    if is_t48_h(s.tt(r.back, x, n)) {
        let idx = (cbp | (cbp >> 1)) & 5;
        if idx & 1 != 0 {
            e.h(plane, dst + 4 * ls + 4, ls, 4);
        }
        if idx & 4 != 0 {
            e.h(plane, dst + 4, ls, 4);
        }
    }
}

impl PictureDecoder<'_> {
    fn filter_row(&mut self, kind: LoopFilterKind, back: usize, y: usize, vertical: bool) {
        let row = FilterRow {
            back,
            y,
            top: y == self.st.start_mb_y,
            bottom: y + 1 == self.st.end_mb_y,
        };
        let intfr = self.hdr.fcm == FrameCodingMode::InterlacedFrame;
        let field = self.hdr.field_mode;
        let st = &*self.st;
        let mut e = Edges {
            planes: &mut self.cur.planes,
            pq: self.hdr.pq,
        };
        let s = InterState {
            st,
            mv: &self.cur.motion_val[0],
            mv_f: &self.cur.mv_f[0],
            field,
        };
        let per_block: fn(&InterState, &mut Edges, FilterRow, usize, usize) = match (kind, vertical) {
            (LoopFilterKind::Intra, true) => return intra_v_row(st, &mut e, intfr, row),
            (LoopFilterKind::Intra, false) => return intra_h_row(st, &mut e, intfr, row),
            (LoopFilterKind::Inter, true) => inter_v_block,
            (LoopFilterKind::Inter, false) => inter_h_block,
            (LoopFilterKind::InterlacedFrame, true) => intfr_v_block,
            (LoopFilterKind::InterlacedFrame, false) => intfr_h_block,
            (LoopFilterKind::FieldB, true) => field_b_v_block,
            (LoopFilterKind::FieldB, false) => field_b_h_block,
        };
        for x in 0..st.mb_width {
            for n in 0..6 {
                per_block(&s, &mut e, row, x, n);
            }
        }
    }

    /// 一行宏块解码完成 (行环尚未前移) 后, 对已就绪的行做去块滤波
    ///
    /// 隔行帧的 V 滤波需要读取边界上方两行, 因此 V 比 H 提前一行.
    pub(super) fn loop_filter_row_done(&mut self, kind: LoopFilterKind) {
        let (y, s) = (self.st.mb_y, self.st.start_mb_y);
        if kind == LoopFilterKind::InterlacedFrame {
            if y > s {
                self.filter_row(kind, 1, y - 1, true);
            }
            if y >= s + 2 {
                self.filter_row(kind, 2, y - 2, false);
            }
        } else if y >= s + 2 {
            self.filter_row(kind, 2, y - 2, true);
            self.filter_row(kind, 2, y - 2, false);
        }
    }

    /// 切片结束: 处理剩余的行 (当前行仍位于行环位置 0)
    pub(super) fn loop_filter_flush(&mut self, kind: LoopFilterKind) {
        let (y, s) = (self.st.mb_y, self.st.start_mb_y);
        if kind == LoopFilterKind::InterlacedFrame {
            self.filter_row(kind, 0, y, true);
            if y > s {
                self.filter_row(kind, 1, y - 1, false);
            }
            self.filter_row(kind, 0, y, false);
        } else {
            if y > s {
                self.filter_row(kind, 1, y - 1, true);
                self.filter_row(kind, 1, y - 1, false);
            }
            self.filter_row(kind, 0, y, true);
            self.filter_row(kind, 0, y, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_kind_selection() {
        use FrameCodingMode::*;
        use Vc1PictureType::*;
        assert_eq!(LoopFilterKind::select(I, Progressive), LoopFilterKind::Intra);
        assert_eq!(LoopFilterKind::select(BI, InterlacedField), LoopFilterKind::Intra);
        assert_eq!(LoopFilterKind::select(B, Progressive), LoopFilterKind::Intra);
        assert_eq!(LoopFilterKind::select(P, Progressive), LoopFilterKind::Inter);
        assert_eq!(LoopFilterKind::select(P, InterlacedField), LoopFilterKind::Inter);
        assert_eq!(LoopFilterKind::select(P, InterlacedFrame), LoopFilterKind::InterlacedFrame);
        assert_eq!(LoopFilterKind::select(B, InterlacedFrame), LoopFilterKind::InterlacedFrame);
        assert_eq!(LoopFilterKind::select(B, InterlacedField), LoopFilterKind::FieldB);
    }

    #[test]
    fn test_h_overlap_smooths_block_boundary() {
        let mut ring = BlockRing::new(2);
        let (l, r) = (0, 1);
        // 左宏块右上块为 0, 右宏块左上块为 64
        let lb = ring.block(l, 2);
        let rb = ring.block(r, 0);
        ring.buf[rb..rb + 64].fill(64);
        ring.buf[lb..lb + 64].fill(0);
        h_overlap(&mut ring, l, r, false, false, 0);
        for row in 0..8 {
            let a = ring.buf[lb + row * 8 + 7];
            let c = ring.buf[rb + row * 8];
            assert!(a > 0 && a < 64, "左侧第 7 列应被拉近: {a}");
            assert!(c > 0 && c < 64, "右侧第 0 列应被拉近: {c}");
            // 远离边界的列不变
            assert_eq!(ring.buf[lb + row * 8 + 5], 0);
            assert_eq!(ring.buf[rb + row * 8 + 2], 64);
        }
    }

    #[test]
    fn test_v_overlap_internal_edge_uses_same_mb() {
        let mut ring = BlockRing::new(1);
        let top = ring.block(0, 0);
        let bottom = ring.block(0, 1);
        ring.buf[top..top + 64].fill(-32);
        ring.buf[bottom..bottom + 64].fill(32);
        // 编码块 2 的上边界为同一宏块的块 0
        v_overlap(&mut ring, 0, 0, 2);
        assert!(ring.buf[top + 56] > -32);
        assert!(ring.buf[bottom] < 32);
        assert_eq!(ring.buf[top], -32);
        assert_eq!(ring.buf[bottom + 16], 32);
    }
}
