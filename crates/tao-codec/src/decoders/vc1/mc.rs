//! 运动补偿
//!
//! 每次预测先把参考区域取到窗口缓冲 (越界样本复制边缘, 再做范围缩减与强度补偿),
//! 然后在窗口上插值写入当前图像. 第二场以第一场为参考时同样经过窗口,
//! 读取与写入不会交叠.

use log::warn;

use super::context::{PictureDecoder, RefSource};
use super::dsp::{self, McOp, Window};
use super::header::{IcLuts, IcState};
use super::picture::{FetchWindow, Picture, fetch_window};
use super::pred::{median4, mid_pred};
use super::tables::RND_TABLE_FIELD;
use super::types::{BmvType, FrameCodingMode, MotionVector, Vc1PictureType};

/// 窗口取样请求
#[derive(Debug, Clone, Copy)]
struct WindowReq {
    plane: usize,
    x: i32,
    y: i32,
    size: usize,
    row_step: i32,
    edge_w: i32,
    edge_h: i32,
    /// 场图像的参考场极性, 帧图像按取样行奇偶选择强度补偿表
    field: Option<usize>,
}

fn ref_luts(luts: &IcState, src: RefSource) -> &IcLuts {
    match src {
        RefSource::Last => &luts.last,
        RefSource::Next => &luts.next,
        RefSource::Current => luts.curr(),
    }
}

fn load_window(pic: &Picture, luts: &IcLuts, rangered: bool, req: &WindowReq, out: &mut Vec<u8>) {
    let ls = pic.linesize[req.plane];
    let (start, row_stride) = match req.field {
        Some(f) => (f * ls, ls * 2),
        None => (0, ls),
    };
    let win = FetchWindow {
        start,
        row_stride,
        x: req.x,
        y: req.y,
        w: req.size,
        h: req.size,
        row_step: req.row_step,
        edge_w: req.edge_w,
        edge_h: req.edge_h,
    };
    fetch_window(&pic.planes[req.plane], &win, out);
    if rangered {
        for v in out.iter_mut() {
            *v = (((i32::from(*v) - 128) >> 1) + 128) as u8;
        }
    }
    if luts.use_ic {
        let table = if req.plane == 0 { &luts.luty } else { &luts.lutuv };
        for (j, row) in out.chunks_mut(req.size).enumerate() {
            let f = req
                .field
                .unwrap_or(((req.y + j as i32 * req.row_step) & 1) as usize);
            for v in row {
                *v = table[f][usize::from(*v)];
            }
        }
    }
}

/// 亮度 MV 转为色度 MV (四分之一像素, 3/4 位置进位)
#[inline]
fn chroma_round(v: i32) -> i32 {
    (v + i32::from(v & 3 == 3)) >> 1
}

/// FASTUVMC: 奇数色度 MV 向零取整
#[inline]
fn fast_uv(v: i32) -> i32 {
    if v < 0 { v + (v & 1) } else { v - (v & 1) }
}

/// 由 4 个亮度块 MV 推导色度 MV
///
/// `a[i]` 与 `flag` 不同的块不参与. 返回参与块数与结果, 参与块少于 2 个时返回 0.
pub(super) fn chroma_mv_from_blocks(mvs: &[(i32, i32); 4], a: [bool; 4], flag: bool) -> (usize, (i32, i32)) {
    let idx = (0..4).fold(0usize, |acc, i| acc | (usize::from(a[i] != flag) << i));
    let pick = |f: &dyn Fn(i32, i32, i32) -> i32, i: usize, j: usize, k: usize| {
        (f(mvs[i].0, mvs[j].0, mvs[k].0), f(mvs[i].1, mvs[j].1, mvs[k].1))
    };
    match idx.count_ones() {
        0 => (
            4,
            (
                median4(mvs[0].0, mvs[1].0, mvs[2].0, mvs[3].0),
                median4(mvs[0].1, mvs[1].1, mvs[2].1, mvs[3].1),
            ),
        ),
        1 => {
            let out = match idx {
                0x1 => pick(&mid_pred, 1, 2, 3),
                0x2 => pick(&mid_pred, 0, 2, 3),
                0x4 => pick(&mid_pred, 0, 1, 3),
                _ => pick(&mid_pred, 0, 1, 2),
            };
            (3, out)
        }
        2 => {
            // 取前两个标志为假的块求平均
            let t1 = (0..3).find(|&i| !a[i]).unwrap_or(0);
            let t2 = (t1 + 1..4).find(|&i| !a[i]).unwrap_or(0);
            (2, ((mvs[t1].0 + mvs[t2].0) / 2, (mvs[t1].1 + mvs[t2].1) / 2))
        }
        _ => (0, (0, 0)),
    }
}

#[inline]
fn xy(m: MotionVector) -> (i32, i32) {
    (i32::from(m.x), i32::from(m.y))
}

impl PictureDecoder<'_> {
    /// 前向参考来源: 第二场引用相反极性时指向本帧第一场
    fn resolve_ref(&self, dir: usize, ref_field: usize) -> RefSource {
        if dir == 1 {
            RefSource::Next
        } else if self.hdr.field_mode && self.hdr.second_field && self.hdr.cur_field_type != ref_field {
            RefSource::Current
        } else {
            RefSource::Last
        }
    }

    /// 取参考窗口到 `st.win[slot]`, 参考缺失时返回 false
    fn fetch(&mut self, slot: usize, src: RefSource, req: WindowReq) -> bool {
        let luts = self.luts;
        let rangered = self.hdr.rangeredfrm;
        let pic = match src {
            RefSource::Last => self.last,
            RefSource::Next => self.next,
            RefSource::Current => Some(&*self.cur),
        };
        let Some(pic) = pic else {
            return false;
        };
        load_window(pic, ref_luts(luts, src), rangered, &req, &mut self.st.win[slot]);
        true
    }

    /// 参考平面的有效宽高 (按宏块对齐, 场图像为场高)
    fn edge_pos(&self) -> (i32, i32) {
        let h = (self.st.mb_width * 16) as i32;
        let v = ((self.hdr.mb_height * 16) >> usize::from(self.hdr.field_mode)) as i32;
        (h, v)
    }

    fn clip_luma_src(&self, x: i32, y: i32) -> (i32, i32) {
        if self.seq.is_advanced() {
            (
                x.clamp(-17, self.st.coded_width),
                y.clamp(-18, self.st.coded_height + 1),
            )
        } else {
            (
                x.clamp(-16, (self.st.mb_width * 16) as i32),
                y.clamp(-16, (self.hdr.mb_height * 16) as i32),
            )
        }
    }

    fn clip_chroma_src(&self, x: i32, y: i32) -> (i32, i32) {
        if self.seq.is_advanced() {
            (
                x.clamp(-8, self.st.coded_width >> 1),
                y.clamp(-8, self.st.coded_height >> 1),
            )
        } else {
            (
                x.clamp(-8, (self.st.mb_width * 8) as i32),
                y.clamp(-8, (self.hdr.mb_height * 8) as i32),
            )
        }
    }

    /// 16x16 亮度与两个 8x8 色度的整宏块预测
    fn mc_block16(&mut self, src: RefSource, ref_field: usize, mv: (i32, i32), uv: (i32, i32), op: McOp) {
        let (mx, my) = mv;
        let (uvmx, uvmy) = uv;
        let (mb_x, mb_y) = (self.st.mb_x as i32, self.st.mb_y as i32);
        let (src_x, src_y) = self.clip_luma_src(mb_x * 16 + (mx >> 2), mb_y * 16 + (my >> 2));
        let (uv_x, uv_y) = self.clip_chroma_src(mb_x * 8 + (uvmx >> 2), mb_y * 8 + (uvmy >> 2));
        let field = self.hdr.field_mode.then_some(ref_field);
        let mspel = i32::from(self.hdr.mspel);
        let (h_edge, v_edge) = self.edge_pos();
        let size = (17 + 2 * mspel) as usize;

        let luma = WindowReq {
            plane: 0,
            x: src_x - mspel,
            y: src_y - mspel,
            size,
            row_step: 1,
            edge_w: h_edge,
            edge_h: v_edge,
            field,
        };
        if !self.fetch(0, src, luma) {
            warn!("VC-1: 参考帧缺失, 跳过运动补偿 (Referenced frame missing)");
            return;
        }
        for p in 1..3 {
            let req = WindowReq {
                plane: p,
                x: uv_x,
                y: uv_y,
                size: 9,
                row_step: 1,
                edge_w: h_edge >> 1,
                edge_h: v_edge >> 1,
                field,
            };
            self.fetch(p, src, req);
        }

        let rnd = self.hdr.rnd;
        let pos = self.st.mb_dest(0);
        let stride = self.st.views[0].stride;
        let win = Window {
            data: &self.st.win[0],
            stride: size,
            origin: mspel as usize * (size + 1),
        };
        if self.hdr.mspel {
            dsp::mspel_mc(
                op,
                &mut self.cur.planes[0],
                pos,
                stride,
                &win,
                16,
                (mx & 3) as usize,
                (my & 3) as usize,
                rnd,
            );
        } else {
            let dxy = ((my & 2) | ((mx & 2) >> 1)) as usize;
            dsp::hpel_mc(op, &mut self.cur.planes[0], pos, stride, &win, 16, dxy, rnd != 0);
        }
        for p in 1..3 {
            let win = Window {
                data: &self.st.win[p],
                stride: 9,
                origin: 0,
            };
            let pos = self.st.mb_dest(p);
            let stride = self.st.views[p].stride;
            dsp::chroma_mc(
                op,
                &mut self.cur.planes[p],
                pos,
                stride,
                &win,
                8,
                (uvmx & 3) << 1,
                (uvmy & 3) << 1,
                rnd != 0,
            );
        }
    }

    /// 单 MV 宏块的运动补偿
    pub(super) fn mc_1mv(&mut self, dir: usize) {
        let m = self.st.cur_mv[dir][0];
        let (mx, mut my) = xy(m);
        if self.hdr.pict_type == Vc1PictureType::P {
            for k in 0..4 {
                let p = self.st.b8(k);
                self.set_mv(1, p, m);
            }
        }
        let (mut uvmx, mut uvmy) = (chroma_round(mx), chroma_round(my));
        let mb_x = self.st.mb_x as i32;
        self.st.luma_mv.set(mb_x, MotionVector::new(uvmx, uvmy));

        let ref_field = self.hdr.ref_field_type[dir];
        let cur_field = self.hdr.cur_field_type as i32;
        if self.hdr.field_mode && self.hdr.cur_field_type != ref_field {
            my += -2 + 4 * cur_field;
            uvmy += -2 + 4 * cur_field;
        }
        if self.seq.fastuvmc && self.hdr.fcm != FrameCodingMode::InterlacedFrame {
            uvmx = fast_uv(uvmx);
            uvmy = fast_uv(uvmy);
        }
        let src = self.resolve_ref(dir, ref_field);
        self.mc_block16(src, ref_field, (mx, my), (uvmx, uvmy), McOp::Put);
    }

    /// B 宏块内插模式的后向分量, 与前向预测取平均
    pub(super) fn interp_mc(&mut self) {
        let (mx, mut my) = xy(self.st.cur_mv[1][0]);
        let (mut uvmx, mut uvmy) = (chroma_round(mx), chroma_round(my));
        let ref_field = self.hdr.ref_field_type[1];
        let cur_field = self.hdr.cur_field_type as i32;
        if self.hdr.field_mode && self.hdr.cur_field_type != ref_field {
            my += -2 + 4 * cur_field;
            uvmy += -2 + 4 * cur_field;
        }
        if self.seq.fastuvmc {
            // 内插分量的奇数 MV 远离零取整
            let away = |v: i32| if v < 0 { v - (v & 1) } else { v + (v & 1) };
            uvmx = away(uvmx);
            uvmy = away(uvmy);
        }
        self.mc_block16(RefSource::Next, ref_field, (mx, my), (uvmx, uvmy), McOp::Avg);
    }

    /// 渐进 B 宏块的运动补偿分派
    pub(super) fn b_mc(&mut self, direct: bool, mode: BmvType) {
        if direct || mode == BmvType::Interpolated {
            self.mc_1mv(0);
            self.interp_mc();
            return;
        }
        self.mc_1mv(usize::from(mode == BmvType::Backward));
    }

    /// 场 P 图像第 4 块完成后, 以占多数极性的块 MV 推导供 B 帧直接模式使用的 MV
    fn store_field_direct_mv(&mut self) {
        let mut chosen = [[(0, 0); 4]; 2];
        let mut count = [0usize; 2];
        for k in 0..4 {
            let f = usize::from(self.get_mv_f(0, self.st.b8(k)));
            chosen[f][count[f]] = xy(self.st.cur_mv[0][k]);
            count[f] += 1;
        }
        let f = usize::from(count[1] > count[0]);
        let c = &chosen[f];
        let (tx, ty) = match count[f] {
            4 => (
                median4(c[0].0, c[1].0, c[2].0, c[3].0),
                median4(c[0].1, c[1].1, c[2].1, c[3].1),
            ),
            3 => (mid_pred(c[0].0, c[1].0, c[2].0), mid_pred(c[0].1, c[1].1, c[2].1)),
            _ => ((c[0].0 + c[1].0) / 2, (c[0].1 + c[1].1) / 2),
        };
        let b0 = self.st.b8(0);
        self.set_mv(1, b0, MotionVector::new(tx, ty));
        for k in 0..4 {
            let p = self.st.b8(k);
            self.set_mv_f(1, p, f == 1);
        }
    }

    /// 4MV 宏块中单个 8x8 亮度块的运动补偿
    pub(super) fn mc_4mv_luma(&mut self, n: usize, dir: usize, avg: bool) {
        let intfr = self.hdr.fcm == FrameCodingMode::InterlacedFrame;
        let at = self.st.b8(n);
        let fieldmv = intfr && self.st.blk_mv_type.get(at.0, at.1);
        let ref_field = self.hdr.ref_field_type[dir];
        let src = self.resolve_ref(dir, ref_field);
        if !self.ref_exists(src) {
            warn!("VC-1: 参考帧缺失, 跳过运动补偿 (Referenced frame missing)");
            return;
        }

        let (mut mx, mut my) = xy(self.st.cur_mv[dir][n]);
        if self.hdr.field_mode && self.hdr.cur_field_type != ref_field {
            my += -2 + 4 * self.hdr.cur_field_type as i32;
        }
        if self.hdr.pict_type == Vc1PictureType::P && n == 3 && self.hdr.field_mode {
            self.store_field_direct_mv();
        }
        let (mb_x, mb_y) = (self.st.mb_x as i32, self.st.mb_y as i32);
        if intfr {
            if self.hdr.pict_type == Vc1PictureType::P {
                self.set_mv(1, at, MotionVector::new(mx, my));
            }
            let width = self.st.coded_width;
            let height = self.st.coded_height >> 1;
            let qx = mb_x * 16 + (mx >> 2);
            let qy = mb_y * 8 + (my >> 3);
            if qx < -17 {
                mx -= 4 * (qx + 17);
            } else if qx > width {
                mx -= 4 * (qx - width);
            }
            if qy < -18 {
                my -= 8 * (qy + 18);
            } else if qy > height + 1 {
                my -= 8 * (qy - height - 1);
            }
        }

        let ls = self.st.views[0].stride;
        let row_off = if fieldmv {
            if n > 1 { ls } else { 0 }
        } else {
            ls * 4 * (n & 2)
        };
        let off = row_off + (n & 1) * 8;
        let src_x = mb_x * 16 + (n as i32 & 1) * 8 + (mx >> 2);
        let row = if fieldmv { i32::from(n > 1) } else { (n as i32 & 2) * 4 };
        let src_y = mb_y * 16 + row + (my >> 2);
        let (src_x, mut src_y) = if !self.seq.is_advanced() {
            (
                src_x.clamp(-16, (self.st.mb_width * 16) as i32),
                src_y.clamp(-16, (self.hdr.mb_height * 16) as i32),
            )
        } else {
            let ch = self.st.coded_height;
            let y = if !intfr {
                src_y.clamp(-18, ch + 1)
            } else if src_y & 1 != 0 {
                src_y.clamp(-17, ch + 1)
            } else {
                src_y.clamp(-18, ch)
            };
            (src_x.clamp(-17, self.st.coded_width), y)
        };

        let (h_edge, mut v_edge) = self.edge_pos();
        if fieldmv && src_y & 1 == 0 {
            v_edge -= 1;
        }
        if fieldmv && src_y & 1 != 0 && src_y < 4 {
            src_y -= 1;
        }
        let mspel = i32::from(self.hdr.mspel);
        let fm = i32::from(fieldmv);
        let row_step = if self.hdr.mspel { 1 << fm } else { 1 };
        let size = (9 + 2 * mspel) as usize;
        let req = WindowReq {
            plane: 0,
            x: src_x - mspel,
            y: src_y - mspel * row_step,
            size,
            row_step,
            edge_w: h_edge,
            edge_h: v_edge,
            field: self.hdr.field_mode.then_some(ref_field),
        };
        self.fetch(0, src, req);

        let op = if avg { McOp::Avg } else { McOp::Put };
        let pos = self.st.mb_dest(0) + off;
        let win = Window {
            data: &self.st.win[0],
            stride: size,
            origin: mspel as usize * (size + 1),
        };
        if self.hdr.mspel {
            dsp::mspel_mc(
                op,
                &mut self.cur.planes[0],
                pos,
                ls << fm,
                &win,
                8,
                (mx & 3) as usize,
                (my & 3) as usize,
                self.hdr.rnd,
            );
        } else {
            let dxy = ((my & 2) | ((mx & 2) >> 1)) as usize;
            dsp::hpel_mc(op, &mut self.cur.planes[0], pos, ls, &win, 8, dxy, self.hdr.rnd != 0);
        }
    }

    /// 4MV 宏块的色度运动补偿 (渐进与场图像)
    pub(super) fn mc_4mv_chroma(&mut self, dir: usize) {
        let mut mvs = [(0, 0); 4];
        let mut intra = [false; 4];
        let mut mv_f = [false; 4];
        for k in 0..4 {
            let p = self.st.b8(k);
            mvs[k] = xy(self.st.cur_mv[dir][k]);
            intra[k] = self.st.blk_intra.get(p.0, p.1);
            mv_f[k] = self.get_mv_f(dir, p);
        }

        let field_mode = self.hdr.field_mode;
        let cur_field = self.hdr.cur_field_type;
        let mut chroma_ref = cur_field;
        let (tx, ty);
        if !field_mode || !self.hdr.numref {
            let (valid, t) = chroma_mv_from_blocks(&mvs, intra, false);
            chroma_ref = if field_mode { self.hdr.reffield } else { 0 };
            if valid == 0 {
                let b0 = self.st.b8(0);
                self.set_mv(1, b0, MotionVector::ZERO);
                let mb_x = self.st.mb_x as i32;
                self.st.luma_mv.set(mb_x, MotionVector::ZERO);
                return;
            }
            (tx, ty) = t;
        } else {
            let dominant = mv_f.iter().filter(|&&f| f).count() > 2;
            (_, (tx, ty)) = chroma_mv_from_blocks(&mvs, mv_f, dominant);
            if dominant {
                chroma_ref = cur_field ^ 1;
            }
        }
        let b0 = self.st.b8(0);
        self.set_mv(1, b0, MotionVector::new(tx, ty));
        let (mut uvmx, mut uvmy) = (chroma_round(tx), chroma_round(ty));
        let mb_x = self.st.mb_x as i32;
        self.st.luma_mv.set(mb_x, MotionVector::new(uvmx, uvmy));
        if self.seq.fastuvmc {
            uvmx = fast_uv(uvmx);
            uvmy = fast_uv(uvmy);
        }
        if cur_field != chroma_ref {
            uvmy += 2 - 4 * chroma_ref as i32;
        }

        let mb_y = self.st.mb_y as i32;
        let (uv_x, uv_y) = self.clip_chroma_src(mb_x * 8 + (uvmx >> 2), mb_y * 8 + (uvmy >> 2));
        let src = self.resolve_ref(dir, chroma_ref);
        let (h_edge, v_edge) = self.edge_pos();
        for p in 1..3 {
            let req = WindowReq {
                plane: p,
                x: uv_x,
                y: uv_y,
                size: 9,
                row_step: 1,
                edge_w: h_edge >> 1,
                edge_h: v_edge >> 1,
                field: field_mode.then_some(chroma_ref),
            };
            if !self.fetch(p, src, req) {
                warn!("VC-1: 参考帧缺失, 跳过运动补偿 (Referenced frame missing)");
                return;
            }
        }
        let no_rnd = self.hdr.rnd != 0;
        for p in 1..3 {
            let win = Window {
                data: &self.st.win[p],
                stride: 9,
                origin: 0,
            };
            let pos = self.st.mb_dest(p);
            let stride = self.st.views[p].stride;
            dsp::chroma_mc(
                McOp::Put,
                &mut self.cur.planes[p],
                pos,
                stride,
                &win,
                8,
                (uvmx & 3) << 1,
                (uvmy & 3) << 1,
                no_rnd,
            );
        }
    }

    /// 隔行帧宏块的色度运动补偿: 4 个 4x4 子块各用对应亮度块的 MV
    ///
    /// 上半两个子块取 `dir` 方向, 下半取 `dir2` 方向.
    pub(super) fn mc_4mv_chroma4(&mut self, dir: usize, dir2: usize, avg: bool) {
        let b0 = self.st.b8(0);
        let fieldmv = self.st.blk_mv_type.get(b0.0, b0.1);
        let fm = i32::from(fieldmv);
        let v_dist = if fieldmv { 1 } else { 4 };
        let (h_edge, full_v_edge) = self.edge_pos();
        let mut v_edge = full_v_edge >> 1;
        let (mb_x, mb_y) = (self.st.mb_x as i32, self.st.mb_y as i32);
        let uvls = self.st.views[1].stride;
        let op = if avg { McOp::Avg } else { McOp::Put };
        let no_rnd = self.hdr.rnd != 0;

        for i in 0..4usize {
            let d = if i < 2 { dir } else { dir2 };
            let (tx, ty) = xy(self.st.cur_mv[d][i]);
            let uvmx = chroma_round(tx);
            let uvmy = if fieldmv {
                (ty >> 4) * 8 + RND_TABLE_FIELD[(ty & 0xF) as usize]
            } else {
                chroma_round(ty)
            };
            let lower = i & 2 != 0;
            let off = (i & 1) * 4 + if lower { v_dist as usize * uvls } else { 0 };
            let uv_x = (mb_x * 8 + (i as i32 & 1) * 4 + (uvmx >> 2)).clamp(-8, self.st.coded_width >> 1);
            let mut uv_y = (mb_y * 8 + if lower { v_dist } else { 0 } + (uvmy >> 2))
                .clamp(-8, self.st.coded_height >> 1);
            let src = if d == 1 { RefSource::Next } else { RefSource::Last };
            if !self.ref_exists(src) {
                return;
            }
            if fieldmv && uv_y & 1 == 0 {
                v_edge = (full_v_edge >> 1) - 1;
            }
            if fieldmv && uv_y & 1 != 0 && uv_y < 2 {
                uv_y -= 1;
            }
            for p in 1..3 {
                let req = WindowReq {
                    plane: p,
                    x: uv_x,
                    y: uv_y,
                    size: 5,
                    row_step: 1 << fm,
                    edge_w: h_edge >> 1,
                    edge_h: v_edge,
                    field: None,
                };
                self.fetch(p, src, req);
            }
            for p in 1..3 {
                let win = Window {
                    data: &self.st.win[p],
                    stride: 5,
                    origin: 0,
                };
                let pos = self.st.mb_dest(p) + off;
                dsp::chroma_mc(
                    op,
                    &mut self.cur.planes[p],
                    pos,
                    uvls << fm,
                    &win,
                    4,
                    (uvmx & 3) << 1,
                    (uvmy & 3) << 1,
                    no_rnd,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chroma_round_and_fast_uv() {
        assert_eq!(chroma_round(3), 2);
        assert_eq!(chroma_round(2), 1);
        assert_eq!(chroma_round(-1), -1);
        assert_eq!(fast_uv(3), 2);
        assert_eq!(fast_uv(-3), -2);
        assert_eq!(fast_uv(4), 4);
    }

    #[test]
    fn test_chroma_mv_skips_intra_blocks() {
        let mvs = [(4, 4), (8, 8), (100, 100), (6, 6)];
        let (n, mv) = chroma_mv_from_blocks(&mvs, [false, false, true, false], false);
        assert_eq!(n, 3);
        assert_eq!(mv, (6, 6));
        let (n, mv) = chroma_mv_from_blocks(&mvs, [true, false, true, false], false);
        assert_eq!(n, 2);
        assert_eq!(mv, (7, 7));
        let (n, _) = chroma_mv_from_blocks(&mvs, [true, true, true, false], false);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_chroma_mv_by_intra_count() {
        let mvs = [(-3, 5), (9, -7), (20, 2), (-6, 11)];
        // 单个帧内块: 其余三块取中值
        for (intra, expected) in [
            (0, (9, 2)),
            (1, (-3, 5)),
            (2, (-3, 5)),
            (3, (9, 2)),
        ] {
            let mut a = [false; 4];
            a[intra] = true;
            assert_eq!(chroma_mv_from_blocks(&mvs, a, false), (3, expected), "帧内块 {intra}");
        }
        // 两个帧内块: 剩余两块平均, 向零截断
        assert_eq!(chroma_mv_from_blocks(&mvs, [false, true, true, false], false), (2, (-4, 8)));
        assert_eq!(chroma_mv_from_blocks(&mvs, [false, false, true, true], false), (2, (3, -1)));
        assert_eq!(chroma_mv_from_blocks(&mvs, [true, true, false, false], false), (2, (7, 6)));
        // 三个及以上帧内块时色度按帧内处理
        assert_eq!(chroma_mv_from_blocks(&mvs, [true, false, true, true], false).0, 0);
        assert_eq!(chroma_mv_from_blocks(&mvs, [true; 4], false).0, 0);
    }

    #[test]
    fn test_chroma_mv_dominant_polarity() {
        // 按极性筛选: 只有块 2 与占多数的极性不同
        let mvs = [(4, 0), (8, 4), (-40, 40), (6, 2)];
        let (n, mv) = chroma_mv_from_blocks(&mvs, [true, true, false, true], true);
        assert_eq!(n, 3);
        assert_eq!(mv, (6, 2));
    }

    #[test]
    fn test_chroma_mv_all_inter_uses_median4() {
        let mvs = [(0, 0), (4, -4), (8, 8), (12, 2)];
        let (n, mv) = chroma_mv_from_blocks(&mvs, [false; 4], false);
        assert_eq!(n, 4);
        assert_eq!(mv, (6, 1));
    }
}
