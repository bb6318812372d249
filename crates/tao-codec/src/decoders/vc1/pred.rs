//! 运动向量预测
//!
//! 渐进/场图像共用 [`PictureDecoder::pred_mv`], 隔行帧使用
//! [`PictureDecoder::pred_mv_intfr`], 渐进 B 帧与场 B 图像各有独立入口.
//! 所有 MV 以四分之一像素为单位存入图像的 `motion_val`.

use log::warn;
use tao_core::TaoResult;

use super::context::PictureDecoder;
use super::header::PictureHeader;
use super::syntax::read_flag;
use super::tables::{B_FIELD_MVPRED_SCALES, FIELD_MVPRED_SCALES};
use super::types::{BmvType, MotionVector, Vc1PictureType};

/// 三者中值
#[inline]
pub(super) fn mid_pred(a: i32, b: i32, c: i32) -> i32 {
    a.max(b).min(a.min(b).max(c))
}

/// 四者中间两值的平均
pub(super) fn median4(a: i32, b: i32, c: i32, d: i32) -> i32 {
    if a < b {
        if c < d {
            (b.min(d) + a.max(c)) / 2
        } else {
            (b.min(c) + a.max(d)) / 2
        }
    } else if c < d {
        (a.min(d) + b.max(c)) / 2
    } else {
        (a.min(c) + b.max(d)) / 2
    }
}

/// 按 MV 范围取有符号模: 结果落在 [-r, r)
#[inline]
pub(super) fn wrap_mv(v: i32, r: i32) -> i32 {
    ((v + r) & ((r << 1) - 1)) - r
}

/// 以 BFRACTION 缩放后一参考的 MV, `inv` 时求后向分量
#[inline]
pub(super) fn scale_mv(value: i32, bfraction: i32, inv: bool, quarter_sample: bool) -> i32 {
    let n = if inv { bfraction - 256 } else { bfraction };
    if !quarter_sample {
        2 * ((value * n + 255) >> 9)
    } else {
        (value * n + 128) >> 8
    }
}

#[inline]
fn mv(x: i32, y: i32) -> MotionVector {
    MotionVector::new(x, y)
}

#[inline]
fn xy(m: MotionVector) -> (i32, i32) {
    (i32::from(m.x), i32::from(m.y))
}

// ============================================================
// 场间 MV 缩放
// ============================================================

/// 分区缩放: 小值用 s1, 大值用 s2 并加偏移, 超过 `limit` 保持原值
#[inline]
fn zone_scale(n: i32, limit: i32, s1: i32, s2: i32, zone: i32, zoff: i32) -> i32 {
    if n.abs() > limit {
        n
    } else if n.abs() < zone {
        (n * s1) >> 8
    } else if n < 0 {
        ((n * s2) >> 8) - zoff
    } else {
        ((n * s2) >> 8) + zoff
    }
}

fn clip_field_y(hdr: &PictureHeader, v: i32, dir: usize) -> i32 {
    let half = hdr.range_y / 2;
    if hdr.cur_field_type == 1 && hdr.ref_field_type[dir] == 0 {
        v.clamp(-half + 1, half)
    } else {
        v.clamp(-half, half - 1)
    }
}

fn ref_distance(hdr: &PictureHeader, dir: usize) -> usize {
    let d = if hdr.pict_type != Vc1PictureType::B {
        hdr.refdist
    } else if dir == 1 {
        hdr.brfd
    } else {
        hdr.frfd
    };
    d.clamp(0, 3) as usize
}

/// 同极性参考场的预测值缩放
fn scale_for_same(hdr: &PictureHeader, n: i32, dim_y: bool, dir: usize) -> i32 {
    let hpel = i32::from(!hdr.quarter_sample);
    let n = n >> hpel;
    if hdr.pict_type != Vc1PictureType::B || hdr.second_field || dir == 0 {
        let t = &FIELD_MVPRED_SCALES[dir ^ usize::from(hdr.second_field)];
        let rd = ref_distance(hdr, dir);
        let g = |k: usize| i32::from(t[k][rd]);
        let v = if dim_y {
            clip_field_y(hdr, zone_scale(n, 63, g(1), g(2), g(4), g(6)), dir)
        } else {
            zone_scale(n, 255, g(1), g(2), g(3), g(5)).clamp(-hdr.range_x, hdr.range_x - 1)
        };
        return v * (1 << hpel);
    }
    let brfd = hdr.brfd.clamp(0, 3) as usize;
    ((n * i32::from(B_FIELD_MVPRED_SCALES[0][brfd])) >> 8) << hpel
}

/// 相反极性参考场的预测值缩放
fn scale_for_opp(hdr: &PictureHeader, n: i32, dim_y: bool, dir: usize) -> i32 {
    let hpel = i32::from(!hdr.quarter_sample);
    let n = n >> hpel;
    if hdr.pict_type == Vc1PictureType::B && !hdr.second_field && dir == 1 {
        let brfd = hdr.brfd.clamp(0, 3) as usize;
        let g = |k: usize| i32::from(B_FIELD_MVPRED_SCALES[k][brfd]);
        let v = if dim_y {
            clip_field_y(hdr, zone_scale(n, 63, g(1), g(2), g(4), g(6)), dir)
        } else {
            zone_scale(n, 255, g(1), g(2), g(3), g(5)).clamp(-hdr.range_x, hdr.range_x - 1)
        };
        return v << hpel;
    }
    let rd = ref_distance(hdr, dir);
    let scale = i32::from(FIELD_MVPRED_SCALES[dir ^ usize::from(hdr.second_field)][0][rd]);
    ((n * scale) >> 8) * (1 << hpel)
}

/// 候选预测值
#[derive(Debug, Clone, Copy, Default)]
struct Candidate {
    mv: (i32, i32),
    valid: bool,
    /// 指向相反极性场
    opp: bool,
}

impl PictureDecoder<'_> {
    /// 帧内宏块: 清零当前块 (1MV 时整宏块) 的前后向 MV
    fn clear_intra_mvs(&mut self, n: usize, dup: bool) {
        let wrap = 2 * self.st.mb_width as i32 + 1;
        let at = self.st.b8(n);
        self.st.cur_mv[0][n] = MotionVector::ZERO;
        let mut targets = vec![at];
        if dup {
            for off in [1, wrap, wrap + 1] {
                targets.push(self.st.b8_offset(at, off));
            }
            let mb_x = self.st.mb_x as i32;
            self.st.luma_mv.set(mb_x, MotionVector::ZERO);
        }
        for p in targets {
            self.set_mv(0, p, MotionVector::ZERO);
            self.set_mv(1, p, MotionVector::ZERO);
        }
    }

    /// 预测并写入块 `n` 的 MV (渐进 P/场 P/场 B)
    ///
    /// `mv1` 时结果复制到整个宏块. 场图像中 `pred_flag` 选择参考场极性.
    pub(super) fn pred_mv(
        &mut self,
        n: usize,
        dmv: (i32, i32),
        mv1: bool,
        pred_flag: bool,
        dir: usize,
    ) -> TaoResult<()> {
        let (mut dmv_x, mut dmv_y) = dmv;
        if !self.hdr.quarter_sample {
            dmv_x *= 2;
            dmv_y *= 2;
        }
        if self.st.mb_intra {
            self.clear_intra_mvs(n, mv1);
            return Ok(());
        }

        let mb_w = self.st.mb_width;
        let mb_x = self.st.mb_x;
        let wrap = 2 * mb_w as i32 + 1;
        let last_col = mb_x + 1 == mb_w;
        let field_mode = self.hdr.field_mode;
        let at = self.st.b8(n);

        let mut a_valid = !self.st.first_line || n == 2 || n == 3;
        let mut b_valid = a_valid;
        let mut c_valid = mb_x != 0 || n == 1 || n == 3;
        let off = if mv1 {
            b_valid = b_valid && mb_w > 1;
            match (field_mode && self.hdr.is_mixed_mv(), last_col) {
                (true, true) => -2,
                (false, true) => -1,
                _ => 2,
            }
        } else {
            let off = match n {
                0 if mb_x != 0 => -1,
                0 if self.seq.res_rtm_flag => 1,
                0 => 2 * mb_w as i32 - wrap - 1,
                1 if last_col => -1,
                1 | 2 => 1,
                _ => -1,
            };
            if field_mode && mb_w == 1 {
                b_valid = b_valid && c_valid;
            }
            off
        };
        let pa = self.st.b8_offset(at, -wrap);
        let pb = self.st.b8_offset(at, -wrap + off);
        let pc = self.st.b8_offset(at, -1);
        if field_mode {
            a_valid = a_valid && !self.st.blk_intra.get(pa.0, pa.1);
            b_valid = b_valid && !self.st.blk_intra.get(pb.0, pb.1);
            c_valid = c_valid && !self.st.blk_intra.get(pc.0, pc.1);
        }

        let fetch = |this: &Self, p: (i32, i32), valid: bool| {
            if valid {
                Candidate {
                    mv: xy(this.get_mv(dir, p)),
                    valid: true,
                    opp: this.get_mv_f(dir, p),
                }
            } else {
                Candidate::default()
            }
        };
        let mut cand = [fetch(self, pa, a_valid), fetch(self, pb, b_valid), fetch(self, pc, c_valid)];
        let num_opp = cand.iter().filter(|c| c.valid && c.opp).count();
        let num_same = cand.iter().filter(|c| c.valid && !c.opp).count();

        let opposite = if field_mode {
            if !self.hdr.numref {
                self.hdr.reffield == 0
            } else if num_same <= num_opp {
                !pred_flag
            } else {
                pred_flag
            }
        } else {
            false
        };
        self.set_mv_f(dir, at, opposite);
        let cur_field = self.hdr.cur_field_type;
        self.hdr.ref_field_type[dir] = if opposite { cur_field ^ 1 } else { cur_field };
        let hdr = &*self.hdr;
        for c in cand.iter_mut().filter(|c| c.valid) {
            if opposite && !c.opp {
                c.mv = (scale_for_opp(hdr, c.mv.0, false, dir), scale_for_opp(hdr, c.mv.1, true, dir));
            } else if !opposite && c.opp {
                c.mv = (scale_for_same(hdr, c.mv.0, false, dir), scale_for_same(hdr, c.mv.1, true, dir));
            }
            // 缩放结果以 16 位存放
            c.mv = (i32::from(c.mv.0 as i16), i32::from(c.mv.1 as i16));
        }
        let [a, b, c] = cand;

        let (mut px, mut py) = if a.valid {
            a.mv
        } else if c.valid {
            c.mv
        } else if b.valid {
            b.mv
        } else {
            (0, 0)
        };
        if num_same + num_opp > 1 {
            px = mid_pred(a.mv.0, b.mv.0, c.mv.0);
            py = mid_pred(a.mv.1, b.mv.1, c.mv.1);
        }

        if !field_mode {
            let limit = if mv1 { -60 } else { -28 };
            let qx = ((mb_x as i32) << 6) + if n == 1 || n == 3 { 32 } else { 0 };
            let qy = ((self.st.mb_y as i32) << 6) + if n == 2 || n == 3 { 32 } else { 0 };
            let max_x = ((mb_w as i32) << 6) - 4;
            let max_y = ((self.hdr.mb_height as i32) << 6) - 4;
            if qx + px < limit {
                px = limit - qx;
            }
            if qy + py < limit {
                py = limit - qy;
            }
            if qx + px > max_x {
                px = max_x - qx;
            }
            if qy + py > max_y {
                py = max_y - qy;
            }
        }

        if (!field_mode || self.hdr.pict_type != Vc1PictureType::B) && a.valid && c.valid {
            let dist = |p: (i32, i32), intra: bool| {
                if intra {
                    px.abs() + py.abs()
                } else {
                    (px - p.0).abs() + (py - p.1).abs()
                }
            };
            let sum_a = dist(a.mv, self.st.blk_intra.get(pa.0, pa.1));
            let hybrid = sum_a > 32 || dist(c.mv, self.st.blk_intra.get(pc.0, pc.1)) > 32;
            if hybrid {
                (px, py) = if read_flag(&mut self.br)? { a.mv } else { c.mv };
            }
        }

        let r_x = self.hdr.range_x;
        let mut r_y = self.hdr.range_y;
        if field_mode && self.hdr.numref {
            r_y >>= 1;
        }
        let y_bias = i32::from(field_mode && cur_field == 1 && self.hdr.ref_field_type[dir] == 0);
        let out = mv(wrap_mv(px + dmv_x, r_x), wrap_mv(py + dmv_y - y_bias, r_y) + y_bias);
        self.st.cur_mv[dir][n] = out;
        self.set_mv(dir, at, out);
        if mv1 {
            for o in [1, wrap, wrap + 1] {
                let p = self.st.b8_offset(at, o);
                self.set_mv(dir, p, out);
                self.set_mv_f(dir, p, opposite);
            }
        }
        Ok(())
    }

    /// 隔行帧宏块的 MV 预测
    ///
    /// `mvn`: 1 为整宏块 1MV, 2 为场 MV 对 (复制到右侧块), 其他值只写当前块.
    pub(super) fn pred_mv_intfr(&mut self, n: usize, dmv: (i32, i32), mvn: u32, dir: usize) {
        let (dmv_x, dmv_y) = dmv;
        if self.st.mb_intra {
            self.clear_intra_mvs(n, mvn == 1);
            return;
        }
        let mb_x = self.st.mb_x as i32;
        let mb_w = self.st.mb_width;
        let wrap = 2 * mb_w as i32 + 1;
        let at = self.st.b8(n);
        let mv_type = |this: &Self, p: (i32, i32)| this.st.blk_mv_type.get(p.0, p.1);
        let cur_field_mv = mv_type(self, at);
        let get = |this: &Self, p: (i32, i32)| xy(this.get_mv(dir, p));
        let up2 = |this: &Self, k: usize, dx: i32| {
            let (x, y) = this.st.b8(k);
            (x + dx, y - 2)
        };

        let off = if n == 0 || n == 1 { 1 } else { -1 };
        let (mut a, mut b, mut c) = ((0, 0), (0, 0), (0, 0));
        let (mut a_valid, mut b_valid, mut c_valid) = (false, false, false);

        // A: 左邻
        if mb_x != 0 || n == 1 || n == 3 {
            let left = self.st.b8_offset(at, -1);
            if cur_field_mv || !mv_type(self, left) {
                a = get(self, left);
            } else {
                let l2 = self.st.b8_offset(at, -1 + off * wrap);
                let (m1, m2) = (get(self, left), get(self, l2));
                a = ((m1.0 + m2.0 + 1) >> 1, (m1.1 + m2.1 + 1) >> 1);
            }
            a_valid = true;
            if n & 1 == 0 && self.st.is_intra.get(0, mb_x - 1) != 0 {
                a_valid = false;
                a = (0, 0);
            }
        }

        // B, C: 上方宏块
        if n == 0 || n == 1 || cur_field_mv {
            if !self.st.first_line {
                if self.st.is_intra.get(1, mb_x) == 0 {
                    b_valid = true;
                    let mut n_adj = n | 2;
                    let pos_b = up2(self, n_adj, 0);
                    if mv_type(self, pos_b) && cur_field_mv {
                        n_adj = (n & 2) | (n & 1);
                    }
                    b = get(self, up2(self, n_adj, 0));
                    if mv_type(self, pos_b) && !cur_field_mv {
                        let o = get(self, up2(self, n_adj ^ 2, 0));
                        b = ((b.0 + o.0 + 1) >> 1, (b.1 + o.1 + 1) >> 1);
                    }
                }
                if mb_w > 1 && self.st.is_intra.get(1, mb_x + 1) == 0 {
                    c_valid = true;
                    let mut n_adj = 2;
                    let pos_c = up2(self, 2, 2);
                    if mv_type(self, pos_c) && cur_field_mv {
                        n_adj = n & 2;
                    }
                    c = get(self, up2(self, n_adj, 2));
                    if mv_type(self, pos_c) && !cur_field_mv {
                        let o = get(self, up2(self, n_adj ^ 2, 2));
                        c = ((1 + c.0 + o.0) >> 1, (1 + c.1 + o.1) >> 1);
                    }
                    if mb_x as usize == mb_w - 1 {
                        if self.st.is_intra.get(1, mb_x - 1) == 0 {
                            c_valid = true;
                            let mut n_adj = 3;
                            let pos_c = up2(self, 3, -2);
                            if mv_type(self, pos_c) && cur_field_mv {
                                n_adj = n | 1;
                            }
                            c = get(self, up2(self, n_adj, -2));
                            if mv_type(self, pos_c) && !cur_field_mv {
                                let o = get(self, up2(self, 1, -2));
                                c = ((1 + c.0 + o.0) >> 1, (1 + c.1 + o.1) >> 1);
                            }
                        } else {
                            c_valid = false;
                        }
                    }
                }
            }
        } else {
            b_valid = true;
            b = get(self, self.st.b8(1));
            c_valid = true;
            c = get(self, self.st.b8(0));
        }

        let total_valid = usize::from(a_valid) + usize::from(b_valid) + usize::from(c_valid);
        if mb_x == 0 && !(n == 1 || n == 3) {
            a = (0, 0);
        }
        if self.st.first_line && (cur_field_mv || n & 2 == 0) {
            b = (0, 0);
            c = (0, 0);
        }

        let (mut px, mut py) = (0, 0);
        if !cur_field_mv {
            if mb_w == 1 {
                (px, py) = b;
            } else if total_valid >= 2 {
                px = mid_pred(a.0, b.0, c.0);
                py = mid_pred(a.1, b.1, c.1);
            } else if total_valid == 1 {
                (px, py) = if a_valid {
                    a
                } else if b_valid {
                    b
                } else {
                    c
                };
            }
        } else {
            // 场 MV: 垂直分量第 2 位表示指向相反极性
            let field_a = a_valid && a.1 & 4 != 0;
            let field_b = b_valid && b.1 & 4 != 0;
            let field_c = c_valid && c.1 & 4 != 0;
            let num_opp = usize::from(field_a) + usize::from(field_b) + usize::from(field_c);
            let num_same = total_valid - num_opp;
            match total_valid {
                3 => {
                    if num_same == 3 || num_opp == 3 {
                        px = mid_pred(a.0, b.0, c.0);
                        py = mid_pred(a.1, b.1, c.1);
                    } else if num_same >= num_opp {
                        (px, py) = if !field_a { a } else { b };
                    } else {
                        (px, py) = if field_a { a } else { b };
                    }
                }
                2 => {
                    if num_same >= num_opp {
                        (px, py) = if !field_a && a_valid {
                            a
                        } else if !field_b && b_valid {
                            b
                        } else {
                            c
                        };
                    } else {
                        (px, py) = if field_a && a_valid { a } else { b };
                    }
                }
                1 => {
                    (px, py) = if a_valid {
                        a
                    } else if b_valid {
                        b
                    } else {
                        c
                    };
                }
                _ => {}
            }
        }

        let (r_x, r_y) = (self.hdr.range_x, self.hdr.range_y);
        let out = mv(wrap_mv(px + dmv_x, r_x), wrap_mv(py + dmv_y, r_y));
        self.st.cur_mv[dir][n] = out;
        self.set_mv(dir, at, out);
        match mvn {
            1 => {
                for o in [1, wrap, wrap + 1] {
                    let p = self.st.b8_offset(at, o);
                    self.set_mv(dir, p, out);
                }
            }
            2 => {
                let p = self.st.b8_offset(at, 1);
                self.set_mv(dir, p, out);
                if n + 1 < 4 {
                    self.st.cur_mv[dir][n + 1] = out;
                }
            }
            _ => {}
        }
    }

    /// 渐进 B 帧的 MV 预测 (前向/后向/内插/直接)
    pub(super) fn pred_b_mv(
        &mut self,
        dmv: [(i32, i32); 2],
        direct: bool,
        mvtype: BmvType,
    ) -> TaoResult<()> {
        let qs = self.hdr.quarter_sample;
        let mut dmv = dmv;
        if !qs {
            for d in &mut dmv {
                d.0 *= 2;
                d.1 *= 2;
            }
        }
        let at = self.st.b8(0);
        if self.st.mb_intra {
            self.set_mv(0, at, MotionVector::ZERO);
            self.set_mv(1, at, MotionVector::ZERO);
            return Ok(());
        }

        let (r_x, r_y) = (self.hdr.range_x, self.hdr.range_y);
        let mb_x = self.st.mb_x as i32;
        let mb_y = self.st.mb_y as i32;
        let mb_w = self.st.mb_width as i32;
        let mb_h = self.hdr.mb_height as i32;
        if direct && self.next.is_some_and(|p| p.field_picture) {
            warn!("VC-1: 不支持帧/场混合的直接模式 (Mixed frame/field direct mode)");
        }
        let colocated = self
            .next
            .map(|p| xy(p.motion_val[1].get(at.0, at.1)))
            .unwrap_or((0, 0));
        let bfrac = self.hdr.bfraction;
        let clip_x = |v: i32| v.clamp(-60 - (mb_x << 6), (mb_w << 6) - 4 - (mb_x << 6));
        let clip_y = |v: i32| v.clamp(-60 - (mb_y << 6), (mb_h << 6) - 4 - (mb_y << 6));
        let mut out = [
            (
                clip_x(scale_mv(colocated.0, bfrac, false, qs)),
                clip_y(scale_mv(colocated.1, bfrac, false, qs)),
            ),
            (
                clip_x(scale_mv(colocated.0, bfrac, true, qs)),
                clip_y(scale_mv(colocated.1, bfrac, true, qs)),
            ),
        ];

        if !direct {
            let sh = if self.seq.is_advanced() { 6 } else { 5 };
            for (dir, d) in dmv.iter().enumerate() {
                let wanted = match dir {
                    0 => matches!(mvtype, BmvType::Forward | BmvType::Interpolated),
                    _ => matches!(mvtype, BmvType::Backward | BmvType::Interpolated),
                };
                if !wanted {
                    continue;
                }
                let mut c = xy(self.get_mv(dir, self.st.b8_offset(at, -2)));
                let a = xy(self.get_mv(dir, (at.0, at.1 - 2)));
                let off = if mb_x == mb_w - 1 { -2 } else { 2 };
                let b = xy(self.get_mv(dir, self.st.b8_offset((at.0, at.1 - 2), off)));
                if mb_x == 0 {
                    c = (0, 0);
                }
                let (mut px, mut py) = if !self.st.first_line {
                    if mb_w == 1 {
                        a
                    } else {
                        (mid_pred(a.0, b.0, c.0), mid_pred(a.1, b.1, c.1))
                    }
                } else if mb_x != 0 {
                    c
                } else {
                    (0, 0)
                };
                let limit = 4 - (1 << sh);
                let (qx, qy) = (mb_x << sh, mb_y << sh);
                let (max_x, max_y) = ((mb_w << sh) - 4, (mb_h << sh) - 4);
                if qx + px < limit {
                    px = limit - qx;
                }
                if qy + py < limit {
                    py = limit - qy;
                }
                if qx + px > max_x {
                    px = max_x - qx;
                }
                if qy + py > max_y {
                    py = max_y - qy;
                }
                if self.cfg.hybrid_b_pred && !self.st.first_line && mb_x != 0 {
                    let up = (at.0, at.1 - 1);
                    let left = self.st.b8_offset(at, -2);
                    let dist = |p: (i32, i32), intra: bool| {
                        if intra {
                            px.abs() + py.abs()
                        } else {
                            (px - p.0).abs() + (py - p.1).abs()
                        }
                    };
                    let hybrid = dist(a, self.st.blk_intra.get(up.0, up.1)) > 32
                        || dist(c, self.st.blk_intra.get(left.0, left.1)) > 32;
                    if hybrid {
                        (px, py) = if read_flag(&mut self.br)? { a } else { c };
                    }
                }
                out[dir] = (wrap_mv(px + d.0, r_x), wrap_mv(py + d.1, r_y));
            }
        }
        for (dir, m) in out.iter().enumerate() {
            let m = mv(m.0, m.1);
            self.st.cur_mv[dir][0] = m;
            self.set_mv(dir, at, m);
        }
        Ok(())
    }

    /// 场 B 图像的 MV 预测
    pub(super) fn pred_b_mv_intfi(
        &mut self,
        n: usize,
        dmv: [(i32, i32); 2],
        mv1: bool,
        pred_flag: [bool; 2],
    ) -> TaoResult<()> {
        let bmvtype = self.st.bmvtype;
        if bmvtype == BmvType::Direct {
            let qs = self.hdr.quarter_sample;
            let bfrac = self.hdr.bfraction;
            let (mbx, mby) = self.pic_mb();
            let b0 = self.st.pic_b8(self.st.b8(0));
            let (fwd, bwd, f) = match self.next {
                Some(next) if !next.mb_intra.get(mbx, mby) => {
                    let col = xy(next.motion_val[1].get(b0.0, b0.1));
                    let total_opp = (0..4)
                        .filter(|&k| {
                            let p = self.st.pic_b8(self.st.b8(k));
                            next.mv_f[0].get(p.0, p.1)
                        })
                        .count();
                    (
                        mv(scale_mv(col.0, bfrac, false, qs), scale_mv(col.1, bfrac, false, qs)),
                        mv(scale_mv(col.0, bfrac, true, qs), scale_mv(col.1, bfrac, true, qs)),
                        total_opp > 2,
                    )
                }
                _ => (MotionVector::ZERO, MotionVector::ZERO, false),
            };
            self.st.cur_mv[0][0] = fwd;
            self.st.cur_mv[1][0] = bwd;
            let ref_type = self.hdr.cur_field_type ^ usize::from(f);
            self.hdr.ref_field_type = [ref_type; 2];
            for k in 0..4 {
                let p = self.st.b8(k);
                self.set_mv(0, p, fwd);
                self.set_mv(1, p, bwd);
                self.set_mv_f(0, p, f);
                self.set_mv_f(1, p, f);
            }
            return Ok(());
        }
        if bmvtype == BmvType::Interpolated {
            self.pred_mv(0, dmv[0], true, pred_flag[0], 0)?;
            self.pred_mv(0, dmv[1], true, pred_flag[1], 1)?;
            return Ok(());
        }
        let dir = usize::from(bmvtype == BmvType::Backward);
        self.pred_mv(n, dmv[dir], mv1, pred_flag[dir], dir)?;
        if n == 3 || mv1 {
            let other = dir ^ 1;
            self.pred_mv(0, dmv[other], true, false, other)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mid_pred_and_median4() {
        assert_eq!(mid_pred(1, 5, 3), 3);
        assert_eq!(mid_pred(-4, -9, 0), -4);
        assert_eq!(median4(1, 2, 3, 4), 2);
        assert_eq!(median4(10, -10, 4, 6), 5);
    }

    #[test]
    fn test_wrap_mv_signed_modulus() {
        // 范围 64: 结果落在 [-64, 64)
        assert_eq!(wrap_mv(63, 64), 63);
        assert_eq!(wrap_mv(64, 64), -64);
        assert_eq!(wrap_mv(-65, 64), 63);
        assert_eq!(wrap_mv(0, 64), 0);
    }

    #[test]
    fn test_wrap_mv_matches_euclidean_modulus() {
        // 线性同余序列覆盖正负值与各档范围
        let mut seed = 0x2545_f491_u32;
        for _ in 0..2000 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            let v = (seed >> 8) as i32 % 8192 - 4096;
            let r = 1 << (4 + (seed >> 4) % 7);
            let w = wrap_mv(v, r);
            assert!((-r..r).contains(&w), "wrap_mv({v}, {r}) = {w}");
            assert_eq!((w - v).rem_euclid(2 * r), 0, "wrap_mv({v}, {r}) = {w}");
            assert_eq!(w, (v + r).rem_euclid(2 * r) - r);
        }
    }

    fn field_p_header(second_field: bool, refdist: i32) -> PictureHeader {
        PictureHeader {
            pict_type: Vc1PictureType::P,
            field_mode: true,
            second_field,
            refdist,
            quarter_sample: true,
            range_x: 256,
            range_y: 128,
            ..PictureHeader::default()
        }
    }

    #[test]
    fn test_scale_for_opposite_field() {
        let hdr = field_p_header(false, 0);
        assert_eq!(scale_for_opp(&hdr, 10, false, 0), 5);
        assert_eq!(scale_for_opp(&hdr, -7, true, 0), -4);
        // 第二场, 参考距离 1: 缩放 64/256
        let hdr = field_p_header(true, 1);
        assert_eq!(scale_for_opp(&hdr, 10, false, 0), 2);
        // 半像素模式先右移再放大
        let hdr = PictureHeader {
            quarter_sample: false,
            ..field_p_header(false, 0)
        };
        assert_eq!(scale_for_opp(&hdr, 10, false, 0), 4);
    }

    #[test]
    fn test_scale_for_same_field_zones() {
        let hdr = field_p_header(false, 0);
        // 水平: 小于 32 时乘 2, 之后按 219/256 并加偏移 37
        assert_eq!(scale_for_same(&hdr, 10, false, 0), 20);
        assert_eq!(scale_for_same(&hdr, 40, false, 0), 71);
        assert_eq!(scale_for_same(&hdr, -40, false, 0), -72);
        assert_eq!(scale_for_same(&hdr, 300, false, 0), 255);
        // 垂直: 分区 8, 偏移 10, 结果限制在场的 MV 范围内
        assert_eq!(scale_for_same(&hdr, 5, true, 0), 10);
        assert_eq!(scale_for_same(&hdr, 20, true, 0), 27);
        assert_eq!(scale_for_same(&hdr, 100, true, 0), 63);
        // 第二场使用另一组系数
        let hdr = field_p_header(true, 1);
        assert_eq!(scale_for_same(&hdr, 3, false, 0), 12);

        // B 场第一场的后向预测
        let hdr = PictureHeader {
            pict_type: Vc1PictureType::B,
            brfd: 0,
            ..field_p_header(false, 0)
        };
        assert_eq!(scale_for_same(&hdr, 12, false, 1), 8);
    }

    #[test]
    fn test_scale_mv_halfway() {
        // bfraction = 128 (1/2)
        assert_eq!(scale_mv(8, 128, false, true), 4);
        assert_eq!(scale_mv(8, 128, true, true), -4);
        assert_eq!(scale_mv(8, 128, false, false), 4);
    }
}
