//! B 图像宏块解码 (渐进, 隔行场, 隔行帧)
//!
//! B 图像不作参考, 帧内块反变换后直接写回, 不经过系数块环与重叠平滑.

use log::{trace, warn};
use tao_core::{TaoError, TaoResult};

use super::block::{MvDifferential, read_mv_diff, read_mv_diff_interlaced};
use super::context::PictureDecoder;
use super::dsp;
use super::mb_p::MbResidual;
use super::pred::scale_mv;
use super::syntax::{decode012, read_flag};
use super::tables::{B_FRACTION_DEN, MBMODE_INTFRP};
use super::types::{BmvType, IntfrMbMode, MotionVector};

impl PictureDecoder<'_> {
    /// 帧内块解码后直接写回当前图像
    fn intra_block_put(&mut self, n: usize, coded: bool, mquant: i32, ac_pred: bool, fieldtx: bool) -> TaoResult<()> {
        let block = self.intra_block(n, coded, mquant, ac_pred)?;
        let d = self.block_dest(n, fieldtx);
        dsp::put_signed_pixels_clamped(&block, &mut self.cur.planes[d.plane], d.pos, d.stride);
        Ok(())
    }

    /// BMVTYPE 码字: 0/1 按 BFRACTION 偏向较近的参考, 2 为内插
    fn read_bmvtype(&mut self) -> TaoResult<BmvType> {
        let near_next = self.hdr.bfraction >= B_FRACTION_DEN / 2;
        Ok(match decode012(&mut self.br)? {
            0 if near_next => BmvType::Backward,
            0 => BmvType::Forward,
            1 if near_next => BmvType::Forward,
            1 => BmvType::Backward,
            _ => BmvType::Interpolated,
        })
    }

    fn b_residual(&mut self, cbp: u32, mquant: i32, fieldtx: bool, res: &mut MbResidual) -> TaoResult<()> {
        let mut tt = self.new_tt_state();
        if !self.hdr.ttmbf && cbp != 0 {
            tt.ttmb = self.read_ttmb()?;
        }
        for i in 0..6 {
            self.clear_dc(i);
            if (cbp >> (5 - i)) & 1 != 0 {
                self.inter_block(i, mquant, &mut tt, fieldtx, res)?;
            }
        }
        Ok(())
    }

    // ============================================================
    // 渐进 B
    // ============================================================

    pub(super) fn decode_b_mb(&mut self) -> TaoResult<()> {
        let (x, y) = (self.st.mb_x, self.st.mb_y);
        let direct = self.hdr.direct_plane.read_or_get(&mut self.br, x, y)?;
        let skipped = self.hdr.skip_plane.read_or_get(&mut self.br, x, y)?;
        let mut dmv = [(0, 0); 2];
        let mut bmvtype = BmvType::Backward;
        let mut d = MvDifferential::default();
        self.set_mb_intra(false);
        for i in 0..6 {
            self.set_block_intra(i, false);
            self.clear_dc(i);
        }
        self.set_qscale(0);

        if !direct {
            if !skipped {
                d = read_mv_diff(&mut self.br, self.t, self.hdr)?;
                self.set_mb_intra(d.mb_intra);
                dmv = [(d.dx, d.dy); 2];
            }
            if skipped || !d.mb_intra {
                bmvtype = self.read_bmvtype()?;
                if bmvtype == BmvType::Interpolated {
                    dmv[0] = (0, 0);
                }
            }
        }
        for i in 0..6 {
            self.set_block_intra(i, d.mb_intra);
        }
        self.st.bmvtype = bmvtype;
        trace!("VC-1 B 宏块 ({x}, {y}): direct={direct}, skip={skipped}, {bmvtype:?}");

        if skipped {
            if direct {
                bmvtype = BmvType::Interpolated;
            }
            self.pred_b_mv(dmv, direct, bmvtype)?;
            self.b_mc(direct, bmvtype);
            return Ok(());
        }

        let mut tt = self.new_tt_state();
        let (cbp, mquant, ac_pred) = if direct {
            let cbp = self.t.p_cbpcy[self.hdr.cbptab].decode(&mut self.br)? as u32;
            let mquant = self.read_mb_mquant()?;
            self.set_mb_intra(false);
            self.set_qscale(mquant);
            if !self.hdr.ttmbf {
                tt.ttmb = self.read_ttmb()?;
            }
            self.pred_b_mv([(0, 0); 2], direct, bmvtype)?;
            self.b_mc(direct, bmvtype);
            (cbp, mquant, false)
        } else if !d.has_coeffs && !d.mb_intra {
            self.pred_b_mv(dmv, direct, bmvtype)?;
            self.b_mc(direct, bmvtype);
            return Ok(());
        } else if d.mb_intra && !d.has_coeffs {
            let mquant = self.read_mb_mquant()?;
            self.set_qscale(mquant);
            let ac_pred = read_flag(&mut self.br)?;
            self.pred_b_mv(dmv, direct, bmvtype)?;
            (0, mquant, ac_pred)
        } else {
            if bmvtype == BmvType::Interpolated {
                d = read_mv_diff(&mut self.br, self.t, self.hdr)?;
                self.set_mb_intra(d.mb_intra);
                dmv[0] = (d.dx, d.dy);
                if !d.has_coeffs {
                    self.pred_b_mv(dmv, direct, bmvtype)?;
                    self.b_mc(direct, bmvtype);
                    return Ok(());
                }
            }
            self.pred_b_mv(dmv, direct, bmvtype)?;
            if !d.mb_intra {
                self.b_mc(direct, bmvtype);
            }
            let ac_pred = d.mb_intra && read_flag(&mut self.br)?;
            let cbp = self.t.p_cbpcy[self.hdr.cbptab].decode(&mut self.br)? as u32;
            let mquant = self.read_mb_mquant()?;
            self.set_qscale(mquant);
            if !self.hdr.ttmbf && !d.mb_intra && d.has_coeffs {
                tt.ttmb = self.read_ttmb()?;
            }
            (cbp, mquant, ac_pred)
        };

        let intra = self.st.mb_intra;
        let mut res = MbResidual::default();
        for i in 0..6 {
            self.clear_dc(i);
            let coded = (cbp >> (5 - i)) & 1 != 0;
            if intra {
                self.intra_block_put(i, coded, mquant, ac_pred, false)?;
            } else if coded {
                self.inter_block(i, mquant, &mut tt, false, &mut res)?;
            }
        }
        Ok(())
    }

    // ============================================================
    // 隔行场 B
    // ============================================================

    pub(super) fn decode_b_mb_intfi(&mut self) -> TaoResult<()> {
        let (x, y) = (self.st.mb_x, self.st.mb_y);
        let mut res = MbResidual::default();
        let idx = self.read_field_mbmode()?;

        if idx <= 1 {
            let (cbp, mquant, ac_pred) = self.read_field_intra_header(idx)?;
            for i in 0..6 {
                self.set_block_intra(i, true);
                self.clear_dc(i);
                let coded = (cbp >> (5 - i)) & 1 != 0;
                self.intra_block_put(i, coded, mquant, ac_pred, false)?;
            }
            self.finish_b_mb(res);
            return Ok(());
        }

        let xi = x as i32;
        self.st.is_intra.set(xi, 0);
        self.set_mb_intra(false);
        for i in 0..6 {
            self.set_block_intra(i, false);
        }
        let fwd = self.hdr.forward_plane.read_or_get(&mut self.br, x, y)?;
        let has_coeffs = if idx <= 5 {
            let mut interpmvp = false;
            let bmvtype = if fwd {
                BmvType::Forward
            } else {
                match decode012(&mut self.br)? {
                    0 => BmvType::Backward,
                    1 => BmvType::Direct,
                    _ => {
                        interpmvp = read_flag(&mut self.br)?;
                        BmvType::Interpolated
                    }
                }
            };
            self.st.bmvtype = bmvtype;
            let mut dmv = [(0, 0); 2];
            let mut pred_flag = [false; 2];
            let slot = usize::from(bmvtype == BmvType::Backward);
            if bmvtype != BmvType::Direct && idx & 1 != 0 {
                let d = read_mv_diff_interlaced(&mut self.br, self.t, self.hdr)?;
                dmv[slot] = (d.dx, d.dy);
                pred_flag[slot] = d.pred_flag;
            }
            if interpmvp {
                let d = read_mv_diff_interlaced(&mut self.br, self.t, self.hdr)?;
                dmv[1] = (d.dx, d.dy);
                pred_flag[1] = d.pred_flag;
            }
            let direct = bmvtype == BmvType::Direct;
            if direct {
                dmv = [(0, 0); 2];
                pred_flag[0] = false;
                if !self.next.is_some_and(|n| n.field_picture) {
                    return Err(TaoError::InvalidData(
                        "VC-1: Mixed field/frame direct mode not supported".into(),
                    ));
                }
            }
            trace!("VC-1 场 B 宏块 ({x}, {y}): 1MV {bmvtype:?}");
            self.pred_b_mv_intfi(0, dmv, true, pred_flag)?;
            self.b_mc(direct, bmvtype);
            idx & 2 == 0
        } else {
            let bmvtype = if fwd { BmvType::Forward } else { BmvType::Backward };
            self.st.bmvtype = bmvtype;
            let dir = usize::from(bmvtype == BmvType::Backward);
            let mvbp = self.t.fourmv_block_pattern[self.hdr.fourmvbptab].decode(&mut self.br)?;
            for i in 0..4 {
                let mut dmv = [(0, 0); 2];
                let mut pred_flag = [false; 2];
                if mvbp & (8 >> i) != 0 {
                    let d = read_mv_diff_interlaced(&mut self.br, self.t, self.hdr)?;
                    dmv[dir] = (d.dx, d.dy);
                    pred_flag[dir] = d.pred_flag;
                }
                self.pred_b_mv_intfi(i, dmv, false, pred_flag)?;
                self.mc_4mv_luma(i, dir, false);
            }
            self.mc_4mv_chroma(dir);
            idx & 1 != 0
        };
        let cbp = if has_coeffs { self.read_icbpcy()? } else { 0 };
        let mquant = if cbp != 0 { self.read_mb_mquant()? } else { self.hdr.pq };
        self.set_qscale(mquant);
        self.b_residual(cbp, mquant, false, &mut res)?;
        self.finish_b_mb(res);
        Ok(())
    }

    fn finish_b_mb(&mut self, res: MbResidual) {
        let x = self.st.mb_x as i32;
        self.st.cbp.set(x, res.cbp);
        self.st.ttblk.set(x, res.tt);
    }

    // ============================================================
    // 隔行帧 B
    // ============================================================

    /// 块 `a` 的 MV 复制到块 `b` (当前 MV 与图像 MV 两处)
    fn copy_block_mv(&mut self, dir: usize, a: usize, b: usize) {
        let m = self.get_mv(dir, self.st.b8(a));
        self.st.cur_mv[dir][b] = m;
        self.st.cur_mv[dir][a] = m;
        let p = self.st.b8(b);
        self.set_mv(dir, p, m);
    }

    /// 上下两对块交换方向: `dir` 取上半对的 MV, `dir2` 取下半对的 MV
    fn share_field_mvs(&mut self, dir: usize, dir2: usize) {
        for i in 0..2 {
            self.copy_block_mv(dir, i, i + 2);
            self.copy_block_mv(dir2, i + 2, i);
        }
    }

    /// 另一方向只有上半对有 MV, 复制到下半对
    fn mirror_other_dir(&mut self, dir: usize) {
        self.set_blk_mv_type(true);
        self.pred_mv_intfr(0, (0, 0), 2, dir ^ 1);
        for i in 0..2 {
            self.copy_block_mv(dir ^ 1, i, i + 2);
        }
    }

    /// 直接模式: 由后一参考同位块的 MV 按 BFRACTION 缩放
    fn intfr_direct_mvs(&mut self, twomv: bool) {
        if self.next.is_some_and(|n| n.field_picture) {
            warn!("VC-1: Mixed frame/field direct mode not supported");
        }
        let qs = self.hdr.quarter_sample;
        let bfrac = self.hdr.bfraction;
        let colocated = |this: &Self, n: usize| {
            let (bx, by) = this.st.pic_b8(this.st.b8(n));
            this.next
                .map(|p| p.motion_val[1].get(bx, by))
                .unwrap_or(MotionVector::ZERO)
        };
        let sources: &[usize] = if twomv { &[0, 2] } else { &[0] };
        for &n in sources {
            let c = colocated(self, n);
            let (cx, cy) = (i32::from(c.x), i32::from(c.y));
            for (dir, inv) in [(0, false), (1, true)] {
                let m = MotionVector::new(scale_mv(cx, bfrac, inv, qs), scale_mv(cy, bfrac, inv, qs));
                self.st.cur_mv[dir][n] = m;
                let p = self.st.b8(n);
                self.set_mv(dir, p, m);
            }
        }
        let pairs: &[(usize, usize)] = if twomv { &[(0, 1), (2, 3)] } else { &[(0, 1), (0, 2), (0, 3)] };
        for &(a, b) in pairs {
            for dir in 0..2 {
                self.copy_block_mv(dir, a, b);
            }
        }
    }

    pub(super) fn decode_b_mb_intfr(&mut self) -> TaoResult<()> {
        let (x, y) = (self.st.mb_x, self.st.mb_y);
        let (xi, yi) = (x as i32, y as i32);
        let skipped = self.hdr.skip_plane.read_or_get(&mut self.br, x, y)?;
        let mut entry = MBMODE_INTFRP[0][0];
        if !skipped {
            let idx = self.t.intfr_non4mv_mbmode[self.hdr.mbmodetab].decode(&mut self.br)?;
            entry = MBMODE_INTFRP[0][idx.min(14)];
        }
        let twomv = entry.mode == IntfrMbMode::TwoMvField;
        if !skipped {
            self.set_blk_mv_type(twomv);
        }
        let mut res = MbResidual::default();

        if entry.mode == IntfrMbMode::Intra {
            for dir in 0..2 {
                for k in 0..4 {
                    self.st.cur_mv[dir][k] = MotionVector::ZERO;
                    let p = self.st.b8(k);
                    self.set_mv(dir, p, MotionVector::ZERO);
                }
            }
            self.st.is_intra.set(xi, 0x3f);
            self.set_mb_intra(true);
            let fieldtx = read_flag(&mut self.br)?;
            self.st.fieldtx.set(xi, yi, fieldtx);
            let cbp = if read_flag(&mut self.br)? { self.read_icbpcy()? } else { 0 };
            let ac_pred = read_flag(&mut self.br)?;
            let mquant = self.read_mb_mquant()?;
            self.set_qscale(mquant);
            for i in 0..6 {
                self.set_block_intra(i, true);
                self.clear_dc(i);
                let coded = (cbp >> (5 - i)) & 1 != 0;
                self.intra_block_put(i, coded, mquant, ac_pred, fieldtx)?;
            }
            self.finish_b_mb(res);
            return Ok(());
        }

        self.st.is_intra.set(xi, 0);
        self.set_mb_intra(false);
        let direct = self.hdr.direct_plane.read_or_get(&mut self.br, x, y)?;
        if direct {
            self.intfr_direct_mvs(twomv);
        }
        let mut bmvtype = BmvType::Backward;
        let mut mvsw = false;
        if !direct {
            bmvtype = self.read_bmvtype()?;
            if twomv && bmvtype != BmvType::Interpolated {
                mvsw = read_flag(&mut self.br)?;
            }
        }
        self.st.bmvtype = if direct { BmvType::Direct } else { bmvtype };
        trace!("VC-1 隔行帧 B 宏块 ({x}, {y}): {:?}, direct={direct}, skip={skipped}", entry.mode);

        if skipped {
            let mut dir = 0;
            for i in 0..6 {
                self.set_block_intra(i, false);
                self.clear_dc(i);
            }
            self.set_qscale(0);
            self.set_blk_mv_type(false);
            if !direct {
                if bmvtype == BmvType::Interpolated {
                    self.pred_mv_intfr(0, (0, 0), 1, 0);
                    self.pred_mv_intfr(0, (0, 0), 1, 1);
                } else {
                    dir = usize::from(bmvtype == BmvType::Backward);
                    self.pred_mv_intfr(0, (0, 0), 1, dir);
                    if mvsw {
                        self.share_field_mvs(dir, dir ^ 1);
                    } else {
                        self.mirror_other_dir(dir);
                    }
                }
            }
            self.mc_1mv(dir);
            if direct || bmvtype == BmvType::Interpolated {
                self.interp_mc();
            }
            self.st.fieldtx.set(xi, yi, false);
            self.finish_b_mb(res);
            return Ok(());
        }

        let cbp = if entry.cbp { self.read_icbpcy()? } else { 0 };
        let mut mvbp = 0;
        if !direct {
            if bmvtype == BmvType::Interpolated && twomv {
                mvbp = self.t.fourmv_block_pattern[self.hdr.fourmvbptab].decode(&mut self.br)?;
            } else if bmvtype == BmvType::Interpolated || twomv {
                mvbp = self.t.twomv_block_pattern[self.hdr.twomvbptab].decode(&mut self.br)?;
            }
        }
        for i in 0..6 {
            self.set_block_intra(i, false);
        }
        let fieldtx = entry.fieldtx;
        self.st.fieldtx.set(xi, yi, fieldtx);

        if direct {
            if twomv {
                for i in 0..4 {
                    self.mc_4mv_luma(i, 0, false);
                    self.mc_4mv_luma(i, 1, true);
                }
                self.mc_4mv_chroma4(0, 0, false);
                self.mc_4mv_chroma4(1, 1, true);
            } else {
                self.mc_1mv(0);
                self.interp_mc();
            }
        } else if twomv && bmvtype == BmvType::Interpolated {
            for i in 0..4 {
                let dir = usize::from(i == 1 || i == 3);
                let d = self.read_intfr_mv((mvbp >> (3 - i)) & 1 != 0)?;
                let j = if i > 1 { 2 } else { 0 };
                self.pred_mv_intfr(j, d, 2, dir);
                self.mc_4mv_luma(j, dir, dir == 1);
                self.mc_4mv_luma(j + 1, dir, dir == 1);
            }
            self.mc_4mv_chroma4(0, 0, false);
            self.mc_4mv_chroma4(1, 1, true);
        } else if bmvtype == BmvType::Interpolated {
            let d = self.read_intfr_mv(mvbp & 2 != 0)?;
            self.pred_mv_intfr(0, d, 1, 0);
            self.mc_1mv(0);
            let d = self.read_intfr_mv(mvbp & 1 != 0)?;
            self.pred_mv_intfr(0, d, 1, 1);
            self.interp_mc();
        } else if twomv {
            let dir = usize::from(bmvtype == BmvType::Backward);
            let dir2 = if mvsw { dir ^ 1 } else { dir };
            let d = self.read_intfr_mv(mvbp & 2 != 0)?;
            self.pred_mv_intfr(0, d, 2, dir);
            let d = self.read_intfr_mv(mvbp & 1 != 0)?;
            self.pred_mv_intfr(2, d, 2, dir2);
            if mvsw {
                self.share_field_mvs(dir, dir2);
            } else {
                self.pred_mv_intfr(0, (0, 0), 2, dir ^ 1);
                self.pred_mv_intfr(2, (0, 0), 2, dir ^ 1);
            }
            self.mc_4mv_luma(0, dir, false);
            self.mc_4mv_luma(1, dir, false);
            self.mc_4mv_luma(2, dir2, false);
            self.mc_4mv_luma(3, dir2, false);
            self.mc_4mv_chroma4(dir, dir2, false);
        } else {
            let dir = usize::from(bmvtype == BmvType::Backward);
            let d = self.read_intfr_mv(entry.mvp)?;
            self.pred_mv_intfr(0, d, 1, dir);
            self.mirror_other_dir(dir);
            self.mc_1mv(dir);
        }

        let mquant = if cbp != 0 { self.read_mb_mquant()? } else { self.hdr.pq };
        self.set_qscale(mquant);
        self.b_residual(cbp, mquant, fieldtx, &mut res)?;
        self.finish_b_mb(res);
        Ok(())
    }
}
