//! P 图像宏块解码 (渐进, 隔行帧, 隔行场) 以及 P/B 共用的块级辅助函数

use log::trace;
use tao_core::TaoResult;

use super::block::{BlockDest, IntraBlockArgs, MvDifferential, read_mquant, read_mv_diff, read_mv_diff_interlaced};
use super::context::PictureDecoder;
use super::dsp;
use super::syntax::read_flag;
use super::tables::{BLOCK_MAP, MBMODE_INTFRP};
use super::types::{IntfrMbMode, MotionVector};

/// 一个宏块累积的残差信息, 供去块滤波使用
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct MbResidual {
    /// 每块 4 位子块编码模式
    pub cbp: u32,
    /// 每块 4 位变换类型
    pub tt: u32,
    /// 每块 1 位帧内标志
    pub intra: u8,
}

/// 宏块内的变换类型状态: MB 级 TTMB 只作用于首个编码块
#[derive(Debug, Clone, Copy)]
pub(super) struct TtState {
    pub ttmb: i32,
    pub first_block: bool,
}

impl PictureDecoder<'_> {
    // ============================================================
    // 共用辅助
    // ============================================================

    pub(super) fn read_mb_mquant(&mut self) -> TaoResult<i32> {
        read_mquant(&mut self.br, self.hdr, self.st.mb_x, self.st.mb_y, self.st.mb_width)
    }

    pub(super) fn read_ttmb(&mut self) -> TaoResult<i32> {
        let idx = self.hdr.tt_index;
        Ok(self.t.ttmb[idx].decode(&mut self.br)? as i32)
    }

    pub(super) fn new_tt_state(&self) -> TtState {
        TtState {
            ttmb: self.hdr.ttfrm as i32,
            first_block: true,
        }
    }

    /// 隔行图像的 CBPCY (码字从 1 开始)
    pub(super) fn read_icbpcy(&mut self) -> TaoResult<u32> {
        Ok(1 + self.t.interlaced_cbpcy[self.hdr.icbptab].decode(&mut self.br)? as u32)
    }

    pub(super) fn set_block_intra(&mut self, n: usize, intra: bool) {
        if n < 4 {
            let (x, y) = self.st.b8(n);
            self.st.blk_intra.set(x, y, intra);
        } else {
            let (x, y) = (self.st.mb_x as i32, self.st.mb_y as i32);
            self.st.chroma_intra.set(x, y, intra);
        }
    }

    pub(super) fn clear_dc(&mut self, n: usize) {
        let (p, x, y) = self.st.block_xy(n);
        self.st.dc_val[p].set(x, y, 0);
    }

    /// 帧内块的上邻 (A) 与左邻 (C) 是否可用作预测
    pub(super) fn intra_avail(&self, n: usize) -> (bool, bool) {
        let st = &*self.st;
        if n < 4 {
            let (bx, by) = st.b8(n);
            let a = (n == 2 || n == 3 || !st.first_line) && st.blk_intra.get(bx, by - 1);
            let c = (n == 1 || n == 3 || st.mb_x > 0) && st.blk_intra.get(bx - 1, by);
            (a, c)
        } else {
            let (x, y) = (st.mb_x as i32, st.mb_y as i32);
            let a = !st.first_line && st.chroma_intra.get(x, y - 1);
            let c = st.mb_x > 0 && st.chroma_intra.get(x - 1, y);
            (a, c)
        }
    }

    /// 帧间图像中的帧内块: 解码并反变换, RANGEREDFRM 时放大一倍
    pub(super) fn intra_block(&mut self, n: usize, coded: bool, mquant: i32, ac_pred: bool) -> TaoResult<[i16; 64]> {
        let (a_avail, c_avail) = self.intra_avail(n);
        let codingset = if n > 3 { self.st.codingset2 } else { self.st.codingset };
        let mut block = [0i16; 64];
        self.decode_intra_block(
            &mut block,
            IntraBlockArgs {
                n,
                coded,
                mquant,
                codingset,
                ac_pred,
                a_avail,
                c_avail,
            },
        )?;
        dsp::inv_trans_8x8(&mut block);
        if self.hdr.rangeredfrm {
            for v in block.iter_mut() {
                *v = v.wrapping_mul(2);
            }
        }
        Ok(block)
    }

    /// 写入当前宏块在系数块环中的块 `n`
    pub(super) fn store_ring_block(&mut self, n: usize, block: &[i16; 64]) {
        let ring = &mut self.st.blocks;
        let off = ring.block(ring.cur, BLOCK_MAP[n]);
        ring.buf[off..off + 64].copy_from_slice(block);
    }

    /// 帧间块 (以及直接写回的帧内块) 的目标位置
    pub(super) fn block_dest(&self, n: usize, fieldtx: bool) -> BlockDest {
        let st = &*self.st;
        if n > 3 {
            let plane = n - 3;
            return BlockDest {
                plane,
                pos: st.mb_dest(plane),
                stride: st.views[plane].stride,
            };
        }
        let ls = st.views[0].stride;
        let base = st.mb_dest(0) + (n & 1) * 8;
        if fieldtx {
            BlockDest {
                plane: 0,
                pos: base + (n >> 1) * ls,
                stride: ls * 2,
            }
        } else {
            BlockDest {
                plane: 0,
                pos: base + (n & 2) * 4 * ls,
                stride: ls,
            }
        }
    }

    /// 帧间残差块: 叠加到预测上并记录子块模式与变换类型
    pub(super) fn inter_block(
        &mut self,
        n: usize,
        mquant: i32,
        tt: &mut TtState,
        fieldtx: bool,
        res: &mut MbResidual,
    ) -> TaoResult<()> {
        let dest = self.block_dest(n, fieldtx);
        let mut block = [0i16; 64];
        let (pat, ttblk) = self.decode_p_block(&mut block, n, mquant, tt.ttmb, tt.first_block, dest, false)?;
        res.cbp |= pat << (4 * n);
        res.tt |= (ttblk as u32) << (4 * n);
        if !self.hdr.ttmbf && tt.ttmb < 8 {
            tt.ttmb = -1;
        }
        tt.first_block = false;
        Ok(())
    }

    /// P 宏块结束: 重叠平滑, 写回帧内块, 记录滤波所需的行环信息
    fn finish_p_mb(&mut self, res: MbResidual, record_intra: bool) {
        if self.seq.overlap && self.hdr.pq >= 9 {
            self.p_overlap_filter();
        }
        self.put_blocks_clamped(true);
        let x = self.st.mb_x as i32;
        self.st.cbp.set(x, res.cbp);
        self.st.ttblk.set(x, res.tt);
        if record_intra {
            self.st.is_intra.set(x, res.intra);
        }
    }

    fn zero_backward_mvs(&mut self, blocks: usize) {
        for k in 0..blocks {
            let p = self.st.b8(k);
            self.set_mv(1, p, MotionVector::ZERO);
        }
    }

    /// 整个宏块的帧内块解码到系数块环 (隔行 P)
    fn intra_mb_to_ring(&mut self, cbp: u32, mquant: i32, ac_pred: bool, res: &mut MbResidual) -> TaoResult<()> {
        for i in 0..6 {
            self.set_block_intra(i, true);
            self.clear_dc(i);
            let coded = (cbp >> (5 - i)) & 1 != 0;
            let block = self.intra_block(i, coded, mquant, ac_pred)?;
            self.store_ring_block(i, &block);
            res.cbp |= 0xF << (4 * i);
        }
        Ok(())
    }

    // ============================================================
    // 渐进 P
    // ============================================================

    pub(super) fn decode_p_mb(&mut self) -> TaoResult<()> {
        let (x, y) = (self.st.mb_x, self.st.mb_y);
        let fourmv = self.hdr.is_mixed_mv() && self.hdr.mv_type_plane.read_or_get(&mut self.br, x, y)?;
        let skipped = self.hdr.skip_plane.read_or_get(&mut self.br, x, y)?;
        let mut res = MbResidual::default();
        let mut tt = self.new_tt_state();
        trace!("VC-1 P 宏块 ({x}, {y}): 4mv={fourmv}, skip={skipped}");

        match (fourmv, skipped) {
            (false, false) => {
                let d = read_mv_diff(&mut self.br, self.t, self.hdr)?;
                self.set_mb_intra(d.mb_intra);
                if d.mb_intra {
                    let p = self.st.b8(0);
                    self.set_mv(1, p, MotionVector::ZERO);
                }
                self.pred_mv(0, (d.dx, d.dy), true, false, 0)?;
                let (cbp, mquant, ac_pred) = if d.mb_intra && !d.has_coeffs {
                    let mquant = self.read_mb_mquant()?;
                    (0, mquant, read_flag(&mut self.br)?)
                } else if d.has_coeffs {
                    let ac_pred = d.mb_intra && read_flag(&mut self.br)?;
                    let cbp = self.t.p_cbpcy[self.hdr.cbptab].decode(&mut self.br)? as u32;
                    (cbp, self.read_mb_mquant()?, ac_pred)
                } else {
                    (0, self.hdr.pq, false)
                };
                self.set_qscale(mquant);
                if !self.hdr.ttmbf && !d.mb_intra && d.has_coeffs {
                    tt.ttmb = self.read_ttmb()?;
                }
                if !d.mb_intra {
                    self.mc_1mv(0);
                }
                for i in 0..6 {
                    self.clear_dc(i);
                    self.set_block_intra(i, d.mb_intra);
                    let coded = (cbp >> (5 - i)) & 1 != 0;
                    if d.mb_intra {
                        let block = self.intra_block(i, coded, mquant, ac_pred)?;
                        self.store_ring_block(i, &block);
                        res.cbp |= 0xF << (4 * i);
                        res.intra |= 1 << i;
                    } else if coded {
                        self.inter_block(i, mquant, &mut tt, false, &mut res)?;
                    }
                }
            }
            (false, true) => {
                self.skip_mb_flags();
                self.pred_mv(0, (0, 0), true, false, 0)?;
                self.mc_1mv(0);
            }
            (true, false) => self.decode_p_4mv(&mut res, &mut tt)?,
            (true, true) => {
                self.skip_mb_flags();
                for i in 0..4 {
                    self.pred_mv(i, (0, 0), false, false, 0)?;
                    self.mc_4mv_luma(i, 0, false);
                }
                self.mc_4mv_chroma(0);
            }
        }
        self.finish_p_mb(res, true);
        Ok(())
    }

    /// 跳过宏块: 全部块为帧间, 无残差
    fn skip_mb_flags(&mut self) {
        self.set_mb_intra(false);
        for i in 0..6 {
            self.set_block_intra(i, false);
            self.clear_dc(i);
        }
        self.set_qscale(0);
    }

    fn decode_p_4mv(&mut self, res: &mut MbResidual, tt: &mut TtState) -> TaoResult<()> {
        self.set_mb_intra(false);
        let cbp = self.t.p_cbpcy[self.hdr.cbptab].decode(&mut self.br)? as u32;
        let mut is_intra = [false; 6];
        let mut is_coded = [false; 6];
        let mut intra_count = 0;
        let mut coded_inter = false;
        for i in 0..6 {
            let val = (cbp >> (5 - i)) & 1 != 0;
            self.clear_dc(i);
            self.st.mb_intra = false;
            if i < 4 {
                let d = if val {
                    read_mv_diff(&mut self.br, self.t, self.hdr)?
                } else {
                    MvDifferential::default()
                };
                self.st.mb_intra = d.mb_intra;
                self.pred_mv(i, (d.dx, d.dy), false, false, 0)?;
                if !d.mb_intra {
                    self.mc_4mv_luma(i, 0, false);
                }
                intra_count += usize::from(d.mb_intra);
                is_intra[i] = d.mb_intra;
                is_coded[i] = d.has_coeffs;
            } else {
                is_intra[i] = intra_count >= 3;
                is_coded[i] = val;
            }
            if i == 4 {
                self.mc_4mv_chroma(0);
            }
            self.set_block_intra(i, is_intra[i]);
            coded_inter |= !is_intra[i] && is_coded[i];
        }
        if intra_count == 0 && !coded_inter {
            return Ok(());
        }

        let mquant = self.read_mb_mquant()?;
        self.set_qscale(mquant);
        let intrapred = (0..6).any(|i| {
            let (a, c) = self.intra_avail(i);
            is_intra[i] && (a || c)
        });
        let ac_pred = intrapred && read_flag(&mut self.br)?;
        if !self.hdr.ttmbf && coded_inter {
            tt.ttmb = self.read_ttmb()?;
        }
        for i in 0..6 {
            self.st.mb_intra = is_intra[i];
            if is_intra[i] {
                let block = self.intra_block(i, is_coded[i], mquant, ac_pred)?;
                self.store_ring_block(i, &block);
                res.cbp |= 0xF << (4 * i);
                res.intra |= 1 << i;
            } else if is_coded[i] {
                self.inter_block(i, mquant, tt, false, res)?;
            }
        }
        Ok(())
    }

    // ============================================================
    // 隔行帧 P
    // ============================================================

    pub(super) fn decode_p_mb_intfr(&mut self) -> TaoResult<()> {
        let (x, y) = (self.st.mb_x, self.st.mb_y);
        let (xi, yi) = (x as i32, y as i32);
        let skipped = self.hdr.skip_plane.read_or_get(&mut self.br, x, y)?;
        let mut res = MbResidual::default();
        let mut tt = self.new_tt_state();

        if skipped {
            self.st.is_intra.set(xi, 0);
            self.skip_mb_flags();
            self.set_blk_mv_type(false);
            self.pred_mv_intfr(0, (0, 0), 1, 0);
            self.mc_1mv(0);
            self.st.fieldtx.set(xi, yi, false);
            self.finish_p_mb(res, false);
            return Ok(());
        }

        let switch = self.hdr.fourmvswitch;
        let tab = self.hdr.mbmodetab;
        let idx = if switch {
            self.t.intfr_4mv_mbmode[tab].decode(&mut self.br)?
        } else {
            self.t.intfr_non4mv_mbmode[tab].decode(&mut self.br)?
        };
        let entry = MBMODE_INTFRP[usize::from(switch)][idx.min(14)];
        match entry.mode {
            IntfrMbMode::FourMvField | IntfrMbMode::TwoMvField => self.set_blk_mv_type(true),
            IntfrMbMode::FourMv | IntfrMbMode::OneMv => self.set_blk_mv_type(false),
            _ => {}
        }
        trace!("VC-1 隔行帧 P 宏块 ({x}, {y}): {:?}", entry.mode);

        if entry.mode == IntfrMbMode::Intra {
            self.zero_backward_mvs(4);
            self.st.is_intra.set(xi, 0x3f);
            self.set_mb_intra(true);
            let fieldtx = read_flag(&mut self.br)?;
            self.st.fieldtx.set(xi, yi, fieldtx);
            let cbp = if read_flag(&mut self.br)? { self.read_icbpcy()? } else { 0 };
            let ac_pred = read_flag(&mut self.br)?;
            let mquant = self.read_mb_mquant()?;
            self.set_qscale(mquant);
            self.intra_mb_to_ring(cbp, mquant, ac_pred, &mut res)?;
            self.finish_p_mb(res, false);
            return Ok(());
        }

        let cbp = if entry.cbp { self.read_icbpcy()? } else { 0 };
        let mut mvbp = 0;
        match entry.mode {
            IntfrMbMode::TwoMvField => {
                mvbp = self.t.twomv_block_pattern[self.hdr.twomvbptab].decode(&mut self.br)?;
            }
            IntfrMbMode::FourMv | IntfrMbMode::FourMvField => {
                mvbp = self.t.fourmv_block_pattern[self.hdr.fourmvbptab].decode(&mut self.br)?;
            }
            _ => {}
        }
        self.st.is_intra.set(xi, 0);
        self.set_mb_intra(false);
        for i in 0..6 {
            self.set_block_intra(i, false);
        }
        let fieldtx = entry.fieldtx;
        self.st.fieldtx.set(xi, yi, fieldtx);

        match entry.mode {
            IntfrMbMode::FourMv | IntfrMbMode::FourMvField => {
                for i in 0..4 {
                    let d = self.read_intfr_mv(mvbp & (8 >> i) != 0)?;
                    self.pred_mv_intfr(i, d, 0, 0);
                    self.mc_4mv_luma(i, 0, false);
                }
                self.mc_4mv_chroma4(0, 0, false);
            }
            IntfrMbMode::TwoMvField => {
                let d = self.read_intfr_mv(mvbp & 2 != 0)?;
                self.pred_mv_intfr(0, d, 2, 0);
                self.mc_4mv_luma(0, 0, false);
                self.mc_4mv_luma(1, 0, false);
                let d = self.read_intfr_mv(mvbp & 1 != 0)?;
                self.pred_mv_intfr(2, d, 2, 0);
                self.mc_4mv_luma(2, 0, false);
                self.mc_4mv_luma(3, 0, false);
                self.mc_4mv_chroma4(0, 0, false);
            }
            _ => {
                let d = self.read_intfr_mv(entry.mvp)?;
                self.pred_mv_intfr(0, d, 1, 0);
                self.mc_1mv(0);
            }
        }

        let mquant = if cbp != 0 { self.read_mb_mquant()? } else { self.hdr.pq };
        self.set_qscale(mquant);
        if !self.hdr.ttmbf && cbp != 0 {
            tt.ttmb = self.read_ttmb()?;
        }
        for i in 0..6 {
            self.clear_dc(i);
            if (cbp >> (5 - i)) & 1 != 0 {
                self.inter_block(i, mquant, &mut tt, fieldtx, &mut res)?;
            }
        }
        self.finish_p_mb(res, false);
        Ok(())
    }

    /// 当前宏块 4 个亮度块的 MV 类型 (场 MV 或帧 MV)
    pub(super) fn set_blk_mv_type(&mut self, field: bool) {
        for k in 0..4 {
            let (bx, by) = self.st.b8(k);
            self.st.blk_mv_type.set(bx, by, field);
        }
    }

    /// 按需读取隔行 MV 差分
    pub(super) fn read_intfr_mv(&mut self, present: bool) -> TaoResult<(i32, i32)> {
        if !present {
            return Ok((0, 0));
        }
        let d = read_mv_diff_interlaced(&mut self.br, self.t, self.hdr)?;
        Ok((d.dx, d.dy))
    }

    // ============================================================
    // 隔行场 P
    // ============================================================

    /// 场图像的宏块模式码字
    pub(super) fn read_field_mbmode(&mut self) -> TaoResult<usize> {
        let tab = self.hdr.mbmodetab;
        if self.hdr.is_mixed_mv() {
            self.t.if_mmv_mbmode[tab].decode(&mut self.br)
        } else {
            self.t.if_1mv_mbmode[tab].decode(&mut self.br)
        }
    }

    /// 场图像的帧内宏块头 (MQUANT, ACPRED, CBPCY), 返回 (cbp, mquant, ac_pred)
    pub(super) fn read_field_intra_header(&mut self, idx: usize) -> TaoResult<(u32, i32, bool)> {
        let xi = self.st.mb_x as i32;
        self.st.is_intra.set(xi, 0x3f);
        self.set_mb_intra(true);
        let p = self.st.b8(0);
        self.set_mv(1, p, MotionVector::ZERO);
        let mquant = self.read_mb_mquant()?;
        self.set_qscale(mquant);
        let ac_pred = read_flag(&mut self.br)?;
        let cbp = if idx & 1 != 0 { self.read_icbpcy()? } else { 0 };
        Ok((cbp, mquant, ac_pred))
    }

    pub(super) fn decode_p_mb_intfi(&mut self) -> TaoResult<()> {
        let mut res = MbResidual::default();
        let mut tt = self.new_tt_state();
        let idx = self.read_field_mbmode()?;
        trace!("VC-1 场 P 宏块 ({}, {}): mbmode={idx}", self.st.mb_x, self.st.mb_y);

        if idx <= 1 {
            let (cbp, mquant, ac_pred) = self.read_field_intra_header(idx)?;
            self.intra_mb_to_ring(cbp, mquant, ac_pred, &mut res)?;
            self.finish_p_mb(res, false);
            return Ok(());
        }

        let xi = self.st.mb_x as i32;
        self.st.is_intra.set(xi, 0);
        self.set_mb_intra(false);
        for i in 0..6 {
            self.set_block_intra(i, false);
        }
        let has_coeffs = if idx <= 5 {
            let d = if idx & 1 != 0 {
                read_mv_diff_interlaced(&mut self.br, self.t, self.hdr)?
            } else {
                Default::default()
            };
            self.pred_mv(0, (d.dx, d.dy), true, d.pred_flag, 0)?;
            self.mc_1mv(0);
            idx & 2 == 0
        } else {
            let mvbp = self.t.fourmv_block_pattern[self.hdr.fourmvbptab].decode(&mut self.br)?;
            for i in 0..4 {
                let d = if mvbp & (8 >> i) != 0 {
                    read_mv_diff_interlaced(&mut self.br, self.t, self.hdr)?
                } else {
                    Default::default()
                };
                self.pred_mv(i, (d.dx, d.dy), false, d.pred_flag, 0)?;
                self.mc_4mv_luma(i, 0, false);
            }
            self.mc_4mv_chroma(0);
            idx & 1 != 0
        };
        let cbp = if has_coeffs { self.read_icbpcy()? } else { 0 };
        let mquant = if cbp != 0 { self.read_mb_mquant()? } else { self.hdr.pq };
        self.set_qscale(mquant);
        if !self.hdr.ttmbf && cbp != 0 {
            tt.ttmb = self.read_ttmb()?;
        }
        for i in 0..6 {
            self.clear_dc(i);
            if (cbp >> (5 - i)) & 1 != 0 {
                self.inter_block(i, mquant, &mut tt, false, &mut res)?;
            }
        }
        self.finish_p_mb(res, false);
        Ok(())
    }
}
