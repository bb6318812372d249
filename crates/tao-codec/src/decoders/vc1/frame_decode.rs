//! 切片级宏块循环: I/BI, P, B 图像与跳过帧
//!
//! 宏块严格按光栅顺序解码. 宏块解码出错 (比特超读或码字无效) 时记录错误,
//! 放弃本切片剩余的宏块并由参考图像填补, 已完成的宏块保持不变.

use log::{debug, error, trace};
use tao_core::{TaoError, TaoResult};

use super::block::IntraBlockArgs;
use super::context::{Esc3Lengths, PictureDecoder};
use super::dsp;
use super::loopfilter::LoopFilterKind;
use super::picture::{MB_BLOCK_LEN, Picture};
use super::syntax::read_flag;
use super::tables::{
    CS_HIGH_MOT_INTER, CS_HIGH_MOT_INTRA, CS_HIGH_RATE_INTER, CS_HIGH_RATE_INTRA,
    CS_LOW_MOT_INTER, CS_LOW_MOT_INTRA, CS_MID_RATE_INTER, CS_MID_RATE_INTRA,
};
use super::types::{Condover, MbDecodePath, MotionVector, Vc1PictureType};

/// 由 AC 表索引选择帧内系数表
fn intra_codingset(index: usize, pqindex: u32) -> usize {
    match index {
        0 if pqindex <= 8 => CS_HIGH_RATE_INTRA,
        0 => CS_LOW_MOT_INTRA,
        1 => CS_HIGH_MOT_INTRA,
        _ => CS_MID_RATE_INTRA,
    }
}

/// 由 AC 表索引选择帧间 (以及 I 帧色度) 系数表
fn inter_codingset(index: usize, pqindex: u32) -> usize {
    match index {
        0 if pqindex <= 8 => CS_HIGH_RATE_INTER,
        0 => CS_LOW_MOT_INTER,
        1 => CS_HIGH_MOT_INTER,
        _ => CS_MID_RATE_INTER,
    }
}

/// 跳过帧: 复制前一参考的样本
pub(super) fn decode_skip_picture(cur: &mut Picture, last: Option<&Picture>) {
    cur.pict_type = Vc1PictureType::P;
    match last {
        Some(last) => cur.copy_samples_from(last),
        None => debug!("VC-1: 跳过帧没有可复制的参考"),
    }
}

impl PictureDecoder<'_> {
    /// 解码当前图像 (或场) 的一个切片 [start_mb_y, end_mb_y)
    pub(super) fn decode_slice(&mut self, start_mb_y: usize, end_mb_y: usize) -> TaoResult<()> {
        if self.hdr.x8_type {
            return Err(TaoError::Unsupported("VC-1: 不支持 X8 帧内编码 (WMV2 风格)".into()));
        }
        self.st.begin_slice(start_mb_y, end_mb_y);
        self.st.esc3 = Esc3Lengths::default();
        let path = MbDecodePath::select(self.seq.profile, self.hdr.pict_type, self.hdr.fcm);
        trace!("VC-1 切片: 行 {start_mb_y}..{end_mb_y}, 路径 {path:?}");
        match path {
            MbDecodePath::IProgressive => self.decode_i_blocks(),
            MbDecodePath::IAdvanced => self.decode_i_blocks_adv(),
            _ => self.decode_inter_blocks(path),
        }
    }

    fn loop_filter_enabled(&self) -> bool {
        self.seq.loop_filter && !self.cfg.skip_loop_filter
    }

    /// 宏块解码结果: 出错时返回 false 结束切片
    fn mb_continue(&self, r: TaoResult<()>) -> bool {
        let (x, y, bits) = (self.st.mb_x, self.st.mb_y, self.bits_read());
        match r {
            Ok(()) => true,
            Err(TaoError::Eof) => {
                error!("VC-1: 比特超读 (Bits overconsumption), 宏块 ({x}, {y}), 已读 {bits} 位");
                false
            }
            Err(e) => {
                error!("VC-1: 宏块 ({x}, {y}) 语法错误: {e}, 已读 {bits} 位");
                false
            }
        }
    }

    /// 放弃切片内从当前宏块起的剩余宏块, 由前向参考 (B 帧缺前向时用后向) 填补
    pub(super) fn conceal_remaining(&mut self) {
        let (x0, y0, w, end) = (self.st.mb_x, self.st.mb_y, self.st.mb_width, self.st.end_mb_y);
        if y0 >= end {
            return;
        }
        let lost = (end - y0) * w - x0.min(w);
        self.cur.lost_mbs += lost;
        let src = if self.hdr.pict_type.is_b() {
            self.last.or(self.next)
        } else {
            self.last
        };
        let Some(src) = src else {
            error!("VC-1: 宏块 ({x0}, {y0}) 起 {lost} 个宏块丢失, 无参考图像可填补");
            return;
        };
        error!("VC-1: 宏块 ({x0}, {y0}) 起 {lost} 个宏块丢失, 由参考图像填补");
        for y in y0..end {
            let first = if y == y0 { x0 } else { 0 };
            for x in first..w {
                for p in 0..3 {
                    let size = if p == 0 { 16 } else { 8 };
                    let origin = self.st.mb_origin(p, x, y);
                    let stride = self.st.views[p].stride;
                    self.cur.copy_square_from(src, p, origin, stride, size);
                }
            }
        }
    }

    /// 一行结束: 去块滤波, 行环前移
    fn finish_row(&mut self, kind: LoopFilterKind) {
        if self.loop_filter_enabled() {
            self.loop_filter_row_done(kind);
            if self.st.mb_y + 1 == self.st.end_mb_y {
                self.loop_filter_flush(kind);
            }
        }
        self.st.cbp.advance();
        self.st.ttblk.advance();
        self.st.is_intra.advance();
        self.st.luma_mv.advance();
        self.st.first_line = false;
    }

    /// I 宏块的公共初始化
    fn begin_intra_mb(&mut self) {
        self.st.blocks.clear_cur();
        self.set_mb_intra(true);
        for k in 0..4 {
            let p = self.st.b8(k);
            self.set_mv(1, p, MotionVector::ZERO);
        }
    }

    /// 编码块标志与上下文预测异或, 并记录供后续块预测
    fn coded_flag(&mut self, cbp: u32, k: usize) -> bool {
        let mut coded = (cbp >> (5 - k)) & 1 != 0;
        if k < 4 {
            coded ^= self.coded_block_pred(k);
            let (bx, by) = self.st.b8(k);
            self.st.coded_block.set(bx, by, coded);
        }
        coded
    }

    fn map_ring_mb(&mut self, f: impl Fn(i16) -> i16) {
        let start = self.st.blocks.cur * MB_BLOCK_LEN;
        for v in &mut self.st.blocks.buf[start..start + MB_BLOCK_LEN] {
            *v = f(*v);
        }
    }

    // ============================================================
    // I / BI
    // ============================================================

    fn decode_i_blocks(&mut self) -> TaoResult<()> {
        let pqindex = self.hdr.pqindex;
        self.st.codingset = intra_codingset(self.hdr.y_ac_table_index, pqindex);
        self.st.codingset2 = inter_codingset(self.hdr.c_ac_table_index, pqindex);
        let kind = LoopFilterKind::Intra;
        for y in self.st.start_mb_y..self.st.end_mb_y {
            self.st.mb_y = y;
            for x in 0..self.st.mb_width {
                self.st.mb_x = x;
                let r = self.decode_i_mb();
                if !self.mb_continue(r) {
                    let put_signed = self.seq.overlap && self.hdr.pq >= 9;
                    self.flush_pending_blocks(put_signed);
                    self.conceal_remaining();
                    return Ok(());
                }
                self.st.blocks.advance();
            }
            self.finish_row(kind);
        }
        Ok(())
    }

    fn decode_i_mb(&mut self) -> TaoResult<()> {
        self.begin_intra_mb();
        let pq = self.hdr.pq;
        self.set_qscale(pq);
        let cbp = self.t.i_cbpcy.decode(&mut self.br)? as u32;
        let ac_pred = read_flag(&mut self.br)?;
        trace!("VC-1 I 宏块 ({}, {}): cbp={cbp:#04x}", self.st.mb_x, self.st.mb_y);
        for k in 0..6 {
            self.set_block_intra(k, true);
            let coded = self.coded_flag(cbp, k);
            let codingset = if k < 4 { self.st.codingset } else { self.st.codingset2 };
            let mut block = [0i16; 64];
            self.decode_i_block(&mut block, k, coded, codingset, ac_pred)?;
            dsp::inv_trans_8x8(&mut block);
            self.store_ring_block(k, &block);
        }

        let rangered = self.hdr.rangeredfrm;
        if self.seq.overlap && pq >= 9 {
            self.i_overlap_filter();
            if rangered {
                self.map_ring_mb(|v| v.wrapping_mul(2));
            }
            self.put_blocks_clamped(true);
        } else {
            if rangered {
                self.map_ring_mb(|v| v.wrapping_sub(64).wrapping_mul(2));
            }
            self.put_blocks_clamped(false);
        }
        Ok(())
    }

    fn decode_i_blocks_adv(&mut self) -> TaoResult<()> {
        let pqindex = self.hdr.pqindex;
        self.st.codingset = intra_codingset(self.hdr.y_ac_table_index, pqindex);
        self.st.codingset2 = inter_codingset(self.hdr.c_ac_table_index, pqindex);
        let kind = LoopFilterKind::select(self.hdr.pict_type, self.hdr.fcm);
        if self.st.start_mb_y > 0 {
            // 切片首行的编码块预测不跨越切片
            let row = 2 * self.st.start_mb_y as i32 - 1;
            self.st.coded_block.clear_row(row);
        }
        for y in self.st.start_mb_y..self.st.end_mb_y {
            self.st.mb_y = y;
            for x in 0..self.st.mb_width {
                self.st.mb_x = x;
                let r = self.decode_i_mb_adv();
                if !self.mb_continue(r) {
                    self.flush_pending_blocks(true);
                    self.conceal_remaining();
                    return Ok(());
                }
                self.st.blocks.advance();
            }
            self.finish_row(kind);
        }
        Ok(())
    }

    fn decode_i_mb_adv(&mut self) -> TaoResult<()> {
        self.begin_intra_mb();
        let (x, y) = (self.st.mb_x, self.st.mb_y);
        let fieldtx = self.hdr.fieldtx_plane.read_or_get(&mut self.br, x, y)?;
        self.st.fieldtx.set(x as i32, y as i32, fieldtx);
        if self.br.bits_left() <= 1 {
            return Err(TaoError::Eof);
        }
        let cbp = self.t.i_cbpcy.decode(&mut self.br)? as u32;
        let ac_pred = self.hdr.acpred_plane.read_or_get(&mut self.br, x, y)?;
        if self.hdr.condover == Condover::Select {
            self.hdr.over_flags_plane.read_or_get(&mut self.br, x, y)?;
        }
        let mquant = self.read_mb_mquant()?;
        self.set_qscale(mquant);
        trace!("VC-1 I 宏块 ({x}, {y}): cbp={cbp:#04x}, mquant={mquant}, fieldtx={fieldtx}");

        for k in 0..6 {
            self.set_block_intra(k, true);
            let coded = self.coded_flag(cbp, k);
            let a_avail = !self.st.first_line || k == 2 || k == 3;
            let c_avail = x > 0 || k == 1 || k == 3;
            let codingset = if k < 4 { self.st.codingset } else { self.st.codingset2 };
            let mut block = [0i16; 64];
            self.decode_i_block_adv(
                &mut block,
                IntraBlockArgs {
                    n: k,
                    coded,
                    mquant,
                    codingset,
                    ac_pred,
                    a_avail,
                    c_avail,
                },
            )?;
            dsp::inv_trans_8x8(&mut block);
            self.store_ring_block(k, &block);
        }
        if self.seq.overlap && (self.hdr.pq >= 9 || self.hdr.condover != Condover::None) {
            self.i_overlap_filter();
        }
        self.put_blocks_clamped(true);
        Ok(())
    }

    // ============================================================
    // P / B
    // ============================================================

    fn decode_inter_blocks(&mut self, path: MbDecodePath) -> TaoResult<()> {
        let pqindex = self.hdr.pqindex;
        self.st.codingset = intra_codingset(self.hdr.c_ac_table_index, pqindex);
        self.st.codingset2 = inter_codingset(self.hdr.c_ac_table_index, pqindex);
        let kind = LoopFilterKind::select(self.hdr.pict_type, self.hdr.fcm);
        let is_b = matches!(
            path,
            MbDecodePath::BProgressive | MbDecodePath::BInterlacedFrame | MbDecodePath::BInterlacedField
        );
        for y in self.st.start_mb_y..self.st.end_mb_y {
            self.st.mb_y = y;
            for x in 0..self.st.mb_width {
                self.st.mb_x = x;
                let r = match path {
                    MbDecodePath::PProgressive => self.decode_p_mb(),
                    MbDecodePath::PInterlacedFrame => self.decode_p_mb_intfr(),
                    MbDecodePath::PInterlacedField => self.decode_p_mb_intfi(),
                    MbDecodePath::BProgressive => self.decode_b_mb(),
                    MbDecodePath::BInterlacedFrame => self.decode_b_mb_intfr(),
                    MbDecodePath::BInterlacedField => self.decode_b_mb_intfi(),
                    MbDecodePath::IProgressive | MbDecodePath::IAdvanced => {
                        return Err(TaoError::Codec("VC-1: 帧内路径进入了帧间宏块循环".into()));
                    }
                };
                if !self.mb_continue(r) {
                    if !is_b {
                        self.flush_pending_blocks(true);
                    }
                    self.conceal_remaining();
                    return Ok(());
                }
                if !is_b {
                    self.st.blocks.advance();
                }
            }
            self.finish_row(kind);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codingset_selection() {
        assert_eq!(intra_codingset(0, 5), CS_HIGH_RATE_INTRA);
        assert_eq!(intra_codingset(0, 9), CS_LOW_MOT_INTRA);
        assert_eq!(intra_codingset(1, 3), CS_HIGH_MOT_INTRA);
        assert_eq!(intra_codingset(2, 3), CS_MID_RATE_INTRA);
        assert_eq!(inter_codingset(0, 8), CS_HIGH_RATE_INTER);
        assert_eq!(inter_codingset(0, 20), CS_LOW_MOT_INTER);
        assert_eq!(inter_codingset(2, 1), CS_MID_RATE_INTER);
    }

    #[test]
    fn test_skip_picture_copies_reference() {
        let mut last = Picture::new(1, 1);
        last.planes[0].fill(77);
        let mut cur = Picture::new(1, 1);
        cur.pict_type = Vc1PictureType::I;
        decode_skip_picture(&mut cur, Some(&last));
        assert_eq!(cur.pict_type, Vc1PictureType::P);
        assert!(cur.planes[0].iter().all(|&v| v == 77));
    }
}
