//! 块层语法: 宏块量化参数, MV 差分, DC/AC 预测与系数解码
//!
//! 纯语法函数 (`read_*`, `decode_ac_coeff`) 只依赖比特读取器与图像头,
//! 预测与块重建实现在 [`PictureDecoder`] 上.

use log::{trace, warn};
use tao_core::{BitReader, TaoError, TaoResult};

use super::context::{Esc3Lengths, PictureDecoder};
use super::dsp;
use super::header::PictureHeader;
use super::syntax::{decode012, decode210, read_bits_or_zero, read_flag, read_unary_limited};
use super::tables::{DC_PRED_OUTER, DC_SCALE_TABLE, DQSCALE, MV_OFFSET_TABLE, MV_SIZE_TABLE, TTBLK_TO_TT};
use super::types::{DqProfile, FrameCodingMode, TransformType};
use super::vlc::{AcCodingSet, Vc1Tables, Vlc};

/// 自然布局下首列第 k 个系数位于 `k << LEFT_SH`
pub(super) const LEFT_SH: usize = 3;
/// 首行第 k 个系数位于 `k << TOP_SH`
pub(super) const TOP_SH: usize = 0;

/// DC/AC 预测方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PredDir {
    /// 从左邻块预测 (首列)
    Left,
    /// 从上邻块预测 (首行)
    Top,
}

impl PredDir {
    /// (系数移位, ac_val 中的起点)
    #[inline]
    fn layout(self) -> (usize, usize) {
        match self {
            PredDir::Left => (LEFT_SH, 0),
            PredDir::Top => (TOP_SH, 8),
        }
    }
}

/// 渐进图像的 MVDATA 解码结果, 字段顺序即读取顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct MvDifferential {
    pub dx: i32,
    pub dy: i32,
    pub mb_intra: bool,
    pub has_coeffs: bool,
}

/// 隔行图像的 MV 差分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct FieldMvDifferential {
    pub dx: i32,
    pub dy: i32,
    /// 两参考场时选择另一极性的参考
    pub pred_flag: bool,
}

/// 单个 AC 系数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct AcCoeff {
    pub last: bool,
    pub run: usize,
    pub value: i32,
}

/// 块重建的目标位置
#[derive(Debug, Clone, Copy)]
pub(super) struct BlockDest {
    pub plane: usize,
    pub pos: usize,
    pub stride: usize,
}

// ============================================================
// 语法元素
// ============================================================

/// 读取宏块量化参数 (MQUANT), 负值表示不加 halfpq
pub(super) fn read_mquant(
    br: &mut BitReader,
    hdr: &PictureHeader,
    mb_x: usize,
    mb_y: usize,
    mb_width: usize,
) -> TaoResult<i32> {
    let mut mquant = hdr.pq;
    if !hdr.dquantfrm {
        return Ok(mquant);
    }
    let edges: u32 = match hdr.dqprofile {
        DqProfile::AllMbs => {
            if hdr.dqbilevel {
                mquant = if read_flag(br)? { -hdr.altpq } else { hdr.pq };
            } else {
                let mqdiff = br.read_bits(3)? as i32;
                mquant = if mqdiff != 7 {
                    -hdr.pq - mqdiff
                } else {
                    -(br.read_bits(5)? as i32)
                };
            }
            0
        }
        DqProfile::SingleEdge => 1 << hdr.dqsbedge,
        DqProfile::DoubleEdges => (3 << hdr.dqsbedge) % 15,
        DqProfile::FourEdges => 15,
    };
    let last_row = (hdr.mb_height >> usize::from(hdr.field_mode)).saturating_sub(1);
    if (edges & 1 != 0 && mb_x == 0)
        || (edges & 2 != 0 && mb_y == 0)
        || (edges & 4 != 0 && mb_x + 1 == mb_width)
        || (edges & 8 != 0 && mb_y == last_row)
    {
        mquant = -hdr.altpq;
    }
    if mquant == 0 || !(-31..=31).contains(&mquant) {
        warn!("VC-1: Overriding invalid mquant {mquant} ({mb_x}, {mb_y}), 改用 1");
        mquant = 1;
    }
    Ok(mquant)
}

fn mv_component(br: &mut BitReader, i1: usize, quarter_sample: bool) -> TaoResult<i32> {
    let base = MV_OFFSET_TABLE[1][i1];
    let size = MV_SIZE_TABLE[i1] - u32::from(!quarter_sample && i1 == 5);
    if size == 0 {
        return Ok(base);
    }
    let v = br.read_bits(size)? as i32;
    let sign = -(v & 1);
    Ok((sign ^ ((v >> 1) + base)) - sign)
}

/// 读取渐进图像的 MVDATA
pub(super) fn read_mv_diff(
    br: &mut BitReader,
    t: &Vc1Tables,
    hdr: &PictureHeader,
) -> TaoResult<MvDifferential> {
    let mut index = 1 + t.mv_diff[hdr.mv_table_index].decode(br)?;
    let has_coeffs = index > 36;
    if has_coeffs {
        index -= 37;
    }
    let qs = hdr.quarter_sample;
    let mut d = MvDifferential {
        has_coeffs,
        ..Default::default()
    };
    match index {
        0 => {}
        35 => {
            let q = u32::from(qs);
            d.dx = read_bits_or_zero(br, (hdr.k_x + q).saturating_sub(1))? as i32;
            d.dy = read_bits_or_zero(br, (hdr.k_y + q).saturating_sub(1))? as i32;
        }
        36 => d.mb_intra = true,
        _ => {
            d.dx = mv_component(br, index % 6, qs)?;
            d.dy = mv_component(br, index / 6, qs)?;
        }
    }
    Ok(d)
}

/// 读取隔行图像的 MV 差分
pub(super) fn read_mv_diff_interlaced(
    br: &mut BitReader,
    t: &Vc1Tables,
    hdr: &PictureHeader,
) -> TaoResult<FieldMvDifferential> {
    let numref = usize::from(hdr.numref);
    let (vlc, escape) = if hdr.numref {
        (&t.mvdata_2ref[hdr.imvtab], 125)
    } else {
        (&t.mvdata_1ref[hdr.imvtab], 71)
    };
    let ext_x = (hdr.dmvrange & 1) as usize;
    let ext_y = ((hdr.dmvrange >> 1) & 1) as usize;
    let index = vlc.decode(br)?;
    if index == escape {
        let dx = read_bits_or_zero(br, hdr.k_x)? as i32;
        let mut dy = read_bits_or_zero(br, hdr.k_y)? as i32;
        let mut pred_flag = false;
        if hdr.numref {
            pred_flag = dy & 1 != 0;
            dy = (dy + (dy & 1)) >> 1;
        }
        return Ok(FieldMvDifferential { dx, dy, pred_flag });
    }

    let i1 = (index + 1) % 9;
    let dx = if i1 != 0 {
        let v = br.read_bits((i1 + ext_x) as u32)? as i32;
        let sign = -(v & 1);
        (sign ^ ((v >> 1) + MV_OFFSET_TABLE[ext_x][i1])) - sign
    } else {
        0
    };
    let i1 = (index + 1) / 9;
    let dy = if i1 > numref {
        let k = i1 >> numref;
        let v = br.read_bits((k + ext_y) as u32)? as i32;
        let sign = -(v & 1);
        (sign ^ ((v >> 1) + MV_OFFSET_TABLE[ext_y][k])) - sign
    } else {
        0
    };
    Ok(FieldMvDifferential {
        dx,
        dy,
        pred_flag: hdr.numref && i1 & 1 != 0,
    })
}

/// 解码一个 AC 系数 (含三种转义模式)
pub(super) fn decode_ac_coeff(
    br: &mut BitReader,
    set: &AcCodingSet,
    esc3: &mut Esc3Lengths,
    pq: i32,
    dquantfrm: bool,
) -> TaoResult<AcCoeff> {
    let index = set.vlc.decode(br)?;
    let (run, level, last);
    if index != set.escape_index {
        let (r, l) = set.run_level[index];
        run = usize::from(r);
        level = i32::from(l);
        last = index >= set.last_index;
    } else {
        let escape = decode210(br)?;
        if escape != 2 {
            let index = set.vlc.decode(br)?;
            if index >= set.escape_index {
                return Err(TaoError::InvalidData("VC-1: AC 转义后的码字非法".into()));
            }
            let (r, l) = set.run_level[index];
            let (mut r, mut l) = (usize::from(r), i32::from(l));
            last = index >= set.last_index;
            if escape == 0 {
                let delta = if last { &set.last_delta_level } else { &set.delta_level };
                l += i32::from(delta[r]);
            } else {
                let delta = if last { &set.last_delta_run } else { &set.delta_run };
                r += usize::from(delta.get(l as usize).copied().unwrap_or(0)) + 1;
            }
            run = r;
            level = l;
        } else {
            last = read_flag(br)?;
            if esc3.level == 0 {
                if pq < 8 || dquantfrm {
                    esc3.level = br.read_bits(3)?;
                    if esc3.level == 0 {
                        esc3.level = br.read_bits(2)? + 8;
                    }
                } else {
                    esc3.level = read_unary_limited(br, 1, 6)? + 2;
                }
                esc3.run = 3 + br.read_bits(2)?;
                trace!("VC-1 AC 转义 3: level_len={}, run_len={}", esc3.level, esc3.run);
            }
            run = br.read_bits(esc3.run)? as usize;
            let sign = read_flag(br)?;
            let l = br.read_bits(esc3.level)? as i32;
            return Ok(AcCoeff {
                last,
                run,
                value: if sign { -l } else { l },
            });
        }
    }
    let sign = read_flag(br)?;
    Ok(AcCoeff {
        last,
        run,
        value: if sign { -level } else { level },
    })
}

/// 读取游程/电平对直到 last 或越过 `limit`, 返回结束位置
///
/// `put(i, value)` 接收扫描位置与系数值.
pub(super) fn read_run_levels(
    br: &mut BitReader,
    set: &AcCodingSet,
    esc3: &mut Esc3Lengths,
    hdr: &PictureHeader,
    start: usize,
    limit: usize,
    mut put: impl FnMut(usize, i32),
) -> TaoResult<usize> {
    let mut i = start;
    loop {
        let c = decode_ac_coeff(br, set, esc3, hdr.pq, hdr.dquantfrm)?;
        i += c.run;
        if i >= limit {
            break;
        }
        put(i, c.value);
        i += 1;
        if c.last {
            break;
        }
    }
    Ok(i)
}

/// 读取 DC 差分, `quant` 为 1 或 2 时精度扩展
pub(super) fn read_dc_diff(br: &mut BitReader, vlc: &Vlc, quant: i32) -> TaoResult<i32> {
    let mut d = vlc.decode(br)? as i32;
    if d != 0 {
        let m = if quant == 1 || quant == 2 { 3 - quant } else { 0 };
        if d == 119 {
            d = br.read_bits(8 + m as u32)? as i32;
        } else if m != 0 {
            d = (d << m) + br.read_bits(m as u32)? as i32 - ((1 << m) - 1);
        }
        if read_flag(br)? {
            d = -d;
        }
    }
    Ok(d)
}

// ============================================================
// 预测辅助
// ============================================================

/// Simple/Main I 帧的 DC 预测选择: |A-B| <= |B-C| 时取左邻 C, 否则取上邻 A
pub(super) fn choose_dc_pred(a: i32, b: i32, c: i32) -> (i32, PredDir) {
    if (a - b).abs() <= (b - c).abs() {
        (c, PredDir::Left)
    } else {
        (a, PredDir::Top)
    }
}

/// 带邻块可用性的 DC 预测选择
pub(super) fn choose_dc_pred_avail(a: i32, b: i32, c: i32, a_avail: bool, c_avail: bool) -> (i32, PredDir) {
    if c_avail && (!a_avail || (a - b).abs() <= (b - c).abs()) {
        (c, PredDir::Left)
    } else if a_avail {
        (a, PredDir::Top)
    } else {
        (0, PredDir::Left)
    }
}

/// 量化参数不同的邻块预测值换算: `(v * mul + 0x20000) >> 18`
#[inline]
pub(super) fn rescale_pred(v: i32, mul: i32) -> i32 {
    v.wrapping_mul(mul).wrapping_add(0x20000) >> 18
}

/// AC 预测换算用的 (当前, 邻块) 双倍量化步长, 邻块不可用时为 0
fn ac_pred_steps(q1: i32, q2: i32, halfpq: i32) -> TaoResult<(i32, i32)> {
    let step = |q: i32| q.abs() * 2 + if q < 0 { 0 } else { halfpq } - 1;
    let s1 = step(q1);
    if s1 < 1 {
        return Err(TaoError::InvalidData(format!("VC-1: 非法量化步长 {q1}")));
    }
    let s2 = if q2 != 0 { step(q2) } else { 0 };
    Ok((s1, s2))
}

/// 帧内系数反量化 (非零时附加量化偏置)
#[inline]
fn dequant_intra(v: i16, scale: i32, quant: i32, uniform: bool) -> i16 {
    if v == 0 {
        return 0;
    }
    let mut b = (i32::from(v) * scale) as i16;
    if !uniform {
        b = b.wrapping_add(if b < 0 { -quant } else { quant } as i16);
    }
    b
}

/// 帧间系数反量化
#[inline]
fn dequant_inter(v: i32, scale: i32, quant: i32, uniform: bool) -> i16 {
    let mut b = (v * scale) as i16;
    if !uniform {
        b = b.wrapping_add(if b < 0 { -quant } else { quant } as i16);
    }
    b
}

fn dc_vlc(t: &Vc1Tables, table: usize, n: usize) -> &Vlc {
    if n < 4 { &t.dc_luma[table] } else { &t.dc_chroma[table] }
}

/// 帧内块的上下文
#[derive(Debug, Clone, Copy)]
pub(super) struct IntraBlockArgs {
    pub n: usize,
    pub coded: bool,
    pub mquant: i32,
    pub codingset: usize,
    pub ac_pred: bool,
    pub a_avail: bool,
    pub c_avail: bool,
}

impl PictureDecoder<'_> {
    /// 宏块 (x, y) 的量化参数
    #[inline]
    fn qscale_at(&self, x: i32, y: i32) -> i32 {
        i32::from(self.st.qscale.get(x, y))
    }

    /// 块 `n` 的编码标志预测: 左上与上邻相同时取左邻, 否则取上邻
    pub(super) fn coded_block_pred(&self, n: usize) -> bool {
        let (x, y) = self.st.b8(n);
        let g = &self.st.coded_block;
        let a = g.get(x - 1, y);
        let b = g.get(x - 1, y - 1);
        let c = g.get(x, y - 1);
        if b == c { a } else { c }
    }

    /// Simple/Main I 帧的 DC 预测
    fn i_pred_dc(&self, n: usize, plane: usize, x: i32, y: i32, dc_scale: usize) -> (i32, PredDir) {
        let g = &self.st.dc_val[plane];
        let mut c = i32::from(g.get(x - 1, y));
        let mut b = i32::from(g.get(x - 1, y - 1));
        let mut a = i32::from(g.get(x, y - 1));
        let outer = if self.hdr.pq < 9 || !self.seq.overlap {
            DC_PRED_OUTER[dc_scale]
        } else {
            0
        };
        if self.st.first_line && n != 2 && n != 3 {
            b = outer;
            a = outer;
        }
        if self.st.mb_x == 0 && n != 1 && n != 3 {
            b = outer;
            c = outer;
        }
        choose_dc_pred(a, b, c)
    }

    /// 高级档次与帧间图像的 DC 预测, 邻块量化参数不同时换算
    fn pred_dc(&self, n: usize, plane: usize, x: i32, y: i32, a_avail: bool, c_avail: bool) -> (i32, PredDir) {
        let (mx, my) = (self.st.mb_x as i32, self.st.mb_y as i32);
        let q1 = self.qscale_at(mx, my).unsigned_abs() as usize;
        let dqidx = i32::from(DC_SCALE_TABLE[q1.min(31)]) - 1;
        if dqidx < 0 {
            return (0, PredDir::Top);
        }
        let dq = DQSCALE[dqidx as usize] as i32;
        let rescale = |v: i32, qx: i32, qy: i32| {
            let q2 = self.qscale_at(qx, qy).unsigned_abs() as usize;
            if q2 != 0 && q2 != q1 {
                rescale_pred(v, i32::from(DC_SCALE_TABLE[q2.min(31)]) * dq)
            } else {
                v
            }
        };
        let g = &self.st.dc_val[plane];
        let mut c = i32::from(g.get(x - 1, y));
        let mut b = i32::from(g.get(x - 1, y - 1));
        let mut a = i32::from(g.get(x, y - 1));
        if c_avail && n != 1 && n != 3 {
            c = rescale(c, mx - 1, my);
        }
        if a_avail && n != 2 && n != 3 {
            a = rescale(a, mx, my - 1);
        }
        if a_avail && c_avail && n != 3 {
            let ox = if n != 1 { mx - 1 } else { mx };
            let oy = if n != 2 { my - 1 } else { my };
            b = rescale(b, ox, oy);
        }
        choose_dc_pred_avail(a, b, c, a_avail, c_avail)
    }

    /// Simple/Main 档次 I 帧的帧内块
    pub(super) fn decode_i_block(
        &mut self,
        block: &mut [i16; 64],
        n: usize,
        coded: bool,
        codingset: usize,
        ac_pred: bool,
    ) -> TaoResult<()> {
        let t = self.t;
        let pq = self.hdr.pq;
        let scale_idx = pq.clamp(0, 31) as usize;
        let dc_scale = i32::from(DC_SCALE_TABLE[scale_idx]);
        let dcdiff = read_dc_diff(&mut self.br, dc_vlc(t, self.hdr.dc_table_index, n), pq)?;

        let (plane, x, y) = self.st.block_xy(n);
        let (pred, dir) = self.i_pred_dc(n, plane, x, y, dc_scale as usize);
        let dc = dcdiff + pred;
        self.st.dc_val[plane].set(x, y, dc as i16);
        *block = [0; 64];
        block[0] = (dc * dc_scale) as i16;

        let scale = pq * 2 + self.hdr.halfpq;
        let uniform = self.hdr.pquantizer;
        let neighbour = match dir {
            PredDir::Left => self.st.ac_val[plane].get(x - 1, y),
            PredDir::Top => self.st.ac_val[plane].get(x, y - 1),
        };
        let (sh, base) = dir.layout();
        let mut saved = [0i16; 16];
        if coded {
            let zz = if !ac_pred {
                &t.scans.zz_8x8[1]
            } else if dir == PredDir::Top {
                &t.scans.zz_8x8[2]
            } else {
                &t.scans.zz_8x8[3]
            };
            read_run_levels(&mut self.br, &t.ac[codingset], &mut self.st.esc3, self.hdr, 1, 64, |i, v| {
                block[usize::from(zz[i])] = v as i16;
            })?;
            if ac_pred {
                for k in 1..8 {
                    block[k << sh] = block[k << sh].wrapping_add(neighbour[base + k]);
                }
            }
            for k in 1..8 {
                saved[k] = block[k << LEFT_SH];
                saved[k + 8] = block[k << TOP_SH];
            }
            for v in block.iter_mut().skip(1) {
                *v = dequant_intra(*v, scale, pq, uniform);
            }
        } else if ac_pred {
            saved[base..base + 8].copy_from_slice(&neighbour[base..base + 8]);
            for k in 1..8 {
                block[k << sh] = dequant_intra(saved[base + k], scale, pq, uniform);
            }
        }
        self.st.ac_val[plane].set(x, y, saved);
        Ok(())
    }

    /// 高级档次 I 帧的帧内块
    pub(super) fn decode_i_block_adv(&mut self, block: &mut [i16; 64], a: IntraBlockArgs) -> TaoResult<()> {
        self.decode_intra_common(block, a, false)
    }

    /// P/B 图像中的帧内块
    pub(super) fn decode_intra_block(&mut self, block: &mut [i16; 64], a: IntraBlockArgs) -> TaoResult<()> {
        self.decode_intra_common(block, a, true)
    }

    fn decode_intra_common(&mut self, block: &mut [i16; 64], a: IntraBlockArgs, inter_pic: bool) -> TaoResult<()> {
        let t = self.t;
        let n = a.n;
        let quant = a.mquant.abs().min(31);
        let dc_scale = i32::from(DC_SCALE_TABLE[quant as usize]);
        let dcdiff = read_dc_diff(&mut self.br, dc_vlc(t, self.hdr.dc_table_index, n), quant)?;

        let (plane, x, y) = self.st.block_xy(n);
        let (pred, mut dir) = self.pred_dc(n, plane, x, y, a.a_avail, a.c_avail);
        let dc = dcdiff + pred;
        self.st.dc_val[plane].set(x, y, dc as i16);
        *block = [0; 64];
        block[0] = (dc * dc_scale) as i16;

        if inter_pic {
            if !a.a_avail {
                dir = PredDir::Left;
            }
            if !a.c_avail {
                dir = PredDir::Top;
            }
        }
        let use_pred = a.ac_pred && (a.a_avail || a.c_avail);
        let halfpq = self.hdr.halfpq;
        let scale = quant * 2 + if a.mquant < 0 { 0 } else { halfpq };
        let uniform = self.hdr.pquantizer;

        let (mx, my) = (self.st.mb_x as i32, self.st.mb_y as i32);
        let q1 = self.qscale_at(mx, my);
        let q2 = if n == 3 {
            q1
        } else {
            match dir {
                PredDir::Left if n == 1 => q1,
                PredDir::Left if a.c_avail => self.qscale_at(mx - 1, my),
                PredDir::Top if n == 2 => q1,
                PredDir::Top if a.a_avail => self.qscale_at(mx, my - 1),
                _ => 0,
            }
        };
        let neighbour = match dir {
            PredDir::Left => self.st.ac_val[plane].get(x - 1, y),
            PredDir::Top => self.st.ac_val[plane].get(x, y - 1),
        };
        let (sh, base) = dir.layout();
        let interlaced_frame = self.hdr.fcm == FrameCodingMode::InterlacedFrame;
        let scans = &t.scans;
        let directional = if dir == PredDir::Top { &scans.zz_8x8[2] } else { &scans.zz_8x8[3] };
        let zz: &[u8; 64] = if inter_pic {
            if self.hdr.fcm == FrameCodingMode::Progressive {
                &scans.zz_8x8[0]
            } else if use_pred && interlaced_frame {
                directional
            } else {
                &scans.adv_interlaced_8x8
            }
        } else if a.ac_pred {
            if !use_pred && interlaced_frame {
                &scans.adv_interlaced_8x8
            } else {
                directional
            }
        } else if interlaced_frame {
            &scans.adv_interlaced_8x8
        } else {
            &scans.zz_8x8[1]
        };

        let mut saved = [0i16; 16];
        if a.coded {
            read_run_levels(&mut self.br, &t.ac[a.codingset], &mut self.st.esc3, self.hdr, 1, 64, |i, v| {
                block[usize::from(zz[i])] = v as i16;
            })?;
            if use_pred {
                let (s1, s2) = ac_pred_steps(q1, q2, halfpq)?;
                let mul = s2 * DQSCALE[(s1 - 1) as usize] as i32;
                for k in 1..8 {
                    let p = i32::from(neighbour[base + k]);
                    let p = if s2 != 0 && s1 != s2 { rescale_pred(p, mul) } else { p };
                    block[k << sh] = block[k << sh].wrapping_add(p as i16);
                }
            }
            for k in 1..8 {
                saved[k] = block[k << LEFT_SH];
                saved[k + 8] = block[k << TOP_SH];
            }
            for v in block.iter_mut().skip(1) {
                *v = dequant_intra(*v, scale, quant, uniform);
            }
        } else if use_pred {
            let (s1, s2) = ac_pred_steps(q1, q2, halfpq)?;
            let mul = s2 * DQSCALE[(s1 - 1) as usize] as i32;
            for k in 1..8 {
                let p = i32::from(neighbour[base + k]);
                let p = if s2 != 0 && s1 != s2 { rescale_pred(p, mul) } else { p };
                saved[base + k] = p as i16;
                block[k << sh] = dequant_intra(p as i16, scale, quant, uniform);
            }
        }
        self.st.ac_val[plane].set(x, y, saved);
        trace!(
            "VC-1 帧内块 ({}, {}) n={n}: dc={dc}, dir={dir:?}, q={}",
            self.st.mb_x,
            self.st.mb_y,
            a.mquant
        );
        Ok(())
    }

    /// 帧间残差块: 解码系数, 反变换并叠加到 `dst`
    ///
    /// `ttmb` 为 -1 时逐块读取变换类型. 返回 (子块编码模式, 最终变换类型).
    #[allow(clippy::too_many_arguments)]
    pub(super) fn decode_p_block(
        &mut self,
        block: &mut [i16; 64],
        n: usize,
        mquant: i32,
        ttmb: i32,
        first_block: bool,
        dst: BlockDest,
        skip_block: bool,
    ) -> TaoResult<(u32, TransformType)> {
        let t = self.t;
        let tt_index = self.hdr.tt_index;
        *block = [0; 64];

        let mut ttblk = TransformType::from_index((ttmb & 7) as u8);
        if ttmb == -1 {
            ttblk = TTBLK_TO_TT[tt_index][t.ttblk[tt_index].decode(&mut self.br)?];
        }
        let mut subblkpat: u32 = 0;
        if ttblk == TransformType::T4x4 {
            subblkpat = !(t.subblkpat[tt_index].decode(&mut self.br)? as u32 + 1);
        }
        if !matches!(ttblk, TransformType::T8x8 | TransformType::T4x4)
            && (self.hdr.ttmbf
                || (ttmb != -1 && ttmb & 8 != 0 && !first_block)
                || (!self.seq.res_rtm_flag && !first_block))
        {
            subblkpat = decode012(&mut self.br)?;
            if subblkpat != 0 {
                subblkpat ^= 3;
            }
            if matches!(ttblk, TransformType::T8x4Top | TransformType::T8x4Bottom) {
                ttblk = TransformType::T8x4;
            }
            if matches!(ttblk, TransformType::T4x8Right | TransformType::T4x8Left) {
                ttblk = TransformType::T4x8;
            }
        }
        if matches!(ttblk, TransformType::T8x4Top | TransformType::T8x4Bottom) {
            subblkpat = 2 - u32::from(ttblk == TransformType::T8x4Top);
            ttblk = TransformType::T8x4;
        }
        if matches!(ttblk, TransformType::T4x8Right | TransformType::T4x8Left) {
            subblkpat = 2 - u32::from(ttblk == TransformType::T4x8Left);
            ttblk = TransformType::T4x8;
        }

        let quant = mquant.abs();
        let scale = quant * 2 + if mquant < 0 { 0 } else { self.hdr.halfpq };
        let uniform = self.hdr.pquantizer;
        let progressive = self.hdr.fcm == FrameCodingMode::Progressive;
        let advanced = self.seq.is_advanced();
        let scans = &t.scans;
        let set = &t.ac[self.st.codingset2];
        let BlockDest { plane, pos, stride } = dst;
        let buf = &mut self.cur.planes[plane];

        let pat = match ttblk {
            TransformType::T8x8 => {
                let zz = if progressive { &scans.zz_8x8[0] } else { &scans.adv_interlaced_8x8 };
                let i = read_run_levels(&mut self.br, set, &mut self.st.esc3, self.hdr, 0, 64, |i, v| {
                    block[usize::from(zz[i])] = dequant_inter(v, scale, quant, uniform);
                })?;
                if !skip_block {
                    if i == 1 {
                        dsp::inv_trans_8x8_dc(buf, pos, stride, block[0]);
                    } else {
                        dsp::inv_trans_8x8(block);
                        dsp::add_pixels_clamped(block, buf, pos, stride);
                    }
                }
                0xF
            }
            TransformType::T4x4 => {
                let zz = if progressive { &scans.zz_4x4 } else { &scans.adv_interlaced_4x4 };
                for j in 0..4 {
                    let coded = subblkpat & (1 << (3 - j)) == 0;
                    if !coded {
                        continue;
                    }
                    let off = (j & 1) * 4 + (j & 2) * 16;
                    let i = read_run_levels(&mut self.br, set, &mut self.st.esc3, self.hdr, 0, 16, |i, v| {
                        block[off + usize::from(zz[i])] = dequant_inter(v, scale, quant, uniform);
                    })?;
                    if !skip_block {
                        let p = pos + (j & 1) * 4 + (j & 2) * 2 * stride;
                        if i == 1 {
                            dsp::inv_trans_4x4_dc(buf, p, stride, block[off]);
                        } else {
                            dsp::inv_trans_4x4(buf, p, stride, &block[..], off);
                        }
                    }
                }
                !subblkpat & 0xF
            }
            TransformType::T8x4 => {
                let zz = if !progressive {
                    &scans.adv_interlaced_8x4
                } else if advanced {
                    &scans.adv_progressive_8x4
                } else {
                    &scans.zz_8x4
                };
                for j in 0..2 {
                    if subblkpat & (1 << (1 - j)) != 0 {
                        continue;
                    }
                    let off = j * 32;
                    let i = read_run_levels(&mut self.br, set, &mut self.st.esc3, self.hdr, 0, 32, |i, v| {
                        block[off + usize::from(zz[i])] = dequant_inter(v, scale, quant, uniform);
                    })?;
                    if !skip_block {
                        let p = pos + j * 4 * stride;
                        if i == 1 {
                            dsp::inv_trans_8x4_dc(buf, p, stride, block[off]);
                        } else {
                            dsp::inv_trans_8x4(buf, p, stride, &block[..], off);
                        }
                    }
                }
                !((subblkpat & 2) * 6 + (subblkpat & 1) * 3) & 0xF
            }
            _ => {
                let zz = if !progressive {
                    &scans.adv_interlaced_4x8
                } else if advanced {
                    &scans.adv_progressive_4x8
                } else {
                    &scans.zz_4x8
                };
                for j in 0..2 {
                    if subblkpat & (1 << (1 - j)) != 0 {
                        continue;
                    }
                    let off = j * 4;
                    let i = read_run_levels(&mut self.br, set, &mut self.st.esc3, self.hdr, 0, 32, |i, v| {
                        block[off + usize::from(zz[i])] = dequant_inter(v, scale, quant, uniform);
                    })?;
                    if !skip_block {
                        let p = pos + j * 4;
                        if i == 1 {
                            dsp::inv_trans_4x8_dc(buf, p, stride, block[off]);
                        } else {
                            dsp::inv_trans_4x8(buf, p, stride, &block[..], off);
                        }
                    }
                }
                !(subblkpat * 5) & 0xF
            }
        };
        trace!("VC-1 残差块 n={n}: tt={ttblk:?}, pat={pat:#x}, q={mquant}");
        Ok((pat, ttblk))
    }
}
