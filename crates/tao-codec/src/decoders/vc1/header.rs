//! 序列头, 入口点与图像头解析
//!
//! 图像头状态在帧间保留 (例如 RND 翻转, 场图像第二场沿用第一场的字段),
//! 因此 [`PictureHeader`] 由解码器长期持有并逐帧就地更新.

use log::{debug, warn};
use tao_core::{BitReader, TaoError, TaoResult};

use super::bitplane::Bitplane;
use super::syntax::{decode012, decode210, read_flag, read_unary_limited};
use super::tables::{
    ASPECT_RATIOS, BFRACTION_LUT, FPS_DR, FPS_NR, MV_PMODE_TABLE, MV_PMODE_TABLE2, PQUANT_TABLE,
    TTFRM_TO_TT,
};
use super::types::{
    Condover, DqProfile, FrameCodingMode, MvMode, Profile, QuantMode, TransformType,
    Vc1PictureType,
};
use super::vlc::Vc1Tables;

// ============================================================
// 序列头与入口点
// ============================================================

#[derive(Debug, Clone, Default)]
pub(super) struct SequenceHeader {
    pub profile: Profile,
    pub level: u32,
    pub frmrtq_postproc: u32,
    pub bitrtq_postproc: u32,
    pub loop_filter: bool,
    pub res_x8: bool,
    pub multires: bool,
    pub res_fasttx: bool,
    pub fastuvmc: bool,
    pub extended_mv: bool,
    pub dquant: u32,
    pub vstransform: bool,
    pub overlap: bool,
    pub resync_marker: bool,
    pub rangered: bool,
    pub max_b_frames: u32,
    pub quantizer_mode: QuantMode,
    pub finterpflag: bool,
    pub res_rtm_flag: bool,
    pub res_sprite: bool,

    // Advanced 档次
    pub postprocflag: bool,
    pub max_coded_width: u32,
    pub max_coded_height: u32,
    pub broadcast: bool,
    pub interlace: bool,
    pub tfcntrflag: bool,
    pub psf: bool,
    pub display_size: Option<(u32, u32)>,
    pub sample_aspect_ratio: Option<(u32, u32)>,
    /// 帧率 (分子, 分母)
    pub frame_rate: Option<(u32, u32)>,
    pub hrd_num_leaky_buckets: u32,

    // 入口点
    pub entry_point_seen: bool,
    pub broken_link: bool,
    pub closed_entry: bool,
    pub panscanflag: bool,
    pub refdist_flag: bool,
    pub extended_dmv: bool,
    pub coded_size: Option<(u32, u32)>,
    pub range_mapy: Option<u32>,
    pub range_mapuv: Option<u32>,
}

impl SequenceHeader {
    pub(super) fn is_advanced(&self) -> bool {
        self.profile == Profile::Advanced
    }

    /// 解析序列头. Simple/Main 为 4 字节 STRUCT_C, 档次为 3 时按 Advanced 语法继续解析.
    pub(super) fn parse(br: &mut BitReader) -> TaoResult<Self> {
        let mut seq = Self {
            profile: Profile::from_bits(br.read_bits(2)?),
            ..Self::default()
        };
        match seq.profile {
            Profile::Advanced => {
                seq.parse_advanced(br)?;
                return Ok(seq);
            }
            Profile::Complex => {
                return Err(TaoError::Unsupported("VC-1: 不支持 WMV9 Complex 档次".into()));
            }
            _ => {}
        }

        let res_y411 = read_flag(br)?;
        seq.res_sprite = read_flag(br)?;
        if res_y411 {
            return Err(TaoError::InvalidData("VC-1: 保留位 RES_Y411 被置位".into()));
        }
        seq.frmrtq_postproc = br.read_bits(3)?;
        seq.bitrtq_postproc = br.read_bits(5)?;
        seq.loop_filter = read_flag(br)?;
        if seq.loop_filter && seq.profile == Profile::Simple {
            warn!("VC-1: Simple 档次不应启用 LOOPFILTER");
        }
        seq.res_x8 = read_flag(br)?;
        seq.multires = read_flag(br)?;
        seq.res_fasttx = read_flag(br)?;
        seq.fastuvmc = read_flag(br)?;
        if seq.profile == Profile::Simple && !seq.fastuvmc {
            return Err(TaoError::InvalidData("VC-1: Simple 档次必须启用 FASTUVMC".into()));
        }
        seq.extended_mv = read_flag(br)?;
        if seq.profile == Profile::Simple && seq.extended_mv {
            return Err(TaoError::InvalidData("VC-1: Simple 档次不允许扩展 MV".into()));
        }
        seq.dquant = br.read_bits(2)?;
        seq.vstransform = read_flag(br)?;
        if read_flag(br)? {
            return Err(TaoError::InvalidData("VC-1: 保留位 RES_TRANSTAB 被置位".into()));
        }
        seq.overlap = read_flag(br)?;
        seq.resync_marker = read_flag(br)?;
        seq.rangered = read_flag(br)?;
        seq.max_b_frames = br.read_bits(3)?;
        seq.quantizer_mode = QuantMode::from_bits(br.read_bits(2)?);
        seq.finterpflag = read_flag(br)?;
        if seq.res_sprite {
            return Err(TaoError::Unsupported("VC-1: 不支持 WMV3 sprite 图像".into()));
        }
        // 有的封装只给出前 31 位
        seq.res_rtm_flag = br.read_bit().map(|b| b != 0).unwrap_or(false);
        if !seq.res_fasttx {
            warn!("VC-1: RES_FASTTX=0 的非快速反变换未实现, 按快速变换解码");
        }
        debug!(
            "VC-1 序列头: profile={:?}, loop_filter={}, dquant={}, overlap={}, rangered={}, max_b={}, quant_mode={:?}",
            seq.profile,
            seq.loop_filter,
            seq.dquant,
            seq.overlap,
            seq.rangered,
            seq.max_b_frames,
            seq.quantizer_mode
        );
        Ok(seq)
    }

    fn parse_advanced(&mut self, br: &mut BitReader) -> TaoResult<()> {
        self.res_rtm_flag = true;
        self.level = br.read_bits(3)?;
        if self.level >= 5 {
            warn!("VC-1: 保留的 LEVEL {}", self.level);
        }
        let chromaformat = br.read_bits(2)?;
        if chromaformat != 1 {
            return Err(TaoError::Unsupported(format!(
                "VC-1: 仅支持 4:2:0 色度格式, 实际 {chromaformat}"
            )));
        }
        self.frmrtq_postproc = br.read_bits(3)?;
        self.bitrtq_postproc = br.read_bits(5)?;
        self.postprocflag = read_flag(br)?;
        self.max_coded_width = (br.read_bits(12)? + 1) << 1;
        self.max_coded_height = (br.read_bits(12)? + 1) << 1;
        self.broadcast = read_flag(br)?;
        self.interlace = read_flag(br)?;
        self.tfcntrflag = read_flag(br)?;
        self.finterpflag = read_flag(br)?;
        br.skip_bits(1)?;
        self.psf = read_flag(br)?;
        if self.psf {
            return Err(TaoError::Unsupported("VC-1: 不支持逐行分段帧 (PSF)".into()));
        }
        self.max_b_frames = 7;
        self.res_fasttx = true;
        self.fastuvmc = false;

        if read_flag(br)? {
            let w = br.read_bits(14)? + 1;
            let h = br.read_bits(14)? + 1;
            self.display_size = Some((w, h));
            let ar = if read_flag(br)? { br.read_bits(4)? } else { 0 };
            if ar > 0 && ar < 14 {
                self.sample_aspect_ratio = Some(ASPECT_RATIOS[ar as usize]);
            } else if ar == 15 {
                let n = br.read_bits(8)? + 1;
                let d = br.read_bits(8)? + 1;
                self.sample_aspect_ratio = Some((n, d));
            }
            if read_flag(br)? {
                if read_flag(br)? {
                    self.frame_rate = Some((br.read_bits(16)? + 1, 32));
                } else {
                    let nr = br.read_bits(8)? as usize;
                    let dr = br.read_bits(4)? as usize;
                    if (1..8).contains(&nr) && (1..3).contains(&dr) {
                        self.frame_rate = Some((FPS_NR[nr - 1] * 1000, FPS_DR[dr - 1]));
                    }
                }
            }
            if read_flag(br)? {
                // 色彩描述
                br.skip_bits(24)?;
            }
        }

        if read_flag(br)? {
            self.hrd_num_leaky_buckets = br.read_bits(5)?;
            br.skip_bits(8)?;
            for _ in 0..self.hrd_num_leaky_buckets {
                br.skip_bits(32)?;
            }
        }
        debug!(
            "VC-1 Advanced 序列头: level={}, 最大编码尺寸 {}x{}, interlace={}, broadcast={}, display={:?}",
            self.level,
            self.max_coded_width,
            self.max_coded_height,
            self.interlace,
            self.broadcast,
            self.display_size
        );
        Ok(())
    }

    /// 解析入口点头
    pub(super) fn parse_entry_point(&mut self, br: &mut BitReader) -> TaoResult<()> {
        if !self.is_advanced() {
            return Err(TaoError::InvalidData("VC-1: 非 Advanced 档次出现入口点".into()));
        }
        self.broken_link = read_flag(br)?;
        self.closed_entry = read_flag(br)?;
        self.panscanflag = read_flag(br)?;
        self.refdist_flag = read_flag(br)?;
        self.loop_filter = read_flag(br)?;
        self.fastuvmc = read_flag(br)?;
        self.extended_mv = read_flag(br)?;
        self.dquant = br.read_bits(2)?;
        self.vstransform = read_flag(br)?;
        self.overlap = read_flag(br)?;
        self.quantizer_mode = QuantMode::from_bits(br.read_bits(2)?);
        for _ in 0..self.hrd_num_leaky_buckets {
            br.skip_bits(8)?;
        }
        if read_flag(br)? {
            let w = (br.read_bits(12)? + 1) << 1;
            let h = (br.read_bits(12)? + 1) << 1;
            self.coded_size = Some((w, h));
        }
        self.extended_dmv = self.extended_mv && read_flag(br)?;
        self.range_mapy = if read_flag(br)? { Some(br.read_bits(3)?) } else { None };
        self.range_mapuv = if read_flag(br)? { Some(br.read_bits(3)?) } else { None };
        self.entry_point_seen = true;
        debug!(
            "VC-1 入口点: broken_link={}, closed={}, panscan={}, refdist={}, loop_filter={}, dquant={}, overlap={}, coded={:?}",
            self.broken_link,
            self.closed_entry,
            self.panscanflag,
            self.refdist_flag,
            self.loop_filter,
            self.dquant,
            self.overlap,
            self.coded_size
        );
        Ok(())
    }

    /// 编码尺寸 (Advanced 取入口点或最大编码尺寸)
    pub(super) fn coded_dimensions(&self) -> Option<(u32, u32)> {
        if !self.is_advanced() {
            return None;
        }
        self.coded_size
            .or(Some((self.max_coded_width, self.max_coded_height)))
    }
}

// ============================================================
// 强度补偿查找表
// ============================================================

/// 一个参考的 [场][样本] 查找表
#[derive(Debug, Clone)]
pub(super) struct IcLuts {
    pub luty: [[u8; 256]; 2],
    pub lutuv: [[u8; 256]; 2],
    pub use_ic: bool,
}

impl Default for IcLuts {
    fn default() -> Self {
        let id: [u8; 256] = std::array::from_fn(|i| i as u8);
        Self {
            luty: [id; 2],
            lutuv: [id; 2],
            use_ic: false,
        }
    }
}

impl IcLuts {
    /// 以 LUMSCALE/LUMSHIFT 构造 (chain 时在已有表之上叠加)
    pub(super) fn apply(&mut self, field: usize, lumscale: u32, lumshift: u32, chain: bool) {
        let (scale, shift) = if lumscale == 0 {
            let mut shift = (255 - lumshift as i32 * 2) * 64;
            if lumshift > 31 {
                shift += 128 << 6;
            }
            (-64, shift)
        } else {
            let shift = if lumshift > 31 {
                (lumshift as i32 - 64) * 64
            } else {
                (lumshift as i32) << 6
            };
            (lumscale as i32 + 32, shift)
        };
        for i in 0..256 {
            let iy = if chain { i32::from(self.luty[field][i]) } else { i as i32 };
            let iu = if chain { i32::from(self.lutuv[field][i]) } else { i as i32 };
            self.luty[field][i] = ((scale * iy + shift + 32) >> 6).clamp(0, 255) as u8;
            self.lutuv[field][i] = ((scale * (iu - 128) + 128 * 64 + 32) >> 6).clamp(0, 255) as u8;
        }
    }
}

/// 前向/后向/当前图像的强度补偿表
#[derive(Debug, Clone, Default)]
pub(super) struct IcState {
    pub last: IcLuts,
    pub next: IcLuts,
    aux: IcLuts,
    curr_is_aux: bool,
}

impl IcState {
    /// 每帧首个图像头时轮换. B/BI 帧不改变参考的表.
    pub(super) fn rotate(&mut self, is_b: bool) {
        if is_b {
            self.curr_is_aux = true;
        } else {
            std::mem::swap(&mut self.last, &mut self.next);
            self.curr_is_aux = false;
        }
        *self.curr_mut() = IcLuts::default();
    }

    pub(super) fn curr(&self) -> &IcLuts {
        if self.curr_is_aux { &self.aux } else { &self.next }
    }

    pub(super) fn curr_mut(&mut self) -> &mut IcLuts {
        if self.curr_is_aux { &mut self.aux } else { &mut self.next }
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================
// 图像头
// ============================================================

/// 图像头解析环境
pub(super) struct HeaderEnv<'a> {
    pub seq: &'a SequenceHeader,
    pub tables: &'a Vc1Tables,
    pub luts: &'a mut IcState,
    /// 每帧的首个图像头 (第二场与切片重复头为 false)
    pub first_pic_header: bool,
    /// 切片携带的完整图像头
    pub pic_header_flag: bool,
    pub mb_width: usize,
    /// 按逐行计算的宏块行数
    pub mb_height: usize,
}

#[derive(Debug, Clone, Default)]
pub(super) struct PictureHeader {
    pub pict_type: Vc1PictureType,
    pub fcm: FrameCodingMode,
    pub field_mode: bool,
    pub second_field: bool,
    pub fptype: u32,
    pub tff: bool,
    pub rff: bool,
    pub rptfrm: u32,
    /// 当前场极性: 0 顶场, 1 底场
    pub cur_field_type: usize,
    /// [前向, 后向] 参考场极性
    pub ref_field_type: [usize; 2],
    pub p_frame_skipped: bool,
    /// 本帧宏块行数 (场图像按 2 对齐)
    pub mb_height: usize,

    pub interpfrm: bool,
    pub rangeredfrm: bool,
    pub respic: u32,
    pub x8_type: bool,
    pub rnd: i32,
    pub uvsamp: bool,
    pub postproc: u32,

    pub bfraction: i32,
    pub refdist: i32,
    pub frfd: i32,
    pub brfd: i32,
    /// 场 P 图像使用两个参考场
    pub numref: bool,
    pub reffield: usize,

    pub pqindex: u32,
    pub pq: i32,
    pub halfpq: i32,
    pub pquantizer: bool,
    pub altpq: i32,
    pub dquantfrm: bool,
    pub dqprofile: DqProfile,
    pub dqsbedge: u32,
    pub dqbilevel: bool,

    pub mvrange: u32,
    pub dmvrange: u32,
    pub k_x: u32,
    pub k_y: u32,
    pub range_x: i32,
    pub range_y: i32,
    pub mv_mode: MvMode,
    pub mv_mode2: MvMode,
    pub quarter_sample: bool,
    pub mspel: bool,
    pub intcomp: bool,
    pub intcompfield: u32,

    pub mv_table_index: usize,
    pub cbptab: usize,
    pub ttmbf: bool,
    pub ttfrm: TransformType,
    pub tt_index: usize,
    pub c_ac_table_index: usize,
    pub y_ac_table_index: usize,
    pub dc_table_index: usize,
    pub mbmodetab: usize,
    pub imvtab: usize,
    pub icbptab: usize,
    pub twomvbptab: usize,
    pub fourmvbptab: usize,
    pub fourmvswitch: bool,
    pub condover: Condover,

    pub mv_type_plane: Bitplane,
    pub skip_plane: Bitplane,
    pub direct_plane: Bitplane,
    pub forward_plane: Bitplane,
    pub fieldtx_plane: Bitplane,
    pub acpred_plane: Bitplane,
    pub over_flags_plane: Bitplane,
}

impl PictureHeader {
    /// 图像是否使用混合 1MV/4MV
    pub(super) fn is_mixed_mv(&self) -> bool {
        self.mv_mode == MvMode::MixedMv
            || (self.mv_mode == MvMode::IntensityComp && self.mv_mode2 == MvMode::MixedMv)
    }

    fn reset_planes(&mut self, w: usize, h: usize) {
        for p in [
            &mut self.mv_type_plane,
            &mut self.skip_plane,
            &mut self.direct_plane,
            &mut self.forward_plane,
            &mut self.fieldtx_plane,
            &mut self.acpred_plane,
            &mut self.over_flags_plane,
        ] {
            p.reset(w, h);
        }
    }

    fn set_mv_ranges(&mut self) {
        self.k_x = self.mvrange + 9 + (self.mvrange >> 1);
        self.k_y = self.mvrange + 8;
        self.range_x = 1 << (self.k_x - 1);
        self.range_y = 1 << (self.k_y - 1);
    }

    fn read_pquant(&mut self, br: &mut BitReader, seq: &SequenceHeader) -> TaoResult<()> {
        let pqindex = br.read_bits(5)?;
        if pqindex == 0 {
            return Err(TaoError::InvalidData("VC-1: PQINDEX 为 0".into()));
        }
        let table = if seq.quantizer_mode == QuantMode::FrameImplicit { 0 } else { 1 };
        self.pq = i32::from(PQUANT_TABLE[table][pqindex as usize]);
        self.pqindex = pqindex;
        self.halfpq = if pqindex < 9 { br.read_bit()? as i32 } else { 0 };
        self.pquantizer = match seq.quantizer_mode {
            QuantMode::FrameImplicit => pqindex < 9,
            QuantMode::NonUniform => false,
            QuantMode::FrameExplicit => read_flag(br)?,
            QuantMode::Uniform => true,
        };
        self.dquantfrm = false;
        Ok(())
    }

    fn read_bfraction(&mut self, br: &mut BitReader, tables: &Vc1Tables) -> TaoResult<()> {
        let idx = tables.bfraction.decode(br)?;
        let v = BFRACTION_LUT[idx];
        if v < 0 {
            return Err(TaoError::InvalidData("VC-1: 非法 BFRACTION".into()));
        }
        self.bfraction = i32::from(v);
        Ok(())
    }

    /// VOPDQUANT: 宏块级量化参数
    fn read_vop_dquant(&mut self, br: &mut BitReader, seq: &SequenceHeader) -> TaoResult<()> {
        if seq.dquant != 2 {
            self.dquantfrm = read_flag(br)?;
            if !self.dquantfrm {
                return Ok(());
            }
            self.dqprofile = DqProfile::from_bits(br.read_bits(2)?);
            match self.dqprofile {
                DqProfile::SingleEdge | DqProfile::DoubleEdges => {
                    self.dqsbedge = br.read_bits(2)?;
                }
                DqProfile::AllMbs => {
                    self.dqbilevel = read_flag(br)?;
                    if !self.dqbilevel {
                        self.halfpq = 0;
                        return Ok(());
                    }
                }
                DqProfile::FourEdges => {}
            }
        } else {
            // 每帧可变量化, 四边均用 ALTPQUANT
            self.dquantfrm = true;
            self.dqprofile = DqProfile::FourEdges;
        }
        let pqdiff = br.read_bits(3)? as i32;
        self.altpq = if pqdiff == 7 {
            br.read_bits(5)? as i32
        } else {
            self.pq + pqdiff + 1
        };
        Ok(())
    }

    fn read_transform_flags(&mut self, br: &mut BitReader, seq: &SequenceHeader) -> TaoResult<()> {
        if seq.vstransform {
            self.ttmbf = read_flag(br)?;
            self.ttfrm = if self.ttmbf {
                TTFRM_TO_TT[br.read_bits(2)? as usize]
            } else {
                TransformType::T8x8
            };
        } else {
            self.ttmbf = true;
            self.ttfrm = TransformType::T8x8;
        }
        Ok(())
    }

    fn set_qs_from_mode(&mut self) {
        let mode = if self.mv_mode == MvMode::IntensityComp {
            self.mv_mode2
        } else {
            self.mv_mode
        };
        self.quarter_sample = mode != MvMode::OneMvHpel && mode != MvMode::OneMvHpelBilin;
        self.mspel = mode != MvMode::OneMvHpelBilin;
    }

    /// Simple/Main 图像头
    pub(super) fn parse_simple(&mut self, br: &mut BitReader, env: &mut HeaderEnv<'_>) -> TaoResult<()> {
        let seq = env.seq;
        let tables = env.tables;
        self.field_mode = false;
        self.second_field = false;
        self.fcm = FrameCodingMode::Progressive;
        self.p_frame_skipped = false;
        self.mb_height = env.mb_height;
        self.reset_planes(env.mb_width, env.mb_height);

        if seq.finterpflag {
            self.interpfrm = read_flag(br)?;
        }
        br.skip_bits(2)?; // FRMCNT
        self.rangeredfrm = seq.rangered && read_flag(br)?;
        self.pict_type = if read_flag(br)? {
            Vc1PictureType::P
        } else if seq.max_b_frames > 0 && !read_flag(br)? {
            Vc1PictureType::B
        } else {
            Vc1PictureType::I
        };
        if self.pict_type == Vc1PictureType::B {
            self.read_bfraction(br, tables)?;
            if self.bfraction == 0 {
                self.pict_type = Vc1PictureType::BI;
            }
        }
        if self.pict_type.is_intra() {
            br.skip_bits(7)?; // BF
        }

        match self.pict_type {
            Vc1PictureType::I | Vc1PictureType::BI => self.rnd = 1,
            Vc1PictureType::P => self.rnd ^= 1,
            Vc1PictureType::B => {}
        }

        self.read_pquant(br, seq)?;
        if seq.extended_mv {
            self.mvrange = read_unary_limited(br, 0, 3)?;
        }
        self.set_mv_ranges();
        if seq.multires && self.pict_type != Vc1PictureType::B {
            self.respic = br.read_bits(2)?;
        }
        self.x8_type = seq.res_x8 && self.pict_type.is_intra() && read_flag(br)?;

        if env.first_pic_header {
            env.luts.rotate(self.pict_type.is_b());
        }

        match self.pict_type {
            Vc1PictureType::P => {
                self.tt_index = usize::from(self.pq > 4) + usize::from(self.pq > 12);
                let lowquant = usize::from(self.pq <= 12);
                self.mv_mode = MV_PMODE_TABLE[lowquant][read_unary_limited(br, 1, 4)? as usize];
                if self.mv_mode == MvMode::IntensityComp {
                    self.mv_mode2 = MV_PMODE_TABLE2[lowquant][read_unary_limited(br, 1, 3)? as usize];
                    let lumscale = br.read_bits(6)?;
                    let lumshift = br.read_bits(6)?;
                    env.luts.last.use_ic = true;
                    env.luts.last.apply(0, lumscale, lumshift, true);
                    env.luts.last.apply(1, lumscale, lumshift, true);
                }
                self.set_qs_from_mode();
                if self.is_mixed_mv() {
                    self.mv_type_plane.decode(br, tables)?;
                } else {
                    self.mv_type_plane.clear();
                }
                self.skip_plane.decode(br, tables)?;
                self.mv_table_index = br.read_bits(2)? as usize;
                self.cbptab = br.read_bits(2)? as usize;
                if seq.dquant != 0 {
                    self.read_vop_dquant(br, seq)?;
                }
                self.read_transform_flags(br, seq)?;
            }
            Vc1PictureType::B => {
                self.tt_index = usize::from(self.pq > 4) + usize::from(self.pq > 12);
                self.mv_mode = if read_flag(br)? {
                    MvMode::OneMv
                } else {
                    MvMode::OneMvHpelBilin
                };
                self.quarter_sample = self.mv_mode == MvMode::OneMv;
                self.mspel = self.quarter_sample;
                self.direct_plane.decode(br, tables)?;
                self.skip_plane.decode(br, tables)?;
                self.mv_table_index = br.read_bits(2)? as usize;
                self.cbptab = br.read_bits(2)? as usize;
                if seq.dquant != 0 {
                    self.read_vop_dquant(br, seq)?;
                }
                self.read_transform_flags(br, seq)?;
            }
            _ => {}
        }

        if !self.x8_type {
            self.c_ac_table_index = decode012(br)? as usize;
            if self.pict_type.is_intra() {
                self.y_ac_table_index = decode012(br)? as usize;
            }
            self.dc_table_index = br.read_bit()? as usize;
        }
        self.log_header();
        Ok(())
    }

    /// Advanced 档次图像头 (帧, 场, 或切片重复头)
    pub(super) fn parse_advanced(&mut self, br: &mut BitReader, env: &mut HeaderEnv<'_>) -> TaoResult<()> {
        let seq = env.seq;
        let tables = env.tables;
        self.numref = false;
        self.p_frame_skipped = false;

        let common_only = if self.second_field {
            if self.fcm != FrameCodingMode::InterlacedField || !self.field_mode {
                return Err(TaoError::InvalidData("VC-1: 非场图像出现第二场".into()));
            }
            self.pict_type = match (self.fptype & 4 != 0, self.fptype & 1 != 0) {
                (true, true) => Vc1PictureType::BI,
                (true, false) => Vc1PictureType::B,
                (false, true) => Vc1PictureType::P,
                (false, false) => Vc1PictureType::I,
            };
            !env.pic_header_flag
        } else {
            false
        };

        if !common_only {
            let fcm = if seq.interlace {
                match decode012(br)? {
                    0 => FrameCodingMode::Progressive,
                    1 => FrameCodingMode::InterlacedFrame,
                    _ => FrameCodingMode::InterlacedField,
                }
            } else {
                FrameCodingMode::Progressive
            };
            let field_mode = fcm == FrameCodingMode::InterlacedField;
            if !env.first_pic_header && self.field_mode != field_mode {
                return Err(TaoError::InvalidData("VC-1: 切片头的场模式与帧不一致".into()));
            }
            self.field_mode = field_mode;
            self.fcm = fcm;
            if field_mode {
                self.mb_height = (env.mb_height + 1) & !1;
                self.fptype = br.read_bits(3)?;
                self.pict_type = match (self.fptype & 4 != 0, self.fptype & 2 != 0) {
                    (true, true) => Vc1PictureType::BI,
                    (true, false) => Vc1PictureType::B,
                    (false, true) => Vc1PictureType::P,
                    (false, false) => Vc1PictureType::I,
                };
            } else {
                self.mb_height = env.mb_height;
                self.pict_type = match read_unary_limited(br, 0, 4)? {
                    0 => Vc1PictureType::P,
                    1 => Vc1PictureType::B,
                    2 => Vc1PictureType::I,
                    3 => Vc1PictureType::BI,
                    _ => {
                        self.p_frame_skipped = true;
                        Vc1PictureType::P
                    }
                };
            }
            if seq.tfcntrflag {
                br.skip_bits(8)?;
            }
            if seq.broadcast {
                if !seq.interlace || seq.psf {
                    self.rptfrm = br.read_bits(2)?;
                } else {
                    self.tff = read_flag(br)?;
                    self.rff = read_flag(br)?;
                }
            } else {
                self.tff = true;
            }
            if seq.panscanflag && read_flag(br)? {
                let windows = if seq.interlace && !seq.psf {
                    if seq.broadcast { 2 + u32::from(self.rff) } else { 2 }
                } else if seq.broadcast {
                    1 + self.rptfrm
                } else {
                    1
                };
                for _ in 0..windows {
                    br.skip_bits(18 + 18 + 14 + 14)?;
                }
            }
            if self.p_frame_skipped {
                self.log_header();
                return Ok(());
            }
            self.rnd = br.read_bit()? as i32;
            if seq.interlace {
                self.uvsamp = read_flag(br)?;
            }
            if self.field_mode {
                if !seq.refdist_flag {
                    self.refdist = 0;
                } else if !self.pict_type.is_b() {
                    self.refdist = br.read_bits(2)? as i32;
                    if self.refdist == 3 {
                        self.refdist += read_unary_limited(br, 0, 14)? as i32;
                    }
                    if self.refdist > 16 {
                        return Err(TaoError::InvalidData("VC-1: REFDIST 超出范围".into()));
                    }
                }
                if self.pict_type.is_b() {
                    self.read_bfraction(br, tables)?;
                    self.frfd = (self.bfraction * self.refdist) >> 8;
                    self.brfd = (self.refdist - self.frfd - 1).max(0);
                }
            } else if self.fcm == FrameCodingMode::Progressive {
                if seq.finterpflag {
                    self.interpfrm = read_flag(br)?;
                }
                if self.pict_type == Vc1PictureType::B {
                    self.read_bfraction(br, tables)?;
                    if self.bfraction == 0 {
                        self.pict_type = Vc1PictureType::BI;
                    }
                }
            }
        }

        // 各场共有部分
        if self.field_mode {
            self.cur_field_type = usize::from(self.tff == self.second_field);
        }
        self.reset_planes(env.mb_width, self.mb_height >> usize::from(self.field_mode));
        self.read_pquant(br, seq)?;
        if seq.postprocflag {
            self.postproc = br.read_bits(2)?;
        }
        if env.first_pic_header {
            env.luts.rotate(self.pict_type.is_b());
        }

        match self.pict_type {
            Vc1PictureType::I | Vc1PictureType::BI => {
                if self.fcm == FrameCodingMode::InterlacedFrame {
                    self.fieldtx_plane.decode(br, tables)?;
                }
                self.acpred_plane.decode(br, tables)?;
                self.condover = Condover::None;
                if seq.overlap && self.pq <= 8 {
                    self.condover = match decode012(br)? {
                        0 => Condover::None,
                        1 => Condover::All,
                        _ => Condover::Select,
                    };
                    if self.condover == Condover::Select {
                        self.over_flags_plane.decode(br, tables)?;
                    }
                }
            }
            Vc1PictureType::P => self.parse_advanced_p(br, env)?,
            Vc1PictureType::B => self.parse_advanced_b(br, env)?,
        }

        self.c_ac_table_index = decode012(br)? as usize;
        if self.pict_type.is_intra() {
            self.y_ac_table_index = decode012(br)? as usize;
        } else if self.fcm != FrameCodingMode::Progressive && !self.quarter_sample {
            self.range_x <<= 1;
            self.range_y <<= 1;
        }
        self.dc_table_index = br.read_bit()? as usize;
        if self.pict_type.is_intra() && seq.dquant != 0 {
            self.read_vop_dquant(br, seq)?;
        }
        self.log_header();
        Ok(())
    }

    fn parse_advanced_p(&mut self, br: &mut BitReader, env: &mut HeaderEnv<'_>) -> TaoResult<()> {
        let seq = env.seq;
        let tables = env.tables;
        if self.field_mode {
            self.numref = read_flag(br)?;
            if !self.numref {
                self.reffield = br.read_bit()? as usize;
                self.ref_field_type[0] = self.reffield ^ usize::from(self.cur_field_type == 0);
            }
        }
        self.mvrange = if seq.extended_mv { read_unary_limited(br, 0, 3)? } else { 0 };
        if seq.interlace {
            self.dmvrange = if seq.extended_dmv { read_unary_limited(br, 0, 3)? } else { 0 };
            if self.fcm == FrameCodingMode::InterlacedFrame {
                self.fourmvswitch = read_flag(br)?;
                self.intcomp = read_flag(br)?;
                if self.intcomp {
                    let lumscale = br.read_bits(6)?;
                    let lumshift = br.read_bits(6)?;
                    env.luts.last.apply(0, lumscale, lumshift, true);
                    env.luts.last.apply(1, lumscale, lumshift, true);
                    env.luts.last.use_ic = true;
                }
                self.skip_plane.decode(br, tables)?;
                self.mbmodetab = br.read_bits(2)? as usize;
                self.imvtab = br.read_bits(2)? as usize;
                self.icbptab = br.read_bits(3)? as usize;
                self.twomvbptab = br.read_bits(2)? as usize;
                if self.fourmvswitch {
                    self.fourmvbptab = br.read_bits(2)? as usize;
                }
            }
        }
        self.set_mv_ranges();
        self.tt_index = usize::from(self.pq > 4) + usize::from(self.pq > 12);

        if self.fcm != FrameCodingMode::InterlacedFrame {
            let lowquant = usize::from(self.pq <= 12);
            self.mv_mode = MV_PMODE_TABLE[lowquant][read_unary_limited(br, 1, 4)? as usize];
            if self.mv_mode == MvMode::IntensityComp {
                self.mv_mode2 = MV_PMODE_TABLE2[lowquant][read_unary_limited(br, 1, 3)? as usize];
                self.intcompfield = if self.field_mode { decode210(br)? ^ 3 } else { 3 };
                let (mut lumscale, mut lumshift) = (32, 0);
                let (mut lumscale2, mut lumshift2) = (32, 0);
                if self.intcompfield & 1 != 0 {
                    lumscale = br.read_bits(6)?;
                    lumshift = br.read_bits(6)?;
                }
                if self.intcompfield & 2 != 0 && self.field_mode {
                    lumscale2 = br.read_bits(6)?;
                    lumshift2 = br.read_bits(6)?;
                } else if !self.field_mode {
                    lumscale2 = lumscale;
                    lumshift2 = lumshift;
                }
                if self.field_mode && self.second_field {
                    let cur = self.cur_field_type;
                    // 另一场在本帧内, 使用当前图像的表
                    let (first, second) = if cur == 1 {
                        ((lumscale, lumshift), (lumscale2, lumshift2))
                    } else {
                        ((lumscale2, lumshift2), (lumscale, lumshift))
                    };
                    env.luts.curr_mut().apply(cur ^ 1, first.0, first.1, false);
                    env.luts.last.apply(cur, second.0, second.1, true);
                    env.luts.curr_mut().use_ic = true;
                } else {
                    env.luts.last.apply(0, lumscale, lumshift, true);
                    env.luts.last.apply(1, lumscale2, lumshift2, true);
                }
                env.luts.last.use_ic = true;
            }
            self.set_qs_from_mode();
        }

        match self.fcm {
            FrameCodingMode::Progressive => {
                if self.is_mixed_mv() {
                    self.mv_type_plane.decode(br, tables)?;
                } else {
                    self.mv_type_plane.clear();
                }
                self.skip_plane.decode(br, tables)?;
                self.mv_table_index = br.read_bits(2)? as usize;
                self.cbptab = br.read_bits(2)? as usize;
            }
            FrameCodingMode::InterlacedFrame => {
                self.quarter_sample = true;
                self.mspel = true;
            }
            FrameCodingMode::InterlacedField => {
                self.mbmodetab = br.read_bits(3)? as usize;
                self.imvtab = br.read_bits(2 + u32::from(self.numref))? as usize;
                self.icbptab = br.read_bits(3)? as usize;
                if self.is_mixed_mv() {
                    self.fourmvbptab = br.read_bits(2)? as usize;
                }
            }
        }
        if seq.dquant != 0 {
            self.read_vop_dquant(br, seq)?;
        }
        self.read_transform_flags(br, seq)
    }

    fn parse_advanced_b(&mut self, br: &mut BitReader, env: &mut HeaderEnv<'_>) -> TaoResult<()> {
        let seq = env.seq;
        let tables = env.tables;
        if self.fcm == FrameCodingMode::InterlacedFrame {
            self.read_bfraction(br, tables)?;
            if self.bfraction == 0 {
                return Err(TaoError::InvalidData("VC-1: 隔行帧 B 图像的 BFRACTION 为 0".into()));
            }
        }
        self.mvrange = if seq.extended_mv { read_unary_limited(br, 0, 3)? } else { 0 };
        self.set_mv_ranges();
        self.tt_index = usize::from(self.pq > 4) + usize::from(self.pq > 12);

        match self.fcm {
            FrameCodingMode::InterlacedField => {
                if seq.extended_dmv {
                    self.dmvrange = read_unary_limited(br, 0, 3)?;
                }
                let lowquant = usize::from(self.pq <= 12);
                self.mv_mode = MV_PMODE_TABLE2[lowquant][read_unary_limited(br, 1, 3)? as usize];
                self.quarter_sample = matches!(self.mv_mode, MvMode::OneMv | MvMode::MixedMv);
                self.mspel = self.mv_mode != MvMode::OneMvHpelBilin;
                self.forward_plane.decode(br, tables)?;
                self.mbmodetab = br.read_bits(3)? as usize;
                self.imvtab = br.read_bits(3)? as usize;
                self.icbptab = br.read_bits(3)? as usize;
                if self.mv_mode == MvMode::MixedMv {
                    self.fourmvbptab = br.read_bits(2)? as usize;
                }
                self.numref = true;
            }
            FrameCodingMode::InterlacedFrame => {
                if seq.extended_dmv {
                    self.dmvrange = read_unary_limited(br, 0, 3)?;
                }
                if read_flag(br)? {
                    warn!("VC-1: B 图像置位了强度补偿");
                }
                self.intcomp = false;
                self.mv_mode = MvMode::OneMv;
                self.fourmvswitch = false;
                self.quarter_sample = true;
                self.mspel = true;
                self.direct_plane.decode(br, tables)?;
                self.skip_plane.decode(br, tables)?;
                self.mbmodetab = br.read_bits(2)? as usize;
                self.imvtab = br.read_bits(2)? as usize;
                self.icbptab = br.read_bits(3)? as usize;
                self.twomvbptab = br.read_bits(2)? as usize;
                self.fourmvbptab = br.read_bits(2)? as usize;
            }
            FrameCodingMode::Progressive => {
                self.mv_mode = if read_flag(br)? {
                    MvMode::OneMv
                } else {
                    MvMode::OneMvHpelBilin
                };
                self.quarter_sample = self.mv_mode == MvMode::OneMv;
                self.mspel = self.quarter_sample;
                self.direct_plane.decode(br, tables)?;
                self.skip_plane.decode(br, tables)?;
                self.mv_table_index = br.read_bits(2)? as usize;
                self.cbptab = br.read_bits(2)? as usize;
            }
        }
        if seq.dquant != 0 {
            self.read_vop_dquant(br, seq)?;
        }
        self.read_transform_flags(br, seq)
    }

    fn log_header(&self) {
        debug!(
            "VC-1 图像头: type={:?}, fcm={:?}, field={} second={}, pq={} (idx {}, half {}), mv_mode={:?}, qs={}, skipped={}",
            self.pict_type,
            self.fcm,
            self.field_mode,
            self.second_field,
            self.pq,
            self.pqindex,
            self.halfpq,
            self.mv_mode,
            self.quarter_sample,
            self.p_frame_skipped
        );
    }
}
