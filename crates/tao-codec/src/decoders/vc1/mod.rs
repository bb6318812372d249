//! VC-1 / WMV3 视频解码器
//!
//! 实现 SMPTE 421M (VC-1) 的 Simple/Main/Advanced 档次解码, WMV3 即 Main 档次.
//!
//! 已实现:
//! - 序列头 (STRUCT_C 与 Advanced 起始码), 入口点, 图像头, 切片头与场头
//! - 起始码分帧与 `00 00 03` 反转义
//! - 位平面解码 (Raw, Norm-2, Diff-2, Norm-6, Diff-6, Rowskip, Colskip)
//! - I/P/B/BI 图像, 逐行帧, 隔行帧与隔行场
//! - 1MV/4MV/2MV 场宏块, 跳过宏块, B 帧 Direct/前向/后向/插值
//! - AC/DC 预测, 三种转义模式, 8x8/8x4/4x8/4x4 变换
//! - 运动补偿 (双三次 1/4 像素与双线性), 强度补偿
//! - 重叠平滑与去块环路滤波
//! - 范围缩减 (RANGEREDFRM) 与输出范围映射
//!
//! 码表不随代码分发, 需通过 [`Vc1Decoder::with_tables`] 注入,
//! 或由环境变量 `TAO_VC1_TABLES` 指定 JSON 资源.
//!
//! ## 模块结构
//!
//! - `types`: 类型定义 (档次, 图像类型, MV 模式, 宏块模式等)
//! - `tables`: 常量表 (量化, MV 偏移, 宏块模式映射等)
//! - `vlc`: 码表资源加载与 VLC 解码
//! - `config`: 环境变量配置
//! - `syntax`: 共用的位流语法元素
//! - `bitplane`: 位平面解码
//! - `header`: 序列头, 入口点与图像头解析
//! - `picture`: 图像缓冲与宏块网格
//! - `context`: 切片/场解码状态
//! - `block`: 8x8 块系数解码
//! - `pred`: DC/AC 与运动向量预测
//! - `dsp`: 反变换, 重叠平滑与环路滤波原语
//! - `mc`: 运动补偿
//! - `mb_p`, `mb_b`: P/B 宏块解码
//! - `loopfilter`: 去块环路滤波调度
//! - `frame_decode`: 切片驱动

mod bitplane;
mod block;
mod config;
mod context;
mod dsp;
mod frame_decode;
mod header;
mod loopfilter;
mod mb_b;
mod mb_p;
mod mc;
mod picture;
mod pred;
mod syntax;
mod tables;
#[cfg(test)]
mod tests;
mod types;
mod vlc;

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, error, trace, warn};
use tao_core::{BitReader, PixelFormat, Rational, TaoError, TaoResult};

use crate::codec_id::CodecId;
use crate::codec_parameters::{CodecParameters, CodecParamsType};
use crate::decoder::Decoder;
use crate::frame::{Frame, VideoFrame};
use crate::packet::Packet;

pub use config::Vc1Config;
pub use vlc::{AcCodingSetBook, CodeWord, ScanBook, Vc1CodeBooks, Vc1Tables};

use context::{PictureDecoder, Vc1Context};
use frame_decode::decode_skip_picture;
use header::{HeaderEnv, IcState, PictureHeader, SequenceHeader};
use picture::Picture;

// ============================================================================
// 起始码与分帧
// ============================================================================

const SC_END_OF_SEQUENCE: u8 = 0x0A;
const SC_SLICE: u8 = 0x0B;
const SC_FIELD: u8 = 0x0C;
const SC_FRAME: u8 = 0x0D;
const SC_ENTRY_POINT: u8 = 0x0E;
const SC_SEQUENCE: u8 = 0x0F;

/// 查找 `from` 之后的下一个起始码 `00 00 01 xx`, 找不到时返回数据长度
pub(super) fn find_start_code(data: &[u8], from: usize) -> usize {
    let mut i = from;
    while i + 3 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            return i;
        }
        i += 1;
    }
    data.len()
}

/// 去除防竞争字节: `00 00 03 xx` (xx <= 3) 中的 03
pub(super) fn unescape(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    if src.len() < 4 {
        out.extend_from_slice(src);
        return out;
    }
    let mut i = 0;
    while i < src.len() {
        if src[i] == 3
            && i >= 2
            && src[i - 1] == 0
            && src[i - 2] == 0
            && i + 1 < src.len()
            && src[i + 1] < 4
        {
            out.push(src[i + 1]);
            i += 2;
        } else {
            out.push(src[i]);
            i += 1;
        }
    }
    out
}

/// 起始码分隔的数据单元, `code` 为 `None` 表示首个起始码之前的裸帧数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Unit<'a> {
    pub code: Option<u8>,
    pub payload: &'a [u8],
}

/// 按起始码切分数据包, 空单元被丢弃
pub(super) fn split_units(data: &[u8]) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    let first = find_start_code(data, 0);
    if first > 0 {
        units.push(Unit {
            code: None,
            payload: &data[..first],
        });
    }
    let mut pos = first;
    while pos < data.len() {
        let next = find_start_code(data, pos + 4);
        if next > pos + 4 {
            units.push(Unit {
                code: Some(data[pos + 3]),
                payload: &data[pos + 4..next],
            });
        }
        pos = next;
    }
    units
}

/// 输出范围映射: `((x - 128) * (map + 9) + 4 >> 3) + 128`
pub(super) fn range_map_sample(v: u8, map: u32) -> u8 {
    let mapped = (((v as i32 - 128) * (map as i32 + 9) + 4) >> 3) + 128;
    mapped.clamp(0, 255) as u8
}

/// 一帧中按出现顺序排列的附加段
#[derive(Debug, Default)]
struct FrameSegments {
    /// 第二场数据 (场起始码)
    field: Option<Vec<u8>>,
    /// [第一场, 第二场] 的切片数据, 含 9 位 SLICE_ADDR
    slices: [Vec<Vec<u8>>; 2],
}

/// 切片任务: 起始宏块行与数据
struct SliceJob {
    mb_row: usize,
    data: Vec<u8>,
    /// 切片头携带完整图像头
    header_repeat: bool,
}

// ============================================================================
// 解码器
// ============================================================================

/// VC-1 / WMV3 解码器
pub struct Vc1Decoder {
    codec_id: CodecId,
    opened: bool,
    cfg: Vc1Config,
    /// 配置由调用方指定, `open()` 不再读取环境变量
    cfg_fixed: bool,
    tables: Option<Arc<Vc1Tables>>,
    seq: SequenceHeader,
    /// 已获得可用序列头
    seq_ready: bool,
    hdr: PictureHeader,
    luts: IcState,
    st: Option<Vc1Context>,
    /// 当前几何: (宏块列数, 逐行宏块行数)
    geometry: Option<(usize, usize)>,
    /// 容器给出的显示尺寸
    width: u32,
    height: u32,
    time_base: Rational,
    /// 较早的参考图像 (前向)
    last: Option<Arc<Picture>>,
    /// 最近的参考图像 (后向)
    next: Option<Arc<Picture>>,
    /// 等待输出的参考图像 (存在 B 帧时延迟一帧)
    delayed: Option<Arc<Picture>>,
    output: VecDeque<VideoFrame>,
    frame_count: u64,
}

impl Vc1Decoder {
    /// 创建解码器, 码表在 `open()` 时从 `TAO_VC1_TABLES` 加载
    pub fn create() -> TaoResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new(None)))
    }

    /// 创建 WMV3 解码器
    pub fn create_wmv3() -> TaoResult<Box<dyn Decoder>> {
        let mut dec = Self::new(None);
        dec.codec_id = CodecId::Wmv3;
        Ok(Box::new(dec))
    }

    /// 使用已编译的码表创建解码器
    pub fn with_tables(tables: Arc<Vc1Tables>) -> Self {
        Self::new(Some(tables))
    }

    fn new(tables: Option<Arc<Vc1Tables>>) -> Self {
        Self {
            codec_id: CodecId::Vc1,
            opened: false,
            cfg: Vc1Config::default(),
            cfg_fixed: false,
            tables,
            seq: SequenceHeader::default(),
            seq_ready: false,
            hdr: PictureHeader::default(),
            luts: IcState::default(),
            st: None,
            geometry: None,
            width: 0,
            height: 0,
            time_base: Rational::UNDEFINED,
            last: None,
            next: None,
            delayed: None,
            output: VecDeque::new(),
            frame_count: 0,
        }
    }

    /// 使用指定配置 (替代环境变量)
    pub fn set_config(&mut self, cfg: Vc1Config) {
        self.cfg = cfg;
        self.cfg_fixed = true;
    }

    fn tables(&self) -> TaoResult<Arc<Vc1Tables>> {
        self.tables.clone().ok_or_else(|| {
            TaoError::Codec(
                "VC-1: 缺少码表资源, 请设置 TAO_VC1_TABLES 或使用 Vc1Decoder::with_tables".into(),
            )
        })
    }

    // ========================================================================
    // 头部单元
    // ========================================================================

    /// 解析 Advanced 档次的扩展数据 (可带 1 字节长度前缀)
    fn parse_extradata_units(&mut self, extra: &[u8]) -> TaoResult<()> {
        let units = split_units(extra);
        let mut found = false;
        for unit in units.iter().filter(|u| u.code.is_some()) {
            self.handle_header_unit(*unit)?;
            found = true;
        }
        if !found && !extra.is_empty() {
            warn!("VC-1: 扩展数据中未找到起始码 ({} 字节)", extra.len());
        }
        Ok(())
    }

    /// 处理序列头与入口点单元, 返回是否已处理
    fn handle_header_unit(&mut self, unit: Unit<'_>) -> TaoResult<bool> {
        match unit.code {
            Some(SC_SEQUENCE) => {
                let buf = unescape(unit.payload);
                let mut br = BitReader::new(&buf);
                let seq = SequenceHeader::parse(&mut br)?;
                if !seq.is_advanced() {
                    return Err(TaoError::InvalidData(
                        "VC-1: 起始码流中的序列头不是 Advanced 档次".into(),
                    ));
                }
                self.seq = seq;
                self.seq_ready = true;
                Ok(true)
            }
            Some(SC_ENTRY_POINT) => {
                if !self.seq_ready {
                    warn!("VC-1: 序列头之前出现入口点, 已忽略");
                    return Ok(true);
                }
                let buf = unescape(unit.payload);
                let mut br = BitReader::new(&buf);
                self.seq.parse_entry_point(&mut br)?;
                Ok(true)
            }
            Some(SC_END_OF_SEQUENCE) => {
                debug!("VC-1: 序列结束");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // ========================================================================
    // 几何与状态
    // ========================================================================

    /// 编码尺寸: Advanced 取序列头, 否则取容器参数
    fn coded_size(&self) -> Option<(u32, u32)> {
        let (w, h) = self
            .seq
            .coded_dimensions()
            .unwrap_or((self.width, self.height));
        (w > 0 && h > 0).then_some((w, h))
    }

    /// 按当前尺寸准备解码状态, 尺寸变化时丢弃参考
    fn ensure_context(&mut self) -> TaoResult<(usize, usize)> {
        let (w, h) = self
            .coded_size()
            .ok_or_else(|| TaoError::InvalidData("VC-1: 图像尺寸未知".into()))?;
        let dims = ((w as usize).div_ceil(16), (h as usize).div_ceil(16));
        if self.geometry != Some(dims) || self.st.is_none() {
            debug!(
                "VC-1: 图像几何 {}x{} ({}x{} 宏块), 隔行={}",
                w, h, dims.0, dims.1, self.seq.interlace
            );
            let mut st = Vc1Context::new(dims.0, self.aligned_rows(dims.1));
            st.coded_width = w as i32;
            st.coded_height = h as i32;
            self.st = Some(st);
            self.geometry = Some(dims);
            self.last = None;
            self.next = None;
            if let Some(pic) = self.delayed.take() {
                self.queue_frame(&pic);
            }
        }
        Ok(dims)
    }

    /// 图像缓冲的宏块行数: 隔行序列按 2 对齐
    fn aligned_rows(&self, mb_height: usize) -> usize {
        if self.seq.interlace {
            (mb_height + 1) & !1
        } else {
            mb_height
        }
    }

    fn parse_picture_header(
        &mut self,
        br: &mut BitReader,
        tables: &Vc1Tables,
        (mb_width, mb_height): (usize, usize),
        first_pic_header: bool,
        pic_header_flag: bool,
    ) -> TaoResult<()> {
        let mut env = HeaderEnv {
            seq: &self.seq,
            tables,
            luts: &mut self.luts,
            first_pic_header,
            pic_header_flag,
            mb_width,
            mb_height,
        };
        if self.seq.is_advanced() {
            self.hdr.parse_advanced(br, &mut env)
        } else {
            self.hdr.parse_simple(br, &mut env)
        }
    }

    /// 解码当前场 (或帧) 的 [start, end) 宏块行, 返回读取器已消耗的位数
    /// 以当前图像构造宏块解码现场. 参考图像在整帧完成后才轮换:
    /// P/I 帧的前向参考是 `next`, B 帧为 `last`/`next`.
    fn with_picture_decoder<R>(
        &mut self,
        tables: &Vc1Tables,
        cur: &mut Picture,
        br: BitReader<'_>,
        f: impl FnOnce(&mut PictureDecoder<'_>) -> TaoResult<R>,
    ) -> TaoResult<R> {
        let (last, next) = if cur.pict_type.is_b() {
            (self.last.as_deref(), self.next.as_deref())
        } else {
            (self.next.as_deref(), None)
        };
        let st = self
            .st
            .as_mut()
            .ok_or_else(|| TaoError::Codec("VC-1: 解码状态未初始化".into()))?;
        let mut dec = PictureDecoder {
            t: tables,
            seq: &self.seq,
            hdr: &mut self.hdr,
            luts: &self.luts,
            cfg: &self.cfg,
            last,
            next,
            cur,
            st,
            br,
        };
        f(&mut dec)
    }

    fn decode_rows(
        &mut self,
        tables: &Vc1Tables,
        cur: &mut Picture,
        br: BitReader<'_>,
        start: usize,
        end: usize,
    ) -> TaoResult<usize> {
        self.with_picture_decoder(tables, cur, br, |dec| {
            dec.decode_slice(start, end)?;
            Ok(dec.bits_read())
        })
    }

    /// 整个场无法解码: 全部宏块行按丢失处理
    fn conceal_rows(&mut self, tables: &Vc1Tables, cur: &mut Picture, rows: usize) -> TaoResult<()> {
        self.with_picture_decoder(tables, cur, BitReader::new(&[]), |dec| {
            dec.st.begin_slice(0, rows);
            dec.conceal_remaining();
            Ok(())
        })
    }

    fn set_field(&mut self, cur: &Picture, second: bool) {
        let field_mode = self.hdr.field_mode;
        let bottom = self.hdr.cur_field_type == 1;
        if let Some(st) = self.st.as_mut() {
            st.set_field(cur, field_mode, bottom, second);
        }
    }

    // ========================================================================
    // 帧解码
    // ========================================================================

    /// Simple/Main 档次: 每个数据包为一帧
    fn decode_simple_packet(&mut self, tables: &Vc1Tables, packet: &Packet) -> TaoResult<()> {
        if packet.data.len() <= 2 {
            trace!("VC-1: {} 字节数据包, 按跳过帧处理", packet.data.len());
            return self.emit_skipped(packet);
        }
        self.decode_frame(tables, &packet.data, FrameSegments::default(), packet)
    }

    /// Advanced 档次: 按起始码切分, 无起始码时整个数据包为一帧
    fn decode_advanced_packet(&mut self, tables: &Vc1Tables, packet: &Packet) -> TaoResult<()> {
        let mut frame_data: Option<Vec<u8>> = None;
        let mut segments = FrameSegments::default();
        for unit in split_units(&packet.data) {
            if self.handle_header_unit(unit)? {
                continue;
            }
            match unit.code {
                None | Some(SC_FRAME) => frame_data = Some(unescape(unit.payload)),
                Some(SC_FIELD) => segments.field = Some(unescape(unit.payload)),
                Some(SC_SLICE) => {
                    let field = usize::from(segments.field.is_some());
                    segments.slices[field].push(unescape(unit.payload));
                }
                Some(code) => trace!("VC-1: 忽略起始码 0x{code:02X}"),
            }
        }
        let Some(frame_data) = frame_data else {
            trace!("VC-1: 数据包不含帧数据");
            return Ok(());
        };
        if !self.seq_ready {
            warn!("VC-1: 尚未收到序列头, 丢弃帧数据");
            return Ok(());
        }
        self.decode_frame(tables, &frame_data, segments, packet)
    }

    fn decode_frame(
        &mut self,
        tables: &Vc1Tables,
        data: &[u8],
        segments: FrameSegments,
        packet: &Packet,
    ) -> TaoResult<()> {
        let dims = self.ensure_context()?;
        let mut br = BitReader::new(data);
        self.hdr.second_field = false;
        self.parse_picture_header(&mut br, tables, dims, true, false)?;
        if self.hdr.p_frame_skipped {
            return self.emit_skipped(packet);
        }

        let pict_type = self.hdr.pict_type;
        let mut cur = Picture::new(dims.0, self.aligned_rows(dims.1));
        cur.pict_type = pict_type;
        cur.field_picture = self.hdr.field_mode;
        cur.pts = packet.pts;
        cur.duration = packet.duration;
        cur.range_map = [self.seq.range_mapy, self.seq.range_mapuv];
        debug!(
            "VC-1 帧 #{}: {:?}, fcm={:?}, pq={}, 大小={} 字节",
            self.frame_count,
            pict_type,
            self.hdr.fcm,
            self.hdr.pq,
            data.len()
        );

        let field_mode = self.hdr.field_mode;
        let rows = if field_mode {
            self.hdr.mb_height / 2
        } else {
            self.hdr.mb_height
        };

        // 第一场 (或整帧)
        self.set_field(&cur, false);
        let jobs = self.slice_jobs(&segments.slices[0], rows);
        let end = jobs.first().map_or(rows, |j| j.mb_row);
        let mut consumed = 0;
        if end > 0 {
            consumed = self.decode_rows(tables, &mut cur, br, 0, end)?;
        }
        self.decode_slice_jobs(tables, &mut cur, &jobs, rows, dims)?;

        if field_mode {
            // 无场起始码时第二场紧接第一场之后 (按字节对齐)
            let field_data: &[u8] = match segments.field.as_deref() {
                Some(field) => field,
                None => &data[consumed.div_ceil(8).min(data.len())..],
            };
            let mut br = BitReader::new(field_data);
            let first_polarity = self.hdr.cur_field_type;
            self.hdr.second_field = true;
            if let Err(e) = self.parse_picture_header(&mut br, tables, dims, false, false) {
                error!("VC-1: 第二场图像头损坏: {e}");
                self.hdr.cur_field_type = first_polarity ^ 1;
                self.set_field(&cur, true);
                self.conceal_rows(tables, &mut cur, rows)?;
            } else {
                trace!(
                    "VC-1 第二场: {:?}, 极性={}",
                    self.hdr.pict_type, self.hdr.cur_field_type
                );
                self.set_field(&cur, true);
                let jobs = self.slice_jobs(&segments.slices[1], rows);
                let end = jobs.first().map_or(rows, |j| j.mb_row);
                if end > 0 {
                    self.decode_rows(tables, &mut cur, br, 0, end)?;
                }
                self.decode_slice_jobs(tables, &mut cur, &jobs, rows, dims)?;
            }
        }

        self.frame_count += 1;
        let pic = Arc::new(cur);
        if pict_type.is_b() {
            self.queue_frame(&pic);
        } else {
            self.last = self.next.replace(pic.clone());
            self.output_reference(pic);
        }
        Ok(())
    }

    /// 读取切片地址, 按起始行排序并去除越界切片
    fn slice_jobs(&self, slices: &[Vec<u8>], rows: usize) -> Vec<SliceJob> {
        let mut jobs = Vec::with_capacity(slices.len());
        for data in slices {
            let mut br = BitReader::new(data);
            let (Ok(addr), Ok(flag)) = (br.read_bits(9), br.read_bit()) else {
                warn!("VC-1: 切片头截断, 已忽略");
                continue;
            };
            if rows == 0 {
                continue;
            }
            jobs.push(SliceJob {
                mb_row: addr as usize % rows,
                data: data.clone(),
                header_repeat: flag != 0,
            });
        }
        jobs
    }

    fn decode_slice_jobs(
        &mut self,
        tables: &Vc1Tables,
        cur: &mut Picture,
        jobs: &[SliceJob],
        rows: usize,
        dims: (usize, usize),
    ) -> TaoResult<()> {
        for (i, job) in jobs.iter().enumerate() {
            let end = jobs.get(i + 1).map_or(rows, |j| j.mb_row.min(rows));
            if end <= job.mb_row {
                warn!("VC-1: 切片行范围无效 {}..{}", job.mb_row, end);
                continue;
            }
            let mut br = BitReader::new(&job.data);
            br.skip_bits(10)?;
            if job.header_repeat {
                let second = self.hdr.second_field;
                if let Err(e) = self.parse_picture_header(&mut br, tables, dims, false, true) {
                    warn!("VC-1: 切片图像头损坏: {e}");
                    self.hdr.second_field = second;
                    continue;
                }
            }
            trace!("VC-1 切片 #{i}: 行 {}..{end}", job.mb_row);
            self.decode_rows(tables, cur, br, job.mb_row, end)?;
        }
        Ok(())
    }

    /// 跳过帧: 重复最近的参考图像, 并作为新的 P 参考
    fn emit_skipped(&mut self, packet: &Packet) -> TaoResult<()> {
        let Some(prev) = self.next.take() else {
            debug!("VC-1: 跳过帧没有参考图像, 已忽略");
            return Ok(());
        };
        let mut cur = Picture::new(prev.mb_width, prev.mb_height);
        decode_skip_picture(&mut cur, Some(&prev));
        cur.pts = packet.pts;
        cur.duration = packet.duration;
        cur.range_map = prev.range_map;
        self.last = Some(prev);
        let pic = Arc::new(cur);
        self.next = Some(pic.clone());
        self.frame_count += 1;
        self.output_reference(pic);
        Ok(())
    }

    // ========================================================================
    // 输出
    // ========================================================================

    /// 参考图像: 无 B 帧时立即输出, 否则延迟到下一个参考图像
    fn output_reference(&mut self, pic: Arc<Picture>) {
        if self.seq.max_b_frames == 0 {
            self.queue_frame(&pic);
        } else if let Some(prev) = self.delayed.replace(pic) {
            self.queue_frame(&prev);
        }
    }

    fn queue_frame(&mut self, pic: &Picture) {
        let frame = self.picture_to_frame(pic);
        self.output.push_back(frame);
    }

    /// 输出尺寸: 容器尺寸 (不超过图像缓冲), 缺省为编码尺寸
    fn output_size(&self, pic: &Picture) -> (u32, u32) {
        let (cw, ch) = self.coded_size().unwrap_or((
            (pic.mb_width * 16) as u32,
            (pic.mb_height * 16) as u32,
        ));
        let w = if self.width > 0 { self.width } else { cw };
        let h = if self.height > 0 { self.height } else { ch };
        (
            w.min((pic.mb_width * 16) as u32),
            h.min((pic.mb_height * 16) as u32),
        )
    }

    /// 裁剪到显示尺寸并应用范围映射
    fn picture_to_frame(&self, pic: &Picture) -> VideoFrame {
        let (w, h) = self.output_size(pic);
        let mut frame = VideoFrame::new(w, h, PixelFormat::Yuv420p);
        for p in 0..3 {
            let (pw, ph) = if p == 0 {
                (w as usize, h as usize)
            } else {
                ((w as usize).div_ceil(2), (h as usize).div_ceil(2))
            };
            let ls = pic.linesize[p];
            let map = pic.range_map[usize::from(p > 0)];
            let mut out = Vec::with_capacity(pw * ph);
            for y in 0..ph {
                let row = &pic.planes[p][y * ls..y * ls + pw];
                match map {
                    Some(m) => out.extend(row.iter().map(|&v| range_map_sample(v, m))),
                    None => out.extend_from_slice(row),
                }
            }
            frame.data[p] = out;
            frame.linesize[p] = pw;
        }
        frame.pts = pic.pts;
        frame.time_base = self.time_base;
        frame.duration = pic.duration;
        frame.is_keyframe = pic.pict_type.is_intra();
        frame.picture_type = pic.pict_type.to_picture_type();
        frame.is_corrupt = pic.lost_mbs > 0;
        if let Some((num, den)) = self.seq.sample_aspect_ratio {
            if num > 0 && den > 0 {
                frame.sample_aspect_ratio = Rational::new(num as i32, den as i32);
            }
        }
        frame
    }
}

impl Decoder for Vc1Decoder {
    fn codec_id(&self) -> CodecId {
        self.codec_id
    }

    fn name(&self) -> &str {
        match self.codec_id {
            CodecId::Wmv3 => "wmv3",
            _ => "vc1",
        }
    }

    fn open(&mut self, params: &CodecParameters) -> TaoResult<()> {
        let video = match &params.params {
            CodecParamsType::Video(v) => v,
            _ => {
                return Err(TaoError::InvalidArgument("VC-1 解码器需要视频参数".into()));
            }
        };
        if !matches!(params.codec_id, CodecId::Vc1 | CodecId::Wmv3) {
            return Err(TaoError::InvalidArgument(format!(
                "VC-1 解码器不支持 {}",
                params.codec_id
            )));
        }

        self.codec_id = params.codec_id;
        if !self.cfg_fixed {
            self.cfg = Vc1Config::from_env();
        }
        if self.tables.is_none() {
            let path = self.cfg.tables_path.clone().ok_or_else(|| {
                TaoError::Codec(
                    "VC-1: 缺少码表资源, 请设置 TAO_VC1_TABLES 或使用 Vc1Decoder::with_tables"
                        .into(),
                )
            })?;
            debug!("VC-1: 从 {} 加载码表", path.display());
            self.tables = Some(Arc::new(Vc1Tables::load(&path)?));
        }

        self.width = video.width;
        self.height = video.height;
        self.seq = SequenceHeader::default();
        self.seq_ready = false;
        match self.codec_id {
            CodecId::Wmv3 => {
                if params.extra_data.len() < 4 {
                    return Err(TaoError::InvalidData(
                        "WMV3 需要 4 字节 STRUCT_C 扩展数据".into(),
                    ));
                }
                let mut br = BitReader::new(&params.extra_data);
                self.seq = SequenceHeader::parse(&mut br)?;
                self.seq_ready = true;
                if !self.seq.is_advanced() && (self.width == 0 || self.height == 0) {
                    return Err(TaoError::InvalidArgument("WMV3 需要有效的宽度和高度".into()));
                }
            }
            _ => self.parse_extradata_units(&params.extra_data)?,
        }

        self.hdr = PictureHeader::default();
        self.luts.reset();
        self.st = None;
        self.geometry = None;
        self.last = None;
        self.next = None;
        self.delayed = None;
        self.output.clear();
        self.frame_count = 0;
        self.opened = true;

        debug!(
            "打开 VC-1 解码器: {}, {}x{}, 档次={:?}, 序列头={}",
            self.codec_id, self.width, self.height, self.seq.profile, self.seq_ready
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> TaoResult<()> {
        if !self.opened {
            return Err(TaoError::Codec("VC-1 解码器未打开".into()));
        }

        if packet.is_empty() {
            debug!("VC-1: 收到刷新信号, 输出延迟帧");
            if let Some(pic) = self.delayed.take() {
                self.queue_frame(&pic);
            }
            return Ok(());
        }

        self.time_base = packet.time_base;
        let tables = self.tables()?;
        if self.codec_id == CodecId::Vc1 || self.seq.is_advanced() {
            self.decode_advanced_packet(&tables, packet)
        } else {
            self.decode_simple_packet(&tables, packet)
        }
    }

    fn receive_frame(&mut self) -> TaoResult<Frame> {
        if !self.opened {
            return Err(TaoError::Codec("VC-1 解码器未打开".into()));
        }
        match self.output.pop_front() {
            Some(frame) => Ok(Frame::Video(frame)),
            None => Err(TaoError::NeedMoreData),
        }
    }

    fn flush(&mut self) {
        debug!("VC-1 解码器已刷新, 清空参考帧和输出队列");
        self.output.clear();
        self.delayed = None;
        self.last = None;
        self.next = None;
        self.hdr = PictureHeader::default();
        self.luts.reset();
    }
}
