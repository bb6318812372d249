//! tao-vc1 - VC-1 / WMV9 解码命令行工具
//!
//! 读取 RCV 或 VC-1 基本流, 解码后输出原始 YUV420P 帧, 用于与参考解码器逐帧比对.

mod input;
mod logging;

use clap::Parser;
use log::{debug, info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use tao_codec::decoders::vc1::{Vc1Config, Vc1Decoder, Vc1Tables};
use tao_codec::{CodecId, CodecRegistry, Decoder, Packet, VideoFrame};
use tao_core::timestamp::pts_to_seconds;
use tao_core::{TaoError, TaoResult};

#[derive(Parser, Debug)]
#[command(name = "tao-vc1", version, about = "纯 Rust VC-1 / WMV9 解码工具")]
struct Cli {
    /// 输入文件 (.rcv 或 VC-1 基本流)
    #[arg(short, long)]
    input: PathBuf,

    /// 输出原始 YUV420P 文件, "-" 表示标准输出
    #[arg(short, long)]
    output: Option<String>,

    /// VLC 码表 JSON 资源, 缺省时读取 TAO_VC1_TABLES
    #[arg(long)]
    tables: Option<PathBuf>,

    /// 显示宽度 (基本流未携带时使用)
    #[arg(long, default_value_t = 0)]
    width: u32,

    /// 显示高度 (基本流未携带时使用)
    #[arg(long, default_value_t = 0)]
    height: u32,

    /// 最多输出的帧数
    #[arg(short = 'n', long)]
    frames: Option<u64>,

    /// 关闭去块环路滤波
    #[arg(long)]
    skip_loop_filter: bool,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 日志文件目录
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_dir.as_deref());

    if let Err(e) = run(&cli) {
        eprintln!("错误: {e}");
        process::exit(1);
    }
}

/// 解码统计
#[derive(Default)]
struct Summary {
    packets: u64,
    frames: u64,
    bytes: u64,
    /// 按 I/P/B/BI 计数
    by_type: [u64; 4],
    /// 含填补宏块的帧
    corrupt: u64,
}

fn run(cli: &Cli) -> TaoResult<()> {
    let data = std::fs::read(&cli.input)?;
    let stream = input::open(&data, cli.width, cli.height)?;
    info!(
        "输入: {}, {}, {} 个数据包",
        cli.input.display(),
        stream.params.codec_id,
        stream.packets.len()
    );

    let mut decoder = create_decoder(cli, stream.params.codec_id)?;
    decoder.open(&stream.params)?;

    let mut sink: Option<Box<dyn Write>> = match cli.output.as_deref() {
        None => None,
        Some("-") => Some(Box::new(BufWriter::new(std::io::stdout().lock()))),
        Some(path) => {
            if !cli.overwrite && std::path::Path::new(path).exists() {
                return Err(TaoError::InvalidArgument(format!(
                    "输出文件已存在 '{path}', 使用 -y 覆盖"
                )));
            }
            Some(Box::new(BufWriter::new(File::create(path)?)))
        }
    };

    let limit = cli.frames.unwrap_or(u64::MAX);
    let mut summary = Summary::default();
    let flush = Packet::empty();
    for pkt in stream.packets.iter().chain(std::iter::once(&flush)) {
        if summary.frames >= limit {
            break;
        }
        if !pkt.is_empty() {
            summary.packets += 1;
        }
        if let Err(e) = decoder.send_packet(pkt) {
            // 单帧损坏不终止整个流
            warn!("数据包 #{} 解码失败: {e}", summary.packets);
            continue;
        }
        drain(decoder.as_mut(), &mut sink, &mut summary, limit)?;
    }
    if let Some(w) = sink.as_mut() {
        w.flush()?;
    }

    info!(
        "完成: {} 个数据包, {} 帧 (I {}, P {}, B {}, BI {}, 受损 {}), 输出 {} 字节",
        summary.packets,
        summary.frames,
        summary.by_type[0],
        summary.by_type[1],
        summary.by_type[2],
        summary.by_type[3],
        summary.corrupt,
        summary.bytes
    );
    Ok(())
}

fn create_decoder(cli: &Cli, codec_id: CodecId) -> TaoResult<Box<dyn Decoder>> {
    let mut cfg = Vc1Config::from_env();
    cfg.skip_loop_filter |= cli.skip_loop_filter;
    if let Some(path) = &cli.tables {
        cfg.tables_path = Some(path.clone());
    }
    let Some(path) = cfg.tables_path.clone() else {
        // 未指定资源时走注册表, open 会报告缺少码表
        let mut registry = CodecRegistry::new();
        tao_codec::register_all(&mut registry);
        return registry.create_decoder(codec_id);
    };
    debug!("码表资源: {}", path.display());
    let tables = Arc::new(Vc1Tables::load(&path)?);
    let mut dec = Vc1Decoder::with_tables(tables);
    dec.set_config(cfg);
    Ok(Box::new(dec))
}

fn drain(
    decoder: &mut dyn Decoder,
    sink: &mut Option<Box<dyn Write>>,
    summary: &mut Summary,
    limit: u64,
) -> TaoResult<()> {
    loop {
        let frame = match decoder.receive_frame() {
            Ok(f) => f,
            Err(TaoError::NeedMoreData) => return Ok(()),
            Err(e) => return Err(e),
        };
        let Some(frame) = frame.into_video() else {
            continue;
        };
        if summary.frames >= limit {
            continue;
        }
        let slot = match frame.picture_type {
            tao_codec::PictureType::P => 1,
            tao_codec::PictureType::B => 2,
            tao_codec::PictureType::Bi => 3,
            _ => 0,
        };
        summary.by_type[slot] += 1;
        if frame.is_corrupt {
            summary.corrupt += 1;
            warn!("帧 #{} 部分宏块丢失, 已由参考图像填补", summary.frames);
        }
        debug!(
            "帧 #{}: {} {}x{}, pts={}",
            summary.frames,
            frame.picture_type.as_char(),
            frame.width,
            frame.height,
            pts_to_seconds(frame.pts, frame.time_base)
                .map(|s| format!("{s:.3}s"))
                .unwrap_or_else(|| "N/A".into())
        );
        if let Some(w) = sink.as_mut() {
            summary.bytes += write_yuv(w.as_mut(), &frame)?;
        }
        summary.frames += 1;
    }
}

/// 按 Y, U, V 平面顺序写出紧凑的 YUV420P 帧
fn write_yuv(w: &mut dyn Write, frame: &VideoFrame) -> TaoResult<u64> {
    let mut written = 0u64;
    for plane in 0..frame.data.len() {
        let (pw, ph) = frame
            .pixel_format
            .plane_dimensions(plane, frame.width, frame.height);
        for y in 0..ph as usize {
            let row = &frame.row(plane, y)[..pw as usize];
            w.write_all(row)?;
            written += row.len() as u64;
        }
    }
    Ok(written)
}
