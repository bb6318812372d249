//! 输入码流读取.
//!
//! 支持两种无需完整容器层的 VC-1 封装:
//! - RCV (VC-1 测试码流, SMPTE 421M 附录 L): 固定头 + 每帧 8 字节帧头, Simple/Main 档次
//! - 基本流 (附录 E): 以 `00 00 01 xx` 起始码分隔, Advanced 档次

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use tao_codec::{CodecId, CodecParameters, Packet};
use tao_core::{Rational, TaoError, TaoResult};

/// RCV 头部标记字节
const RCV_MARKER: u8 = 0xC5;
/// 帧起始码后缀
const SC_FRAME: u8 = 0x0D;
/// 序列头起始码后缀
const SC_SEQUENCE: u8 = 0x0F;

/// 解析后的输入: 解码参数 + 按解码顺序排列的数据包
pub(crate) struct InputStream {
    pub params: CodecParameters,
    pub time_base: Rational,
    pub packets: Vec<Packet>,
}

/// 按内容探测封装
pub(crate) fn open(data: &[u8], width: u32, height: u32) -> TaoResult<InputStream> {
    if data.len() >= 8 && data[3] == RCV_MARKER && data[4..8] == [4, 0, 0, 0] {
        parse_rcv(data)
    } else if data.starts_with(&[0, 0, 1]) {
        Ok(parse_elementary(data, width, height))
    } else {
        Err(TaoError::InvalidData(
            "无法识别的输入: 既不是 RCV 也不是 VC-1 基本流".into(),
        ))
    }
}

/// RCV: NUMFRAMES(24) 0xC5 | 4 | STRUCT_C | 高 | 宽 | 12 | STRUCT_B(12), 帧头为 (大小|关键帧标志, 时间戳)
fn parse_rcv(data: &[u8]) -> TaoResult<InputStream> {
    let mut rd = Cursor::new(data);
    let frames = rd.read_u24::<LittleEndian>()?;
    rd.read_u8()?;
    rd.read_u32::<LittleEndian>()?;
    let mut struct_c = vec![0u8; 4];
    rd.read_exact(&mut struct_c)?;
    let height = rd.read_u32::<LittleEndian>()?;
    let width = rd.read_u32::<LittleEndian>()?;
    if rd.read_u32::<LittleEndian>()? != 0xC {
        return Err(TaoError::InvalidData("RCV: STRUCT_B 长度不是 12".into()));
    }
    // LEVEL/CBR/HRD_BUFFER 与 HRD_RATE
    rd.read_u32::<LittleEndian>()?;
    rd.read_u32::<LittleEndian>()?;
    let fps = rd.read_u32::<LittleEndian>()?;
    let time_base = match fps {
        0xFFFF_FFFF => Rational::new(1, 1000),
        0 => {
            warn!("RCV: 帧率为 0, 按 25fps 处理");
            Rational::new(1, 25)
        }
        f => Rational::new(1, f as i32),
    };
    debug!("RCV: {frames} 帧, {width}x{height}, 时间基 {time_base}");

    let mut packets = Vec::with_capacity(frames as usize);
    while (rd.position() as usize) < data.len() {
        let (size, pts) = match (rd.read_u32::<LittleEndian>(), rd.read_u32::<LittleEndian>()) {
            (Ok(s), Ok(p)) => (s, p),
            _ => {
                warn!("RCV: 帧头不完整, 忽略 {} 字节尾部数据", data.len() - rd.position() as usize);
                break;
            }
        };
        let len = (size & 0x3FFF_FFFF) as usize;
        let start = rd.position() as usize;
        let Some(payload) = data.get(start..start + len) else {
            warn!("RCV: 第 {} 帧数据被截断", packets.len());
            break;
        };
        rd.set_position((start + len) as u64);
        let mut pkt = Packet::from_data(payload.to_vec());
        pkt.pts = i64::from(pts);
        pkt.dts = pkt.pts;
        pkt.time_base = time_base;
        pkt.is_keyframe = size & 0x8000_0000 != 0;
        packets.push(pkt);
    }

    Ok(InputStream {
        params: CodecParameters::video(CodecId::Wmv3, width, height, struct_c),
        time_base,
        packets,
    })
}

/// 基本流按帧起始码切分为访问单元, 序列头与入口点随后一帧一起送入
fn parse_elementary(data: &[u8], width: u32, height: u32) -> InputStream {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 3 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            starts.push((i, data[i + 3]));
            i += 3;
        } else {
            i += 1;
        }
    }

    let time_base = Rational::new(1, 25);
    let mut packets = Vec::new();
    let mut au_start = 0;
    let mut has_frame = false;
    for &(pos, code) in &starts {
        let opens_unit = code == SC_FRAME || code == SC_SEQUENCE;
        if opens_unit && has_frame {
            packets.push(data[au_start..pos].to_vec());
            au_start = pos;
            has_frame = false;
        }
        has_frame |= code == SC_FRAME;
    }
    if au_start < data.len() {
        packets.push(data[au_start..].to_vec());
    }

    let packets = packets
        .into_iter()
        .enumerate()
        .map(|(n, payload)| {
            let mut pkt = Packet::from_data(payload);
            pkt.dts = n as i64;
            pkt.duration = 1;
            pkt.time_base = time_base;
            pkt
        })
        .collect::<Vec<_>>();
    debug!("VC-1 基本流: {} 个访问单元", packets.len());

    InputStream {
        params: CodecParameters::video(CodecId::Vc1, width, height, Vec::new()),
        time_base,
        packets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rcv_file(frames: &[(&[u8], bool, u32)]) -> Vec<u8> {
        let mut out = vec![frames.len() as u8, 0, 0, RCV_MARKER, 4, 0, 0, 0];
        out.extend_from_slice(&[0x44, 0x00, 0x00, 0x01]); // STRUCT_C
        out.extend_from_slice(&48u32.to_le_bytes());
        out.extend_from_slice(&64u32.to_le_bytes());
        out.extend_from_slice(&12u32.to_le_bytes());
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        for &(data, key, pts) in frames {
            let size = data.len() as u32 | if key { 0x8000_0000 } else { 0 };
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&pts.to_le_bytes());
            out.extend_from_slice(data);
        }
        out
    }

    #[test]
    fn test_rcv_header_and_frames() {
        let file = rcv_file(&[(&[1, 2, 3], true, 0), (&[4], false, 40)]);
        let input = open(&file, 0, 0).expect("解析 RCV 失败");
        assert_eq!(input.params.codec_id, CodecId::Wmv3);
        assert_eq!(input.params.extra_data, vec![0x44, 0x00, 0x00, 0x01]);
        let video = input.params.video_params().expect("应为视频参数");
        assert_eq!((video.width, video.height), (64, 48));
        assert_eq!(input.time_base, Rational::new(1, 1000));
        assert_eq!(input.packets.len(), 2);
        assert_eq!(&input.packets[0].data[..], &[1, 2, 3]);
        assert!(input.packets[0].is_keyframe);
        assert_eq!(input.packets[1].pts, 40);
        assert!(!input.packets[1].is_keyframe);
    }

    #[test]
    fn test_rcv_truncated_frame_is_dropped() {
        let mut file = rcv_file(&[(&[1, 2, 3], true, 0)]);
        file.truncate(file.len() - 1);
        let input = open(&file, 0, 0).expect("解析 RCV 失败");
        assert!(input.packets.is_empty());
    }

    #[test]
    fn test_elementary_stream_split_at_frames() {
        let es = [
            0, 0, 1, 0x0F, 0xAA, // 序列头
            0, 0, 1, 0x0E, 0xBB, // 入口点
            0, 0, 1, 0x0D, 0x01, // 帧
            0, 0, 1, 0x0B, 0x02, // 切片
            0, 0, 1, 0x0D, 0x03, // 帧
            0, 0, 1, 0x0C, 0x04, // 场
        ];
        let input = open(&es, 320, 240).expect("解析基本流失败");
        assert_eq!(input.params.codec_id, CodecId::Vc1);
        assert_eq!(input.packets.len(), 2);
        assert_eq!(input.packets[0].data.len(), 20);
        assert_eq!(&input.packets[1].data[..], &[0, 0, 1, 0x0D, 0x03, 0, 0, 1, 0x0C, 0x04]);
        assert_eq!(input.packets[1].dts, 1);
    }

    #[test]
    fn test_unknown_input_rejected() {
        assert!(matches!(open(&[0x12, 0x34], 0, 0), Err(TaoError::InvalidData(_))));
    }
}
