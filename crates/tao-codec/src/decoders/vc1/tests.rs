use std::sync::Arc;

use tao_core::{BitReader, BitWriter, PixelFormat, Rational, TaoError};

use super::bitplane::Bitplane;
use super::block::{PredDir, choose_dc_pred, choose_dc_pred_avail, rescale_pred};
use super::dsp;
use super::tables::DQSCALE;
use super::*;
use crate::codec_parameters::VideoCodecParams;
use crate::frame::PictureType;

// ============================================================
// 合成码表与码流
// ============================================================

/// 定长码: 符号 i 编码为 i
fn fixed(n: usize) -> Vec<CodeWord> {
    let bits = (usize::BITS - (n - 1).leading_zeros()).max(1) as u8;
    (0..n as u32).map(|i| (i, bits)).collect()
}

fn groups(count: usize, n: usize) -> Vec<Vec<CodeWord>> {
    (0..count).map(|_| fixed(n)).collect()
}

fn positions(filter: fn(u8) -> bool) -> Vec<u8> {
    (0..64u8).filter(|&p| filter(p)).collect()
}

fn synthetic_books() -> Vc1CodeBooks {
    let ac = AcCodingSetBook {
        codes: fixed(3),
        run_level: vec![(0, 1), (0, 1)],
        last_index: 1,
    };
    let full = positions(|_| true);
    let top = positions(|p| p < 32);
    let left = positions(|p| p & 7 < 4);
    let quarter = positions(|p| p < 32 && p & 7 < 4);
    Vc1CodeBooks {
        i_cbpcy: fixed(64),
        p_cbpcy: groups(4, 64),
        ttmb: groups(3, 16),
        ttblk: groups(3, 8),
        subblkpat: groups(3, 15),
        mv_diff: groups(4, 73),
        bfraction: fixed(23),
        imode: fixed(7),
        norm2: fixed(4),
        norm6: fixed(64),
        dc_luma: groups(2, 120),
        dc_chroma: groups(2, 120),
        ac_coding_sets: vec![ac; 8],
        fourmv_block_pattern: groups(4, 16),
        twomv_block_pattern: groups(4, 4),
        interlaced_cbpcy: groups(8, 63),
        intfr_4mv_mbmode: groups(4, 15),
        intfr_non4mv_mbmode: groups(4, 9),
        if_mmv_mbmode: groups(8, 8),
        if_1mv_mbmode: groups(8, 6),
        mvdata_1ref: groups(4, 72),
        mvdata_2ref: groups(8, 126),
        scans: ScanBook {
            zz_8x8: vec![full.clone(); 4],
            zz_8x4: top.clone(),
            zz_4x8: left.clone(),
            zz_4x4: quarter.clone(),
            adv_progressive_8x4: top.clone(),
            adv_progressive_4x8: left.clone(),
            adv_interlaced_8x8: full,
            adv_interlaced_8x4: top,
            adv_interlaced_4x8: left,
            adv_interlaced_4x4: quarter,
        },
    }
}

fn synthetic_tables() -> Arc<Vc1Tables> {
    Arc::new(Vc1Tables::build(&synthetic_books()).expect("合成码表应能编译"))
}

/// Main 档次 STRUCT_C 的可变字段
#[derive(Clone, Copy, Default)]
struct SeqOpts {
    loop_filter: bool,
    overlap: bool,
    max_b_frames: u32,
    /// 0 隐式, 1 显式, 2 非均匀, 3 均匀
    quantizer: u32,
}

fn struct_c(o: SeqOpts) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(1, 2); // Main
    bw.write_bits(0, 2); // RES_Y411, RES_SPRITE
    bw.write_bits(0, 3);
    bw.write_bits(0, 5);
    bw.write_bit(u32::from(o.loop_filter));
    bw.write_bits(0, 2); // RES_X8, MULTIRES
    bw.write_bits(0b11, 2); // RES_FASTTX, FASTUVMC
    bw.write_bit(0); // EXTENDED_MV
    bw.write_bits(0, 2); // DQUANT
    bw.write_bits(0, 2); // VSTRANSFORM, RES_TRANSTAB
    bw.write_bit(u32::from(o.overlap));
    bw.write_bits(0, 2); // SYNCMARKER, RANGERED
    bw.write_bits(o.max_b_frames, 3);
    bw.write_bits(o.quantizer, 2);
    bw.write_bit(0); // FINTERPFLAG
    bw.write_bit(1); // RES_RTM_FLAG
    bw.finish()
}

/// 写入 I 图像头, 返回的写入器停在宏块层之前
fn i_header(o: SeqOpts, pqindex: u32) -> BitWriter {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 2); // FRMCNT
    bw.write_bit(0); // 非 P
    if o.max_b_frames > 0 {
        bw.write_bit(1); // 非 B
    }
    bw.write_bits(0, 7); // BF
    bw.write_bits(pqindex, 5);
    if pqindex < 9 {
        bw.write_bit(0); // HALFQP
    }
    if o.quantizer == 1 {
        bw.write_bit(1);
    }
    bw.write_bit(0); // TRANSACFRM
    bw.write_bit(0); // TRANSACFRM2
    bw.write_bit(0); // TRANSDCTAB
    bw
}

/// 写入一个 I 宏块: CBPCY 为 0, 只有 DC 差分
fn i_mb(bw: &mut BitWriter, dc_diffs: [i32; 6]) {
    bw.write_bits(0, 6); // CBPCY
    bw.write_bit(0); // ACPRED
    for d in dc_diffs {
        bw.write_bits(d.unsigned_abs(), 7);
        if d != 0 {
            bw.write_bit(u32::from(d < 0));
        }
    }
}

fn video_params(codec_id: CodecId, width: u32, height: u32, extra_data: Vec<u8>) -> CodecParameters {
    CodecParameters {
        codec_id,
        extra_data,
        bit_rate: 0,
        params: CodecParamsType::Video(VideoCodecParams {
            width,
            height,
            pixel_format: PixelFormat::Yuv420p,
            frame_rate: Rational::new(25, 1),
            sample_aspect_ratio: Rational::new(1, 1),
        }),
    }
}

fn open_wmv3(o: SeqOpts, width: u32, height: u32, cfg: Vc1Config) -> Vc1Decoder {
    let mut dec = Vc1Decoder::with_tables(synthetic_tables());
    dec.set_config(cfg);
    dec.open(&video_params(CodecId::Wmv3, width, height, struct_c(o)))
        .expect("打开 WMV3 解码器失败");
    dec
}

fn decode_one(dec: &mut Vc1Decoder, data: Vec<u8>) -> VideoFrame {
    dec.send_packet(&Packet::from_data(data)).expect("送入数据包失败");
    receive_video(dec)
}

fn receive_video(dec: &mut Vc1Decoder) -> VideoFrame {
    dec.receive_frame()
        .expect("应输出一帧")
        .into_video()
        .expect("应为视频帧")
}

/// 只有 DC 系数的帧内块经反变换后的样本值
fn dc_only_sample(dc: i32, dc_scale: i32) -> i32 {
    let mut block = [0i16; 64];
    block[0] = (dc * dc_scale) as i16;
    dsp::inv_trans_8x8(&mut block);
    i32::from(block[0])
}

fn luma(frame: &VideoFrame, x: usize, y: usize) -> u8 {
    frame.data[0][y * frame.linesize[0] + x]
}

// ============================================================
// 预测与表
// ============================================================

#[test]
fn test_dc_pred_tie_prefers_left() {
    // |A - B| == |B - C| 时取左邻 C
    assert_eq!(choose_dc_pred(10, 20, 30), (30, PredDir::Left));
    assert_eq!(choose_dc_pred(30, 20, 20), (30, PredDir::Top));
    assert_eq!(choose_dc_pred_avail(10, 20, 30, true, true), (30, PredDir::Left));
    assert_eq!(choose_dc_pred_avail(10, 20, 30, true, false), (10, PredDir::Top));
    assert_eq!(choose_dc_pred_avail(10, 20, 30, false, false), (0, PredDir::Left));
}

#[test]
fn test_dqscale_approximates_reciprocal() {
    for (i, &t) in DQSCALE.iter().enumerate() {
        let exact = 0x40000 / (i as i64 + 1);
        assert!(
            (exact - i64::from(t)).abs() <= 1,
            "DQSCALE[{i}] = {t}, 精确值 {exact}"
        );
    }
    // 同量化步长换算保持不变
    assert_eq!(rescale_pred(40, 8 * DQSCALE[7] as i32), 40);
}

// ============================================================
// 比特平面
// ============================================================

fn plane_rows(plane: &Bitplane, w: usize, h: usize) -> Vec<Vec<bool>> {
    (0..h).map(|y| (0..w).map(|x| plane.get(x, y)).collect()).collect()
}

#[test]
fn test_bitplane_rowskip_with_invert() {
    let tables = synthetic_tables();
    let mut bw = BitWriter::new();
    bw.write_bit(1); // INVERT
    bw.write_bits(5, 3); // ROWSKIP
    bw.write_bits(0b1_101, 4);
    bw.write_bit(0);
    let data = bw.finish();
    let mut plane = Bitplane::new(3, 2);
    plane.decode(&mut BitReader::new(&data), &tables).unwrap();
    assert_eq!(
        plane_rows(&plane, 3, 2),
        vec![vec![false, true, false], vec![true, true, true]]
    );
}

#[test]
fn test_bitplane_norm2_odd_count_and_diff2() {
    let tables = synthetic_tables();
    let mut bw = BitWriter::new();
    bw.write_bit(0);
    bw.write_bits(1, 3); // NORM2
    bw.write_bit(1); // 奇数个时首位单独读取
    bw.write_bits(0b10, 2);
    let data = bw.finish();
    let mut plane = Bitplane::new(3, 1);
    plane.decode(&mut BitReader::new(&data), &tables).unwrap();
    assert_eq!(plane_rows(&plane, 3, 1), vec![vec![true, false, true]]);

    // DIFF2: 差分值 [1, 0, 0, 0] 沿左邻/上邻传播
    let mut bw = BitWriter::new();
    bw.write_bit(0);
    bw.write_bits(2, 3);
    bw.write_bits(0b01, 2);
    bw.write_bits(0b00, 2);
    let data = bw.finish();
    let mut plane = Bitplane::new(2, 2);
    plane.decode(&mut BitReader::new(&data), &tables).unwrap();
    assert_eq!(plane_rows(&plane, 2, 2), vec![vec![true, true], vec![true, true]]);
}

#[test]
fn test_bitplane_raw_read_in_mb_layer() {
    let tables = synthetic_tables();
    let data = [0b0000_1010u8];
    let mut br = BitReader::new(&data);
    let mut plane = Bitplane::new(2, 1);
    plane.decode(&mut br, &tables).unwrap();
    assert!(plane.is_raw);
    assert!(plane.read_or_get(&mut br, 0, 0).unwrap());
    assert!(!plane.read_or_get(&mut br, 1, 0).unwrap());
    assert!(plane.get(0, 0));
}

// ============================================================
// 分帧
// ============================================================

#[test]
fn test_unescape_removes_emulation_prevention() {
    assert_eq!(unescape(&[0, 0, 3, 1, 5]), vec![0, 0, 1, 5]);
    assert_eq!(unescape(&[0, 0, 3, 3, 0, 0, 3, 0]), vec![0, 0, 3, 0, 0, 0]);
    // 03 后跟大于 3 的字节时保留
    assert_eq!(unescape(&[0, 0, 3, 4, 9]), vec![0, 0, 3, 4, 9]);
    assert_eq!(unescape(&[0, 0, 3]), vec![0, 0, 3]);
}

#[test]
fn test_split_units_by_start_code() {
    let data = [
        0x11, 0x22, // 起始码之前的裸帧数据
        0, 0, 1, 0x0F, 0xAA, 0xBB, //
        0, 0, 1, 0x0E, //
        0, 0, 1, 0x0D, 0xCC,
    ];
    let units = split_units(&data);
    assert_eq!(units.len(), 3, "空单元应被丢弃");
    assert_eq!(units[0].code, None);
    assert_eq!(units[0].payload, &[0x11, 0x22]);
    assert_eq!(units[1].code, Some(0x0F));
    assert_eq!(units[1].payload, &[0xAA, 0xBB]);
    assert_eq!(units[2].code, Some(0x0D));
    assert_eq!(units[2].payload, &[0xCC]);
}

#[test]
fn test_range_map_sample() {
    // map = 7: (x - 128) * 2 + 128
    assert_eq!(range_map_sample(128, 7), 128);
    assert_eq!(range_map_sample(138, 7), 148);
    assert_eq!(range_map_sample(250, 7), 255);
    assert_eq!(range_map_sample(0, 7), 0);
    // map = 0: 缩小到 9/8
    assert_eq!(range_map_sample(136, 0), 137);
}

// ============================================================
// 解码器外壳
// ============================================================

#[test]
fn test_open_without_tables_fails() {
    let mut dec = Vc1Decoder::new(None);
    dec.set_config(Vc1Config::default());
    let err = dec
        .open(&video_params(CodecId::Wmv3, 16, 16, struct_c(SeqOpts::default())))
        .unwrap_err();
    assert!(matches!(err, TaoError::Codec(_)), "缺少码表应返回 Codec 错误: {err:?}");
}

#[test]
fn test_tables_loaded_from_json_resource() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("vc1_tables.json");
    let json = synthetic_books().to_json().expect("序列化码表失败");
    std::fs::write(&path, json).expect("写入码表失败");

    let o = SeqOpts::default();
    let mut dec = Vc1Decoder::new(None);
    dec.set_config(Vc1Config {
        tables_path: Some(path.clone()),
        ..Vc1Config::default()
    });
    dec.open(&video_params(CodecId::Wmv3, 16, 16, struct_c(o)))
        .expect("从 JSON 资源加载码表失败");
    let mut bw = i_header(o, 8);
    i_mb(&mut bw, [5, 0, 0, 0, 0, 0]);
    let frame = decode_one(&mut dec, bw.finish());
    assert!(frame.data[0].iter().all(|&v| v == 150));

    std::fs::write(&path, "{\"i_cbpcy\": []}").expect("写入码表失败");
    let mut dec = Vc1Decoder::new(None);
    dec.set_config(Vc1Config {
        tables_path: Some(path),
        ..Vc1Config::default()
    });
    let err = dec
        .open(&video_params(CodecId::Wmv3, 16, 16, struct_c(o)))
        .unwrap_err();
    assert!(matches!(err, TaoError::InvalidData(_)), "损坏的码表资源: {err:?}");
}

#[test]
fn test_not_opened_and_empty_queue() {
    let mut dec = Vc1Decoder::with_tables(synthetic_tables());
    assert!(matches!(
        dec.send_packet(&Packet::from_data(vec![1, 2, 3])),
        Err(TaoError::Codec(_))
    ));
    let mut dec = open_wmv3(SeqOpts::default(), 16, 16, Vc1Config::default());
    assert!(matches!(dec.receive_frame(), Err(TaoError::NeedMoreData)));
    assert_eq!(dec.name(), "wmv3");
    assert_eq!(dec.codec_id(), CodecId::Wmv3);
}

#[test]
fn test_wmv3_requires_struct_c() {
    let mut dec = Vc1Decoder::with_tables(synthetic_tables());
    dec.set_config(Vc1Config::default());
    let err = dec
        .open(&video_params(CodecId::Wmv3, 16, 16, vec![0x40]))
        .unwrap_err();
    assert!(matches!(err, TaoError::InvalidData(_)));
}

// ============================================================
// 端到端
// ============================================================

#[test]
fn test_intra_dc_only_block_is_flat() {
    let o = SeqOpts::default();
    let mut dec = open_wmv3(o, 16, 16, Vc1Config::default());
    let mut bw = i_header(o, 8);
    i_mb(&mut bw, [5, 0, 0, 0, 0, 0]);
    let frame = decode_one(&mut dec, bw.finish());

    // pq = 8: DC 缩放 10, 帧外预测 1024 / 10 = 102
    let expected = dc_only_sample(102 + 5, 10);
    assert_eq!(expected, 150);
    assert_eq!(frame.width, 16);
    assert_eq!(frame.height, 16);
    assert!(frame.is_keyframe);
    assert_eq!(frame.picture_type, PictureType::I);
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(i32::from(luma(&frame, x, y)), expected, "({x}, {y})");
        }
    }
    let chroma = dc_only_sample(102, 10) as u8;
    assert!(frame.data[1].iter().all(|&v| v == chroma));
    assert!(frame.data[2].iter().all(|&v| v == chroma));
}

#[test]
fn test_raster_order_dc_prediction() {
    // 只有首宏块带差分, 其余宏块依赖已解码的左邻或上邻得到相同 DC
    let o = SeqOpts::default();
    let mut dec = open_wmv3(o, 32, 32, Vc1Config::default());
    let mut bw = i_header(o, 8);
    i_mb(&mut bw, [5, 0, 0, 0, 0, 0]);
    for _ in 0..3 {
        i_mb(&mut bw, [0; 6]);
    }
    let frame = decode_one(&mut dec, bw.finish());
    let expected = dc_only_sample(107, 10) as u8;
    assert!(frame.data[0].iter().all(|&v| v == expected));
}

/// 默认序列参数下的 I 图像 (PQINDEX 8), 宏块按光栅顺序给出 DC 差分
fn i_picture(mbs: &[[i32; 6]]) -> Vec<u8> {
    let mut bw = i_header(SeqOpts::default(), 8);
    for &mb in mbs {
        i_mb(&mut bw, mb);
    }
    bw.finish()
}

/// Main 档次 P 图像头: 双线性半像素 1MV, 跳过平面按行编码
fn p_header(skipped: &[&[bool]]) -> BitWriter {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 2); // FRMCNT
    bw.write_bit(1); // P
    bw.write_bits(8, 5); // PQINDEX
    bw.write_bit(0); // HALFQP
    bw.write_bits(0, 4); // MVMODE: 双线性半像素
    bw.write_bit(0); // 跳过平面 INVERT
    bw.write_bits(5, 3); // IMODE: Rowskip
    for row in skipped {
        if row.iter().any(|&s| s) {
            bw.write_bit(1);
            for &s in row.iter() {
                bw.write_bit(u32::from(s));
            }
        } else {
            bw.write_bit(0);
        }
    }
    bw.write_bits(0, 2); // MVTAB
    bw.write_bits(0, 2); // CBPTAB
    bw.write_bit(0); // TRANSACFRM
    bw.write_bit(0); // TRANSDCTAB
    bw
}

/// 无残差 1MV 宏块的转义 MVDATA, 差分以半像素为单位 (dx 8 位, dy 7 位)
fn mv_escape(bw: &mut BitWriter, dx: u32, dy: u32) {
    bw.write_bits(34, 7);
    bw.write_bits(dx, 8);
    bw.write_bits(dy, 7);
}

#[test]
fn test_bits_overconsumption_keeps_decoded_rows() {
    let o = SeqOpts::default();
    let mut dec = open_wmv3(o, 16, 32, Vc1Config::default());
    // 第二行宏块的数据缺失, 没有参考图像可填补
    let frame = decode_one(&mut dec, i_picture(&[[5, 0, 0, 0, 0, 0]]));
    assert!(frame.is_corrupt);
    let expected = dc_only_sample(107, 10) as u8;
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(luma(&frame, x, y), expected, "已解码行 ({x}, {y})");
        }
    }
    for y in 16..32 {
        assert!(frame.row(0, y).iter().all(|&v| v == 0), "未解码行 {y}");
    }

    // 有参考时缺失的宏块由参考图像填补
    let mut dec = open_wmv3(o, 16, 32, Vc1Config::default());
    let full = decode_one(&mut dec, i_picture(&[[3, 0, 0, 0, 0, 0], [0; 6]]));
    assert!(!full.is_corrupt);
    let truncated = decode_one(&mut dec, i_picture(&[[5, 0, 0, 0, 0, 0]]));
    assert!(truncated.is_corrupt);
    for y in 0..16 {
        assert!(truncated.row(0, y).iter().all(|&v| v == expected), "已解码行 {y}");
    }
    for y in 16..32 {
        assert_eq!(truncated.row(0, y), full.row(0, y), "填补行 {y}");
    }
    assert_eq!(truncated.row(1, 15), full.row(1, 15));
}

#[test]
fn test_invalid_dc_codeword_keeps_picture_and_reference() {
    let o = SeqOpts::default();
    let mut dec = open_wmv3(o, 16, 32, Vc1Config::default());
    let mut bw = i_header(o, 8);
    i_mb(&mut bw, [5, 0, 0, 0, 0, 0]);
    // 第二行宏块的亮度 DC 码字超出码表
    bw.write_bits(0, 6);
    bw.write_bit(0);
    bw.write_bits(125, 7);
    bw.write_bits(0, 16);
    dec.send_packet(&Packet::from_data(bw.finish()))
        .expect("宏块语法错误不应丢弃整帧");
    let damaged = receive_video(&mut dec);
    assert!(damaged.is_corrupt);
    assert_eq!(damaged.picture_type, PictureType::I);
    let expected = dc_only_sample(107, 10) as u8;
    for y in 0..16 {
        assert!(damaged.row(0, y).iter().all(|&v| v == expected), "已解码行 {y}");
    }

    // 参考链保持: 跳过帧重复受损图像
    dec.send_packet(&Packet::from_data(vec![0])).unwrap();
    let repeat = receive_video(&mut dec);
    assert_eq!(repeat.picture_type, PictureType::P);
    assert_eq!(repeat.data, damaged.data);

    let clean = decode_one(&mut dec, i_picture(&[[5, 0, 0, 0, 0, 0], [0; 6]]));
    assert!(!clean.is_corrupt);
    assert!(clean.data[0].iter().all(|&v| v == expected));
}

#[test]
fn test_invalid_mv_codeword_conceals_from_reference() {
    let mut dec = open_wmv3(SeqOpts::default(), 32, 16, Vc1Config::default());
    let reference = decode_one(&mut dec, i_picture(&[[5, 0, 0, 0, 0, 0], [-10, 0, 0, 0, 0, 0]]));
    assert_ne!(luma(&reference, 0, 0), luma(&reference, 16, 0));

    // 宏块 0 跳过, 宏块 1 的 MVDATA 码字超出码表
    let mut bw = p_header(&[&[true, false]]);
    bw.write_bits(127, 7);
    bw.write_bits(0, 16);
    dec.send_packet(&Packet::from_data(bw.finish())).unwrap();
    let p_frame = receive_video(&mut dec);
    assert_eq!(p_frame.picture_type, PictureType::P);
    assert!(p_frame.is_corrupt);
    assert_eq!(p_frame.data, reference.data, "丢失的宏块应复制参考");

    dec.send_packet(&Packet::from_data(vec![0])).unwrap();
    assert_eq!(receive_video(&mut dec).data, reference.data);
}

#[test]
fn test_p_frame_half_pel_mv_uses_bilinear_average() {
    let mut dec = open_wmv3(SeqOpts::default(), 32, 16, Vc1Config::default());
    let reference = decode_one(&mut dec, i_picture(&[[5, 0, 0, 0, 0, 0], [-10, 0, 0, 0, 0, 0]]));
    let left = i32::from(luma(&reference, 0, 0));
    let right = i32::from(luma(&reference, 16, 0));
    assert_eq!((left, right), (dc_only_sample(107, 10), dc_only_sample(97, 10)));

    // 宏块 0: MV 水平 +1/2 像素; 宏块 1 跳过, 沿用左邻预测的同一 MV
    let mut bw = p_header(&[&[false, true]]);
    mv_escape(&mut bw, 1, 0);
    let p_frame = decode_one(&mut dec, bw.finish());
    assert!(!p_frame.is_corrupt);

    // P 帧 RND 为 0: (a + b + 1) >> 1
    let edge = ((left + right + 1) >> 1) as u8;
    for y in 0..16 {
        for x in 0..15 {
            assert_eq!(i32::from(luma(&p_frame, x, y)), left, "({x}, {y})");
        }
        assert_eq!(luma(&p_frame, 15, y), edge, "边界 ({y})");
        // 右边缘之外的样本复制边缘
        for x in 16..32 {
            assert_eq!(i32::from(luma(&p_frame, x, y)), right, "({x}, {y})");
        }
    }
    // 色度 MV 1/4 像素经 FASTUVMC 取整为 0
    assert_eq!(p_frame.data[1], reference.data[1]);
    assert_eq!(p_frame.data[2], reference.data[2]);
}

#[test]
fn test_mv_predictor_pulled_back_inside_picture() {
    let mut dec = open_wmv3(SeqOpts::default(), 32, 16, Vc1Config::default());
    // 宏块 1 左右两半 DC 不同
    let reference = decode_one(&mut dec, i_picture(&[[5, 0, 0, 0, 0, 0], [-10, 10, 0, 0, 0, 0]]));
    let (a, b) = (dc_only_sample(97, 10) as u8, dc_only_sample(107, 10) as u8);
    assert_eq!((luma(&reference, 16, 0), luma(&reference, 24, 0)), (a, b));

    // 宏块 0 的 MV 为 +94 (四分之一像素); 宏块 1 以其为预测值,
    // 拉回到 60 后加差分 452, 取模得到零向量
    let mut bw = p_header(&[&[false, false]]);
    mv_escape(&mut bw, 47, 0);
    mv_escape(&mut bw, 226, 0);
    let p_frame = decode_one(&mut dec, bw.finish());
    for y in 0..16 {
        for x in 16..32 {
            assert_eq!(luma(&p_frame, x, y), luma(&reference, x, y), "({x}, {y})");
        }
    }
}

#[test]
fn test_hybrid_mv_prediction_selects_by_flag() {
    // 宏块 3 的左右两半 DC 不同, 其余宏块平坦
    let reference = i_picture(&[
        [5, 0, 0, 0, 0, 0],
        [0; 6],
        [0; 6],
        [0, 10, 0, 0, 0, 0],
    ]);
    let decode = |hybrid_bit: u32| {
        let mut dec = open_wmv3(SeqOpts::default(), 32, 32, Vc1Config::default());
        let i_frame = decode_one(&mut dec, reference.clone());
        // 宏块 2 的 MV 为 +80, 宏块 3 跳过: 上邻 0 与左邻 80 相差超过 32,
        // 由一位标志在上邻与左邻之间选择
        let mut bw = p_header(&[&[true, true], &[false, true]]);
        mv_escape(&mut bw, 40, 0);
        bw.write_bit(hybrid_bit);
        (i_frame, decode_one(&mut dec, bw.finish()))
    };
    let (flat, inner) = (dc_only_sample(107, 10) as u8, dc_only_sample(117, 10) as u8);

    let (i_frame, from_top) = decode(1);
    assert_eq!((luma(&i_frame, 16, 16), luma(&i_frame, 31, 16)), (flat, inner));
    for y in 16..32 {
        for x in 16..32 {
            assert_eq!(luma(&from_top, x, y), luma(&i_frame, x, y), "({x}, {y})");
        }
    }

    // 左邻 MV 指向右边缘之外, 全部取边缘列
    let (_, from_left) = decode(0);
    for y in 16..32 {
        for x in 16..32 {
            assert_eq!(luma(&from_left, x, y), inner, "({x}, {y})");
        }
    }
    // 跳过的宏块 1 复制参考
    for y in 0..16 {
        assert_eq!(from_left.row(0, y)[16..], i_frame.row(0, y)[16..]);
    }
}

#[test]
fn test_skipped_p_mb_copies_reference() {
    let o = SeqOpts::default();
    let mut dec = open_wmv3(o, 16, 16, Vc1Config::default());
    let mut bw = i_header(o, 8);
    i_mb(&mut bw, [5, 0, 0, 0, -3, 4]);
    let i_frame = decode_one(&mut dec, bw.finish());

    let mut bw = BitWriter::new();
    bw.write_bits(0, 2); // FRMCNT
    bw.write_bit(1); // P
    bw.write_bits(8, 5); // PQINDEX
    bw.write_bit(0); // HALFQP
    bw.write_bit(1); // MVMODE: 1MV
    bw.write_bit(0); // 跳过平面 INVERT
    bw.write_bits(5, 3); // IMODE: Rowskip
    bw.write_bits(0b11, 2); // 行编码, 宏块跳过
    bw.write_bits(0, 2); // MVTAB
    bw.write_bits(0, 2); // CBPTAB
    bw.write_bit(0); // TRANSACFRM
    bw.write_bit(0); // TRANSDCTAB
    let p_frame = decode_one(&mut dec, bw.finish());

    assert_eq!(p_frame.picture_type, PictureType::P);
    assert!(!p_frame.is_keyframe);
    assert_eq!(p_frame.data, i_frame.data, "零 MV 跳过宏块应复制参考");
}

#[test]
fn test_short_packet_repeats_reference() {
    let o = SeqOpts::default();
    let mut dec = open_wmv3(o, 16, 16, Vc1Config::default());
    let mut bw = i_header(o, 8);
    i_mb(&mut bw, [5, 0, 0, 0, 0, 0]);
    let i_frame = decode_one(&mut dec, bw.finish());
    let mut pkt = Packet::from_data(vec![0u8]);
    pkt.pts = 7;
    dec.send_packet(&pkt).unwrap();
    let repeat = receive_video(&mut dec);
    assert_eq!(repeat.pts, 7);
    assert_eq!(repeat.picture_type, PictureType::P);
    assert_eq!(repeat.data, i_frame.data);
}

#[test]
fn test_reference_delayed_when_b_frames_enabled() {
    let o = SeqOpts {
        max_b_frames: 1,
        ..SeqOpts::default()
    };
    let mut dec = open_wmv3(o, 16, 16, Vc1Config::default());
    let mut bw = i_header(o, 8);
    i_mb(&mut bw, [5, 0, 0, 0, 0, 0]);
    dec.send_packet(&Packet::from_data(bw.finish())).unwrap();
    assert!(matches!(dec.receive_frame(), Err(TaoError::NeedMoreData)));
    dec.send_packet(&Packet::empty()).unwrap();
    let frame = receive_video(&mut dec);
    assert_eq!(frame.picture_type, PictureType::I);
    assert!(matches!(dec.receive_frame(), Err(TaoError::NeedMoreData)));
}

#[test]
fn test_overlap_smoothing_precedes_deblocking() {
    let o = SeqOpts {
        loop_filter: true,
        overlap: true,
        quantizer: 3,
        ..SeqOpts::default()
    };
    let stream = || {
        // pq = 9 启用重叠平滑; 左宏块 DC 10, 右宏块 DC 0
        let mut bw = i_header(o, 9);
        i_mb(&mut bw, [10, 0, 0, 0, 0, 0]);
        i_mb(&mut bw, [-10, 0, 0, 0, 0, 0]);
        bw.finish()
    };
    let no_filter = Vc1Config {
        skip_loop_filter: true,
        ..Vc1Config::default()
    };
    let mut dec = open_wmv3(o, 32, 16, no_filter);
    let overlapped = decode_one(&mut dec, stream());
    let mut dec = open_wmv3(o, 32, 16, Vc1Config::default());
    let filtered = decode_one(&mut dec, stream());

    let left = (128 + dc_only_sample(10, 10)) as u8;
    for y in 2..6 {
        assert_eq!(luma(&overlapped, 0, y), left);
        assert_eq!(luma(&overlapped, 31, y), 128);
        // 宏块边界两侧第 2 列被重叠平滑拉近
        assert_ne!(luma(&overlapped, 14, y), left);
        assert_ne!(luma(&overlapped, 17, y), 128);
        // 去块滤波只修改紧邻 8x8 边界的样本, 其余保持重叠平滑的结果
        for x in (0..7).chain([14, 17]).chain(25..31) {
            assert_eq!(luma(&filtered, x, y), luma(&overlapped, x, y), "({x}, {y})");
        }
    }
}

// ============================================================
// Advanced 档次
// ============================================================

/// 插入防竞争字节 (00 00 0x → 00 00 03 0x)
fn escape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    let mut zeros = 0;
    for &b in payload {
        if zeros >= 2 && b <= 3 {
            out.push(3);
            zeros = 0;
        }
        out.push(b);
        zeros = if b == 0 { zeros + 1 } else { 0 };
    }
    out
}

fn start_code(out: &mut Vec<u8>, code: u8, payload: &[u8]) {
    out.extend_from_slice(&[0, 0, 1, code]);
    out.extend_from_slice(&escape(payload));
}

/// 16x16 逐行 Advanced 序列头 + 带亮度范围映射的入口点
fn advanced_extradata(range_mapy: u32) -> Vec<u8> {
    let mut seq = BitWriter::new();
    seq.write_bits(3, 2); // Advanced
    seq.write_bits(2, 3); // LEVEL
    seq.write_bits(1, 2); // 4:2:0
    seq.write_bits(0, 3);
    seq.write_bits(0, 5);
    seq.write_bit(0); // POSTPROCFLAG
    seq.write_bits(16 / 2 - 1, 12);
    seq.write_bits(16 / 2 - 1, 12);
    seq.write_bits(0, 4); // BROADCAST, INTERLACE, TFCNTRFLAG, FINTERPFLAG
    seq.write_bit(1); // 保留位
    seq.write_bits(0, 3); // PSF, DISPLAY_EXT, HRD_PARAM_FLAG

    let mut ep = BitWriter::new();
    ep.write_bit(0); // BROKEN_LINK
    ep.write_bit(1); // CLOSED_ENTRY
    ep.write_bits(0, 5); // PANSCAN, REFDIST, LOOPFILTER, FASTUVMC, EXTENDED_MV
    ep.write_bits(0, 2); // DQUANT
    ep.write_bits(0, 2); // VSTRANSFORM, OVERLAP
    ep.write_bits(0, 2); // QUANTIZER: 隐式
    ep.write_bit(0); // CODED_SIZE_FLAG
    ep.write_bit(1);
    ep.write_bits(range_mapy, 3);
    ep.write_bit(0); // RANGE_MAPUV_FLAG

    let mut out = Vec::new();
    start_code(&mut out, 0x0F, &seq.finish());
    start_code(&mut out, 0x0E, &ep.finish());
    out
}

/// 逐行 Advanced I 帧, 单个宏块
fn advanced_i_frame(dc_diffs: [i32; 6]) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0b110, 3); // PTYPE = I
    bw.write_bit(0); // RNDCTRL
    bw.write_bits(8, 5); // PQINDEX
    bw.write_bit(0); // HALFQP
    // ACPRED 比特平面: 不反转, 行跳过, 唯一一行未编码
    bw.write_bit(0);
    bw.write_bits(5, 3);
    bw.write_bit(0);
    bw.write_bit(0); // TRANSACFRM
    bw.write_bit(0); // TRANSACFRM2
    bw.write_bit(0); // TRANSDCTAB
    bw.write_bits(0, 6); // CBPCY
    for d in dc_diffs {
        bw.write_bits(d.unsigned_abs(), 7);
        if d != 0 {
            bw.write_bit(u32::from(d < 0));
        }
    }
    let mut out = Vec::new();
    start_code(&mut out, 0x0D, &bw.finish());
    out
}

#[test]
fn test_escape_helper_matches_unescape() {
    let raw = [0, 0, 1, 0, 0, 0, 7, 0, 0];
    let escaped = escape(&raw);
    assert_eq!(escaped, vec![0, 0, 3, 1, 0, 0, 3, 0, 7, 0, 0]);
    assert_eq!(unescape(&escaped), raw.to_vec());
}

#[test]
fn test_advanced_i_frame_with_range_mapping() {
    let mut dec = Vc1Decoder::with_tables(synthetic_tables());
    dec.set_config(Vc1Config::default());
    dec.open(&video_params(CodecId::Vc1, 16, 16, advanced_extradata(7)))
        .expect("打开 VC-1 解码器失败");

    dec.send_packet(&Packet::from_data(advanced_i_frame([5, 0, 0, 0, 0, 0])))
        .expect("送入数据包失败");
    // Advanced 档次允许 B 帧, 参考帧延迟到冲刷时输出
    assert!(matches!(dec.receive_frame(), Err(TaoError::NeedMoreData)));
    dec.send_packet(&Packet::empty()).expect("冲刷失败");
    let frame = receive_video(&mut dec);

    assert_eq!(frame.picture_type, PictureType::I);
    assert!(frame.is_keyframe);
    assert_eq!((frame.width, frame.height), (16, 16));
    // 无可用邻块时 DC 预测为 0, 样本以有符号方式写出
    let decoded = (128 + dc_only_sample(5, 10)) as u8;
    let expected = range_map_sample(decoded, 7);
    assert_ne!(expected, decoded);
    for y in 0..16 {
        for x in 0..16 {
            assert_eq!(luma(&frame, x, y), expected, "({x}, {y})");
        }
    }
    // 色度未映射
    assert!(frame.data[1].iter().all(|&v| v == 128));
    assert!(frame.data[2].iter().all(|&v| v == 128));
}

#[test]
fn test_advanced_frame_before_sequence_header_is_dropped() {
    let mut dec = Vc1Decoder::with_tables(synthetic_tables());
    dec.set_config(Vc1Config::default());
    dec.open(&video_params(CodecId::Vc1, 16, 16, Vec::new()))
        .expect("无扩展数据也应能打开");
    dec.send_packet(&Packet::from_data(advanced_i_frame([5, 0, 0, 0, 0, 0])))
        .expect("缺少序列头时丢弃帧而非报错");
    dec.send_packet(&Packet::empty()).expect("冲刷失败");
    assert!(matches!(dec.receive_frame(), Err(TaoError::NeedMoreData)));

    // 带内序列头之后可以正常解码
    let mut packet = advanced_extradata(7);
    packet.extend_from_slice(&advanced_i_frame([5, 0, 0, 0, 0, 0]));
    let mut dec = Vc1Decoder::with_tables(synthetic_tables());
    dec.set_config(Vc1Config::default());
    dec.open(&video_params(CodecId::Vc1, 16, 16, Vec::new())).unwrap();
    dec.send_packet(&Packet::from_data(packet)).unwrap();
    dec.send_packet(&Packet::empty()).unwrap();
    assert_eq!(receive_video(&mut dec).picture_type, PictureType::I);
}
