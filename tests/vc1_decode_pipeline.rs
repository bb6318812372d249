//! VC-1 / WMV9 解码集成测试
//!
//! 验证解码器通过公开接口的完整流水:
//! - 注册表创建 vc1 / wmv3 解码器
//! - JSON 码表资源的加载
//! - WMV3 I 帧解码, 跳过帧复制参考帧
//! - 刷新信号与输出队列

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tao::codec::decoders::vc1::{
        AcCodingSetBook, CodeWord, ScanBook, Vc1CodeBooks, Vc1Decoder, Vc1Tables,
    };
    use tao::codec::{CodecId, CodecParameters, Decoder, Packet, PictureType, VideoFrame};
    use tao::core::{BitWriter, PixelFormat, Rational, TaoError};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn fixed(n: usize) -> Vec<CodeWord> {
        let bits = (usize::BITS - (n - 1).leading_zeros()).max(1) as u8;
        (0..n as u32).map(|i| (i, bits)).collect()
    }

    fn groups(count: usize, n: usize) -> Vec<Vec<CodeWord>> {
        (0..count).map(|_| fixed(n)).collect()
    }

    /// 全部使用定长码的测试码本
    fn test_books() -> Vc1CodeBooks {
        let ac = AcCodingSetBook {
            codes: fixed(3),
            run_level: vec![(0, 1), (0, 1)],
            last_index: 1,
        };
        let full: Vec<u8> = (0..64).collect();
        let top: Vec<u8> = (0..32).collect();
        let left: Vec<u8> = (0..64).filter(|p| p & 7 < 4).collect();
        let quarter: Vec<u8> = (0..32).filter(|p| p & 7 < 4).collect();
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

    /// Main 档次 STRUCT_C: 无环路滤波, 无 B 帧, 隐式量化
    fn struct_c() -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(1, 2);
        bw.write_bits(0, 2);
        bw.write_bits(0, 8);
        bw.write_bit(0);
        bw.write_bits(0, 2);
        bw.write_bits(0b11, 2);
        bw.write_bits(0, 5);
        bw.write_bit(0);
        bw.write_bits(0, 2);
        bw.write_bits(0, 3);
        bw.write_bits(0, 2);
        bw.write_bit(0);
        bw.write_bit(1);
        bw.finish()
    }

    /// 16x16 的 I 帧, 单个宏块, 亮度 DC 差分为 `dc`
    fn i_frame(dc: u32) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 2); // FRMCNT
        bw.write_bit(0); // I
        bw.write_bits(0, 7); // BF
        bw.write_bits(8, 5); // PQINDEX
        bw.write_bit(0); // HALFQP
        bw.write_bits(0, 3); // TRANSACFRM, TRANSACFRM2, TRANSDCTAB
        bw.write_bits(0, 6); // CBPCY
        bw.write_bit(0); // ACPRED
        bw.write_bits(dc, 7);
        bw.write_bit(0);
        for _ in 1..6 {
            bw.write_bits(0, 7);
        }
        bw.finish()
    }

    fn wmv3_params() -> CodecParameters {
        let params = CodecParameters::video(CodecId::Wmv3, 16, 16, struct_c());
        let video = params.video_params().expect("应为视频参数");
        assert_eq!(video.pixel_format, PixelFormat::Yuv420p);
        params
    }

    fn next_video(dec: &mut dyn Decoder) -> VideoFrame {
        dec.receive_frame()
            .expect("应输出一帧")
            .into_video()
            .expect("应为视频帧")
    }

    #[test]
    fn test_registry_creates_vc1_and_wmv3() {
        let registry = tao::default_codec_registry();
        let names: Vec<_> = registry
            .list_decoders()
            .into_iter()
            .map(|(_, name)| name.to_string())
            .collect();
        assert_eq!(names, vec!["vc1", "wmv3"]);

        let vc1 = registry.create_decoder(CodecId::Vc1).expect("应能创建 vc1");
        assert_eq!(vc1.codec_id(), CodecId::Vc1);
        let wmv3 = registry.create_decoder_by_name("wmv3").expect("应能创建 wmv3");
        assert_eq!(wmv3.codec_id(), CodecId::Wmv3);
        assert!(matches!(
            registry.create_decoder(CodecId::None),
            Err(TaoError::CodecNotFound(_))
        ));
    }

    #[test]
    fn test_open_without_tables_reports_codec_error() {
        if std::env::var_os("TAO_VC1_TABLES").is_some() {
            return;
        }
        let mut dec = Vc1Decoder::create_wmv3().expect("创建解码器失败");
        let err = dec.open(&wmv3_params()).unwrap_err();
        assert!(matches!(err, TaoError::Codec(_)), "{err:?}");
    }

    #[test]
    fn test_wmv3_pipeline_with_json_tables() {
        init_logger();
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let path = dir.path().join("vc1_tables.json");
        std::fs::write(&path, test_books().to_json().unwrap()).unwrap();
        let tables = Arc::new(Vc1Tables::load(&path).expect("加载码表失败"));

        let mut dec = Vc1Decoder::with_tables(tables);
        dec.open(&wmv3_params()).expect("打开失败");

        let time_base = Rational::new(1, 1000);
        let mut key = Packet::from_data(i_frame(5));
        key.pts = 0;
        key.time_base = time_base;
        key.is_keyframe = true;
        dec.send_packet(&key).unwrap();
        let first = next_video(&mut dec);
        assert_eq!(first.picture_type, PictureType::I);
        assert!(first.is_keyframe);
        assert_eq!((first.width, first.height), (16, 16));
        assert_eq!(first.time_base, time_base);
        let y0 = first.data[0][0];
        assert!(first.data[0].iter().take(16).all(|&v| v == y0), "DC 块应为平坦");

        // 不超过 2 字节的数据包表示跳过帧
        let mut skipped = Packet::from_data(vec![0]);
        skipped.pts = 40;
        skipped.time_base = time_base;
        dec.send_packet(&skipped).unwrap();
        let second = next_video(&mut dec);
        assert_eq!(second.pts, 40);
        assert_eq!(second.picture_type, PictureType::P);
        assert!(!second.is_keyframe);
        assert_eq!(second.data, first.data);

        dec.send_packet(&Packet::empty()).unwrap();
        assert!(matches!(dec.receive_frame(), Err(TaoError::NeedMoreData)));

        dec.flush();
        assert!(matches!(dec.receive_frame(), Err(TaoError::NeedMoreData)));
    }
}
