use avc_core::{AvcError, AvcResult};

use super::super::{
    CAT_LUMA_DC, CabacEncoder, ChromaPredMode, DecoderConfig, Intra16x16Mode, IntraNxNMode,
    MacroblockKind, MacroblockUnit, NeighborAvailability, PictureDecoder, PictureParams,
    PictureStatus, PipelineConfig, SampleReconstruction, SliceData, SliceDecoder, SliceParams,
    SliceType,
};

use super::helpers::{CollectSink, SliceWriter, decode_with, write_i16x16_header};

// ============================================================
// 码流构造
// ============================================================

/// 单个 I_16x16 宏块, CBP 0, 无系数
fn single_i16x16_slice() -> Vec<u8> {
    let mut w = SliceWriter::new(26, 0);
    write_i16x16_header(&mut w, 0, 0);
    w.bin(64, 0); // intra_chroma_pred_mode
    w.bin(60, 0); // mb_qp_delta
    w.bin(85 + 3, 0); // 亮度 DC coded_block_flag, 两侧不可用
    w.terminate(1);
    w.finish()
}

/// 2x2 宏块的 I slice: I_16x16, I_4x4, I_16x16, I_16x16
fn two_row_i_slice() -> Vec<u8> {
    let mut w = SliceWriter::new(26, 0);

    // (0, 0)
    write_i16x16_header(&mut w, 0, 0);
    w.bins(&[(64, 0), (60, 0), (85 + 3, 0)]);
    w.terminate(0);

    // (1, 0): I_NxN, 左邻为 I_16x16
    w.bin(4, 0);
    w.bins(&[(68, 0), (69, 0), (69, 0), (69, 0)]);
    for _ in 1..16 {
        w.bin(68, 1);
    }
    w.bin(64, 0);
    w.bins(&[(74, 0), (74, 0), (76, 0), (76, 0), (77, 0)]);
    w.terminate(0);

    // (0, 1): 上邻 I_16x16, 左侧不可用
    write_i16x16_header(&mut w, 1, 2);
    w.bins(&[(64, 0), (60, 0), (85 + 1, 0)]);
    w.terminate(0);

    // (1, 1)
    write_i16x16_header(&mut w, 1, 1);
    w.bins(&[(64, 0), (60, 0), (85, 0)]);
    w.terminate(1);
    w.finish()
}

fn pcm_bytes() -> Vec<u8> {
    (0..384u32).map(|i| (i * 7 + 3) as u8).collect()
}

/// I_PCM 后接一个 I_16x16
fn pcm_slice() -> Vec<u8> {
    let mut w = SliceWriter::new(26, 0);
    w.bin(3, 1);
    w.terminate(1);
    w.enc.write_pcm_bytes(&pcm_bytes());
    w.terminate(0);

    write_i16x16_header(&mut w, 1, 0);
    // 左邻 I_PCM 的 DC 视为已编码
    w.bins(&[(64, 0), (60, 0), (85 + 3, 0)]);
    w.terminate(1);
    w.finish()
}

fn pipelined() -> DecoderConfig {
    DecoderConfig {
        pipeline: PipelineConfig {
            enabled: true,
            row_queue_depth: 1,
        },
        ..DecoderConfig::default()
    }
}

// ============================================================
// I slice
// ============================================================

#[test]
fn test_single_i16x16_macroblock() {
    let rbsp = single_i16x16_slice();
    let (result, sink, dec) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 26),
        &rbsp,
    );
    let summary = result.expect("slice 应解码成功");
    assert_eq!(summary.mb_count, 1);
    assert!(summary.end_of_slice);
    assert_eq!(summary.qp_delta_inc, 0);
    assert_eq!(summary.final_qp, 26);
    assert_eq!(sink.rows, vec![0]);

    let unit = &sink.units[0];
    assert_eq!(
        unit.kind,
        MacroblockKind::Intra16x16 {
            mode: Intra16x16Mode::Vertical,
            chroma: ChromaPredMode::Dc,
        }
    );
    assert_eq!(unit.qp, [26, 26, 26]);
    assert_eq!((unit.cbp_luma, unit.cbp_chroma), (0, 0));
    assert!(unit.coeffs.is_zero(), "CBP 0 且 DC 块未编码时无系数");
    assert_eq!(unit.availability, NeighborAvailability::empty());
    assert_eq!(dec.qp_delta_inc(), 0);
}

#[test]
fn test_i16x16_dc_coefficient_and_qp_delta() {
    let mut w = SliceWriter::new(26, 0);
    write_i16x16_header(&mut w, 0, 0);
    w.bin(64, 0);
    w.qp_delta(1, false);
    w.residual_block(&CAT_LUMA_DC, Some(3), 16, 1, &[(0, 1)]);
    w.terminate(1);
    let rbsp = w.finish();

    let (result, sink, dec) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 26),
        &rbsp,
    );
    let summary = result.expect("slice 应解码成功");
    assert_eq!(summary.final_qp, 27);
    assert_eq!(summary.qp_delta_inc, 1, "非零 mb_qp_delta 后上下文增量为 1");

    let unit = &sink.units[0];
    assert_eq!(unit.qp, [27, 27, 27]);
    assert_eq!(unit.coeffs.dc[0][0], 1, "DC 系数应写入位置 0");
    assert_eq!(unit.coeffs.dc[0].iter().filter(|&&c| c != 0).count(), 1);
    assert_eq!(dec.neighbors().get(0, 0).cbf_dc & 1, 1, "邻居记录应保存 DC 标志");
}

#[test]
fn test_two_row_slice_in_raster_order() {
    let rbsp = two_row_i_slice();
    let (result, sink, _) = decode_with(
        PictureParams::new(2, 2),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 26),
        &rbsp,
    );
    let summary = result.expect("slice 应解码成功");
    assert_eq!(summary.mb_count, 4);
    assert_eq!(sink.rows, vec![0, 1], "每行结束应通知一次");

    let positions: Vec<_> = sink.units.iter().map(|u| (u.mb_x, u.mb_y)).collect();
    assert_eq!(positions, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);

    let mut expected_modes = [IntraNxNMode::Vertical; 16];
    for blk in [1, 4, 5] {
        expected_modes[blk] = IntraNxNMode::Dc;
    }
    assert_eq!(
        sink.units[1].kind,
        MacroblockKind::Intra4x4 {
            modes: expected_modes,
            chroma: ChromaPredMode::Dc,
        },
        "预测模式应按左/上邻的最小值推导"
    );
    assert_eq!(
        sink.units[2].kind,
        MacroblockKind::Intra16x16 {
            mode: Intra16x16Mode::Dc,
            chroma: ChromaPredMode::Dc,
        }
    );
    assert_eq!(
        sink.units[3].kind,
        MacroblockKind::Intra16x16 {
            mode: Intra16x16Mode::Horizontal,
            chroma: ChromaPredMode::Dc,
        }
    );

    assert_eq!(sink.units[1].availability, NeighborAvailability::LEFT);
    assert_eq!(
        sink.units[2].availability,
        NeighborAvailability::TOP | NeighborAvailability::TOP_RIGHT
    );
    assert_eq!(
        sink.units[3].availability,
        NeighborAvailability::LEFT | NeighborAvailability::TOP | NeighborAvailability::TOP_LEFT
    );
}

#[test]
fn test_pcm_macroblock_restarts_engine() {
    let rbsp = pcm_slice();
    let (result, sink, dec) = decode_with(
        PictureParams::new(2, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 26),
        &rbsp,
    );
    let summary = result.expect("slice 应解码成功");
    assert_eq!(summary.mb_count, 2);

    let pcm = pcm_bytes();
    match &sink.units[0].kind {
        MacroblockKind::Pcm { samples } => {
            let luma: Vec<u16> = pcm[..256].iter().map(|&b| u16::from(b)).collect();
            let cr: Vec<u16> = pcm[320..].iter().map(|&b| u16::from(b)).collect();
            assert_eq!(samples.luma, luma);
            assert_eq!(samples.cb.len(), 64);
            assert_eq!(samples.cr, cr);
        }
        other => panic!("首个宏块应为 I_PCM, 实际 {:?}", other),
    }
    assert_eq!((sink.units[0].cbp_luma, sink.units[0].cbp_chroma), (0x0F, 2));
    assert!(matches!(
        sink.units[1].kind,
        MacroblockKind::Intra16x16 { .. }
    ));
    assert_eq!(dec.neighbors().get(0, 0).cbp_luma, 0x0F);
}

#[test]
fn test_pcm_past_slice_end_is_desync() {
    let mut w = SliceWriter::new(26, 0);
    w.bin(3, 1);
    w.terminate(1);
    let rbsp = w.finish();

    let (result, sink, _) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 26),
        &rbsp,
    );
    assert!(matches!(result, Err(AvcError::EntropyDesync(_))));
    assert!(sink.units.is_empty());
}

#[test]
fn test_picture_exhausted_without_end_flag() {
    let mut w = SliceWriter::new(26, 0);
    write_i16x16_header(&mut w, 0, 0);
    w.bins(&[(64, 0), (60, 0), (85 + 3, 0)]);
    w.terminate(0);
    // 解码器不会读取此 bin, 仅用于结束算术码
    w.terminate(1);
    let rbsp = w.finish();

    let (result, sink, _) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 26),
        &rbsp,
    );
    let summary = result.expect("图像耗尽时应正常结束");
    assert!(!summary.end_of_slice);
    assert_eq!(summary.mb_count, 1);
    assert_eq!(sink.rows, vec![0]);
}

// ============================================================
// P / B slice
// ============================================================

#[test]
fn test_p_skip_macroblocks() {
    let mut w = SliceWriter::new(26, 1);
    w.bin(11, 1);
    w.terminate(0);
    w.bin(11, 1); // 左邻 skip, 上邻不可用
    w.terminate(1);
    let rbsp = w.finish();

    let (result, sink, dec) = decode_with(
        PictureParams::new(2, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::P, 26),
        &rbsp,
    );
    let summary = result.expect("slice 应解码成功");
    assert_eq!(summary.mb_count, 2);
    assert!(sink.units.iter().all(|u| u.kind == MacroblockKind::Skip));
    assert!(sink.units.iter().all(|u| u.qp == [26, 26, 26]));
    assert_eq!(dec.neighbors().get(1, 0).skip_inc, 0);
}

#[test]
fn test_p_inter_macroblock_is_unsupported() {
    let mut w = SliceWriter::new(26, 1);
    w.bins(&[(11, 0), (14, 0), (15, 0), (16, 0)]);
    w.terminate(1);
    let rbsp = w.finish();

    let (result, sink, _) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::P, 26),
        &rbsp,
    );
    match result {
        Err(AvcError::UnsupportedFeature(msg)) => {
            assert!(msg.contains("P_L0_16x16"), "错误信息应包含分割形状: {}", msg)
        }
        other => panic!("应返回 UnsupportedFeature, 实际 {:?}", other),
    }
    assert!(sink.units.is_empty(), "失败的行不应交付");
}

#[test]
fn test_b_direct_macroblock_is_unsupported() {
    let mut w = SliceWriter::new(26, 1);
    w.bins(&[(24, 0), (27, 0)]);
    w.terminate(1);
    let rbsp = w.finish();

    let (result, _, _) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::B, 26),
        &rbsp,
    );
    match result {
        Err(AvcError::UnsupportedFeature(msg)) => assert!(msg.contains("B_Direct_16x16")),
        other => panic!("应返回 UnsupportedFeature, 实际 {:?}", other),
    }
}

#[test]
fn test_unsupported_slice_configurations() {
    let rbsp = single_i16x16_slice();

    let mut pic = PictureParams::new(1, 1);
    pic.mbaff = true;
    let (result, _, _) = decode_with(
        pic,
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 26),
        &rbsp,
    );
    assert!(matches!(result, Err(AvcError::UnsupportedFeature(_))), "MBAFF");

    let (result, _, _) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::Sp, 26),
        &rbsp,
    );
    assert!(matches!(result, Err(AvcError::UnsupportedFeature(_))), "SP slice");

    let mut slice = SliceParams::new(SliceType::I, 26);
    slice.first_mb_in_slice = 1;
    let (result, _, _) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &slice,
        &rbsp,
    );
    assert!(matches!(result, Err(AvcError::StructuralFault(_))), "first_mb 越界");

    let (result, _, _) = decode_with(
        PictureParams::new(1, 1),
        DecoderConfig::default(),
        &SliceParams::new(SliceType::I, 52),
        &rbsp,
    );
    assert!(matches!(result, Err(AvcError::StructuralFault(_))), "slice_qp 越界");
}

// ============================================================
// 流水线 / 轨迹 / 图像聚合
// ============================================================

#[test]
fn test_pipelined_decode_matches_sequential() {
    let rbsp = two_row_i_slice();
    let slice = SliceParams::new(SliceType::I, 26);
    let (seq, seq_sink, _) = decode_with(
        PictureParams::new(2, 2),
        DecoderConfig::default(),
        &slice,
        &rbsp,
    );
    let (pipe, pipe_sink, _) = decode_with(PictureParams::new(2, 2), pipelined(), &slice, &rbsp);
    assert_eq!(seq.expect("顺序解码应成功"), pipe.expect("流水线解码应成功"));
    assert_eq!(seq_sink.units, pipe_sink.units);
    assert_eq!(seq_sink.rows, pipe_sink.rows);
}

/// 第一行结束时即报错的重建协作方
struct FailingSink;

impl SampleReconstruction for FailingSink {
    fn reconstruct_macroblock(&mut self, _unit: &MacroblockUnit) -> AvcResult<()> {
        Ok(())
    }

    fn finish_row(&mut self, mb_y: usize) -> AvcResult<()> {
        Err(AvcError::Internal(format!("重建失败, mb_y={}", mb_y)))
    }
}

#[test]
fn test_reconstruction_error_propagates_in_both_modes() {
    let rbsp = two_row_i_slice();
    let slice = SliceParams::new(SliceType::I, 26);
    for config in [DecoderConfig::default(), pipelined()] {
        let mut dec = SliceDecoder::new(PictureParams::new(2, 2), config).expect("图像参数应有效");
        let result = dec.decode_slice(&slice, &SliceData::from_rbsp(&rbsp), &mut FailingSink);
        assert!(
            matches!(result, Err(AvcError::Internal(_))),
            "重建错误应返回给调用方: {:?}",
            result
        );
    }
}

#[test]
fn test_slice_trace_replays_to_identical_bytes() {
    let config = DecoderConfig {
        trace_bins: true,
        ..DecoderConfig::default()
    };
    for (pic, rbsp) in [
        (PictureParams::new(2, 2), two_row_i_slice()),
        (PictureParams::new(2, 1), pcm_slice()),
    ] {
        let (result, _, mut dec) = decode_with(
            pic,
            config.clone(),
            &SliceParams::new(SliceType::I, 26),
            &rbsp,
        );
        result.expect("slice 应解码成功");
        let trace = dec.take_trace();
        assert!(!trace.is_empty());

        let mut enc = CabacEncoder::new();
        enc.replay(&trace);
        assert_eq!(enc.finish(), rbsp, "轨迹重新编码应与原码流一致");
    }
}

#[test]
fn test_decoder_is_reusable_across_slices() {
    let rbsp = single_i16x16_slice();
    let mut dec = SliceDecoder::new(PictureParams::new(1, 2), DecoderConfig::default())
        .expect("图像参数应有效");
    let data = SliceData::from_rbsp(&rbsp);
    let mut sink = CollectSink::default();

    let first = dec
        .decode_slice(&SliceParams::new(SliceType::I, 26), &data, &mut sink)
        .expect("第一个 slice 应成功");
    let mut second_params = SliceParams::new(SliceType::I, 26);
    second_params.first_mb_in_slice = 1;
    let second = dec
        .decode_slice(&second_params, &data, &mut sink)
        .expect("第二个 slice 应成功");

    // 每个 slice 重新初始化上下文, 邻居在 slice 边界不可用
    assert_eq!(first.bits_consumed, second.bits_consumed);
    assert_eq!(second.first_mb, 1);
    assert_eq!(sink.units[1].mb_y, 1);
    assert_eq!(sink.units[0].kind, sink.units[1].kind);
}

#[test]
fn test_picture_decoder_marks_incomplete_on_bad_slice() {
    let _ = env_logger::builder().is_test(true).try_init();

    let good = SliceData::from_rbsp(&single_i16x16_slice());
    let mut w = SliceWriter::new(26, 1);
    w.bins(&[(11, 0), (14, 0), (15, 0), (16, 0)]);
    w.terminate(1);
    let bad = SliceData::from_rbsp(&w.finish());

    let mut pic_dec =
        PictureDecoder::new(PictureParams::new(1, 2), DecoderConfig::default()).expect("应成功");
    let mut sink = CollectSink::default();
    assert_eq!(pic_dec.status(), PictureStatus::InProgress);

    let summary = pic_dec.decode_slice(&SliceParams::new(SliceType::I, 26), &good, &mut sink);
    assert!(summary.is_some());
    assert_eq!(pic_dec.decoded_mbs(), 1);

    let mut p_slice = SliceParams::new(SliceType::P, 26);
    p_slice.first_mb_in_slice = 1;
    assert!(pic_dec.decode_slice(&p_slice, &bad, &mut sink).is_none());
    assert_eq!(pic_dec.status(), PictureStatus::Incomplete);
    assert_eq!(pic_dec.malformed_slices(), 1);
    assert!(pic_dec.last_error().is_some_and(|e| e.contains("P_L0_16x16")));

    // 新图像重置状态, 两个 slice 都成功时图像完整
    pic_dec.start_picture();
    let mut second = SliceParams::new(SliceType::I, 26);
    second.first_mb_in_slice = 1;
    assert!(pic_dec.decode_slice(&SliceParams::new(SliceType::I, 26), &good, &mut sink).is_some());
    assert!(pic_dec.decode_slice(&second, &good, &mut sink).is_some());
    assert_eq!(pic_dec.status(), PictureStatus::Complete);
    assert_eq!(pic_dec.decoded_mbs(), 2);
}
