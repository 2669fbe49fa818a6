//! slice 熵解码端到端测试.
//!
//! 用 CABAC 编码器合成多行 I_16x16 图像, 验证光栅顺序, QP 轨迹,
//! 流水线与顺序模式的一致性, 以及多 slice 图像的聚合状态.

use avc::codec::{
    CabacEncoder, ContextModel, DecoderConfig, Intra16x16Mode, MacroblockKind, MacroblockUnit,
    PictureDecoder, PictureParams, PictureStatus, PipelineConfig, SampleReconstruction, SliceData,
    SliceDecoder, SliceParams, SliceType,
};
use avc::core::AvcResult;

const WIDTH: usize = 8;
const HEIGHT: usize = 4;

#[derive(Default)]
struct Collect {
    units: Vec<MacroblockUnit>,
    rows: Vec<usize>,
}

impl SampleReconstruction for Collect {
    fn reconstruct_macroblock(&mut self, unit: &MacroblockUnit) -> AvcResult<()> {
        self.units.push(unit.clone());
        Ok(())
    }

    fn finish_row(&mut self, mb_y: usize) -> AvcResult<()> {
        self.rows.push(mb_y);
        Ok(())
    }
}

/// 宏块的合成参数: 16x16 预测模式与 mb_qp_delta
#[derive(Clone, Copy)]
struct MbPlan {
    pred_mode: u32,
    qp_delta: i32,
}

fn plan_for(addr: usize) -> MbPlan {
    let h = (addr as u32).wrapping_mul(2_654_435_761) >> 7;
    MbPlan {
        pred_mode: h % 4,
        qp_delta: (h % 7) as i32 - 3,
    }
}

/// 编码 [first, first + count) 范围的 I_16x16 宏块 (CBP 0, DC 块未编码)
fn encode_slice(first: usize, count: usize, slice_qp: i32) -> Vec<u8> {
    let mut ctxs = ContextModel::new(slice_qp, 0).expect("上下文初始化失败");
    let mut enc = CabacEncoder::new();
    let mut prev_nz = false;

    for addr in first..first + count {
        let (x, y) = (addr % WIDTH, addr / WIDTH);
        // 同一 slice 内已解码的邻居才可用
        let left = x > 0 && addr > first;
        let above = y > 0 && addr >= first + WIDTH;
        let plan = plan_for(addr);

        enc.encode_decision(&mut ctxs[3 + usize::from(left) + usize::from(above)], 1);
        enc.encode_terminate(0);
        enc.encode_decision(&mut ctxs[6], 0);
        enc.encode_decision(&mut ctxs[7], 0);
        enc.encode_decision(&mut ctxs[9], plan.pred_mode >> 1);
        enc.encode_decision(&mut ctxs[10], plan.pred_mode & 1);
        enc.encode_decision(&mut ctxs[64], 0);

        let d = plan.qp_delta;
        let k = (if d > 0 { 2 * d - 1 } else { -2 * d }) as usize;
        let mut inc = usize::from(prev_nz);
        for _ in 0..k {
            enc.encode_decision(&mut ctxs[60 + inc], 1);
            inc = 2 + (inc >> 1);
        }
        enc.encode_decision(&mut ctxs[60 + inc], 0);
        prev_nz = d != 0;

        let cbf_inc = usize::from(!left) + 2 * usize::from(!above);
        enc.encode_decision(&mut ctxs[85 + cbf_inc], 0);

        let last = addr + 1 == first + count;
        enc.encode_terminate(u32::from(last));
    }
    enc.finish()
}

fn expected_qps(first: usize, count: usize, slice_qp: i32) -> Vec<i32> {
    let mut qp = slice_qp;
    (first..first + count)
        .map(|addr| {
            qp = (qp + plan_for(addr).qp_delta + 52).rem_euclid(52);
            qp
        })
        .collect()
}

fn pipelined(depth: usize) -> DecoderConfig {
    DecoderConfig {
        pipeline: PipelineConfig {
            enabled: true,
            row_queue_depth: depth,
        },
        ..DecoderConfig::default()
    }
}

#[test]
fn test_full_picture_raster_order_and_qp_trajectory() {
    let _ = env_logger::builder().is_test(true).try_init();

    let total = WIDTH * HEIGHT;
    let rbsp = encode_slice(0, total, 30);
    let mut dec = SliceDecoder::new(PictureParams::new(WIDTH, HEIGHT), DecoderConfig::default())
        .expect("图像参数应有效");
    let mut sink = Collect::default();
    let summary = dec
        .decode_slice(
            &SliceParams::new(SliceType::I, 30),
            &SliceData::from_rbsp(&rbsp),
            &mut sink,
        )
        .expect("slice 应解码成功");

    assert_eq!(summary.mb_count, total);
    assert!(summary.end_of_slice);
    assert_eq!(sink.rows, (0..HEIGHT).collect::<Vec<_>>());

    let qps = expected_qps(0, total, 30);
    for (addr, unit) in sink.units.iter().enumerate() {
        assert_eq!((unit.mb_x, unit.mb_y), (addr % WIDTH, addr / WIDTH));
        assert_eq!(unit.qp[0], qps[addr], "宏块 {} 的 QP", addr);
        match unit.kind {
            MacroblockKind::Intra16x16 { mode, .. } => {
                assert_eq!(mode, Intra16x16Mode::from_index(plan_for(addr).pred_mode));
            }
            ref other => panic!("宏块 {} 类型错误: {:?}", addr, other),
        }
        assert!(unit.coeffs.is_zero());
    }
    assert_eq!(summary.final_qp, qps[total - 1]);
}

#[test]
fn test_pipeline_depths_match_sequential() {
    let total = WIDTH * HEIGHT;
    let rbsp = encode_slice(0, total, 22);
    let slice = SliceParams::new(SliceType::I, 22);
    let data = SliceData::from_rbsp(&rbsp);

    let decode = |config: DecoderConfig| {
        let mut dec =
            SliceDecoder::new(PictureParams::new(WIDTH, HEIGHT), config).expect("图像参数应有效");
        let mut sink = Collect::default();
        let summary = dec.decode_slice(&slice, &data, &mut sink).expect("slice 应解码成功");
        (summary, sink.units, sink.rows)
    };

    let baseline = decode(DecoderConfig::default());
    for depth in [1, 2, 8] {
        assert_eq!(
            decode(pipelined(depth)),
            baseline,
            "队列深度 {} 的结果应与顺序模式一致",
            depth
        );
    }
}

#[test]
fn test_multi_slice_picture_status() {
    // 第一个 slice 覆盖前 1.5 行, 第二个 slice 从行中间开始
    let split = WIDTH + WIDTH / 2;
    let total = WIDTH * HEIGHT;
    let first = SliceData::from_rbsp(&encode_slice(0, split, 26));
    let second = SliceData::from_rbsp(&encode_slice(split, total - split, 26));

    let mut pic_dec = PictureDecoder::new(PictureParams::new(WIDTH, HEIGHT), pipelined(2))
        .expect("图像参数应有效");
    let mut sink = Collect::default();

    let s1 = pic_dec
        .decode_slice(&SliceParams::new(SliceType::I, 26), &first, &mut sink)
        .expect("第一个 slice 应成功");
    assert_eq!(s1.mb_count, split);
    assert_eq!(pic_dec.status(), PictureStatus::InProgress);

    let mut params = SliceParams::new(SliceType::I, 26);
    params.first_mb_in_slice = split as u32;
    let s2 = pic_dec
        .decode_slice(&params, &second, &mut sink)
        .expect("第二个 slice 应成功");
    assert_eq!(s2.first_mb, split);
    assert_eq!(s2.mb_count, total - split);
    assert_eq!(pic_dec.status(), PictureStatus::Complete);
    assert_eq!(pic_dec.decoded_mbs(), total);

    // 第二行被两个 slice 分别交付一次
    assert_eq!(sink.rows, vec![0, 1, 1, 2, 3]);
    let qps = expected_qps(split, total - split, 26);
    assert_eq!(sink.units[split].qp[0], qps[0], "新 slice 的 QP 从 SliceQP 开始");
}

#[test]
fn test_truncated_slice_marks_picture_incomplete() {
    let total = WIDTH * HEIGHT;
    let rbsp = encode_slice(0, total, 26);
    let truncated = SliceData::from_rbsp(&rbsp[..rbsp.len() / 3]);

    let mut pic_dec =
        PictureDecoder::new(PictureParams::new(WIDTH, HEIGHT), DecoderConfig::default())
            .expect("图像参数应有效");
    let mut sink = Collect::default();
    let result = pic_dec.decode_slice(&SliceParams::new(SliceType::I, 26), &truncated, &mut sink);

    // 截断后的码流要么失步被丢弃, 要么提前结束; 不能越界读取
    match result {
        None => {
            assert_eq!(pic_dec.status(), PictureStatus::Incomplete);
            assert_eq!(pic_dec.malformed_slices(), 1);
            assert!(pic_dec.last_error().is_some());
        }
        Some(summary) => assert!(summary.mb_count <= total),
    }
}
