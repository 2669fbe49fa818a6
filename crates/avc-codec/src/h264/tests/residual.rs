use super::super::residual::{BlockScan, decode_residual_block};
use super::super::tables::{CHROMA_DC_SCAN_422, ZIGZAG_4X4, ZIGZAG_8X8};
use super::super::{
    CAT_CHROMA_DC, CAT_LUMA_4X4, CAT_LUMA_8X8, CAT_LUMA_AC, CabacDecoder, ContextModel,
};

use super::helpers::SliceWriter;

fn scan4(start: usize, len: usize) -> BlockScan<'static> {
    BlockScan {
        scan: &ZIGZAG_4X4,
        start,
        len,
        field: false,
        num_c8x8: 1,
    }
}

#[test]
fn test_empty_block_yields_no_coefficients() {
    let mut w = SliceWriter::new(26, 0);
    w.residual_block(&CAT_LUMA_4X4, Some(2), 16, 1, &[]);
    w.terminate(1);
    let data = w.finish();

    let mut ctxs = ContextModel::new(26, 0).expect("初始化应成功");
    let mut dec = CabacDecoder::new(&data);
    let mut coeffs = [0i32; 16];
    let n = decode_residual_block(
        &mut dec,
        &mut ctxs,
        &CAT_LUMA_4X4,
        Some(2),
        &scan4(0, 16),
        &mut coeffs,
    )
    .expect("解码应成功");
    assert_eq!(n, 0, "coded_block_flag 为 0 时不应有系数");
    assert!(coeffs.iter().all(|&c| c == 0));
    assert_eq!(dec.decode_terminate(), 1, "块后应紧跟终止 bin");
}

#[test]
fn test_escape_path_reconstructs_large_magnitudes() {
    let levels = [(0usize, 15i32), (3, -16), (7, 1000), (9, -1), (15, 14)];
    let mut w = SliceWriter::new(26, 0);
    w.residual_block(&CAT_LUMA_4X4, Some(0), 16, 1, &levels);
    w.terminate(1);
    let data = w.finish();

    let mut ctxs = ContextModel::new(26, 0).expect("初始化应成功");
    let mut dec = CabacDecoder::new(&data);
    let mut coeffs = [0i32; 16];
    let n = decode_residual_block(
        &mut dec,
        &mut ctxs,
        &CAT_LUMA_4X4,
        Some(0),
        &scan4(0, 16),
        &mut coeffs,
    )
    .expect("解码应成功");
    assert_eq!(n, levels.len());
    for &(idx, value) in &levels {
        let pos = ZIGZAG_4X4[idx] as usize;
        assert_eq!(coeffs[pos], value, "扫描位置 {} 的系数", idx);
    }
    let nonzero = coeffs.iter().filter(|&&c| c != 0).count();
    assert_eq!(nonzero, levels.len(), "其他位置应保持 0");
    assert_eq!(dec.decode_terminate(), 1);
}

#[test]
fn test_ac_block_skips_dc_slot() {
    // 最后一个列表位置 (14) 无 last 标志, 隐式显著
    let levels = [(0usize, 2i32), (14, -3)];
    let mut w = SliceWriter::new(30, 0);
    w.residual_block(&CAT_LUMA_AC, Some(1), 15, 1, &levels);
    w.terminate(1);
    let data = w.finish();

    let mut ctxs = ContextModel::new(30, 0).expect("初始化应成功");
    let mut dec = CabacDecoder::new(&data);
    let mut coeffs = [0i32; 16];
    let n = decode_residual_block(
        &mut dec,
        &mut ctxs,
        &CAT_LUMA_AC,
        Some(1),
        &scan4(1, 15),
        &mut coeffs,
    )
    .expect("解码应成功");
    assert_eq!(n, 2);
    assert_eq!(coeffs[0], 0, "AC 块不写 DC 位置");
    assert_eq!(coeffs[ZIGZAG_4X4[1] as usize], 2);
    assert_eq!(coeffs[ZIGZAG_4X4[15] as usize], -3);
    assert_eq!(dec.decode_terminate(), 1);
}

#[test]
fn test_chroma_dc_422_uses_num_c8x8_contexts() {
    let levels = [(1usize, 1i32), (4, -2), (6, 5)];
    let mut w = SliceWriter::new(28, 0);
    w.residual_block(&CAT_CHROMA_DC, Some(3), 8, 2, &levels);
    w.terminate(1);
    let data = w.finish();

    let mut ctxs = ContextModel::new(28, 0).expect("初始化应成功");
    let mut dec = CabacDecoder::new(&data);
    let mut dc = [0i32; 16];
    let layout = BlockScan {
        scan: &CHROMA_DC_SCAN_422,
        start: 0,
        len: 8,
        field: false,
        num_c8x8: 2,
    };
    let n = decode_residual_block(&mut dec, &mut ctxs, &CAT_CHROMA_DC, Some(3), &layout, &mut dc)
        .expect("解码应成功");
    assert_eq!(n, 3);
    assert_eq!(dc[CHROMA_DC_SCAN_422[1] as usize], 1);
    assert_eq!(dc[CHROMA_DC_SCAN_422[4] as usize], -2);
    assert_eq!(dc[CHROMA_DC_SCAN_422[6] as usize], 5);
    assert_eq!(dec.decode_terminate(), 1);
}

#[test]
fn test_8x8_block_without_coded_block_flag() {
    let levels = [(0usize, 3i32), (5, 1), (20, -1), (40, 7)];
    let mut w = SliceWriter::new(26, 0);
    w.residual_block(&CAT_LUMA_8X8, None, 64, 1, &levels);
    w.terminate(1);
    let data = w.finish();

    let mut ctxs = ContextModel::new(26, 0).expect("初始化应成功");
    let mut dec = CabacDecoder::new(&data);
    let mut coeffs = [0i32; 64];
    let layout = BlockScan {
        scan: &ZIGZAG_8X8,
        start: 0,
        len: 64,
        field: false,
        num_c8x8: 1,
    };
    let n = decode_residual_block(&mut dec, &mut ctxs, &CAT_LUMA_8X8, None, &layout, &mut coeffs)
        .expect("解码应成功");
    assert_eq!(n, levels.len());
    for &(idx, value) in &levels {
        assert_eq!(coeffs[ZIGZAG_8X8[idx] as usize], value, "8x8 扫描位置 {}", idx);
    }
    assert_eq!(dec.decode_terminate(), 1);
}

#[test]
fn test_escape_prefix_overflow_reports_desync() {
    // 全 1 的输入让旁路前缀无限延续
    let data = [0xFFu8; 64];
    let mut ctxs = ContextModel::new(26, 0).expect("初始化应成功");
    let mut dec = CabacDecoder::new(&data);
    let mut coeffs = [0i32; 16];
    let mut saw_desync = false;
    for _ in 0..64 {
        match decode_residual_block(
            &mut dec,
            &mut ctxs,
            &CAT_LUMA_4X4,
            Some(0),
            &scan4(0, 16),
            &mut coeffs,
        ) {
            Ok(n) => assert!(n <= 16, "系数数量不应超过块大小"),
            Err(_) => {
                saw_desync = true;
                break;
            }
        }
    }
    assert!(saw_desync, "全 1 输入最终应触发转义前缀溢出");
}
