use super::super::{MbContext, NeighborGrid};

fn marked(id: u8) -> MbContext {
    let mut rec = MbContext::seeded(false);
    rec.intra_modes = [id; 16];
    rec
}

fn id_of(rec: &MbContext) -> Option<u8> {
    rec.available.then_some(rec.intra_modes[0])
}

#[test]
fn test_edges_return_sentinel() {
    let mut grid = NeighborGrid::new();
    grid.reset(3, false);
    let seed = grid.seed(0, 0);
    assert!(seed.available);
    assert_eq!(seed.cbp_luma, 0, "当前宏块初始 CBP 为 0");
    assert_eq!(*grid.left(), MbContext::UNAVAILABLE);
    assert_eq!(*grid.above(), MbContext::UNAVAILABLE);
    assert_eq!(*grid.above_left(), MbContext::UNAVAILABLE);
    assert_eq!(*grid.above_right(), MbContext::UNAVAILABLE);

    let sentinel = MbContext::UNAVAILABLE;
    assert_eq!(sentinel.cbp_luma, 0x0F, "不可用邻居的亮度 CBP 视为全编码");
    assert_eq!(sentinel.intra_modes, [2; 16]);
    assert!(sentinel.intra_pred_unavailable);
}

#[test]
fn test_raster_walk_lookups() {
    let width = 3;
    let mut grid = NeighborGrid::new();
    grid.reset(width, false);
    for y in 0..4usize {
        for x in 0..width {
            grid.seed(x, y);
            let id = |dx: isize, dy: isize| -> Option<u8> {
                let nx = x as isize + dx;
                let ny = y as isize + dy;
                (nx >= 0 && ny >= 0 && (nx as usize) < width)
                    .then(|| (ny as usize * width + nx as usize) as u8)
            };
            assert_eq!(id_of(grid.left()), id(-1, 0), "({}, {}) 左邻", x, y);
            assert_eq!(id_of(grid.above()), id(0, -1), "({}, {}) 上邻", x, y);
            assert_eq!(id_of(grid.above_left()), id(-1, -1), "({}, {}) 左上邻", x, y);
            assert_eq!(id_of(grid.above_right()), id(1, -1), "({}, {}) 右上邻", x, y);
            grid.commit(marked((y * width + x) as u8));
        }
    }
}

#[test]
fn test_ring_rows_are_recycled() {
    let mut grid = NeighborGrid::new();
    grid.reset(2, false);
    for y in 0..3usize {
        for x in 0..2usize {
            grid.seed(x, y);
            grid.commit(marked((y * 2 + x) as u8));
        }
    }
    // 当前停在 (1, 2): 第 0 行已被第 2 行覆盖
    assert_eq!(id_of(grid.get(0, 1)), Some(2));
    assert_eq!(id_of(grid.get(1, 2)), Some(5));
    assert!(!grid.get(0, 0).available, "超出两行窗口的记录不可查询");
    assert!(!grid.get(5, 2).available, "越过宽度的查询返回哨兵");

    grid.seed(0, 3);
    assert_eq!(id_of(grid.above()), Some(4));
    assert_eq!(id_of(grid.above_right()), Some(5));
    assert!(!grid.get(1, 3).available, "当前行尚未解码的位置不可用");
}

#[test]
fn test_reset_clears_previous_slice() {
    let mut grid = NeighborGrid::new();
    grid.reset(4, false);
    for x in 0..4 {
        grid.seed(x, 0);
        grid.commit(marked(x as u8));
    }
    // 新 slice 从行中间开始, 前一个 slice 的宏块不可用
    grid.reset(4, false);
    grid.seed(2, 1);
    assert!(!grid.above().available);
    assert!(!grid.left().available);
    assert!(!grid.above_right().available);
}

#[test]
fn test_constrained_intra_seed() {
    let mut grid = NeighborGrid::default();
    grid.reset(2, true);
    let seed = grid.seed(0, 0);
    assert!(seed.available);
    assert!(seed.intra_pred_unavailable, "受限帧内预测下初始记录不可作帧内参考");

    let mut pcm = seed;
    pcm.mark_pcm();
    assert!(!pcm.intra_pred_unavailable);
    assert_eq!((pcm.cbp_luma, pcm.cbp_chroma), (0x0F, 2));
    assert_eq!(pcm.cbf_4x4_bit(1, 1, 1, 2), 1);
    assert_eq!(pcm.cbf_8x8_bit(0, 1, 1), 1);

    let mut skip = MbContext::seeded(false);
    skip.mark_skip();
    assert_eq!((skip.skip_inc, skip.mb_type_b_inc, skip.cbp_luma), (0, 0, 0));
}
