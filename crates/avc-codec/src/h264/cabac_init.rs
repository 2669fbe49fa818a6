//! CABAC 上下文模型: 1024 个自适应概率状态及其按 slice 的初始化.

use std::ops::{Index, IndexMut};

use avc_core::{AvcError, AvcResult};

use super::cabac::{CTX_TERMINATE, CabacCtx};
use super::cabac_init_table::CABAC_INIT_MN;

/// 上下文数量
pub const NUM_CTX: usize = 1024;

/// 1024 个上下文状态
#[derive(Clone, PartialEq, Eq)]
pub struct ContextModel {
    states: [CabacCtx; NUM_CTX],
}

impl ContextModel {
    /// 按 (SliceQP, 初始化表编号) 创建上下文模型
    ///
    /// `init_idc` 为 0 表示 I slice, 1..=3 表示 P/B slice 的 cabac_init_idc + 1.
    pub fn new(slice_qp: i32, init_idc: usize) -> AvcResult<Self> {
        let mut model = Self {
            states: [CabacCtx::default(); NUM_CTX],
        };
        model.init(slice_qp, init_idc)?;
        Ok(model)
    }

    /// 重新初始化全部上下文 (9.3.1.1), 结果只取决于两个输入
    pub fn init(&mut self, slice_qp: i32, init_idc: usize) -> AvcResult<()> {
        if !(0..=51).contains(&slice_qp) {
            return Err(AvcError::StructuralFault(format!(
                "H264: CABAC 初始化 QP 越界, slice_qp={}",
                slice_qp
            )));
        }
        let Some(table) = CABAC_INIT_MN.get(init_idc) else {
            return Err(AvcError::StructuralFault(format!(
                "H264: CABAC 初始化表编号越界, init_idc={}",
                init_idc
            )));
        };

        for (state, &[m, n]) in self.states.iter_mut().zip(table.iter()) {
            let pre = (((i32::from(m) * slice_qp) >> 4) + i32::from(n)).clamp(1, 126);
            *state = if pre <= 63 {
                CabacCtx::new((63 - pre) as u8, 0)
            } else {
                CabacCtx::new((pre - 64) as u8, 1)
            };
        }
        self.states[CTX_TERMINATE] = CabacCtx::new(63, 0);
        Ok(())
    }

    /// 全部状态字节的快照
    pub fn to_bytes(&self) -> [u8; NUM_CTX] {
        let mut bytes = [0u8; NUM_CTX];
        for (dst, state) in bytes.iter_mut().zip(self.states.iter()) {
            *dst = state.to_byte();
        }
        bytes
    }
}

impl Index<usize> for ContextModel {
    type Output = CabacCtx;

    fn index(&self, idx: usize) -> &CabacCtx {
        &self.states[idx]
    }
}

impl IndexMut<usize> for ContextModel {
    fn index_mut(&mut self, idx: usize) -> &mut CabacCtx {
        &mut self.states[idx]
    }
}

impl std::fmt::Debug for ContextModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextModel")
            .field("len", &NUM_CTX)
            .finish()
    }
}
