use super::*;

use std::sync::mpsc::{self, SyncSender};
use std::thread;

// ============================================================
// slice 状态机
// ============================================================

/// slice 解码循环状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceState {
    /// 新一行宏块开始
    RowStart,
    /// 解析当前宏块
    MacroblockDecode,
    /// 解码 end_of_slice_flag
    EndOfSliceCheck,
    /// 交付当前行
    RowEnd,
    /// slice 结束
    SliceDone,
}

/// 单个 slice 的解码结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SliceSummary {
    /// 起始宏块地址
    pub first_mb: usize,
    /// 解码的宏块数
    pub mb_count: usize,
    /// slice 结束时的 QP_Y
    pub final_qp: i32,
    /// 下一个宏块 mb_qp_delta 的上下文增量
    pub qp_delta_inc: usize,
    /// 算术引擎消耗的总位数
    pub bits_consumed: usize,
    /// 是否由 end_of_slice_flag 结束 (否则为图像宏块耗尽)
    pub end_of_slice: bool,
}

/// 一行宏块的交付批次
struct RowBatch {
    mb_y: usize,
    units: Vec<MacroblockUnit>,
}

/// 行级交付目标
trait RowConsumer {
    fn deliver_row(&mut self, batch: RowBatch) -> AvcResult<()>;
}

/// 在熵解码线程内直接重建
struct DirectConsumer<'s, S: SampleReconstruction> {
    sink: &'s mut S,
}

impl<S: SampleReconstruction> RowConsumer for DirectConsumer<'_, S> {
    fn deliver_row(&mut self, batch: RowBatch) -> AvcResult<()> {
        deliver_to_sink(self.sink, batch)
    }
}

/// 经有界队列交给重建线程
struct ChannelConsumer {
    tx: SyncSender<RowBatch>,
}

impl RowConsumer for ChannelConsumer {
    fn deliver_row(&mut self, batch: RowBatch) -> AvcResult<()> {
        self.tx
            .send(batch)
            .map_err(|_| AvcError::Internal("H264: 重建线程已提前退出".into()))
    }
}

fn deliver_to_sink<S: SampleReconstruction>(sink: &mut S, batch: RowBatch) -> AvcResult<()> {
    for unit in &batch.units {
        sink.reconstruct_macroblock(unit)?;
    }
    sink.finish_row(batch.mb_y)
}

// ============================================================
// slice 解码入口
// ============================================================

impl SliceDecoder {
    /// 解码一个 slice, 每行宏块解析完成后交给 `sink` 重建
    ///
    /// 开启流水线时重建在独立线程上进行, 与下一行的熵解码重叠;
    /// 函数返回前等待重建线程处理完全部已交付的行.
    /// 出错时已交付的行不会撤回, 调用方应将整个 slice 视为作废.
    pub fn decode_slice<S>(
        &mut self,
        slice: &SliceParams,
        data: &SliceData,
        sink: &mut S,
    ) -> AvcResult<SliceSummary>
    where
        S: SampleReconstruction + Send,
    {
        self.begin_slice(slice)?;

        if !self.config.pipeline.enabled {
            let mut consumer = DirectConsumer { sink };
            return self.run_slice(slice, data, &mut consumer);
        }

        let depth = self.config.pipeline.row_queue_depth.max(1);
        thread::scope(|scope| {
            let (tx, rx) = mpsc::sync_channel::<RowBatch>(depth);
            let worker = scope.spawn(move || -> AvcResult<()> {
                for batch in rx {
                    deliver_to_sink(sink, batch)?;
                }
                Ok(())
            });

            let mut consumer = ChannelConsumer { tx };
            let result = self.run_slice(slice, data, &mut consumer);
            // 关闭队列后等待重建线程, 作为 slice 完成屏障
            drop(consumer);
            worker
                .join()
                .map_err(|_| AvcError::Internal("H264: 重建线程 panic".into()))??;
            result
        })
    }

    /// slice 起始: 校验参数, 初始化上下文与邻居网格
    fn begin_slice(&mut self, slice: &SliceParams) -> AvcResult<()> {
        slice.validate(&self.pic)?;
        if self.pic.mbaff {
            return Err(AvcError::UnsupportedFeature("H264: MBAFF 宏块对解码".into()));
        }
        if matches!(slice.slice_type, SliceType::Sp | SliceType::Si) {
            return Err(AvcError::UnsupportedFeature(format!(
                "H264: {:?} slice",
                slice.slice_type
            )));
        }

        // 位深大于 8 时 SliceQPY 可为负, 上下文初始化按 [0, 51] 截断
        self.ctxs.init(slice.slice_qp.clamp(0, 51), slice.context_table_idx())?;
        self.grid.reset(self.pic.width_in_mbs, self.pic.constrained_intra_pred);
        self.slice_type = slice.slice_type;
        self.field = slice.field_pic;
        self.qp = slice.slice_qp;
        self.prev_qp_delta_nz = false;
        self.trace.clear();

        debug!(
            "H264: slice 开始, type={:?}, qp={}, cabac_init_idc={}, first_mb={}",
            slice.slice_type, slice.slice_qp, slice.cabac_init_idc, slice.first_mb_in_slice
        );
        Ok(())
    }

    /// 光栅扫描驱动循环
    fn run_slice(
        &mut self,
        slice: &SliceParams,
        data: &SliceData,
        consumer: &mut dyn RowConsumer,
    ) -> AvcResult<SliceSummary> {
        let mut cabac = CabacDecoder::with_declared_len(data.padded(), data.declared_len());
        if self.config.trace_bins {
            cabac.enable_trace();
        }

        let width = self.pic.width_in_mbs;
        let total = self.pic.total_mbs();
        let first_mb = slice.first_mb_in_slice as usize;
        let mut mb_addr = first_mb;
        let mut row: Vec<MacroblockUnit> = Vec::with_capacity(width);
        let mut mb_count = 0usize;
        let mut end_of_slice = false;
        let mut state = SliceState::RowStart;

        loop {
            state = match state {
                SliceState::RowStart => {
                    trace!("H264: 宏块行开始, mb_y={}", mb_addr / width);
                    SliceState::MacroblockDecode
                }
                SliceState::MacroblockDecode => {
                    let (mb_x, mb_y) = (mb_addr % width, mb_addr / width);
                    let unit = self.decode_macroblock(&mut cabac, mb_x, mb_y)?;
                    if self.config.check_engine_invariant {
                        cabac.check_invariant()?;
                    } else if cabac.is_overrun() {
                        return Err(AvcError::EntropyDesync(format!(
                            "H264: 位游标越过安全区, mb=({}, {}), bits={}",
                            mb_x,
                            mb_y,
                            cabac.bits_consumed()
                        )));
                    }
                    row.push(unit);
                    mb_count += 1;
                    SliceState::EndOfSliceCheck
                }
                SliceState::EndOfSliceCheck => {
                    let end = cabac.decode_terminate();
                    trace!("H264: end_of_slice_flag={}", end);
                    mb_addr += 1;
                    if end == 1 {
                        end_of_slice = true;
                        SliceState::RowEnd
                    } else if mb_addr >= total {
                        warn!(
                            "H264: 图像宏块已耗尽但 slice 未结束, mb_count={}, bits={}",
                            mb_count,
                            cabac.bits_consumed()
                        );
                        SliceState::RowEnd
                    } else if mb_addr % width == 0 {
                        SliceState::RowEnd
                    } else {
                        SliceState::MacroblockDecode
                    }
                }
                SliceState::RowEnd => {
                    let mb_y = (mb_addr - 1) / width;
                    consumer.deliver_row(RowBatch {
                        mb_y,
                        units: std::mem::take(&mut row),
                    })?;
                    if end_of_slice || mb_addr >= total {
                        SliceState::SliceDone
                    } else {
                        SliceState::RowStart
                    }
                }
                SliceState::SliceDone => break,
            };
        }

        if self.config.trace_bins {
            self.trace = cabac.take_trace();
        }
        let summary = SliceSummary {
            first_mb,
            mb_count,
            final_qp: self.qp,
            qp_delta_inc: usize::from(self.prev_qp_delta_nz),
            bits_consumed: cabac.bits_consumed(),
            end_of_slice,
        };
        debug!(
            "H264: slice 完成, mb_count={}, final_qp={}, bits={}",
            summary.mb_count, summary.final_qp, summary.bits_consumed
        );
        Ok(summary)
    }
}
