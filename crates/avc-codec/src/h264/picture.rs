use super::*;

/// 一幅图像的解码状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PictureStatus {
    /// 仍有宏块未覆盖
    InProgress,
    /// 所有宏块均已由成功的 slice 解码
    Complete,
    /// 至少一个 slice 被丢弃
    Incomplete,
}

/// 按图像聚合多个 slice 的熵解码
///
/// slice 解码失败时不向上传播: 记录丢弃计数并把图像标记为不完整,
/// 已成功的 slice 不受影响.
pub struct PictureDecoder {
    slice_decoder: SliceDecoder,
    /// 每个宏块是否已由成功的 slice 覆盖
    decoded: Vec<bool>,
    decoded_count: usize,
    /// 被丢弃的 slice 数
    malformed_slices: u32,
    last_error: Option<String>,
}

impl PictureDecoder {
    pub fn new(pic: PictureParams, config: DecoderConfig) -> AvcResult<Self> {
        let total = pic.total_mbs();
        Ok(Self {
            slice_decoder: SliceDecoder::new(pic, config)?,
            decoded: vec![false; total],
            decoded_count: 0,
            malformed_slices: 0,
            last_error: None,
        })
    }

    /// 开始新图像
    pub fn start_picture(&mut self) {
        self.decoded.iter_mut().for_each(|d| *d = false);
        self.decoded_count = 0;
        self.malformed_slices = 0;
        self.last_error = None;
    }

    /// 解码一个 slice, 失败时返回 `None`
    pub fn decode_slice<S>(
        &mut self,
        slice: &SliceParams,
        data: &SliceData,
        sink: &mut S,
    ) -> Option<SliceSummary>
    where
        S: SampleReconstruction + Send,
    {
        match self.slice_decoder.decode_slice(slice, data, sink) {
            Ok(summary) => {
                let end = (summary.first_mb + summary.mb_count).min(self.decoded.len());
                for done in &mut self.decoded[summary.first_mb.min(end)..end] {
                    if !*done {
                        *done = true;
                        self.decoded_count += 1;
                    }
                }
                Some(summary)
            }
            Err(err) => {
                self.record_malformed_slice(slice, &err);
                None
            }
        }
    }

    fn record_malformed_slice(&mut self, slice: &SliceParams, err: &AvcError) {
        self.malformed_slices = self.malformed_slices.saturating_add(1);
        warn!(
            "H264: 丢弃损坏的 slice, first_mb={}, type={:?}, total_dropped={}, err={}",
            slice.first_mb_in_slice, slice.slice_type, self.malformed_slices, err
        );
        self.last_error = Some(err.to_string());
    }

    /// 当前图像状态
    pub fn status(&self) -> PictureStatus {
        if self.malformed_slices > 0 {
            PictureStatus::Incomplete
        } else if self.decoded_count == self.decoded.len() {
            PictureStatus::Complete
        } else {
            PictureStatus::InProgress
        }
    }

    /// 已解码宏块数
    pub fn decoded_mbs(&self) -> usize {
        self.decoded_count
    }

    /// 被丢弃的 slice 数
    pub fn malformed_slices(&self) -> u32 {
        self.malformed_slices
    }

    /// 最近一次 slice 错误
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 内部 slice 解码器
    pub fn slice_decoder(&mut self) -> &mut SliceDecoder {
        &mut self.slice_decoder
    }
}
