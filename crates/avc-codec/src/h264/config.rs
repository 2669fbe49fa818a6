use super::*;

// ============================================================
// 参数块 (由上游参数集/slice 头解析提供, 只读)
// ============================================================

/// 色度格式 (chroma_format_idc)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromaFormat {
    /// 4:0:0, 或 separate_colour_plane_flag 为 1 的 4:4:4
    Monochrome,
    Yuv420,
    Yuv422,
    Yuv444,
}

impl ChromaFormat {
    /// 每个色度平面中 8x8 块的数量 (NumC8x8)
    pub fn num_c8x8(self) -> usize {
        match self {
            ChromaFormat::Monochrome => 0,
            ChromaFormat::Yuv420 => 1,
            ChromaFormat::Yuv422 => 2,
            ChromaFormat::Yuv444 => 4,
        }
    }

    /// 宏块内单个色度平面的样本数
    pub fn chroma_samples_per_mb(self) -> usize {
        self.num_c8x8() * 64
    }

    /// 是否使用独立的色度 DC/AC 残差语法 (ChromaArrayType 1 或 2)
    pub fn has_chroma_dc(self) -> bool {
        matches!(self, ChromaFormat::Yuv420 | ChromaFormat::Yuv422)
    }
}

/// slice 类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceType {
    P,
    B,
    I,
    Sp,
    Si,
}

impl SliceType {
    /// 由 slice_type 语法值 (0..=9) 转换
    pub fn from_raw(value: u32) -> AvcResult<Self> {
        const TYPES: [SliceType; 5] = [
            SliceType::P,
            SliceType::B,
            SliceType::I,
            SliceType::Sp,
            SliceType::Si,
        ];
        if value > 9 {
            return Err(AvcError::StructuralFault(format!(
                "H264: slice_type 越界, value={}",
                value
            )));
        }
        Ok(TYPES[(value % 5) as usize])
    }
}

/// 图像级参数
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureParams {
    /// 宽度 (宏块)
    pub width_in_mbs: usize,
    /// 高度 (宏块, 场图像时为单场高度)
    pub height_in_mbs: usize,
    pub chroma_format: ChromaFormat,
    #[serde(default = "default_bit_depth")]
    pub bit_depth_luma: u8,
    #[serde(default = "default_bit_depth")]
    pub bit_depth_chroma: u8,
    #[serde(default)]
    pub transform_8x8_mode: bool,
    #[serde(default)]
    pub constrained_intra_pred: bool,
    #[serde(default)]
    pub chroma_qp_index_offset: i32,
    #[serde(default)]
    pub second_chroma_qp_index_offset: i32,
    /// 帧内宏块自适应帧场 (MbaffFrameFlag)
    #[serde(default)]
    pub mbaff: bool,
}

fn default_bit_depth() -> u8 {
    8
}

impl PictureParams {
    /// 常用的 8 位 4:2:0 参数
    pub fn new(width_in_mbs: usize, height_in_mbs: usize) -> Self {
        Self {
            width_in_mbs,
            height_in_mbs,
            chroma_format: ChromaFormat::Yuv420,
            bit_depth_luma: 8,
            bit_depth_chroma: 8,
            transform_8x8_mode: false,
            constrained_intra_pred: false,
            chroma_qp_index_offset: 0,
            second_chroma_qp_index_offset: 0,
            mbaff: false,
        }
    }

    /// 图像宏块总数
    pub fn total_mbs(&self) -> usize {
        self.width_in_mbs * self.height_in_mbs
    }

    /// QpBdOffsetY
    pub fn qp_bd_offset_luma(&self) -> i32 {
        6 * (i32::from(self.bit_depth_luma) - 8)
    }

    /// QpBdOffsetC
    pub fn qp_bd_offset_chroma(&self) -> i32 {
        6 * (i32::from(self.bit_depth_chroma) - 8)
    }

    /// 校验核心可处理的取值范围
    pub fn validate(&self) -> AvcResult<()> {
        if self.width_in_mbs == 0 || self.height_in_mbs == 0 {
            return Err(AvcError::StructuralFault(format!(
                "H264: 图像尺寸无效, width_in_mbs={}, height_in_mbs={}",
                self.width_in_mbs, self.height_in_mbs
            )));
        }
        for depth in [self.bit_depth_luma, self.bit_depth_chroma] {
            if !(8..=14).contains(&depth) {
                return Err(AvcError::StructuralFault(format!(
                    "H264: 位深越界, bit_depth={}",
                    depth
                )));
            }
        }
        for offset in [
            self.chroma_qp_index_offset,
            self.second_chroma_qp_index_offset,
        ] {
            if !(-12..=12).contains(&offset) {
                return Err(AvcError::StructuralFault(format!(
                    "H264: 色度 QP 偏移越界, offset={}",
                    offset
                )));
            }
        }
        Ok(())
    }
}

/// slice 级参数
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceParams {
    pub slice_type: SliceType,
    /// SliceQPY = 26 + pic_init_qp_minus26 + slice_qp_delta
    pub slice_qp: i32,
    #[serde(default)]
    pub cabac_init_idc: u8,
    #[serde(default)]
    pub first_mb_in_slice: u32,
    #[serde(default)]
    pub field_pic: bool,
    /// 活动参考索引数量, 熵解码只做范围校验, 原样交给帧间协作方
    #[serde(default = "default_num_ref_idx")]
    pub num_ref_idx_l0_active: u32,
    /// 同上, 仅 B slice 使用
    #[serde(default = "default_num_ref_idx")]
    pub num_ref_idx_l1_active: u32,
}

fn default_num_ref_idx() -> u32 {
    1
}

impl SliceParams {
    /// 指定类型与 QP 的 slice, 其余取默认值
    pub fn new(slice_type: SliceType, slice_qp: i32) -> Self {
        Self {
            slice_type,
            slice_qp,
            cabac_init_idc: 0,
            first_mb_in_slice: 0,
            field_pic: false,
            num_ref_idx_l0_active: 1,
            num_ref_idx_l1_active: 1,
        }
    }

    /// 上下文初始化表编号: I slice 为 0, 其余为 cabac_init_idc + 1
    pub fn context_table_idx(&self) -> usize {
        match self.slice_type {
            SliceType::I | SliceType::Si => 0,
            _ => usize::from(self.cabac_init_idc) + 1,
        }
    }

    /// 校验与图像参数的组合
    pub fn validate(&self, pic: &PictureParams) -> AvcResult<()> {
        let min_qp = -pic.qp_bd_offset_luma();
        if !(min_qp..=51).contains(&self.slice_qp) {
            return Err(AvcError::StructuralFault(format!(
                "H264: slice_qp 越界, slice_qp={}, min={}",
                self.slice_qp, min_qp
            )));
        }
        if self.cabac_init_idc > 2 {
            return Err(AvcError::StructuralFault(format!(
                "H264: cabac_init_idc 越界, cabac_init_idc={}",
                self.cabac_init_idc
            )));
        }
        // 帧最多 16 个参考索引, 场最多 32 个
        let max_ref = if self.field_pic { 32 } else { 16 };
        let lists: &[u32] = match self.slice_type {
            SliceType::P | SliceType::Sp => &[self.num_ref_idx_l0_active],
            SliceType::B => &[self.num_ref_idx_l0_active, self.num_ref_idx_l1_active],
            SliceType::I | SliceType::Si => &[],
        };
        if let Some(&count) = lists.iter().find(|&&n| !(1..=max_ref).contains(&n)) {
            return Err(AvcError::StructuralFault(format!(
                "H264: num_ref_idx_active 越界, value={}, max={}",
                count, max_ref
            )));
        }
        if self.first_mb_in_slice as usize >= pic.total_mbs() {
            return Err(AvcError::StructuralFault(format!(
                "H264: first_mb 越界, first_mb={}, total_mbs={}",
                self.first_mb_in_slice,
                pic.total_mbs()
            )));
        }
        Ok(())
    }
}

// ============================================================
// 解码器配置
// ============================================================

/// 行级流水线配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 是否在独立线程上执行重建
    #[serde(default)]
    pub enabled: bool,
    /// 熵解码与重建之间的有界队列深度 (行)
    #[serde(default = "default_row_queue_depth")]
    pub row_queue_depth: usize,
}

fn default_row_queue_depth() -> usize {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            row_queue_depth: default_row_queue_depth(),
        }
    }
}

/// 熵解码器运行配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// 每个宏块结束后校验算术引擎不变量
    #[serde(default = "default_true")]
    pub check_engine_invariant: bool,
    /// 记录 bin 轨迹
    #[serde(default)]
    pub trace_bins: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            check_engine_invariant: true,
            trace_bins: false,
        }
    }
}

// ============================================================
// slice 数据
// ============================================================

/// 一个 slice 的 RBSP 数据 (从 CABAC 对齐位置开始), 末尾带安全区
#[derive(Clone, Debug)]
pub struct SliceData {
    payload: Bytes,
    declared_len: usize,
}

impl SliceData {
    /// 复制 RBSP 并追加 0xFF 安全区
    pub fn from_rbsp(rbsp: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(rbsp.len() + SAFE_ZONE_LEN);
        buf.extend_from_slice(rbsp);
        buf.resize(rbsp.len() + SAFE_ZONE_LEN, 0xFF);
        Self {
            payload: buf.freeze(),
            declared_len: rbsp.len(),
        }
    }

    /// 使用已带安全区的缓冲区, `declared_len` 为不含安全区的长度
    pub fn from_padded(payload: Bytes, declared_len: usize) -> AvcResult<Self> {
        if payload.len() < declared_len + SAFE_ZONE_LEN {
            return Err(AvcError::InvalidArgument(format!(
                "H264: slice 缓冲区安全区不足, len={}, declared_len={}",
                payload.len(),
                declared_len
            )));
        }
        Ok(Self {
            payload,
            declared_len,
        })
    }

    /// 含安全区的完整缓冲区
    pub fn padded(&self) -> &[u8] {
        &self.payload
    }

    /// 不含安全区的声明长度
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }
}
