//! 熵解码与样本重建之间的交接类型.
//!
//! 每个宏块解析完成后产出一个 [`MacroblockUnit`], 预测模式按封闭的变体集合表达,
//! 由实现 [`SampleReconstruction`] 的下游一次性消费.

use bitflags::bitflags;

use avc_core::AvcResult;

bitflags! {
    /// 帧内预测可用的相邻宏块
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NeighborAvailability: u8 {
        const LEFT = 0x01;
        const TOP = 0x02;
        const TOP_LEFT = 0x04;
        const TOP_RIGHT = 0x08;
    }
}

/// Intra_4x4 / Intra_8x8 预测模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntraNxNMode {
    Vertical,
    Horizontal,
    Dc,
    DiagonalDownLeft,
    DiagonalDownRight,
    VerticalRight,
    HorizontalDown,
    VerticalLeft,
    HorizontalUp,
}

impl IntraNxNMode {
    /// 由语法值 (0..=8) 转换, 越界时回退 DC
    pub fn from_index(value: u8) -> Self {
        match value {
            0 => Self::Vertical,
            1 => Self::Horizontal,
            3 => Self::DiagonalDownLeft,
            4 => Self::DiagonalDownRight,
            5 => Self::VerticalRight,
            6 => Self::HorizontalDown,
            7 => Self::VerticalLeft,
            8 => Self::HorizontalUp,
            _ => Self::Dc,
        }
    }
}

/// Intra_16x16 预测模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intra16x16Mode {
    Vertical,
    Horizontal,
    Dc,
    Plane,
}

impl Intra16x16Mode {
    pub fn from_index(value: u32) -> Self {
        match value & 3 {
            0 => Self::Vertical,
            1 => Self::Horizontal,
            2 => Self::Dc,
            _ => Self::Plane,
        }
    }
}

/// 色度帧内预测模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaPredMode {
    Dc,
    Horizontal,
    Vertical,
    Plane,
}

impl ChromaPredMode {
    pub fn from_index(value: u8) -> Self {
        match value & 3 {
            0 => Self::Dc,
            1 => Self::Horizontal,
            2 => Self::Vertical,
            _ => Self::Plane,
        }
    }
}

/// I_PCM 原始样本
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PcmSamples {
    pub luma: Vec<u16>,
    pub cb: Vec<u16>,
    pub cr: Vec<u16>,
}

/// 宏块预测方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MacroblockKind {
    /// 16 个 4x4 块模式, 按 luma4x4BlkIdx 顺序
    Intra4x4 {
        modes: [IntraNxNMode; 16],
        chroma: ChromaPredMode,
    },
    /// 4 个 8x8 块模式
    Intra8x8 {
        modes: [IntraNxNMode; 4],
        chroma: ChromaPredMode,
    },
    Intra16x16 {
        mode: Intra16x16Mode,
        chroma: ChromaPredMode,
    },
    Pcm {
        samples: PcmSamples,
    },
    /// P_Skip / B_Skip, 预测样本由帧间协作方提供
    Skip,
}

/// 宏块系数
///
/// `planes` 中 4x4 块按 `blkIdx * 16 + 光栅位置` 存放 (AC 块的位置 0 留给 DC),
/// 8x8 块按 `blk8x8 * 64 + 光栅位置` 存放. `dc` 为亮度 Intra16x16 DC 或色度 DC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroblockCoeffs {
    pub planes: [[i32; 256]; 3],
    pub dc: [[i32; 16]; 3],
}

impl Default for MacroblockCoeffs {
    fn default() -> Self {
        Self {
            planes: [[0; 256]; 3],
            dc: [[0; 16]; 3],
        }
    }
}

impl MacroblockCoeffs {
    /// 全部系数是否为 0
    pub fn is_zero(&self) -> bool {
        self.planes.iter().all(|p| p.iter().all(|&c| c == 0))
            && self.dc.iter().all(|d| d.iter().all(|&c| c == 0))
    }
}

/// 交给样本重建的宏块单元
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacroblockUnit {
    pub mb_x: usize,
    pub mb_y: usize,
    pub kind: MacroblockKind,
    pub availability: NeighborAvailability,
    /// QP'Y, QP'Cb, QP'Cr
    pub qp: [i32; 3],
    pub transform_8x8: bool,
    pub cbp_luma: u8,
    pub cbp_chroma: u8,
    pub coeffs: Box<MacroblockCoeffs>,
}

/// 样本重建协作方
pub trait SampleReconstruction {
    /// 每个宏块在系数全部解码后调用一次
    fn reconstruct_macroblock(&mut self, unit: &MacroblockUnit) -> AvcResult<()>;

    /// 一行宏块全部交付后调用
    fn finish_row(&mut self, _mb_y: usize) -> AvcResult<()> {
        Ok(())
    }
}
