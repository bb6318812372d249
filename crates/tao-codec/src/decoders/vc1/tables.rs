//! VC-1 数值常量表
//!
//! VLC 码表与扫描顺序作为外部资源加载 (见 `vlc`), 这里只放数值表.

use super::types::{IntfrMbMode, IntfrMbModeEntry, MvMode, TransformType};

/// PQINDEX 到 PQUANT 的映射: [隐式, 显式均匀, 显式非均匀]
pub(super) const PQUANT_TABLE: [[u8; 32]; 3] = [
    [
        0, 1, 2, 3, 4, 5, 6, 7, 8, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22,
        23, 24, 25, 27, 29, 31,
    ],
    [
        0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
        25, 26, 27, 28, 29, 30, 31,
    ],
    [
        0, 1, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
        24, 25, 26, 27, 29, 31,
    ],
];

/// DC 缩放表 (亮度与色度共用)
pub(super) const DC_SCALE_TABLE: [u8; 32] = [
    0, 2, 4, 8, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13, 13, 14, 14, 15, 15, 16, 16, 17, 17, 18, 18,
    19, 19, 20, 20, 21, 21,
];

/// Simple/Main I 帧的帧外 DC 预测值, 按 DC 缩放索引
pub(super) const DC_PRED_OUTER: [i32; 32] = [
    -1, 1024, 512, 341, 256, 205, 171, 146, 128, 114, 102, 93, 85, 79, 73, 68, 64, 60, 57, 54, 51,
    49, 47, 45, 43, 41, 39, 38, 37, 35, 34, 33,
];

const fn build_dqscale() -> [u32; 63] {
    let mut t = [0u32; 63];
    let mut i = 0;
    while i < 63 {
        let d = (i + 1) as u32;
        t[i] = (0x40000 + d / 2) / d;
        i += 1;
    }
    t
}

/// 0x40000 / (i + 1) 的定点近似, 用于邻块 DC 预测值的量化缩放
pub(super) const DQSCALE: [u32; 63] = build_dqscale();

/// 场图像 MV 预测缩放表 [dir ^ second_field][参数][refdist]
///
/// 参数行: SCALEOPP, SCALESAME1, SCALESAME2, SCALEZONE1_X, SCALEZONE1_Y,
/// ZONE1OFFSET_X, ZONE1OFFSET_Y
pub(super) const FIELD_MVPRED_SCALES: [[[u16; 4]; 7]; 2] = [
    [
        [128, 192, 213, 224],
        [512, 341, 307, 293],
        [219, 236, 242, 245],
        [32, 48, 53, 56],
        [8, 12, 13, 14],
        [37, 20, 14, 11],
        [10, 5, 4, 3],
    ],
    [
        [128, 64, 43, 32],
        [512, 1024, 1536, 2048],
        [219, 204, 200, 198],
        [32, 16, 11, 8],
        [8, 4, 3, 2],
        [37, 52, 56, 58],
        [10, 13, 14, 15],
    ],
];

/// 场图像 B 帧第一场后向 MV 预测缩放表 [参数][brfd]
///
/// 参数行: SCALESAME, SCALEOPP1, SCALEOPP2, 之后同上
pub(super) const B_FIELD_MVPRED_SCALES: [[u16; 4]; 7] = [
    [171, 205, 219, 228],
    [384, 320, 299, 288],
    [230, 239, 244, 246],
    [43, 51, 55, 57],
    [11, 13, 14, 14],
    [26, 17, 12, 10],
    [7, 4, 3, 3],
];

/// 渐进 MVDATA 的偏移表 (第二行用于扩展范围)
pub(super) const MV_OFFSET_TABLE: [[i32; 9]; 2] = [
    [0, 1, 2, 4, 8, 16, 32, 64, 128],
    [0, 1, 3, 7, 15, 31, 63, 127, 255],
];

/// 渐进 MVDATA 的附加位数
pub(super) const MV_SIZE_TABLE: [u32; 6] = [0, 2, 3, 4, 5, 8];

/// 码流块序号到内部块缓冲序号
pub(super) const BLOCK_MAP: [usize; 6] = [0, 2, 1, 3, 4, 5];

/// TTBLK/TTMB 码值到变换类型, 按 tt_index
pub(super) const TTBLK_TO_TT: [[TransformType; 8]; 3] = {
    use TransformType::*;
    [
        [T8x4, T4x8, T8x8, T4x4, T8x4Top, T8x4Bottom, T4x8Right, T4x8Left],
        [T8x8, T4x8Right, T4x8Left, T4x4, T8x4, T4x8, T8x4Bottom, T8x4Top],
        [T8x8, T4x8, T4x4, T8x4Bottom, T4x8Right, T4x8Left, T8x4, T8x4Top],
    ]
};

/// MVMODE 一元码到模式 [lowquant][code]
pub(super) const MV_PMODE_TABLE: [[MvMode; 5]; 2] = {
    use MvMode::*;
    [
        [OneMvHpelBilin, OneMv, OneMvHpel, IntensityComp, MixedMv],
        [OneMv, MixedMv, OneMvHpel, IntensityComp, OneMvHpelBilin],
    ]
};

/// 强度补偿时的 MVMODE2 [lowquant][code]
pub(super) const MV_PMODE_TABLE2: [[MvMode; 4]; 2] = {
    use MvMode::*;
    [
        [OneMvHpelBilin, OneMv, OneMvHpel, MixedMv],
        [OneMv, MixedMv, OneMvHpel, OneMvHpelBilin],
    ]
};

const fn e(mode: IntfrMbMode, fieldtx: u8, mvp: u8, cbp: u8) -> IntfrMbModeEntry {
    IntfrMbModeEntry {
        mode,
        fieldtx: fieldtx != 0,
        mvp: mvp != 0,
        cbp: cbp != 0,
    }
}

/// 隔行帧 P/B 宏块模式表 [fourmvswitch][idx]
pub(super) const MBMODE_INTFRP: [[IntfrMbModeEntry; 15]; 2] = {
    use IntfrMbMode::*;
    [
        [
            e(OneMv, 0, 1, 1),
            e(OneMv, 1, 1, 1),
            e(OneMv, 0, 1, 0),
            e(OneMv, 0, 0, 1),
            e(OneMv, 1, 0, 1),
            e(TwoMvField, 0, 0, 1),
            e(TwoMvField, 1, 0, 1),
            e(TwoMvField, 0, 0, 0),
            e(Intra, 0, 0, 0),
            e(Intra, 0, 0, 0),
            e(Intra, 0, 0, 0),
            e(Intra, 0, 0, 0),
            e(Intra, 0, 0, 0),
            e(Intra, 0, 0, 0),
            e(Intra, 0, 0, 0),
        ],
        [
            e(OneMv, 0, 1, 1),
            e(OneMv, 1, 1, 1),
            e(OneMv, 0, 1, 0),
            e(OneMv, 0, 0, 1),
            e(OneMv, 1, 0, 1),
            e(TwoMvField, 0, 0, 1),
            e(TwoMvField, 1, 0, 1),
            e(TwoMvField, 0, 0, 0),
            e(FourMv, 0, 0, 1),
            e(FourMv, 1, 0, 1),
            e(FourMv, 0, 0, 0),
            e(FourMvField, 0, 0, 1),
            e(FourMvField, 1, 0, 1),
            e(FourMvField, 0, 0, 0),
            e(Intra, 0, 0, 0),
        ],
    ]
};

/// 场 MV 色度取整表
pub(super) const RND_TABLE_FIELD: [i32; 16] = [0, 0, 1, 2, 4, 4, 5, 6, 2, 2, 3, 8, 6, 6, 7, 12];

/// 4 位掩码中置位个数
pub(super) const POPCOUNT4: [usize; 16] = [0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4];

/// BFRACTION 码字索引到分数 (单位 1/256), -1 为非法, 0 表示 BI 帧
pub(super) const BFRACTION_LUT: [i16; 23] = [
    128, 85, 170, 64, 192, 51, 102, 153, 204, 43, 215, 37, 74, 111, 148, 185, 222, 32, 96, 160, 224,
    -1, 0,
];

/// BFRACTION 分母
pub(super) const B_FRACTION_DEN: i32 = 256;

/// 序列头帧率分子与分母
pub(super) const FPS_NR: [u32; 7] = [24, 25, 30, 50, 60, 48, 72];
pub(super) const FPS_DR: [u32; 2] = [1000, 1001];

/// 宽高比表 (ASPECT_RATIO 1..13)
pub(super) const ASPECT_RATIOS: [(u32, u32); 16] = [
    (0, 1),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (0, 1),
    (0, 1),
];

/// TTFRM 到帧级变换类型
pub(super) const TTFRM_TO_TT: [TransformType; 4] = [
    TransformType::T8x8,
    TransformType::T8x4,
    TransformType::T4x8,
    TransformType::T4x4,
];

/// AC 编码集合索引
pub(super) const CS_HIGH_MOT_INTRA: usize = 0;
pub(super) const CS_HIGH_MOT_INTER: usize = 1;
pub(super) const CS_LOW_MOT_INTRA: usize = 2;
pub(super) const CS_LOW_MOT_INTER: usize = 3;
pub(super) const CS_MID_RATE_INTRA: usize = 4;
pub(super) const CS_MID_RATE_INTER: usize = 5;
pub(super) const CS_HIGH_RATE_INTRA: usize = 6;
pub(super) const CS_HIGH_RATE_INTER: usize = 7;
