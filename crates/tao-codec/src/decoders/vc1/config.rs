//! VC-1 解码器运行配置
//!
//! 在 `open()` 时从环境变量解析, 与工作区内其他解码器的调试开关保持一致.

use std::path::PathBuf;

/// 码表资源路径
pub(super) const ENV_TABLES: &str = "TAO_VC1_TABLES";
/// 启用渐进 B 帧 MV 的混合预测位读取
pub(super) const ENV_HYBRID_BPRED: &str = "TAO_VC1_HYBRID_BPRED";
/// 关闭去块滤波
pub(super) const ENV_SKIP_LOOP_FILTER: &str = "TAO_VC1_SKIP_LOOP_FILTER";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vc1Config {
    /// JSON 码表资源路径
    pub tables_path: Option<PathBuf>,
    /// 渐进 B 帧 MV 预测是否读取混合预测位, 默认关闭
    pub hybrid_b_pred: bool,
    /// 跳过去块环路滤波
    pub skip_loop_filter: bool,
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl Vc1Config {
    pub fn from_env() -> Self {
        Self {
            tables_path: std::env::var_os(ENV_TABLES).map(PathBuf::from),
            hybrid_b_pred: env_flag(ENV_HYBRID_BPRED),
            skip_loop_filter: env_flag(ENV_SKIP_LOOP_FILTER),
        }
    }
}
