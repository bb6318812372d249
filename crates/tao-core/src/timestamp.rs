//! 时间戳工具.
//!
//! 时间戳以 `time_base` 为单位的整数表示, 实际时间 (秒) = pts * num / den.

use crate::rational::Rational;

/// 表示"未定义"的时间戳值
pub const NOPTS_VALUE: i64 = i64::MIN;

/// 时间戳转换为秒, 未定义的时间戳或时间基返回 `None`
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> Option<f64> {
    if pts == NOPTS_VALUE || !time_base.is_valid() {
        return None;
    }
    Some(pts as f64 * time_base.to_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pts_to_seconds() {
        assert_eq!(pts_to_seconds(500, Rational::new(1, 1000)), Some(0.5));
        assert_eq!(pts_to_seconds(NOPTS_VALUE, Rational::new(1, 1000)), None);
        assert_eq!(pts_to_seconds(1, Rational::UNDEFINED), None);
    }
}
