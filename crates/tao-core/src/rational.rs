//! 有理数类型, 用于时间基、帧率与像素宽高比.

use std::fmt;

/// 有理数, 由分子和分母组成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: i32,
    /// 分母
    pub den: i32,
}

impl Rational {
    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 创建新的有理数
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// 分母不为 0 时有效
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64, 分母为 0 时返回 NaN
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 约分, 分母保持为正
    pub fn reduce(self) -> Self {
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs());
        if self.den == 0 || g == 0 {
            return self;
        }
        let sign = if self.den < 0 { -1 } else { 1 };
        Self {
            num: sign * self.num / g as i32,
            den: sign * self.den / g as i32,
        }
    }

    /// 求倒数
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_and_invert() {
        assert_eq!(Rational::new(30, 60).reduce(), Rational::new(1, 2));
        assert_eq!(Rational::new(3, -9).reduce(), Rational::new(-1, 3));
        assert_eq!(Rational::new(1, 25).invert(), Rational::new(25, 1));
    }

    #[test]
    fn test_undefined() {
        assert!(!Rational::UNDEFINED.is_valid());
        assert!(Rational::UNDEFINED.to_f64().is_nan());
        assert_eq!(Rational::new(30000, 1001).to_string(), "30000/1001");
    }
}
