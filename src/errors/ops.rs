/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 配置与输入校验中用到的比较关系
 */

use std::fmt::{self, Display};

/// 校验用的比较关系，出错时也用于拼装提示信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterOrEqual,
    LessOrEqual,
    LessThan,
}

impl ComparisonOperator {
    /// `value`与`bound`是否满足该关系；任一侧为NaN时不满足
    pub fn holds<T: PartialOrd>(self, value: T, bound: T) -> bool {
        match self {
            Self::GreaterThan => value > bound,
            Self::GreaterOrEqual => value >= bound,
            Self::LessOrEqual => value <= bound,
            Self::LessThan => value < bound,
        }
    }
}

impl Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => "≥",
            Self::LessOrEqual => "≤",
            Self::LessThan => "<",
        };
        f.write_str(symbol)
    }
}
