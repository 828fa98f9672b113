//! 比较操作符定义

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// 数值比较操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Gt,
    #[default]
    Gte,
    Lt,
    Lte,
}

impl Comparator {
    pub const ALL: [Comparator; 5] = [Self::Eq, Self::Gt, Self::Gte, Self::Lt, Self::Lte];

    /// 根据观测值与期望值的排序关系判断是否满足
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
        }
    }

    /// 比较 `observed <op> expected`
    pub fn compare<T: Ord + ?Sized>(self, observed: &T, expected: &T) -> bool {
        self.matches(observed.cmp(expected))
    }

    /// 规则名称中使用的符号
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("不支持的比较操作符: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        assert!(Comparator::Gte.compare(&10, &10));
        assert!(!Comparator::Gt.compare(&10, &10));
        assert!(Comparator::Lte.compare(&9, &10));
        assert!(Comparator::Lt.compare(&9, &10));
        assert!(!Comparator::Eq.compare(&9, &10));
    }

    #[test]
    fn test_parse_and_display() {
        for op in Comparator::ALL {
            assert_eq!(op.to_string().parse::<Comparator>().unwrap(), op);
        }
        assert!("neq".parse::<Comparator>().is_err());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Comparator::Gte).unwrap(), "\"gte\"");
        let op: Comparator = serde_json::from_str("\"lt\"").unwrap();
        assert_eq!(op, Comparator::Lt);
    }
}
