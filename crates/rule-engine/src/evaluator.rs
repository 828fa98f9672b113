//! 条件评估器
//!
//! 按合约调用返回值的动态类型比较观测值与期望值：
//! 数值支持全部五种操作符，布尔、字符串与地址只支持 `eq`。

use alloy_primitives::Address;

use crate::error::{Result, RuleError};
use crate::models::Expected;
use crate::network::CallValue;
use crate::numeric::Integer;
use crate::operators::Comparator;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估 `observed <operator> expected`
    ///
    /// 类型不匹配或操作符不适用于该类型时返回 `UnsupportedComparison`。
    pub fn evaluate(observed: &CallValue, operator: Comparator, expected: &Expected) -> Result<bool> {
        match observed {
            CallValue::Uint(v) => Self::numeric(Integer::Unsigned(*v), operator, expected),
            CallValue::Int(v) => Self::numeric(Integer::Signed(*v), operator, expected),
            CallValue::Bool(value) => {
                Self::require_eq(observed, operator)?;
                match expected {
                    Expected::Bool(expected) => Ok(value == expected),
                    Expected::Text(_) => Err(Self::mismatch(observed, operator, expected)),
                }
            }
            CallValue::Address(value) => {
                Self::require_eq(observed, operator)?;
                let expected_address = match expected {
                    Expected::Text(text) => text.parse::<Address>().ok(),
                    Expected::Bool(_) => None,
                }
                .ok_or_else(|| Self::mismatch(observed, operator, expected))?;
                Ok(*value == expected_address)
            }
            CallValue::String(value) => {
                Self::require_eq(observed, operator)?;
                match expected {
                    Expected::Text(text) => Ok(value == text),
                    Expected::Bool(_) => Err(Self::mismatch(observed, operator, expected)),
                }
            }
        }
    }

    /// 整数比较，有符号与无符号之间精确比较
    pub fn compare_integers(observed: Integer, operator: Comparator, expected: Integer) -> bool {
        operator.compare(&observed, &expected)
    }

    fn numeric(observed: Integer, operator: Comparator, expected: &Expected) -> Result<bool> {
        let expected_int = match expected {
            Expected::Text(text) => Integer::parse(text),
            Expected::Bool(_) => None,
        }
        .ok_or_else(|| {
            RuleError::UnsupportedComparison(format!(
                "数值结果无法与 {} 类型的期望值 '{}' 比较",
                Self::type_name(expected),
                expected
            ))
        })?;
        Ok(Self::compare_integers(observed, operator, expected_int))
    }

    fn require_eq(observed: &CallValue, operator: Comparator) -> Result<()> {
        if operator == Comparator::Eq {
            Ok(())
        } else {
            Err(RuleError::UnsupportedComparison(format!(
                "{} 类型的结果仅支持 eq，收到 {}",
                observed.type_name(),
                operator
            )))
        }
    }

    fn mismatch(observed: &CallValue, operator: Comparator, expected: &Expected) -> RuleError {
        RuleError::UnsupportedComparison(format!(
            "{} 类型的结果 '{}' 无法使用 {} 与 {} 类型的期望值 '{}' 比较",
            observed.type_name(),
            observed,
            operator,
            Self::type_name(expected),
            expected
        ))
    }

    fn type_name(expected: &Expected) -> &'static str {
        match expected {
            Expected::Bool(_) => "boolean",
            Expected::Text(_) => "string",
        }
    }
}
