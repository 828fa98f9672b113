//! 规则校验器
//!
//! 两阶段校验：结构校验（参数是否符合类型的字段表）与语义校验（链是否已注册）。
//! 两个阶段都通过后规则才会进入引擎。

use crate::error::{Result, RuleError};
use crate::factories::BuiltRule;
use crate::models::{RuleDefinition, RuleKind};
use crate::network::NetworkRegistry;
use crate::schema;

/// 规则校验器
pub struct RuleValidator;

impl RuleValidator {
    /// 结构校验：定义的参数是否符合其类型的字段表
    pub fn validate_definition(definition: &RuleDefinition) -> Result<RuleKind> {
        let raw = definition.to_raw()?;
        schema::validate_raw(&raw)
    }

    /// 完整校验：结构校验后检查链 ID 是否在注册表中
    pub fn validate_built_rule(rule: &BuiltRule, registry: &NetworkRegistry) -> Result<()> {
        Self::validate_definition(rule.definition())?;

        if !registry.contains(rule.chain_id()) {
            return Err(RuleError::UnregisteredChain(rule.chain_id().to_string()));
        }

        Ok(())
    }
}
