//! 规则编译器
//!
//! 将 JSON 规则定义解析、校验并通过工厂构造为可执行规则。
//! 导入与以代码方式添加共用同一套校验，两条路径的接受范围一致。

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, RuleError};
use crate::factories::{self, BuiltRule};
use crate::models::{RawDefinition, RuleDefinition};
use crate::network::NetworkRegistry;
use crate::schema;
use crate::validator::RuleValidator;

/// 规则编译器
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    registry: Arc<NetworkRegistry>,
}

impl RuleCompiler {
    pub fn new(registry: Arc<NetworkRegistry>) -> Self {
        Self { registry }
    }

    /// 从 JSON 数组编译规则集
    ///
    /// 任一定义不合法时整体失败，不返回部分结果。
    pub fn compile_from_json(&self, json: &str) -> Result<Vec<BuiltRule>> {
        // 按 JSON 值读取，字段类型错误由结构校验报告而不是反序列化错误
        let values: Vec<Value> = serde_json::from_str(json)?;
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                self.compile_value(value).inspect_err(|e| {
                    warn!(index, error = %e, "规则定义编译失败");
                })
            })
            .collect()
    }

    /// 编译任意 JSON 值形态的定义
    pub fn compile_value(&self, value: Value) -> Result<BuiltRule> {
        self.compile_raw(schema::raw_from_value(value)?)
    }

    /// 编译未经校验的原始定义
    pub fn compile_raw(&self, raw: RawDefinition) -> Result<BuiltRule> {
        let definition = RuleDefinition::try_from(raw)?;
        self.compile(definition)
    }

    /// 编译规则定义：结构校验 → 工厂构造 → 链注册校验
    pub fn compile(&self, definition: RuleDefinition) -> Result<BuiltRule> {
        RuleValidator::validate_definition(&definition)?;

        if !self.registry.contains(&definition.chain_id) {
            return Err(RuleError::UnregisteredChain(definition.chain_id));
        }

        let rule = factories::from_definition(&self.registry, definition)?;
        debug!(rule_name = %rule.name(), kind = %rule.kind(), "规则编译完成");
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleKind;
    use crate::network::{MockChainClient, Network};

    fn compiler() -> RuleCompiler {
        let registry = NetworkRegistry::new(vec![
            Network::new("1", Arc::new(MockChainClient::new())),
            Network::new("31337", Arc::new(MockChainClient::new())),
        ])
        .unwrap();
        RuleCompiler::new(Arc::new(registry))
    }

    fn sample_rules_json() -> &'static str {
        r#"
        [
            {
                "type": "walletBalance",
                "chainId": "31337",
                "params": { "value": "1000000000000000000" }
            },
            {
                "type": "hasNftId",
                "chainId": "1",
                "params": {
                    "contractAddress": "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D",
                    "tokenId": "7"
                }
            },
            { "type": "isContract", "chainId": "1" }
        ]
        "#
    }

    #[test]
    fn test_compile_from_json() {
        let rules = compiler().compile_from_json(sample_rules_json()).unwrap();

        assert_eq!(rules.len(), 3);
        assert_eq!(rules[0].name(), "Wallet balance >= 1000000000000000000");
        assert_eq!(rules[1].kind(), RuleKind::HasNftId);
        assert_eq!(rules[2].name(), "Address is a contract");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = compiler()
            .compile_from_json(r#"[{ "type": "stakedBalance", "chainId": "1", "params": {} }]"#)
            .unwrap_err();
        assert!(matches!(err, RuleError::UnknownRuleType(_)));
    }

    #[test]
    fn test_unregistered_chain_rejected() {
        let err = compiler()
            .compile_from_json(r#"[{ "type": "isEoa", "chainId": "137", "params": {} }]"#)
            .unwrap_err();
        assert!(matches!(err, RuleError::UnregisteredChain(ref id) if id == "137"));
    }

    #[test]
    fn test_custom_definition_rejected() {
        let err = compiler()
            .compile_from_json(r#"[{ "type": "custom", "chainId": "1", "params": { "name": "x" } }]"#)
            .unwrap_err();
        assert!(matches!(err, RuleError::NotSerializable(_)));
    }

    #[test]
    fn test_not_an_array() {
        let err = compiler()
            .compile_from_json(r#"{ "type": "isEoa", "chainId": "1" }"#)
            .unwrap_err();
        assert!(matches!(err, RuleError::JsonError(_)));
    }

    #[test]
    fn test_non_string_fields_reported_as_schema_error() {
        let err = compiler()
            .compile_from_json(r#"[{ "type": "isEoa", "chainId": 1 }]"#)
            .unwrap_err();
        assert!(matches!(
            err,
            RuleError::Schema { ref fields, .. } if fields == &vec!["chainId"]
        ));
    }

    #[test]
    fn test_schema_fields_reported() {
        let err = compiler()
            .compile_from_json(
                r#"[{ "type": "erc20Balance", "chainId": "1", "params": { "value": 5 } }]"#,
            )
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("contractAddress"));
        assert!(message.contains("value"));
    }
}
