//! 规则参数结构表
//!
//! 每种规则类型对应一张字段表，添加规则时的结构校验与 JSON 导入共用同一份表，
//! 两条路径不会出现分歧。校验会收集所有不合法的字段后一并报告。

use alloy_primitives::Address;
use serde_json::{Map, Value};

use crate::error::{Result, RuleError};
use crate::models::{RawDefinition, RuleKind};
use crate::numeric::parse_decimal;
use crate::operators::Comparator;

/// 字段的取值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 十进制字符串表示的 256 位无符号整数
    Decimal,
    /// 20 字节十六进制地址
    Address,
    /// eq / gt / gte / lt / lte
    Comparator,
    /// 非空字符串
    Text,
    /// JSON ABI 函数片段：对象或非空对象数组
    AbiFragment,
    /// 任意 JSON 数组
    List,
    /// 布尔值或字符串
    Expected,
}

impl FieldType {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Decimal => value.as_str().and_then(parse_decimal).is_some(),
            Self::Address => value
                .as_str()
                .is_some_and(|s| s.parse::<Address>().is_ok()),
            Self::Comparator => value
                .as_str()
                .is_some_and(|s| s.parse::<Comparator>().is_ok()),
            Self::Text => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            Self::AbiFragment => match value {
                Value::Object(_) => true,
                Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
                _ => false,
            },
            Self::List => value.is_array(),
            Self::Expected => value.is_boolean() || value.is_string(),
        }
    }
}

/// 字段定义
#[derive(Debug, Clone, Copy)]
pub struct FieldSchema {
    pub name: &'static str,
    pub field_type: FieldType,
    pub required: bool,
}

const fn required(name: &'static str, field_type: FieldType) -> FieldSchema {
    FieldSchema {
        name,
        field_type,
        required: true,
    }
}

const fn optional(name: &'static str, field_type: FieldType) -> FieldSchema {
    FieldSchema {
        name,
        field_type,
        required: false,
    }
}

const THRESHOLD: &[FieldSchema] = &[
    required("value", FieldType::Decimal),
    optional("operator", FieldType::Comparator),
];

const CONTRACT_THRESHOLD: &[FieldSchema] = &[
    required("contractAddress", FieldType::Address),
    required("value", FieldType::Decimal),
    optional("operator", FieldType::Comparator),
];

const NFT: &[FieldSchema] = &[required("contractAddress", FieldType::Address)];

const NFT_ID: &[FieldSchema] = &[
    required("contractAddress", FieldType::Address),
    required("tokenId", FieldType::Decimal),
];

const NONE: &[FieldSchema] = &[];

const CONTRACT_CALL: &[FieldSchema] = &[
    required("contractAddress", FieldType::Address),
    required("method", FieldType::Text),
    required("abi", FieldType::AbiFragment),
    optional("args", FieldType::List),
    required("expected", FieldType::Expected),
    optional("operator", FieldType::Comparator),
];

const CUSTOM: &[FieldSchema] = &[required("name", FieldType::Text)];

/// 获取规则类型的字段表
pub fn schema_for(kind: RuleKind) -> &'static [FieldSchema] {
    match kind {
        RuleKind::WalletBalance | RuleKind::TransactionCount => THRESHOLD,
        RuleKind::ContractBalance | RuleKind::Erc20Balance => CONTRACT_THRESHOLD,
        RuleKind::HasAnyNft => NFT,
        RuleKind::HasNftId => NFT_ID,
        RuleKind::IsContract | RuleKind::IsEoa => NONE,
        RuleKind::ContractCall => CONTRACT_CALL,
        RuleKind::Custom => CUSTOM,
    }
}

/// 校验参数对象，返回所有不合法字段的名称
fn invalid_fields(kind: RuleKind, params: &Value) -> Vec<String> {
    let fields = schema_for(kind);
    let empty = Map::new();

    let object = match params {
        Value::Object(map) => map,
        // 所有字段均可选时允许省略 params
        Value::Null if fields.iter().all(|f| !f.required) => &empty,
        _ => return vec!["params".to_string()],
    };

    let mut invalid: Vec<String> = fields
        .iter()
        .filter(|field| match object.get(field.name) {
            None | Some(Value::Null) => field.required,
            Some(value) => !field.field_type.accepts(value),
        })
        .map(|field| field.name.to_string())
        .collect();

    // 未声明的字段（多为拼写错误）不能被静默忽略，否则会退回默认值
    invalid.extend(
        object
            .keys()
            .filter(|key| fields.iter().all(|field| field.name != key.as_str()))
            .cloned(),
    );
    invalid
}

/// 校验某一类型的参数对象
pub fn validate_params(kind: RuleKind, params: &Value) -> Result<()> {
    let fields = invalid_fields(kind, params);
    if fields.is_empty() {
        Ok(())
    } else {
        Err(RuleError::Schema {
            kind: kind.as_str().to_string(),
            fields,
        })
    }
}

/// 校验原始定义：类型标签、链 ID 与参数结构
///
/// 类型未知时返回 `UnknownRuleType`；其余问题合并为一个 `Schema` 错误。
pub fn validate_raw(raw: &RawDefinition) -> Result<RuleKind> {
    let kind: RuleKind = raw.kind.parse()?;

    let mut fields = Vec::new();
    if raw.chain_id.trim().is_empty() {
        fields.push("chainId".to_string());
    }
    fields.extend(invalid_fields(kind, &raw.params));

    if fields.is_empty() {
        Ok(kind)
    } else {
        Err(RuleError::Schema {
            kind: kind.as_str().to_string(),
            fields,
        })
    }
}

/// `type` 无法读取时 `Schema` 错误中使用的类型标签
const UNREADABLE_KIND: &str = "unknown";

/// 从任意 JSON 值读取原始定义并完成结构校验
///
/// `type` 与 `chainId` 必须是字符串，类型错误与参数问题一起以 `Schema` 错误报告，
/// 不会退化为 JSON 反序列化错误。
pub fn raw_from_value(value: Value) -> Result<RawDefinition> {
    let Value::Object(mut object) = value else {
        return Err(RuleError::Schema {
            kind: UNREADABLE_KIND.to_string(),
            fields: vec!["definition".to_string()],
        });
    };

    let chain_id = match object.remove("chainId") {
        Some(Value::String(chain_id)) => Some(chain_id),
        _ => None,
    };
    let params = object.remove("params").unwrap_or(Value::Null);

    let kind = match object.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => {
            let mut fields = vec!["type".to_string()];
            if chain_id.as_deref().is_none_or(|c| c.trim().is_empty()) {
                fields.push("chainId".to_string());
            }
            return Err(RuleError::Schema {
                kind: UNREADABLE_KIND.to_string(),
                fields,
            });
        }
    };

    // 非字符串的 chainId 按空值处理，由 validate_raw 统一报告
    let raw = RawDefinition {
        kind,
        chain_id: chain_id.unwrap_or_default(),
        params,
    };
    validate_raw(&raw)?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOKEN: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

    fn raw(kind: &str, chain_id: &str, params: Value) -> RawDefinition {
        RawDefinition {
            kind: kind.to_string(),
            chain_id: chain_id.to_string(),
            params,
        }
    }

    fn schema_fields<T: std::fmt::Debug>(result: Result<T>) -> Vec<String> {
        match result {
            Err(RuleError::Schema { fields, .. }) => fields,
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_every_kind_has_schema() {
        for kind in RuleKind::ALL {
            // 调用不 panic 即可，NONE 表也是合法的
            let _ = schema_for(kind);
        }
        assert!(schema_for(RuleKind::IsContract).is_empty());
    }

    #[test]
    fn test_valid_threshold() {
        let kind = validate_raw(&raw(
            "walletBalance",
            "1",
            json!({ "value": "1000000000000000000", "operator": "gte" }),
        ))
        .unwrap();
        assert_eq!(kind, RuleKind::WalletBalance);
    }

    #[test]
    fn test_missing_and_malformed_fields_are_all_reported() {
        let fields = schema_fields(validate_raw(&raw(
            "erc20Balance",
            "1",
            json!({ "contractAddress": "not-an-address", "operator": "neq" }),
        )));
        assert_eq!(fields, vec!["contractAddress", "value", "operator"]);
    }

    #[test]
    fn test_blank_chain_id_reported_with_params() {
        let fields = schema_fields(validate_raw(&raw("transactionCount", " ", json!({}))));
        assert_eq!(fields, vec!["chainId", "value"]);
    }

    #[test]
    fn test_params_must_be_object() {
        let fields = schema_fields(validate_raw(&raw("hasAnyNft", "1", json!("0x00"))));
        assert_eq!(fields, vec!["params"]);

        assert!(validate_raw(&raw("isContract", "1", Value::Null)).is_ok());
        assert_eq!(
            schema_fields(validate_raw(&raw("isContract", "1", json!([])))),
            vec!["params"]
        );
    }

    #[test]
    fn test_unknown_kind() {
        let err = validate_raw(&raw("stakedBalance", "1", json!({}))).unwrap_err();
        assert!(matches!(err, RuleError::UnknownRuleType(ref t) if t == "stakedBalance"));
    }

    #[test]
    fn test_contract_call_schema() {
        let abi = json!({
            "name": "isMember",
            "type": "function",
            "stateMutability": "view",
            "inputs": [{ "name": "account", "type": "address" }],
            "outputs": [{ "name": "", "type": "bool" }]
        });

        assert!(validate_params(
            RuleKind::ContractCall,
            &json!({
                "contractAddress": TOKEN,
                "method": "isMember",
                "abi": abi,
                "args": ["0x0000000000000000000000000000000000000001"],
                "expected": true
            })
        )
        .is_ok());

        let err = validate_params(
            RuleKind::ContractCall,
            &json!({
                "contractAddress": TOKEN,
                "method": "",
                "abi": [],
                "args": "x",
                "expected": 1
            }),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RuleError::Schema { ref fields, .. } if fields == &vec!["method", "abi", "args", "expected"]
        ));
    }

    #[test]
    fn test_unknown_param_keys_reported() {
        let fields = schema_fields(validate_raw(&raw(
            "walletBalance",
            "1",
            json!({ "value": "1000", "operater": "lte" }),
        )));
        assert_eq!(fields, vec!["operater"]);

        let fields = schema_fields(validate_raw(&raw("isEoa", "1", json!({ "strict": true }))));
        assert_eq!(fields, vec!["strict"]);
    }

    #[test]
    fn test_raw_from_value_names_non_string_chain_id() {
        let fields = schema_fields(raw_from_value(json!({
            "type": "walletBalance",
            "chainId": 1,
            "params": { "value": 5 }
        })));
        assert_eq!(fields, vec!["chainId", "value"]);
    }

    #[test]
    fn test_raw_from_value_names_non_string_type() {
        let err = raw_from_value(json!({ "type": 3, "chainId": "1" })).unwrap_err();
        assert!(matches!(
            err,
            RuleError::Schema { ref kind, ref fields } if kind == "unknown" && fields == &vec!["type"]
        ));

        let fields = schema_fields(raw_from_value(json!({ "chainId": false })));
        assert_eq!(fields, vec!["type", "chainId"]);

        let fields = schema_fields(raw_from_value(json!("isEoa")));
        assert_eq!(fields, vec!["definition"]);
    }

    #[test]
    fn test_raw_from_value_accepts_valid_definition() {
        let raw = raw_from_value(json!({ "type": "isContract", "chainId": "137" })).unwrap();
        assert_eq!(raw.kind, "isContract");
        assert_eq!(raw.chain_id, "137");
        assert!(raw.params.is_null());
    }

    #[test]
    fn test_decimal_rejects_numbers_and_hex() {
        assert!(!FieldType::Decimal.accepts(&json!(1)));
        assert!(!FieldType::Decimal.accepts(&json!("0x01")));
        assert!(!FieldType::Decimal.accepts(&json!("-1")));
        assert!(FieldType::Decimal.accepts(&json!("0")));
    }
}
