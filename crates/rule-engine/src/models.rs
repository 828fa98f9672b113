//! 规则引擎领域模型
//!
//! `RuleDefinition` 是可序列化的规则描述，JSON 形态为
//! `{ "type": "...", "chainId": "...", "params": { ... } }`；
//! 可执行的谓词与定义的组合见 [`crate::factories::BuiltRule`]。

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, RuleError};
use crate::operators::Comparator;
use crate::schema;

/// 规则类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    WalletBalance,
    ContractBalance,
    Erc20Balance,
    TransactionCount,
    HasAnyNft,
    HasNftId,
    IsContract,
    IsEoa,
    ContractCall,
    /// 调用方提供的自定义谓词，不可序列化导入
    Custom,
}

impl RuleKind {
    pub const ALL: [RuleKind; 10] = [
        Self::WalletBalance,
        Self::ContractBalance,
        Self::Erc20Balance,
        Self::TransactionCount,
        Self::HasAnyNft,
        Self::HasNftId,
        Self::IsContract,
        Self::IsEoa,
        Self::ContractCall,
        Self::Custom,
    ];

    /// JSON 中的 `type` 标签
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WalletBalance => "walletBalance",
            Self::ContractBalance => "contractBalance",
            Self::Erc20Balance => "erc20Balance",
            Self::TransactionCount => "transactionCount",
            Self::HasAnyNft => "hasAnyNft",
            Self::HasNftId => "hasNftId",
            Self::IsContract => "isContract",
            Self::IsEoa => "isEoa",
            Self::ContractCall => "contractCall",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| RuleError::UnknownRuleType(s.to_string()))
    }
}

/// 阈值参数：钱包余额、交易数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    #[serde(with = "crate::numeric::decimal")]
    pub value: U256,
    #[serde(default)]
    pub operator: Comparator,
}

impl ThresholdParams {
    pub fn new(value: U256, operator: Comparator) -> Self {
        Self { value, operator }
    }

    pub fn at_least(value: U256) -> Self {
        Self::new(value, Comparator::Gte)
    }
}

/// 针对某个合约地址的阈值参数：合约余额、ERC-20 余额
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractThresholdParams {
    pub contract_address: String,
    #[serde(with = "crate::numeric::decimal")]
    pub value: U256,
    #[serde(default)]
    pub operator: Comparator,
}

impl ContractThresholdParams {
    pub fn new(contract_address: impl Into<String>, value: U256, operator: Comparator) -> Self {
        Self {
            contract_address: contract_address.into(),
            value,
            operator,
        }
    }
}

/// 持有任意 NFT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftParams {
    pub contract_address: String,
}

/// 持有指定 token id 的 NFT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftIdParams {
    pub contract_address: String,
    #[serde(with = "crate::numeric::decimal")]
    pub token_id: U256,
}

/// 无参数（地址类型检查）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyParams {}

/// 合约调用结果的期望值
///
/// 数值结果与字符串形式的十进制整数比较；布尔结果只能与布尔值比较。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expected {
    Bool(bool),
    Text(String),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Expected {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Expected {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<U256> for Expected {
    fn from(value: U256) -> Self {
        Self::Text(value.to_string())
    }
}

fn default_call_operator() -> Comparator {
    Comparator::Eq
}

/// 通用合约调用比较
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractCallParams {
    pub contract_address: String,
    pub method: String,
    /// JSON ABI 函数片段（对象或对象数组）
    pub abi: Value,
    #[serde(default)]
    pub args: Vec<Value>,
    pub expected: Expected,
    #[serde(default = "default_call_operator")]
    pub operator: Comparator,
}

/// 自定义规则的描述信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomParams {
    pub name: String,
}

/// 按规则类型区分的参数
#[derive(Debug, Clone, PartialEq)]
pub enum RuleParams {
    WalletBalance(ThresholdParams),
    ContractBalance(ContractThresholdParams),
    Erc20Balance(ContractThresholdParams),
    TransactionCount(ThresholdParams),
    HasAnyNft(NftParams),
    HasNftId(NftIdParams),
    IsContract(EmptyParams),
    IsEoa(EmptyParams),
    ContractCall(ContractCallParams),
    Custom(CustomParams),
}

impl RuleParams {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::WalletBalance(_) => RuleKind::WalletBalance,
            Self::ContractBalance(_) => RuleKind::ContractBalance,
            Self::Erc20Balance(_) => RuleKind::Erc20Balance,
            Self::TransactionCount(_) => RuleKind::TransactionCount,
            Self::HasAnyNft(_) => RuleKind::HasAnyNft,
            Self::HasNftId(_) => RuleKind::HasNftId,
            Self::IsContract(_) => RuleKind::IsContract,
            Self::IsEoa(_) => RuleKind::IsEoa,
            Self::ContractCall(_) => RuleKind::ContractCall,
            Self::Custom(_) => RuleKind::Custom,
        }
    }

    /// 按类型将已通过结构校验的 JSON 参数解析为强类型参数
    fn from_value(kind: RuleKind, params: Value) -> Result<Self> {
        // 无参数类型允许省略 params
        let params = if params.is_null() {
            Value::Object(Default::default())
        } else {
            params
        };

        Ok(match kind {
            RuleKind::WalletBalance => Self::WalletBalance(serde_json::from_value(params)?),
            RuleKind::ContractBalance => Self::ContractBalance(serde_json::from_value(params)?),
            RuleKind::Erc20Balance => Self::Erc20Balance(serde_json::from_value(params)?),
            RuleKind::TransactionCount => Self::TransactionCount(serde_json::from_value(params)?),
            RuleKind::HasAnyNft => Self::HasAnyNft(serde_json::from_value(params)?),
            RuleKind::HasNftId => Self::HasNftId(serde_json::from_value(params)?),
            RuleKind::IsContract => Self::IsContract(serde_json::from_value(params)?),
            RuleKind::IsEoa => Self::IsEoa(serde_json::from_value(params)?),
            RuleKind::ContractCall => Self::ContractCall(serde_json::from_value(params)?),
            RuleKind::Custom => Self::Custom(serde_json::from_value(params)?),
        })
    }

    /// 转换为 JSON 参数对象（整数统一为十进制字符串）
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            Self::WalletBalance(p) | Self::TransactionCount(p) => serde_json::to_value(p)?,
            Self::ContractBalance(p) | Self::Erc20Balance(p) => serde_json::to_value(p)?,
            Self::HasAnyNft(p) => serde_json::to_value(p)?,
            Self::HasNftId(p) => serde_json::to_value(p)?,
            Self::IsContract(p) | Self::IsEoa(p) => serde_json::to_value(p)?,
            Self::ContractCall(p) => serde_json::to_value(p)?,
            Self::Custom(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    fn serialize_params<S: Serializer>(
        &self,
        state: &mut S::SerializeStruct,
    ) -> std::result::Result<(), S::Error> {
        match self {
            Self::WalletBalance(p) | Self::TransactionCount(p) => state.serialize_field("params", p),
            Self::ContractBalance(p) | Self::Erc20Balance(p) => state.serialize_field("params", p),
            Self::HasAnyNft(p) => state.serialize_field("params", p),
            Self::HasNftId(p) => state.serialize_field("params", p),
            Self::IsContract(p) | Self::IsEoa(p) => state.serialize_field("params", p),
            Self::ContractCall(p) => state.serialize_field("params", p),
            Self::Custom(p) => state.serialize_field("params", p),
        }
    }
}

/// 未经校验的原始规则定义（JSON 边界上的形态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(default)]
    pub params: Value,
}

/// 规则定义
///
/// 反序列化时先经过结构校验（见 [`crate::schema`]），再解析为强类型参数。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct RuleDefinition {
    pub chain_id: String,
    pub params: RuleParams,
}

impl RuleDefinition {
    pub fn new(chain_id: impl Into<String>, params: RuleParams) -> Self {
        Self {
            chain_id: chain_id.into(),
            params,
        }
    }

    pub fn kind(&self) -> RuleKind {
        self.params.kind()
    }

    /// 转换为原始 JSON 形态
    pub fn to_raw(&self) -> Result<RawDefinition> {
        Ok(RawDefinition {
            kind: self.kind().as_str().to_string(),
            chain_id: self.chain_id.clone(),
            params: self.params.to_value()?,
        })
    }
}

impl TryFrom<RawDefinition> for RuleDefinition {
    type Error = RuleError;

    fn try_from(raw: RawDefinition) -> Result<Self> {
        let kind = schema::validate_raw(&raw)?;
        let params = RuleParams::from_value(kind, raw.params)?;
        Ok(Self {
            chain_id: raw.chain_id,
            params,
        })
    }
}

impl TryFrom<Value> for RuleDefinition {
    type Error = RuleError;

    fn try_from(value: Value) -> Result<Self> {
        Self::try_from(schema::raw_from_value(value)?)
    }
}

impl Serialize for RuleDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RuleDefinition", 3)?;
        state.serialize_field("type", self.kind().as_str())?;
        state.serialize_field("chainId", &self.chain_id)?;
        self.params.serialize_params::<S>(&mut state)?;
        state.end()
    }
}

/// 单条规则的执行结果
///
/// `error` 仅在执行故障（RPC 失败、缺少参数、比较类型不匹配等）时存在；
/// 正常执行但条件不满足时 `success == false` 且 `error` 为空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RuleResult {
    pub fn passed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            error: None,
        }
    }

    pub fn errored(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            error: Some(error.into()),
        }
    }

    /// 将谓词的执行结果转换为规则结果
    pub fn from_outcome(name: impl Into<String>, outcome: Result<bool>) -> Self {
        match outcome {
            Ok(true) => Self::passed(name),
            Ok(false) => Self::failed(name),
            Err(e) => Self::errored(name, e.to_string()),
        }
    }
}

/// 整体评估结果：`result` 为所有规则结果的逻辑与（零条规则时为 true）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
    pub rule_results: Vec<RuleResult>,
    pub result: bool,
}

impl EvaluateResult {
    pub fn new(rule_results: Vec<RuleResult>) -> Self {
        let result = rule_results.iter().all(|r| r.success);
        Self {
            rule_results,
            result,
        }
    }

    /// 失败的规则结果
    pub fn failures(&self) -> impl Iterator<Item = &RuleResult> {
        self.rule_results.iter().filter(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_kind_round_trip() {
        for kind in RuleKind::ALL {
            assert_eq!(kind.as_str().parse::<RuleKind>().unwrap(), kind);
        }
        assert!(matches!(
            "nftBalance".parse::<RuleKind>(),
            Err(RuleError::UnknownRuleType(ref t)) if t == "nftBalance"
        ));
    }

    #[test]
    fn test_definition_serialization() {
        let definition = RuleDefinition::new(
            "31337",
            RuleParams::WalletBalance(ThresholdParams::at_least(U256::from(
                1_000_000_000_000_000_000u64,
            ))),
        );

        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "walletBalance",
                "chainId": "31337",
                "params": { "value": "1000000000000000000", "operator": "gte" }
            })
        );

        let parsed: RuleDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, definition);
    }

    #[test]
    fn test_definition_deserialization() {
        let json = r#"
        {
            "type": "erc20Balance",
            "chainId": "1",
            "params": {
                "contractAddress": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
                "value": "5000000",
                "operator": "gt"
            }
        }
        "#;

        let definition: RuleDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.kind(), RuleKind::Erc20Balance);
        match definition.params {
            RuleParams::Erc20Balance(p) => {
                assert_eq!(p.value, U256::from(5_000_000u64));
                assert_eq!(p.operator, Comparator::Gt);
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn test_operator_defaults_to_gte() {
        let definition: RuleDefinition = serde_json::from_value(json!({
            "type": "transactionCount",
            "chainId": "1",
            "params": { "value": "10" }
        }))
        .unwrap();

        assert_eq!(
            definition.params,
            RuleParams::TransactionCount(ThresholdParams::at_least(U256::from(10u64)))
        );
    }

    #[test]
    fn test_params_optional_for_address_kind() {
        let definition: RuleDefinition = serde_json::from_value(json!({
            "type": "isEoa",
            "chainId": "1"
        }))
        .unwrap();
        assert_eq!(definition.params, RuleParams::IsEoa(EmptyParams {}));

        let value = serde_json::to_value(&definition).unwrap();
        assert_eq!(value["params"], json!({}));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = serde_json::from_value::<RuleDefinition>(json!({
            "type": "stakedBalance",
            "chainId": "1",
            "params": {}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("stakedBalance"));
    }

    #[test]
    fn test_non_string_chain_id_named_in_error() {
        let err = serde_json::from_value::<RuleDefinition>(json!({
            "type": "isEoa",
            "chainId": 1
        }))
        .unwrap_err();
        assert!(err.to_string().contains("chainId"));
    }

    #[test]
    fn test_numeric_param_as_json_number_rejected() {
        let raw = RawDefinition {
            kind: "walletBalance".to_string(),
            chain_id: "1".to_string(),
            params: json!({ "value": 1000 }),
        };
        let err = RuleDefinition::try_from(raw).unwrap_err();
        assert!(matches!(err, RuleError::Schema { ref fields, .. } if fields == &vec!["value".to_string()]));
    }

    #[test]
    fn test_rule_result_error_only_on_fault() {
        let ok = RuleResult::from_outcome("a", Ok(false));
        assert!(!ok.success);
        assert!(ok.error.is_none());

        let fault = RuleResult::from_outcome("a", Err(RuleError::MissingAddress));
        assert!(!fault.success);
        assert!(fault.error.is_some());

        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, json!({ "name": "a", "success": false }));
    }

    #[test]
    fn test_evaluate_result_aggregation() {
        assert!(EvaluateResult::new(vec![]).result);

        let mixed = EvaluateResult::new(vec![RuleResult::passed("a"), RuleResult::failed("b")]);
        assert!(!mixed.result);
        assert_eq!(mixed.failures().count(), 1);

        let json = serde_json::to_value(&mixed).unwrap();
        assert!(json.get("ruleResults").is_some());
    }
}
