//! 规则工厂
//!
//! 每个工厂在调用时即校验自身参数（失败返回 `InvalidParameter`），
//! 生成的谓词持有网络注册表与链 ID，在执行时才解析连接。
//! 谓词本身不会返回错误：执行中的任何失败都被转换为失败的 [`RuleResult`]。

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Value, json};

use crate::error::{Result, RuleError};
use crate::evaluator::ConditionEvaluator;
use crate::models::{
    ContractCallParams, ContractThresholdParams, CustomParams, EmptyParams, Expected, NftIdParams,
    NftParams, RuleDefinition, RuleKind, RuleParams, RuleResult, ThresholdParams,
};
use crate::network::{CallRequest, CallValue, ChainClient, NetworkRegistry};
use crate::numeric::Integer;
use crate::operators::Comparator;

/// 谓词返回的 future
pub type RuleFuture = BoxFuture<'static, RuleResult>;

/// 规则谓词：接收待评估地址（可选），返回规则结果
pub type Predicate = Arc<dyn Fn(Option<String>) -> RuleFuture + Send + Sync>;

/// 可执行规则：谓词与其可序列化定义的组合
#[derive(Clone)]
pub struct BuiltRule {
    name: String,
    predicate: Predicate,
    definition: RuleDefinition,
}

impl BuiltRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &RuleDefinition {
        &self.definition
    }

    pub fn kind(&self) -> RuleKind {
        self.definition.kind()
    }

    pub fn chain_id(&self) -> &str {
        &self.definition.chain_id
    }

    /// 对地址执行谓词
    pub fn evaluate(&self, address: Option<&str>) -> RuleFuture {
        (self.predicate)(address.map(str::to_string))
    }
}

impl fmt::Debug for BuiltRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltRule")
            .field("name", &self.name)
            .field("definition", &self.definition)
            .finish_non_exhaustive()
    }
}

/// 将链上检查包装为谓词
///
/// 连接在每次执行时通过注册表解析，链未注册时返回 `UnknownChain` 失败结果。
fn build<F, Fut>(
    registry: &Arc<NetworkRegistry>,
    definition: RuleDefinition,
    name: String,
    check: F,
) -> BuiltRule
where
    F: Fn(Arc<dyn ChainClient>, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    let registry = Arc::clone(registry);
    let chain_id = definition.chain_id.clone();
    let rule_name = name.clone();

    let predicate: Predicate = Arc::new(move |address: Option<String>| {
        let pending = registry
            .resolve(&chain_id)
            .map(|client| check(client, address));
        let name = rule_name.clone();

        async move {
            let outcome = match pending {
                Ok(check) => check.await,
                Err(e) => Err(e),
            };
            RuleResult::from_outcome(name, outcome)
        }
        .boxed()
    });

    BuiltRule {
        name,
        predicate,
        definition,
    }
}

fn require_chain_id(chain_id: impl Into<String>) -> Result<String> {
    let chain_id = chain_id.into();
    if chain_id.trim().is_empty() {
        return Err(RuleError::invalid_parameter("chainId", "链 ID 不能为空"));
    }
    Ok(chain_id)
}

fn require_contract_address(contract_address: &str) -> Result<Address> {
    contract_address.parse::<Address>().map_err(|e| {
        RuleError::invalid_parameter(
            "contractAddress",
            format!("'{contract_address}' 不是有效的地址: {e}"),
        )
    })
}

/// 解析待评估地址
fn target_address(address: Option<String>) -> Result<Address> {
    let address = address.ok_or(RuleError::MissingAddress)?;
    address
        .trim()
        .parse::<Address>()
        .map_err(|_| RuleError::InvalidAddress(address))
}

fn expect_integer(value: CallValue, method: &str) -> Result<Integer> {
    value.as_integer().ok_or_else(|| {
        RuleError::UnsupportedComparison(format!(
            "{method} 返回了 {} 类型的结果 '{value}'，期望数值",
            value.type_name()
        ))
    })
}

/// ERC-20 / ERC-721 `balanceOf(address)` 函数片段
pub fn balance_of_abi() -> Value {
    json!({
        "type": "function",
        "name": "balanceOf",
        "stateMutability": "view",
        "inputs": [{ "name": "owner", "type": "address" }],
        "outputs": [{ "name": "", "type": "uint256" }]
    })
}

/// ERC-721 `ownerOf(uint256)` 函数片段
pub fn owner_of_abi() -> Value {
    json!({
        "type": "function",
        "name": "ownerOf",
        "stateMutability": "view",
        "inputs": [{ "name": "tokenId", "type": "uint256" }],
        "outputs": [{ "name": "", "type": "address" }]
    })
}

/// ABI 中是否声明了指定名称的函数
fn abi_declares(abi: &Value, method: &str) -> bool {
    let declares = |fragment: &Value| {
        fragment.get("name").and_then(Value::as_str) == Some(method)
            && fragment
                .get("type")
                .and_then(Value::as_str)
                .is_none_or(|t| t == "function")
    };

    match abi {
        Value::Object(_) => declares(abi),
        Value::Array(fragments) => fragments.iter().any(declares),
        _ => false,
    }
}

fn format_args(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// 钱包原生币余额
pub fn wallet_balance(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    params: ThresholdParams,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let name = format!("Wallet balance {} {}", params.operator.symbol(), params.value);
    let ThresholdParams { value, operator } = params.clone();

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, RuleParams::WalletBalance(params)),
        name,
        move |client, address| async move {
            let address = target_address(address)?;
            let balance = client
                .get_balance(&address.to_string())
                .await
                .map_err(RuleError::rpc)?;
            Ok(operator.compare(&balance, &value))
        },
    ))
}

/// 钱包余额不少于 `value` wei
pub fn wallet_balance_at_least(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    value: U256,
) -> Result<BuiltRule> {
    wallet_balance(registry, chain_id, ThresholdParams::at_least(value))
}

/// 合约地址的原生币余额（与待评估地址无关）
pub fn contract_balance(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    params: ContractThresholdParams,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let contract = require_contract_address(&params.contract_address)?;
    let name = format!(
        "Contract {} balance {} {}",
        params.contract_address,
        params.operator.symbol(),
        params.value
    );
    let (value, operator) = (params.value, params.operator);

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, RuleParams::ContractBalance(params)),
        name,
        move |client, _address| async move {
            let balance = client
                .get_balance(&contract.to_string())
                .await
                .map_err(RuleError::rpc)?;
            Ok(operator.compare(&balance, &value))
        },
    ))
}

/// ERC-20 代币余额
pub fn erc20_balance(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    params: ContractThresholdParams,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let contract = require_contract_address(&params.contract_address)?;
    let name = format!(
        "ERC-20 {} balance {} {}",
        params.contract_address,
        params.operator.symbol(),
        params.value
    );
    let expected = Integer::Unsigned(params.value);
    let operator = params.operator;

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, RuleParams::Erc20Balance(params)),
        name,
        move |client, address| async move {
            let address = target_address(address)?;
            let request = CallRequest {
                address: contract.to_string(),
                abi: balance_of_abi(),
                method: "balanceOf".to_string(),
                args: vec![Value::String(address.to_string())],
            };
            let result = client.call(&request).await.map_err(RuleError::rpc)?;
            let balance = expect_integer(result, "balanceOf")?;
            Ok(ConditionEvaluator::compare_integers(balance, operator, expected))
        },
    ))
}

/// 地址已发送的交易数
pub fn transaction_count(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    params: ThresholdParams,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let name = format!(
        "Transaction count {} {}",
        params.operator.symbol(),
        params.value
    );
    let ThresholdParams { value, operator } = params.clone();

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, RuleParams::TransactionCount(params)),
        name,
        move |client, address| async move {
            let address = target_address(address)?;
            let count = client
                .get_transaction_count(&address.to_string())
                .await
                .map_err(RuleError::rpc)?;
            Ok(operator.compare(&U256::from(count), &value))
        },
    ))
}

/// 持有合约中任意一个 NFT（`balanceOf > 0`）
pub fn has_any_nft(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    params: NftParams,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let contract = require_contract_address(&params.contract_address)?;
    let name = format!("Owns any NFT from {}", params.contract_address);

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, RuleParams::HasAnyNft(params)),
        name,
        move |client, address| async move {
            let address = target_address(address)?;
            let request = CallRequest {
                address: contract.to_string(),
                abi: balance_of_abi(),
                method: "balanceOf".to_string(),
                args: vec![Value::String(address.to_string())],
            };
            let result = client.call(&request).await.map_err(RuleError::rpc)?;
            let balance = expect_integer(result, "balanceOf")?;
            Ok(balance > Integer::from(0u64))
        },
    ))
}

/// 持有指定 token id 的 NFT（`ownerOf(tokenId) == address`）
pub fn has_nft_id(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    params: NftIdParams,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let contract = require_contract_address(&params.contract_address)?;
    let name = format!(
        "Owns NFT #{} from {}",
        params.token_id, params.contract_address
    );
    let token_id = params.token_id;

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, RuleParams::HasNftId(params)),
        name,
        move |client, address| async move {
            let address = target_address(address)?;
            let request = CallRequest {
                address: contract.to_string(),
                abi: owner_of_abi(),
                method: "ownerOf".to_string(),
                args: vec![Value::String(token_id.to_string())],
            };
            let result = client.call(&request).await.map_err(RuleError::rpc)?;
            let owner = result.as_address().ok_or_else(|| {
                RuleError::UnsupportedComparison(format!(
                    "ownerOf 返回了 {} 类型的结果 '{result}'，期望地址",
                    result.type_name()
                ))
            })?;
            Ok(owner == address)
        },
    ))
}

/// 地址上是否部署了代码；`expect_code` 为 false 时即 EOA 检查
fn address_kind(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    expect_code: bool,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let (name, params) = if expect_code {
        ("Address is a contract", RuleParams::IsContract(EmptyParams {}))
    } else {
        ("Address is an EOA", RuleParams::IsEoa(EmptyParams {}))
    };

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, params),
        name.to_string(),
        move |client, address| async move {
            let address = target_address(address)?;
            let code = client
                .get_code(&address.to_string())
                .await
                .map_err(RuleError::rpc)?;
            Ok(code.is_empty() != expect_code)
        },
    ))
}

/// 地址为合约
pub fn is_contract(registry: &Arc<NetworkRegistry>, chain_id: impl Into<String>) -> Result<BuiltRule> {
    address_kind(registry, chain_id, true)
}

/// 地址为外部账户（无代码）
pub fn is_eoa(registry: &Arc<NetworkRegistry>, chain_id: impl Into<String>) -> Result<BuiltRule> {
    address_kind(registry, chain_id, false)
}

/// 通用只读合约调用比较
///
/// 参数中的字符串 `"$address"` 在执行时替换为待评估地址。
pub fn contract_call(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    params: ContractCallParams,
) -> Result<BuiltRule> {
    let chain_id = require_chain_id(chain_id)?;
    let contract = require_contract_address(&params.contract_address)?;

    if params.method.trim().is_empty() {
        return Err(RuleError::invalid_parameter("method", "方法名不能为空"));
    }
    if !abi_declares(&params.abi, &params.method) {
        return Err(RuleError::invalid_parameter(
            "abi",
            format!("ABI 中未声明函数 {}", params.method),
        ));
    }
    match &params.expected {
        Expected::Bool(_) if params.operator != Comparator::Eq => {
            return Err(RuleError::invalid_parameter(
                "operator",
                format!("布尔期望值仅支持 eq，收到 {}", params.operator),
            ));
        }
        Expected::Text(text) if params.operator != Comparator::Eq && Integer::parse(text).is_none() => {
            return Err(RuleError::invalid_parameter(
                "operator",
                format!("非数值期望值 '{text}' 仅支持 eq，收到 {}", params.operator),
            ));
        }
        _ => {}
    }

    let name = format!(
        "Contract call {}.{}({}) {} {}",
        params.contract_address,
        params.method,
        format_args(&params.args),
        params.operator.symbol(),
        params.expected
    );
    let request = CallRequest {
        address: contract.to_string(),
        abi: params.abi.clone(),
        method: params.method.clone(),
        args: params.args.clone(),
    };
    let expected = params.expected.clone();
    let operator = params.operator;

    Ok(build(
        registry,
        RuleDefinition::new(chain_id, RuleParams::ContractCall(params)),
        name,
        move |client, address| {
            let mut request = request.clone();
            let expected = expected.clone();
            async move {
                if request.args.iter().any(|arg| arg.as_str() == Some(ADDRESS_PLACEHOLDER)) {
                    let address = target_address(address)?.to_string();
                    for arg in &mut request.args {
                        if arg.as_str() == Some(ADDRESS_PLACEHOLDER) {
                            *arg = Value::String(address.clone());
                        }
                    }
                }
                let result = client.call(&request).await.map_err(RuleError::rpc)?;
                ConditionEvaluator::evaluate(&result, operator, &expected)
            }
        },
    ))
}

/// 合约调用参数中代表待评估地址的占位符
pub const ADDRESS_PLACEHOLDER: &str = "$address";

/// 自定义谓词
///
/// 谓词返回的错误消息原样作为规则结果的 `error`。
/// 自定义规则不可导出为 JSON。
pub fn custom<F, Fut>(
    registry: &Arc<NetworkRegistry>,
    chain_id: impl Into<String>,
    name: impl Into<String>,
    check: F,
) -> Result<BuiltRule>
where
    F: Fn(Arc<dyn ChainClient>, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    let chain_id = require_chain_id(chain_id)?;
    let name = name.into();
    if name.trim().is_empty() {
        return Err(RuleError::invalid_parameter("name", "自定义规则名称不能为空"));
    }

    Ok(build(
        registry,
        RuleDefinition::new(
            chain_id,
            RuleParams::Custom(CustomParams { name: name.clone() }),
        ),
        name,
        move |client, address| {
            check(client, address)
                .map(|outcome| outcome.map_err(|e| RuleError::Predicate(format!("{e:#}"))))
        },
    ))
}

/// 根据定义构造规则
///
/// `custom` 定义不携带谓词，无法重建，返回 `NotSerializable`。
pub fn from_definition(
    registry: &Arc<NetworkRegistry>,
    definition: RuleDefinition,
) -> Result<BuiltRule> {
    let RuleDefinition { chain_id, params } = definition;
    match params {
        RuleParams::WalletBalance(p) => wallet_balance(registry, chain_id, p),
        RuleParams::ContractBalance(p) => contract_balance(registry, chain_id, p),
        RuleParams::Erc20Balance(p) => erc20_balance(registry, chain_id, p),
        RuleParams::TransactionCount(p) => transaction_count(registry, chain_id, p),
        RuleParams::HasAnyNft(p) => has_any_nft(registry, chain_id, p),
        RuleParams::HasNftId(p) => has_nft_id(registry, chain_id, p),
        RuleParams::IsContract(_) => is_contract(registry, chain_id),
        RuleParams::IsEoa(_) => is_eoa(registry, chain_id),
        RuleParams::ContractCall(p) => contract_call(registry, chain_id, p),
        RuleParams::Custom(p) => Err(RuleError::NotSerializable(format!(
            "自定义规则 '{}' 无法从定义重建",
            p.name
        ))),
    }
}

/// 绑定到网络注册表的规则工厂
#[derive(Debug, Clone)]
pub struct RuleFactory {
    registry: Arc<NetworkRegistry>,
}

impl RuleFactory {
    pub fn new(registry: Arc<NetworkRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    pub fn wallet_balance(&self, chain_id: impl Into<String>, params: ThresholdParams) -> Result<BuiltRule> {
        wallet_balance(&self.registry, chain_id, params)
    }

    pub fn wallet_balance_at_least(&self, chain_id: impl Into<String>, value: U256) -> Result<BuiltRule> {
        wallet_balance_at_least(&self.registry, chain_id, value)
    }

    pub fn contract_balance(
        &self,
        chain_id: impl Into<String>,
        params: ContractThresholdParams,
    ) -> Result<BuiltRule> {
        contract_balance(&self.registry, chain_id, params)
    }

    pub fn erc20_balance(
        &self,
        chain_id: impl Into<String>,
        params: ContractThresholdParams,
    ) -> Result<BuiltRule> {
        erc20_balance(&self.registry, chain_id, params)
    }

    pub fn transaction_count(&self, chain_id: impl Into<String>, params: ThresholdParams) -> Result<BuiltRule> {
        transaction_count(&self.registry, chain_id, params)
    }

    pub fn has_any_nft(&self, chain_id: impl Into<String>, params: NftParams) -> Result<BuiltRule> {
        has_any_nft(&self.registry, chain_id, params)
    }

    pub fn has_nft_id(&self, chain_id: impl Into<String>, params: NftIdParams) -> Result<BuiltRule> {
        has_nft_id(&self.registry, chain_id, params)
    }

    pub fn is_contract(&self, chain_id: impl Into<String>) -> Result<BuiltRule> {
        is_contract(&self.registry, chain_id)
    }

    pub fn is_eoa(&self, chain_id: impl Into<String>) -> Result<BuiltRule> {
        is_eoa(&self.registry, chain_id)
    }

    pub fn contract_call(&self, chain_id: impl Into<String>, params: ContractCallParams) -> Result<BuiltRule> {
        contract_call(&self.registry, chain_id, params)
    }

    pub fn custom<F, Fut>(
        &self,
        chain_id: impl Into<String>,
        name: impl Into<String>,
        check: F,
    ) -> Result<BuiltRule>
    where
        F: Fn(Arc<dyn ChainClient>, Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
    {
        custom(&self.registry, chain_id, name, check)
    }

    pub fn from_definition(&self, definition: RuleDefinition) -> Result<BuiltRule> {
        from_definition(&self.registry, definition)
    }
}
