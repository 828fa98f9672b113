//! 多网络注册表
//!
//! 以链 ID 为键管理链上查询连接。注册表在构造时一次性给定，之后只读，
//! 连接句柄在多个并发执行的谓词之间共享。
//!
//! 链上查询的具体传输（JSON-RPC、ABI 编解码）由外部组件实现 [`ChainClient`]。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, I256, U256};
use async_trait::async_trait;
use gate_shared::config::NetworkConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, RuleError};
use crate::numeric::Integer;

/// 只读合约调用请求
///
/// `abi` 为 JSON ABI 函数片段，参数编码由实现方负责。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub address: String,
    pub abi: Value,
    pub method: String,
    pub args: Vec<Value>,
}

/// 合约调用返回值（已解码）
#[derive(Debug, Clone, PartialEq)]
pub enum CallValue {
    Bool(bool),
    Uint(U256),
    Int(I256),
    Address(Address),
    String(String),
}

impl CallValue {
    /// 数值类返回值转换为统一的整数表示
    pub fn as_integer(&self) -> Option<Integer> {
        match self {
            Self::Uint(v) => Some(Integer::Unsigned(*v)),
            Self::Int(v) => Some(Integer::Signed(*v)),
            _ => None,
        }
    }

    /// 地址类返回值；字符串形式的地址也会被解析
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(a) => Some(*a),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Uint(_) | Self::Int(_) => "number",
            Self::Address(_) => "address",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for CallValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Address(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
        }
    }
}

/// 链上查询能力契约
///
/// 引擎只使用只读查询；实现必须可在多个并发请求间共享。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// 原生币余额（wei）
    async fn get_balance(&self, address: &str) -> anyhow::Result<U256>;

    /// 地址已发送的交易数（nonce）
    async fn get_transaction_count(&self, address: &str) -> anyhow::Result<u64>;

    /// 地址上部署的代码，EOA 返回空
    async fn get_code(&self, address: &str) -> anyhow::Result<Bytes>;

    /// 调用只读合约方法
    async fn call(&self, request: &CallRequest) -> anyhow::Result<CallValue>;
}

/// 网络：链 ID 与连接句柄
#[derive(Clone)]
pub struct Network {
    pub chain_id: String,
    pub connection: Arc<dyn ChainClient>,
}

impl Network {
    pub fn new(chain_id: impl Into<String>, connection: Arc<dyn ChainClient>) -> Self {
        Self {
            chain_id: chain_id.into(),
            connection,
        }
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

/// 网络注册表
///
/// 构造后不可变；重复的链 ID 会在构造时被拒绝，避免"先注册者生效"的歧义。
pub struct NetworkRegistry {
    networks: HashMap<String, Arc<dyn ChainClient>>,
    chain_ids: Vec<String>,
}

impl NetworkRegistry {
    /// 从网络列表构造注册表
    ///
    /// 列表为空、链 ID 为空或重复时返回 `RuleError::Configuration`。
    pub fn new(networks: Vec<Network>) -> Result<Self> {
        if networks.is_empty() {
            return Err(RuleError::Configuration(
                "网络注册表至少需要一个网络".to_string(),
            ));
        }

        let mut map = HashMap::with_capacity(networks.len());
        let mut chain_ids = Vec::with_capacity(networks.len());

        for network in networks {
            let chain_id = network.chain_id.trim().to_string();
            if chain_id.is_empty() {
                return Err(RuleError::Configuration("链 ID 不能为空".to_string()));
            }
            if map.contains_key(&chain_id) {
                return Err(RuleError::Configuration(format!(
                    "重复的链 ID: {chain_id}"
                )));
            }

            debug!(chain_id = %chain_id, "注册网络");
            map.insert(chain_id.clone(), network.connection);
            chain_ids.push(chain_id);
        }

        info!(network_count = chain_ids.len(), chain_ids = ?chain_ids, "网络注册表初始化完成");

        Ok(Self {
            networks: map,
            chain_ids,
        })
    }

    /// 根据配置构造注册表，连接由调用方提供的 `connect` 创建
    pub fn from_config<F>(configs: &[NetworkConfig], mut connect: F) -> Result<Self>
    where
        F: FnMut(&NetworkConfig) -> anyhow::Result<Arc<dyn ChainClient>>,
    {
        let networks = configs
            .iter()
            .map(|config| {
                let connection = connect(config).map_err(|e| {
                    RuleError::Configuration(format!(
                        "无法连接网络 {} ({}): {e:#}",
                        config.chain_id, config.rpc_url
                    ))
                })?;
                Ok(Network::new(config.chain_id.clone(), connection))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(networks)
    }

    /// 解析链 ID 对应的连接
    pub fn resolve(&self, chain_id: &str) -> Result<Arc<dyn ChainClient>> {
        self.networks
            .get(chain_id)
            .cloned()
            .ok_or_else(|| RuleError::UnknownChain(chain_id.to_string()))
    }

    pub fn contains(&self, chain_id: &str) -> bool {
        self.networks.contains_key(chain_id)
    }

    /// 已注册的链 ID（按注册顺序）
    pub fn chain_ids(&self) -> &[String] {
        &self.chain_ids
    }

    pub fn len(&self) -> usize {
        self.chain_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain_ids.is_empty()
    }
}

impl fmt::Debug for NetworkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkRegistry")
            .field("chain_ids", &self.chain_ids)
            .finish()
    }
}
