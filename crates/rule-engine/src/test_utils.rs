//! 测试工具模块
//!
//! 提供内存中的 [`ChainClient`] 实现，供集成测试与基准测试使用，
//! 无需连接真实节点即可驱动各类规则。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Bytes, U256};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::network::{CallRequest, CallValue, ChainClient, Network, NetworkRegistry};

/// 静态链状态
///
/// 地址键不区分大小写；未配置的余额、交易数与代码按零值返回，
/// 未配置的合约调用返回 revert 错误。
#[derive(Debug, Default)]
pub struct StaticChainClient {
    balances: HashMap<String, U256>,
    nonces: HashMap<String, u64>,
    code: HashMap<String, Bytes>,
    calls: HashMap<String, CallValue>,
    failure: Option<String>,
    latency: Option<Duration>,
    reads: AtomicUsize,
}

fn normalize(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

fn call_key(contract: &str, method: &str, args: &[Value]) -> String {
    let args = args
        .iter()
        .map(|arg| match arg {
            Value::String(s) => normalize(s),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",");
    format!("{}.{method}({args})", normalize(contract))
}

impl StaticChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, address: &str, balance: U256) -> Self {
        self.balances.insert(normalize(address), balance);
        self
    }

    pub fn with_nonce(mut self, address: &str, nonce: u64) -> Self {
        self.nonces.insert(normalize(address), nonce);
        self
    }

    pub fn with_code(mut self, address: &str, code: impl Into<Bytes>) -> Self {
        self.code.insert(normalize(address), code.into());
        self
    }

    /// 配置合约调用的返回值，参数中的字符串按不区分大小写匹配
    pub fn with_call_result(
        mut self,
        contract: &str,
        method: &str,
        args: Vec<Value>,
        result: CallValue,
    ) -> Self {
        self.calls.insert(call_key(contract, method, &args), result);
        self
    }

    /// 所有查询均返回该错误
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// 每次查询前等待的时间
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 已执行的查询次数
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn begin_read(&self) -> anyhow::Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match &self.failure {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainClient for StaticChainClient {
    async fn get_balance(&self, address: &str) -> anyhow::Result<U256> {
        self.begin_read().await?;
        Ok(self
            .balances
            .get(&normalize(address))
            .copied()
            .unwrap_or_default())
    }

    async fn get_transaction_count(&self, address: &str) -> anyhow::Result<u64> {
        self.begin_read().await?;
        Ok(self
            .nonces
            .get(&normalize(address))
            .copied()
            .unwrap_or_default())
    }

    async fn get_code(&self, address: &str) -> anyhow::Result<Bytes> {
        self.begin_read().await?;
        Ok(self
            .code
            .get(&normalize(address))
            .cloned()
            .unwrap_or_default())
    }

    async fn call(&self, request: &CallRequest) -> anyhow::Result<CallValue> {
        self.begin_read().await?;
        let key = call_key(&request.address, &request.method, &request.args);
        self.calls
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("execution reverted: {key}"))
    }
}

/// 构造只含一个网络的注册表
pub fn single_chain_registry(
    chain_id: &str,
    client: Arc<dyn ChainClient>,
) -> Result<Arc<NetworkRegistry>> {
    Ok(Arc::new(NetworkRegistry::new(vec![Network::new(
        chain_id, client,
    )])?))
}
