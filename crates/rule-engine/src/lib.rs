//! EVM 链上规则引擎
//!
//! 针对一个地址并发评估一组链上条件，并将结果归约为单个布尔值：
//! - 多网络注册表，按链 ID 解析查询连接
//! - 规则工厂：余额、交易数、NFT 持有、地址类型、通用合约调用、自定义谓词
//! - 两阶段校验（结构 + 链注册），批量添加原子
//! - 并发执行，结果保持添加顺序，单条规则故障相互隔离
//! - JSON 导入导出，整数在 JSON 边界上以十进制字符串表示

pub mod compiler;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod factories;
pub mod models;
pub mod network;
pub mod numeric;
pub mod operators;
pub mod schema;
pub mod test_utils;
pub mod validator;

pub use compiler::RuleCompiler;
pub use engine::RuleEngine;
pub use error::{Result, RuleError};
pub use executor::RuleExecutor;
pub use factories::{BuiltRule, RuleFactory};
pub use models::{
    ContractCallParams, ContractThresholdParams, CustomParams, EmptyParams, EvaluateResult,
    Expected, NftIdParams, NftParams, RawDefinition, RuleDefinition, RuleKind, RuleParams,
    RuleResult, ThresholdParams,
};
pub use network::{CallRequest, CallValue, ChainClient, Network, NetworkRegistry};
pub use numeric::Integer;
pub use operators::Comparator;
pub use validator::RuleValidator;

/// 重新导出的链上数值类型
pub use alloy_primitives::{Address, Bytes, I256, U256};
