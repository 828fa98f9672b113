//! 规则引擎错误类型
//!
//! 错误分为两类：配置/校验类错误在调用点直接返回给调用方；
//! 执行类错误（链上调用失败、比较类型不匹配等）在谓词内部被转换为失败的 `RuleResult`。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("网络配置错误: {0}")]
    Configuration(String),

    #[error("无效的参数 {field}: {message}")]
    InvalidParameter { field: String, message: String },

    #[error("规则结构校验失败 ({kind}): {}", fields.join(", "))]
    Schema { kind: String, fields: Vec<String> },

    #[error("未知的规则类型: {0}")]
    UnknownRuleType(String),

    #[error("规则校验失败: 链 {0} 未在网络注册表中注册")]
    UnregisteredChain(String),

    #[error("未知的链: {0}")]
    UnknownChain(String),

    #[error("不支持的比较: {0}")]
    UnsupportedComparison(String),

    #[error("缺少地址参数")]
    MissingAddress,

    #[error("无效的地址: {0}")]
    InvalidAddress(String),

    #[error("链上调用失败: {0}")]
    Rpc(String),

    /// 调用方自定义谓词返回的错误，消息原样透传
    #[error("{0}")]
    Predicate(String),

    #[error("规则执行超时: {0}ms")]
    Timeout(u128),

    #[error("规则不可序列化: {0}")]
    NotSerializable(String),

    #[error("规则未找到: index={0}")]
    RuleNotFound(usize),

    #[error("JSON 序列化错误: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;

impl RuleError {
    pub fn invalid_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 将外部链查询组件的错误包装为 RPC 错误
    pub fn rpc(err: anyhow::Error) -> Self {
        Self::Rpc(format!("{err:#}"))
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::UnknownRuleType(_) => "UNKNOWN_RULE_TYPE",
            Self::UnregisteredChain(_) => "VALIDATION_ERROR",
            Self::UnknownChain(_) => "UNKNOWN_CHAIN",
            Self::UnsupportedComparison(_) => "UNSUPPORTED_COMPARISON",
            Self::MissingAddress => "MISSING_ADDRESS",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::Rpc(_) => "RPC_ERROR",
            Self::Predicate(_) => "PREDICATE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::NotSerializable(_) => "NOT_SERIALIZABLE",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::JsonError(_) => "JSON_ERROR",
        }
    }

    /// 是否为添加规则时的校验类错误（规则不会进入引擎）
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. }
                | Self::Schema { .. }
                | Self::UnknownRuleType(_)
                | Self::UnregisteredChain(_)
                | Self::NotSerializable(_)
                | Self::JsonError(_)
        )
    }
}
