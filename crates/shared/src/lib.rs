//! 共享库
//!
//! 包含嵌入规则引擎的服务共用的配置加载与可观测性（日志、指标）基础设施。

pub mod config;
pub mod observability;
