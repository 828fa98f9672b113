//! 规则引擎
//!
//! 持有网络注册表与已接受的规则列表。规则在加入前经过两阶段校验，
//! 批量添加与导入是原子的：任一规则不合法时整批都不会加入。

use std::sync::Arc;
use std::time::Duration;

use gate_shared::config::EngineConfig;
use gate_shared::observability::metrics;
use tracing::{info, instrument, warn};

use crate::compiler::RuleCompiler;
use crate::error::{Result, RuleError};
use crate::executor::RuleExecutor;
use crate::factories::{BuiltRule, RuleFactory};
use crate::models::{EvaluateResult, RuleDefinition, RuleKind};
use crate::network::{Network, NetworkRegistry};
use crate::validator::RuleValidator;

/// 规则引擎
pub struct RuleEngine {
    registry: Arc<NetworkRegistry>,
    compiler: RuleCompiler,
    executor: RuleExecutor,
    rules: Vec<BuiltRule>,
}

impl RuleEngine {
    /// 从网络列表创建引擎
    ///
    /// 列表为空或链 ID 重复时返回 `Configuration` 错误。
    pub fn new(networks: Vec<Network>) -> Result<Self> {
        let registry = NetworkRegistry::new(networks)?;
        Ok(Self::with_registry(Arc::new(registry)))
    }

    pub fn with_registry(registry: Arc<NetworkRegistry>) -> Self {
        Self {
            compiler: RuleCompiler::new(Arc::clone(&registry)),
            registry,
            executor: RuleExecutor::new(),
            rules: Vec::new(),
        }
    }

    /// 按引擎配置创建，应用评估截止时间
    pub fn with_config(registry: Arc<NetworkRegistry>, config: &EngineConfig) -> Self {
        let engine = Self::with_registry(registry);
        match config.evaluation_timeout() {
            Some(timeout) => engine.with_timeout(timeout),
            None => engine,
        }
    }

    /// 设置单次评估的截止时间
    ///
    /// 截止时间基于 tokio 计时器，设置后 [`Self::evaluate`] 必须在 Tokio runtime 中执行；
    /// 未设置时评估不依赖特定的 runtime。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<NetworkRegistry> {
        &self.registry
    }

    /// 绑定到本引擎注册表的规则工厂
    pub fn factory(&self) -> RuleFactory {
        RuleFactory::new(Arc::clone(&self.registry))
    }

    pub fn rules(&self) -> &[BuiltRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn validate(&self, rule: &BuiltRule) -> Result<()> {
        RuleValidator::validate_built_rule(rule, &self.registry).inspect_err(|e| {
            metrics::record_rule_rejected(e.code());
            warn!(rule_name = %rule.name(), error = %e, "规则校验失败");
        })
    }

    /// 校验并添加单条规则
    #[instrument(skip(self, rule), fields(rule_name = %rule.name(), chain_id = %rule.chain_id()))]
    pub fn add_rule(&mut self, rule: BuiltRule) -> Result<()> {
        self.validate(&rule)?;
        info!("规则已添加: {}", rule.name());
        self.rules.push(rule);
        Ok(())
    }

    /// 校验并批量添加规则，全部通过后才会加入
    #[instrument(skip(self, rules), fields(count = rules.len()))]
    pub fn add_rules(&mut self, rules: Vec<BuiltRule>) -> Result<()> {
        for rule in &rules {
            self.validate(rule)?;
        }

        let count = rules.len();
        self.rules.extend(rules);
        info!("批量添加完成: {} 条规则, 当前共 {} 条", count, self.rules.len());
        Ok(())
    }

    /// 按位置移除规则
    #[instrument(skip(self))]
    pub fn remove_rule(&mut self, index: usize) -> Result<BuiltRule> {
        if index >= self.rules.len() {
            warn!("移除不存在的规则: index={}", index);
            return Err(RuleError::RuleNotFound(index));
        }
        let rule = self.rules.remove(index);
        info!("规则已移除: {}", rule.name());
        Ok(rule)
    }

    /// 清空所有规则，注册表保持不变
    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        let count = self.rules.len();
        self.rules.clear();
        info!("已清空 {} 条规则", count);
    }

    /// 对地址评估所有规则
    ///
    /// 单条规则的执行故障只体现在对应的结果中，本方法总是返回结果。
    #[instrument(skip(self), fields(rule_count = self.rules.len()))]
    pub async fn evaluate(&self, address: &str) -> EvaluateResult {
        let result = self.executor.execute(&self.rules, Some(address)).await;
        info!(
            passed = result.result,
            failures = result.failures().count(),
            "评估完成"
        );
        result
    }

    /// 不提供地址评估所有规则，依赖地址的规则返回 `MissingAddress` 失败结果
    #[instrument(skip(self), fields(rule_count = self.rules.len()))]
    pub async fn evaluate_without_address(&self) -> EvaluateResult {
        self.executor.execute(&self.rules, None).await
    }

    /// 当前规则集的定义，按添加顺序
    pub fn get_definitions(&self) -> Vec<RuleDefinition> {
        self.rules
            .iter()
            .map(|rule| rule.definition().clone())
            .collect()
    }

    /// 导出为格式化的 JSON 数组
    ///
    /// 规则集中包含自定义规则时返回 `NotSerializable`。
    pub fn export_as_json(&self) -> Result<String> {
        if let Some(rule) = self.rules.iter().find(|r| r.kind() == RuleKind::Custom) {
            return Err(RuleError::NotSerializable(format!(
                "自定义规则 '{}' 无法导出",
                rule.name()
            )));
        }
        Ok(serde_json::to_string_pretty(&self.get_definitions())?)
    }

    /// 从 JSON 数组导入规则并追加到当前规则集，返回导入数量
    ///
    /// 与 [`Self::add_rules`] 执行相同的两阶段校验，整批原子。
    #[instrument(skip(self, json))]
    pub fn import_from_json(&mut self, json: &str) -> Result<usize> {
        let rules = self.compiler.compile_from_json(json).inspect_err(|e| {
            metrics::record_rule_rejected(e.code());
        })?;
        let count = rules.len();
        self.add_rules(rules)?;
        info!("规则导入完成: {} 条", count);
        Ok(count)
    }

    /// 预检 JSON 规则集是否可以导入，不修改引擎状态
    pub fn validate_rules_json_string(&self, json: &str) -> bool {
        self.compiler
            .compile_from_json(json)
            .and_then(|rules| {
                rules
                    .iter()
                    .try_for_each(|rule| RuleValidator::validate_built_rule(rule, &self.registry))
            })
            .is_ok()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("registry", &self.registry)
            .field("executor", &self.executor)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
