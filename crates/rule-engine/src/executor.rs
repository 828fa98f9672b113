//! 规则执行器
//!
//! 在同一任务内并发驱动所有规则的谓词（`join_all`），I/O 等待相互重叠；
//! 结果按规则的添加顺序返回，与完成顺序无关。
//! 单条规则的错误、panic 或超时只影响该规则自身的结果。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::join_all;
use gate_shared::observability::metrics;
use tracing::{debug, warn};

use crate::error::RuleError;
use crate::factories::BuiltRule;
use crate::models::{EvaluateResult, RuleResult};

/// 规则执行器
#[derive(Debug, Clone, Default)]
pub struct RuleExecutor {
    /// 单次评估的整体截止时间
    timeout: Option<Duration>,
}

impl RuleExecutor {
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// 设置评估截止时间，超时未完成的谓词被取消并报告为失败
    ///
    /// 截止时间依赖 tokio 计时器，[`Self::execute`] 需在 Tokio runtime 中执行。
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 对地址执行所有规则
    pub async fn execute(&self, rules: &[BuiltRule], address: Option<&str>) -> EvaluateResult {
        let start = Instant::now();
        let deadline = self.timeout.map(|t| tokio::time::Instant::now() + t);

        let results = join_all(
            rules
                .iter()
                .map(|rule| self.run_rule(rule, address, deadline)),
        )
        .await;

        let result = EvaluateResult::new(results);
        metrics::record_engine_evaluation(result.result, start.elapsed());
        result
    }

    async fn run_rule(
        &self,
        rule: &BuiltRule,
        address: Option<&str>,
        deadline: Option<tokio::time::Instant>,
    ) -> RuleResult {
        let start = Instant::now();

        // 谓词的同步部分也在 catch_unwind 内执行
        let guarded = AssertUnwindSafe(async { rule.evaluate(address).await }).catch_unwind();

        let (result, outcome) = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, guarded).await {
                Ok(finished) => Self::settle(rule, finished),
                Err(_) => {
                    let timeout = self.timeout.unwrap_or_default();
                    (
                        RuleResult::errored(
                            rule.name(),
                            RuleError::Timeout(timeout.as_millis()).to_string(),
                        ),
                        "timeout",
                    )
                }
            },
            None => Self::settle(rule, guarded.await),
        };

        let elapsed = start.elapsed();
        metrics::record_rule_evaluation(rule.kind().as_str(), outcome, elapsed);

        match &result.error {
            Some(error) => warn!(
                rule_name = %result.name,
                chain_id = %rule.chain_id(),
                error = %error,
                "规则执行失败"
            ),
            None => debug!(
                rule_name = %result.name,
                success = result.success,
                elapsed_ms = elapsed.as_millis() as u64,
                "规则执行完成"
            ),
        }

        result
    }

    fn settle(
        rule: &BuiltRule,
        finished: std::thread::Result<RuleResult>,
    ) -> (RuleResult, &'static str) {
        match finished {
            Ok(result) => {
                let outcome = match (&result.error, result.success) {
                    (Some(_), _) => "error",
                    (None, true) => "passed",
                    (None, false) => "failed",
                };
                (result, outcome)
            }
            Err(panic) => (
                RuleResult::errored(
                    rule.name(),
                    format!("谓词执行 panic: {}", panic_message(&*panic)),
                ),
                "panic",
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知 panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factories;
    use crate::network::{Network, NetworkRegistry};
    use crate::test_utils::StaticChainClient;
    use std::sync::Arc;

    const ADDRESS: &str = "0x1111111111111111111111111111111111111111";

    fn registry(client: StaticChainClient) -> Arc<NetworkRegistry> {
        Arc::new(NetworkRegistry::new(vec![Network::new("1", Arc::new(client))]).unwrap())
    }

    #[tokio::test]
    async fn test_empty_rule_set_is_vacuously_true() {
        let result = RuleExecutor::new().execute(&[], Some(ADDRESS)).await;
        assert!(result.result);
        assert!(result.rule_results.is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let registry = registry(StaticChainClient::new());
        let slow = factories::custom(&registry, "1", "slow", |_, _| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            anyhow::Ok(true)
        })
        .unwrap();
        let fast = factories::custom(&registry, "1", "fast", |_, _| async { anyhow::Ok(false) })
            .unwrap();

        let result = RuleExecutor::new()
            .execute(&[slow, fast], Some(ADDRESS))
            .await;
        let names: Vec<_> = result.rule_results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast"]);
        assert!(!result.result);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let registry = registry(StaticChainClient::new());
        let panicking = factories::custom(&registry, "1", "panics", |_, _| async {
            if true {
                panic!("boom");
            }
            anyhow::Ok(true)
        })
        .unwrap();
        let sibling =
            factories::custom(&registry, "1", "sibling", |_, _| async { anyhow::Ok(true) }).unwrap();

        let result = RuleExecutor::new()
            .execute(&[panicking, sibling], Some(ADDRESS))
            .await;
        assert!(!result.result);
        assert!(result.rule_results[0].error.as_ref().unwrap().contains("boom"));
        assert!(result.rule_results[1].success);
    }

    #[tokio::test]
    async fn test_deadline_cancels_pending_rules() {
        let registry = registry(StaticChainClient::new());
        let hanging = factories::custom(&registry, "1", "hanging", |_, _| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            anyhow::Ok(true)
        })
        .unwrap();
        let quick =
            factories::custom(&registry, "1", "quick", |_, _| async { anyhow::Ok(true) }).unwrap();

        let started = Instant::now();
        let result = RuleExecutor::new()
            .with_timeout(Duration::from_millis(50))
            .execute(&[hanging, quick], Some(ADDRESS))
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!result.result);
        assert_eq!(
            result.rule_results[0].error,
            Some(RuleError::Timeout(50).to_string())
        );
        assert!(result.rule_results[1].success);
    }
}
