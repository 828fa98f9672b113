//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。
//! 未安装 recorder 时，记录函数为空操作。

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// 初始化 Prometheus 指标导出
///
/// 在 `0.0.0.0:{port}` 上暴露指标端点。在 tokio runtime 内调用时导出服务
/// 运行在当前 runtime 上，否则运行在独立的后台线程中。
pub fn init(service_name: &str, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    register_common_metrics(service_name);
    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// 注册指标描述
///
/// 这些描述会出现在 /metrics 端点的 HELP 注释中
pub fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "rule_evaluations_total",
        "Total number of rule predicate evaluations"
    );
    metrics::describe_histogram!(
        "rule_evaluation_duration_seconds",
        "Rule predicate evaluation duration in seconds"
    );

    metrics::describe_counter!(
        "engine_evaluations_total",
        "Total number of engine evaluations"
    );
    metrics::describe_histogram!(
        "engine_evaluation_duration_seconds",
        "Engine evaluation duration in seconds"
    );

    metrics::describe_counter!(
        "rules_rejected_total",
        "Total number of rules rejected at add or import time"
    );

    // 记录服务启动
    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录单条规则的执行
///
/// `outcome` 取值：passed / failed / error / timeout / panic
#[inline]
pub fn record_rule_evaluation(kind: &str, outcome: &str, duration: Duration) {
    metrics::counter!(
        "rule_evaluations_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "rule_evaluation_duration_seconds",
        "kind" => kind.to_string()
    )
    .record(duration.as_secs_f64());
}

/// 记录一次整体评估
#[inline]
pub fn record_engine_evaluation(passed: bool, duration: Duration) {
    metrics::counter!(
        "engine_evaluations_total",
        "result" => passed.to_string()
    )
    .increment(1);

    metrics::histogram!("engine_evaluation_duration_seconds").record(duration.as_secs_f64());
}

/// 记录被拒绝的规则，`reason` 为错误码
#[inline]
pub fn record_rule_rejected(reason: &str) {
    metrics::counter!(
        "rules_rejected_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}
