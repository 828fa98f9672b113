//! 条件评估器与规则引擎性能基准测试
//!
//! 细粒度测试 ConditionEvaluator 的比较开销，以及引擎并发评估随规则数量的扩展。

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rule_engine::evaluator::ConditionEvaluator;
use rule_engine::test_utils::StaticChainClient;
use rule_engine::{CallValue, Comparator, Expected, I256, Network, RuleEngine, U256};
use tokio::runtime::Runtime;

const HOLDER: &str = "0x1111111111111111111111111111111111111111";

/// 数值比较基准
fn bench_numeric_comparisons(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric_comparisons");

    let observed = CallValue::Uint(U256::from(1_000_000_000_000_000_000u64));
    let expected = Expected::from("500000000000000000");

    for operator in [Comparator::Eq, Comparator::Gt, Comparator::Gte, Comparator::Lt, Comparator::Lte] {
        group.bench_function(operator.as_str(), |b| {
            b.iter(|| {
                ConditionEvaluator::evaluate(
                    black_box(&observed),
                    black_box(operator),
                    black_box(&expected),
                )
            })
        });
    }

    // 有符号结果与无符号期望值的混合比较
    let signed = CallValue::Int(I256::try_from(-42i64).unwrap_or_default());
    let large = Expected::from(U256::MAX);
    group.bench_function("signed_vs_max_uint", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(&signed),
                black_box(Comparator::Lt),
                black_box(&large),
            )
        })
    });

    group.finish();
}

/// 非数值相等比较基准
fn bench_equality_comparisons(c: &mut Criterion) {
    let mut group = c.benchmark_group("equality_comparisons");

    let flag = CallValue::Bool(true);
    let expected_flag = Expected::from(true);
    group.bench_function("bool", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(&flag),
                black_box(Comparator::Eq),
                black_box(&expected_flag),
            )
        })
    });

    let owner = CallValue::Address(HOLDER.parse().unwrap_or_default());
    let expected_owner = Expected::from(HOLDER);
    group.bench_function("address", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(&owner),
                black_box(Comparator::Eq),
                black_box(&expected_owner),
            )
        })
    });

    let symbol = CallValue::String("USDC".to_string());
    let expected_symbol = Expected::from("USDC");
    group.bench_function("string", |b| {
        b.iter(|| {
            ConditionEvaluator::evaluate(
                black_box(&symbol),
                black_box(Comparator::Eq),
                black_box(&expected_symbol),
            )
        })
    });

    group.finish();
}

fn engine_with_rules(count: usize) -> RuleEngine {
    let client = StaticChainClient::new()
        .with_balance(HOLDER, U256::from(10u64).pow(U256::from(18u64)))
        .with_nonce(HOLDER, 25);
    let mut engine = RuleEngine::new(vec![Network::new("1", Arc::new(client))])
        .unwrap_or_else(|e| panic!("failed to build engine: {e}"));
    let factory = engine.factory();

    let rules = (0..count)
        .map(|i| match i % 3 {
            0 => factory.wallet_balance_at_least("1", U256::from(i as u64)),
            1 => factory.is_eoa("1"),
            _ => factory.transaction_count(
                "1",
                rule_engine::ThresholdParams::new(U256::from(i as u64), Comparator::Lte),
            ),
        })
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| panic!("failed to build rules: {e}"));
    engine
        .add_rules(rules)
        .unwrap_or_else(|e| panic!("failed to add rules: {e}"));
    engine
}

/// 引擎评估随规则数量的扩展
fn bench_engine_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_fan_out");
    let runtime = Runtime::new().unwrap_or_else(|e| panic!("failed to start runtime: {e}"));

    for count in [1usize, 10, 50, 200] {
        let engine = engine_with_rules(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &engine, |b, engine| {
            b.iter(|| runtime.block_on(engine.evaluate(black_box(HOLDER))))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_numeric_comparisons,
    bench_equality_comparisons,
    bench_engine_fan_out,
);

criterion_main!(benches);
