//! Criterion benchmarks for PSLab hot paths.
//!
//! Benchmarks:
//! 1. TA batch functions (SMA, EMA, RSI, Bollinger, pivots)
//! 2. Lowering a crossover strategy script
//! 3. Full bar loop: precompute, series feeds, strategy fills and plots

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

use pslab_core::ast::{parse_program, Program};
use pslab_core::context::BarContext;
use pslab_core::domain::Bar;
use pslab_core::engine::{execute, EngineConfig};
use pslab_core::lower::{lower, LowerOptions};
use pslab_core::ta::{bb, ema, pivot_high, rsi, sma};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Bar {
                time: 1_600_000_000 + i as i64 * 3_600,
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000.0 + (i % 500) as f64,
            }
        })
        .collect()
}

fn id(name: &str) -> Value {
    json!({"type": "Identifier", "name": name})
}

fn ta(name: &str, args: Vec<Value>) -> Value {
    json!({"type": "CallExpression",
        "callee": {"type": "MemberExpression", "object": id("ta"), "property": id(name), "computed": false},
        "arguments": args})
}

fn num(v: f64) -> Value {
    json!({"type": "Literal", "value": v})
}

fn entry(entry_id: &str, direction: &str) -> Value {
    json!({"type": "ExpressionStatement", "expression": {"type": "CallExpression",
        "callee": {"type": "MemberExpression", "object": id("strategy"), "property": id("entry"), "computed": false},
        "arguments": [{"type": "Literal", "value": entry_id},
                      {"type": "MemberExpression", "object": id("strategy"), "property": id(direction), "computed": false},
                      num(1.0)]}})
}

fn decl(name: &str, init: Value) -> Value {
    json!({"type": "VariableDeclaration", "kind": "var", "declarations": [
        {"type": "VariableDeclarator", "id": id(name), "init": init}]})
}

fn crossover_script() -> Program {
    let body = json!([
        {"type": "ExpressionStatement", "expression": {"type": "CallExpression",
            "callee": id("strategy"), "arguments": [{"type": "Literal", "value": "Bench"}]}},
        decl("fast", ta("sma", vec![id("close"), num(20.0)])),
        decl("slow", ta("sma", vec![id("close"), num(50.0)])),
        decl("r", ta("rsi", vec![id("close"), num(14.0)])),
        {"type": "IfStatement", "test": ta("crossover", vec![id("fast"), id("slow")]),
         "consequent": [entry("Long", "long")]},
        {"type": "IfStatement", "test": ta("crossunder", vec![id("fast"), id("slow")]),
         "consequent": [entry("Short", "short")]},
        {"type": "ExpressionStatement", "expression": {"type": "CallExpression",
            "callee": id("plot"), "arguments": [id("r"), {"type": "Literal", "value": "rsi"}]}}
    ]);
    let source = json!({"type": "Program", "body": body}).to_string();
    parse_program(&source).unwrap()
}

// ── 1. TA Library ────────────────────────────────────────────────────

fn bench_ta(c: &mut Criterion) {
    let mut group = c.benchmark_group("ta_batch");

    for &bar_count in &[1_000, 10_000, 100_000] {
        let close: Vec<f64> = make_bars(bar_count).iter().map(|b| b.close).collect();
        group.bench_with_input(BenchmarkId::new("sma_20", bar_count), &close, |b, src| {
            b.iter(|| sma(black_box(src), 20));
        });
        group.bench_with_input(BenchmarkId::new("ema_20", bar_count), &close, |b, src| {
            b.iter(|| ema(black_box(src), 20));
        });
        group.bench_with_input(BenchmarkId::new("rsi_14", bar_count), &close, |b, src| {
            b.iter(|| rsi(black_box(src), 14));
        });
        group.bench_with_input(BenchmarkId::new("bb_20_2", bar_count), &close, |b, src| {
            b.iter(|| bb(black_box(src), 20, 2.0));
        });
        group.bench_with_input(BenchmarkId::new("pivothigh_5_5", bar_count), &close, |b, src| {
            b.iter(|| pivot_high(black_box(src), 5, 5));
        });
    }

    group.finish();
}

// ── 2. Lowering ──────────────────────────────────────────────────────

fn bench_lower(c: &mut Criterion) {
    let script = crossover_script();
    let options = LowerOptions::default();
    c.bench_function("lower_crossover_strategy", |b| {
        b.iter(|| lower(black_box(&script), black_box(&options)).unwrap());
    });
}

// ── 3. Bar Loop ──────────────────────────────────────────────────────

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_loop");
    let program = lower(&crossover_script(), &LowerOptions::default()).unwrap();
    let config = EngineConfig::default();

    for &bar_count in &[1_000, 10_000] {
        let bars = make_bars(bar_count);
        group.bench_with_input(
            BenchmarkId::new("crossover_strategy", bar_count),
            &bars,
            |b, bars| {
                b.iter(|| {
                    let mut ctx = BarContext::new("BENCH", "1h", bars.clone());
                    execute(black_box(&program), &mut ctx, &config).unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_ta, bench_lower, bench_bar_loop);
criterion_main!(benches);
