//! Shared helpers for integration tests: AST JSON builders and bar fixtures.

#![allow(dead_code)]

use pslab_core::ast::parse_program;
use pslab_core::context::BarContext;
use pslab_core::domain::Bar;
use pslab_core::engine::{execute, EngineConfig, RunOutput};
use pslab_core::lower::ir::LoweredProgram;
use pslab_core::lower::{lower, LowerOptions};
use serde_json::{json, Value};

// ── AST builders ──

pub fn id(name: &str) -> Value {
    json!({"type": "Identifier", "name": name})
}

pub fn num(v: f64) -> Value {
    json!({"type": "Literal", "value": v})
}

pub fn text(s: &str) -> Value {
    json!({"type": "Literal", "value": s})
}

pub fn member(object: &str, property: &str) -> Value {
    json!({"type": "MemberExpression", "object": id(object), "property": id(property), "computed": false})
}

pub fn hist(object: Value, offset: f64) -> Value {
    json!({"type": "MemberExpression", "object": object, "property": num(offset), "computed": true})
}

pub fn call(callee: Value, args: Vec<Value>) -> Value {
    json!({"type": "CallExpression", "callee": callee, "arguments": args})
}

pub fn ta(name: &str, args: Vec<Value>) -> Value {
    call(member("ta", name), args)
}

pub fn binary(op: &str, left: Value, right: Value) -> Value {
    json!({"type": "BinaryExpression", "operator": op, "left": left, "right": right})
}

pub fn named(pairs: &[(&str, Value)]) -> Value {
    let properties: Vec<Value> = pairs
        .iter()
        .map(|(k, v)| json!({"type": "Property", "key": id(k), "value": v}))
        .collect();
    json!({"type": "ObjectExpression", "properties": properties})
}

pub fn decl(name: &str, init: Value) -> Value {
    json!({"type": "VariableDeclaration", "kind": "var", "declarations": [
        {"type": "VariableDeclarator", "id": id(name), "init": init}
    ]})
}

pub fn stmt(expr: Value) -> Value {
    json!({"type": "ExpressionStatement", "expression": expr})
}

pub fn if_then(test: Value, consequent: Vec<Value>) -> Value {
    json!({"type": "IfStatement", "test": test, "consequent": consequent})
}

pub fn plot(value: Value, title: &str) -> Value {
    stmt(call(id("plot"), vec![value, text(title)]))
}

pub fn strategy(title: &str) -> Value {
    stmt(call(id("strategy"), vec![text(title)]))
}

pub fn entry(entry_id: &str, direction: &str, qty: f64) -> Value {
    stmt(call(
        member("strategy", "entry"),
        vec![text(entry_id), member("strategy", direction), num(qty)],
    ))
}

pub fn program(body: Vec<Value>) -> String {
    json!({"type": "Program", "body": body}).to_string()
}

// ── Running ──

pub fn lower_body(body: Vec<Value>, options: &LowerOptions) -> LoweredProgram {
    let ast = parse_program(&program(body)).expect("valid AST");
    lower(&ast, options).expect("script lowers")
}

pub fn run_body(body: Vec<Value>, bars: Vec<Bar>) -> RunOutput {
    let lowered = lower_body(body, &LowerOptions::default());
    let mut ctx = BarContext::new("TEST", "1h", bars);
    execute(&lowered, &mut ctx, &EngineConfig::default()).expect("run succeeds")
}

// ── Bars ──

/// Bars whose close follows `closes`; each open sits 0.25 below its close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            time: 1_600_000_000 + i as i64 * 3_600,
            open: close - 0.25,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0 + i as f64,
        })
        .collect()
}

/// Deterministic pseudo-random walk using a simple LCG.
pub fn make_test_bars(n: usize) -> Vec<Bar> {
    let mut price = 100.0;
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            let change = ((seed % 200) as f64 - 100.0) * 0.05;
            price = (price + change).max(10.0);
            price
        })
        .collect();
    bars_from_closes(&closes)
}

pub fn plot_values(output: &RunOutput, title: &str) -> Vec<f64> {
    output
        .plots
        .iter()
        .find(|p| p.title == title)
        .map(|p| p.data.iter().map(|d| d.value).collect())
        .unwrap_or_default()
}
