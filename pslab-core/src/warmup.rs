//! Static warm-up analysis of a lowered program.
//!
//! The warm-up of a series is the number of leading bars it can be NA for
//! over fully valid data: history offsets plus TA windows, composed through
//! nested sources. The program's warm-up is the largest one any statement
//! observes.

use std::collections::HashMap;

use serde::Serialize;

use crate::lower::ir::{Expr, LoweredProgram, Precompute, SlotId, SlotKind, Stmt};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotWarmup {
    pub name: String,
    pub lookback: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    /// Bars before every value the script reads can be defined.
    pub bars: usize,
    /// Per series slot, in slot order.
    pub slots: Vec<SlotWarmup>,
}

pub fn analyze(program: &LoweredProgram) -> WarmupReport {
    let mut definitions: HashMap<SlotId, Vec<&Expr>> = HashMap::new();
    let mut ta_steps = HashMap::new();
    for step in &program.precompute {
        match step {
            Precompute::Derived { slot, expr } => definitions.entry(*slot).or_default().push(expr),
            Precompute::Ta { func, inputs, outputs } => {
                for output in outputs {
                    ta_steps.insert(*output, (func, inputs));
                }
            }
        }
    }
    collect_assignments(&program.body, &mut definitions);

    // Slots are allocated after everything they read, so one pass in id
    // order sees every dependency first.
    let mut lookback = vec![0usize; program.slots.len()];
    for index in 0..program.slots.len() {
        let slot = SlotId(index);
        let value = match program.slot(slot).kind {
            SlotKind::Bar(_) | SlotKind::Strategy(_) => 0,
            SlotKind::Ta => ta_steps.get(&slot).map_or(0, |(func, inputs)| {
                let source = inputs.iter().map(|s| lookback[s.0]).max().unwrap_or(0);
                source.saturating_add(func.lookback())
            }),
            SlotKind::User => definitions
                .get(&slot)
                .map_or(0, |exprs| exprs.iter().map(|e| expr_lookback(e, &lookback)).max().unwrap_or(0)),
        };
        lookback[index] = value;
    }

    let mut bars = 0;
    visit_exprs(&program.body, &mut |expr| {
        bars = bars.max(expr_lookback(expr, &lookback));
    });

    let slots = program
        .slots
        .iter()
        .zip(&lookback)
        .filter(|(slot, _)| slot.is_series())
        .map(|(slot, &lookback)| SlotWarmup {
            name: slot.name.clone(),
            lookback,
        })
        .collect();
    WarmupReport { bars, slots }
}

fn expr_lookback(expr: &Expr, lookback: &[usize]) -> usize {
    let mut max = 0;
    expr.visit(&mut |node| match node {
        Expr::Read { slot, offset } => max = max.max(lookback[slot.0].saturating_add(*offset)),
        Expr::Lagged { offset, .. } => max = max.max(*offset),
        _ => {}
    });
    max
}

fn collect_assignments<'a>(stmts: &'a [Stmt], out: &mut HashMap<SlotId, Vec<&'a Expr>>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { slot, value } => out.entry(*slot).or_default().push(value),
            Stmt::If { then, otherwise, .. } => {
                collect_assignments(then, out);
                collect_assignments(otherwise, out);
            }
            _ => {}
        }
    }
}

/// Every expression evaluated by `stmts`, nested branches included.
fn visit_exprs<'a>(stmts: &'a [Stmt], f: &mut impl FnMut(&'a Expr)) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign { value, .. } => f(value),
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                f(test);
                visit_exprs(then, f);
                visit_exprs(otherwise, f);
            }
            Stmt::Entry { qty, .. } => f(qty),
            Stmt::Plot { value, .. } => f(value),
            Stmt::Exit { .. } | Stmt::Close { .. } | Stmt::CloseAll => {}
        }
    }
}
