//! Batch precompute: hoisted TA calls and the derived series they consume,
//! computed once over the whole bar array before the loop.
//!
//! Steps are grouped into dependency waves. Steps in one wave only read bar
//! columns or outputs of earlier waves, so each wave runs in parallel.

use rayon::prelude::*;
use tracing::debug;

use crate::context::BarContext;
use crate::lower::ir::{LoweredProgram, Precompute, SlotId, SlotKind};
use crate::ta::delay;
use crate::value::NA;

use super::eval::{eval, SeriesReader};

/// Whole-bar arrays for every precomputed slot.
#[derive(Debug, Clone)]
pub struct BatchArrays {
    columns: Vec<Option<Vec<f64>>>,
}

impl BatchArrays {
    /// The array for `slot`, if it was precomputed.
    pub fn get(&self, slot: SlotId) -> Option<&[f64]> {
        self.columns.get(slot.0).and_then(|c| c.as_deref())
    }

    /// Value of `slot` at `bar`, NA if absent.
    pub fn value(&self, slot: SlotId, bar: usize) -> f64 {
        self.get(slot)
            .and_then(|c| c.get(bar).copied())
            .unwrap_or(NA)
    }
}

/// Reads bar columns and already computed arrays at a fixed bar.
struct BatchReader<'a> {
    program: &'a LoweredProgram,
    ctx: &'a BarContext,
    arrays: &'a BatchArrays,
    bar: usize,
}

impl SeriesReader for BatchReader<'_> {
    fn read(&self, slot: SlotId, offset: usize) -> f64 {
        if offset > self.bar {
            return NA;
        }
        let index = self.bar - offset;
        match self.program.slot(slot).kind {
            SlotKind::Bar(field) => self.ctx.column(field).get(index).copied().unwrap_or(NA),
            _ => self.arrays.value(slot, index),
        }
    }

    fn bar_index(&self) -> usize {
        self.bar
    }
}

/// Compute every precompute step of `program` over the bars of `ctx`.
pub fn precompute(program: &LoweredProgram, ctx: &BarContext) -> BatchArrays {
    let mut arrays = BatchArrays {
        columns: vec![None; program.slots.len()],
    };
    let waves = waves(&program.precompute);
    for (depth, wave) in waves.iter().enumerate() {
        debug!(wave = depth, steps = wave.len(), "precompute wave");
        let results: Vec<(SlotId, Vec<f64>)> = wave
            .par_iter()
            .flat_map_iter(|step| run_step(program, ctx, &arrays, step))
            .collect();
        for (slot, column) in results {
            debug_assert_eq!(
                column.len(),
                ctx.len(),
                "slot '{}' produced {} values for {} bars",
                program.slot(slot).name,
                column.len(),
                ctx.len()
            );
            arrays.columns[slot.0] = Some(column);
        }
    }
    arrays
}

fn run_step(
    program: &LoweredProgram,
    ctx: &BarContext,
    arrays: &BatchArrays,
    step: &Precompute,
) -> Vec<(SlotId, Vec<f64>)> {
    let n = ctx.len();
    match step {
        Precompute::Derived { slot, expr } => {
            let column = (0..n)
                .map(|bar| {
                    eval(
                        expr,
                        &BatchReader {
                            program,
                            ctx,
                            arrays,
                            bar,
                        },
                    )
                })
                .collect();
            vec![(*slot, column)]
        }
        Precompute::Ta {
            func,
            inputs,
            outputs,
        } => {
            let missing = vec![NA; n];
            let columns: Vec<&[f64]> = inputs
                .iter()
                .map(|slot| match program.slot(*slot).kind {
                    SlotKind::Bar(field) => ctx.column(field),
                    _ => arrays.get(*slot).unwrap_or(missing.as_slice()),
                })
                .collect();
            let delay_by = func.emit_delay();
            func.compute(&columns)
                .into_iter()
                .map(|column| {
                    if delay_by > 0 {
                        delay(&column, delay_by)
                    } else {
                        column
                    }
                })
                .zip(outputs.iter().copied())
                .map(|(column, slot)| (slot, column))
                .collect()
        }
    }
}

/// Group steps into waves: a step lands one wave after the latest wave that
/// produces one of its inputs.
fn waves(steps: &[Precompute]) -> Vec<Vec<&Precompute>> {
    let mut produced_in: std::collections::HashMap<SlotId, usize> =
        std::collections::HashMap::new();
    let mut waves: Vec<Vec<&Precompute>> = Vec::new();
    for step in steps {
        let depth = step
            .inputs()
            .iter()
            .filter_map(|slot| produced_in.get(slot).map(|d| d + 1))
            .max()
            .unwrap_or(0);
        if waves.len() <= depth {
            waves.resize_with(depth + 1, Vec::new);
        }
        waves[depth].push(step);
        for slot in step.outputs() {
            produced_in.insert(slot, depth);
        }
    }
    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse_program;
    use crate::domain::Bar;
    use crate::lower::{lower, LowerOptions};
    use crate::ta::{assert_series, DEFAULT_EPSILON};

    fn ctx(closes: &[f64]) -> BarContext {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                time: i as i64 * 60,
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100.0,
            })
            .collect();
        BarContext::new("TEST", "1m", bars)
    }

    fn program(script: serde_json::Value) -> LoweredProgram {
        let program = parse_program(&script.to_string()).unwrap();
        lower(&program, &LowerOptions::default()).unwrap()
    }

    #[test]
    fn derived_series_feed_ta_in_later_wave() {
        // spread = high - low; avg = ta.sma(spread * close, 2)
        let script = serde_json::json!({"type": "Program", "body": [
            {"type": "VariableDeclaration", "kind": "var", "declarations": [{
                "type": "VariableDeclarator",
                "id": {"type": "Identifier", "name": "avg"},
                "init": {"type": "CallExpression",
                    "callee": {"type": "MemberExpression",
                        "object": {"type": "Identifier", "name": "ta"},
                        "property": {"type": "Identifier", "name": "sma"}, "computed": false},
                    "arguments": [
                        {"type": "BinaryExpression", "operator": "*",
                         "left": {"type": "Identifier", "name": "close"},
                         "right": {"type": "Literal", "value": 2}},
                        {"type": "Literal", "value": 2}
                    ]}
            }]}
        ]});
        let program = program(script);
        let ctx = ctx(&[1.0, 2.0, 3.0, 4.0]);
        let arrays = precompute(&program, &ctx);
        let ta_slot = program
            .slots
            .iter()
            .position(|s| s.kind == SlotKind::Ta)
            .map(SlotId)
            .unwrap();
        assert_series(
            arrays.get(ta_slot).unwrap(),
            &[NA, 3.0, 5.0, 7.0],
            DEFAULT_EPSILON,
        );
        assert_eq!(waves(&program.precompute).len(), 2);
    }

    #[test]
    fn center_aligned_outputs_are_delayed() {
        let script = serde_json::json!({"type": "Program", "body": [
            {"type": "VariableDeclaration", "kind": "var", "declarations": [{
                "type": "VariableDeclarator",
                "id": {"type": "Identifier", "name": "ph"},
                "init": {"type": "CallExpression",
                    "callee": {"type": "MemberExpression",
                        "object": {"type": "Identifier", "name": "ta"},
                        "property": {"type": "Identifier", "name": "pivothigh"}, "computed": false},
                    "arguments": [
                        {"type": "Identifier", "name": "close"},
                        {"type": "Literal", "value": 1},
                        {"type": "Literal", "value": 1}
                    ]}
            }]}
        ]});
        let program = program(script);
        let ctx = ctx(&[1.0, 3.0, 2.0, 1.0]);
        let arrays = precompute(&program, &ctx);
        let ta_slot = program
            .slots
            .iter()
            .position(|s| s.kind == SlotKind::Ta)
            .map(SlotId)
            .unwrap();
        // The pivot at bar 1 is confirmed, and visible, at bar 2.
        assert_series(arrays.get(ta_slot).unwrap(), &[NA, NA, 3.0, NA], DEFAULT_EPSILON);
    }
}
