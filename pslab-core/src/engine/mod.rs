//! Bar-loop executor for lowered programs.
//!
//! Per bar, in this order:
//! 1. advance the bar context;
//! 2. on the first bar, declare the strategy;
//! 3. fill intents recorded on the previous bar at this bar's open;
//! 4. sample strategy state series (equity marked at this bar's close);
//! 5. feed precomputed arrays into their series;
//! 6. run the statements in source order;
//! 7. advance every series cursor, except on the last bar.

pub mod eval;
pub mod precompute;

use tracing::{info, warn};

use crate::context::BarContext;
use crate::error::CoreError;
use crate::lower::ir::{Expr, LoweredProgram, SlotId, SlotKind, Stmt};
use crate::plot::{PlotCollector, PlotSeries};
use crate::series::{ForwardSeries, SeriesError};
use crate::strategy::{StrategyEngine, DEFAULT_INITIAL_CAPITAL};
use crate::value::{truthy, NA};

use eval::{eval, SeriesReader};
use precompute::precompute;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Used when `strategy()` omits `initial_capital`.
    pub initial_capital: f64,
    /// Flat fee per fill.
    pub commission_per_order: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            commission_per_order: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub plots: Vec<PlotSeries>,
    /// `None` for scripts without `strategy()`.
    pub strategy: Option<StrategyEngine>,
    pub bars: usize,
}

/// Run `program` over every bar of `ctx`.
pub fn execute(
    program: &LoweredProgram,
    ctx: &mut BarContext,
    config: &EngineConfig,
) -> Result<RunOutput, CoreError> {
    let n = ctx.len();
    info!(
        symbol = ctx.symbol(),
        bars = n,
        precompute = program.precompute.len(),
        "run started"
    );
    let arrays = precompute(program, ctx);

    let mut runtime = Runtime {
        program,
        series: program
            .slots
            .iter()
            .map(|slot| slot.is_series().then(|| ForwardSeries::new(n)))
            .collect(),
        strategy: program.strategy.as_ref().map(|_| {
            StrategyEngine::new(config.initial_capital).with_commission(config.commission_per_order)
        }),
        plots: PlotCollector::new(),
    };

    while let Some(i) = ctx.advance() {
        let bar = ctx.bars()[i];
        if let (Some(engine), Some(decl)) = (runtime.strategy.as_mut(), program.strategy.as_ref()) {
            if i == 0 {
                engine.call(&decl.title, decl.initial_capital.unwrap_or(config.initial_capital));
            }
            engine.on_bar_update(i, bar.open, bar.time);
        }
        for (slot, field) in &program.state_feeds {
            let value = runtime
                .strategy
                .as_ref()
                .map_or(NA, |engine| field.sample(engine, bar.close));
            runtime.set(*slot, i, value)?;
        }
        for slot in &program.feeds {
            runtime.set(*slot, i, arrays.value(*slot, i))?;
        }
        runtime.exec(ctx, &program.body, i, bar.time)?;
        if !ctx.is_last_bar() {
            runtime.advance(i)?;
        }
    }

    if let Some(engine) = &runtime.strategy {
        if !engine.pending().is_empty() {
            warn!(
                pending = engine.pending().len(),
                "intents recorded on the last bar were not filled"
            );
        }
        info!(
            trades = engine.get_trade_history().len(),
            net_profit = engine.net_profit(),
            "run finished"
        );
    } else {
        info!(plots = runtime.plots.get_series().len(), "run finished");
    }

    Ok(RunOutput {
        plots: runtime.plots.into_series(),
        strategy: runtime.strategy,
        bars: n,
    })
}

struct Runtime<'p> {
    program: &'p LoweredProgram,
    /// One forward series per non-bar slot, indexed by slot id.
    series: Vec<Option<ForwardSeries>>,
    strategy: Option<StrategyEngine>,
    plots: PlotCollector,
}

impl Runtime<'_> {
    fn violation(&self, slot: SlotId, bar: usize, source: SeriesError) -> CoreError {
        CoreError::Causality {
            series: self.program.slot(slot).name.clone(),
            bar,
            source,
        }
    }

    fn set(&mut self, slot: SlotId, bar: usize, value: f64) -> Result<(), CoreError> {
        let capacity = self.series.len();
        let result = match self.series.get_mut(slot.0).and_then(Option::as_mut) {
            Some(series) => series.set(value),
            None => Err(SeriesError::OutOfBounds {
                index: slot.0,
                capacity,
            }),
        };
        result.map_err(|e| self.violation(slot, bar, e))
    }

    fn advance(&mut self, bar: usize) -> Result<(), CoreError> {
        let mut failed = None;
        for (index, series) in self.series.iter_mut().enumerate() {
            if let Some(series) = series {
                if let Err(e) = series.next() {
                    failed = Some((SlotId(index), e));
                    break;
                }
            }
        }
        match failed {
            Some((slot, e)) => Err(self.violation(slot, bar, e)),
            None => Ok(()),
        }
    }

    fn eval(&self, ctx: &BarContext, expr: &Expr, bar: usize) -> f64 {
        eval(
            expr,
            &LoopReader {
                program: self.program,
                ctx,
                series: &self.series,
                bar,
            },
        )
    }

    fn exec(&mut self, ctx: &BarContext, stmts: &[Stmt], bar: usize, time: i64) -> Result<(), CoreError> {
        for stmt in stmts {
            match stmt {
                Stmt::Assign { slot, value } => {
                    let value = self.eval(ctx, value, bar);
                    self.set(*slot, bar, value)?;
                }
                Stmt::If {
                    test,
                    then,
                    otherwise,
                } => {
                    let branch = if truthy(self.eval(ctx, test, bar)) {
                        then
                    } else {
                        otherwise
                    };
                    self.exec(ctx, branch, bar, time)?;
                }
                Stmt::Entry { id, direction, qty } => {
                    let qty = self.eval(ctx, qty, bar);
                    if let Some(engine) = self.strategy.as_mut() {
                        engine.entry(id, *direction, qty);
                    }
                }
                Stmt::Exit { id, from_entry } => {
                    if let Some(engine) = self.strategy.as_mut() {
                        engine.exit(id, from_entry.as_deref());
                    }
                }
                Stmt::Close { id } => {
                    if let Some(engine) = self.strategy.as_mut() {
                        engine.close(id);
                    }
                }
                Stmt::CloseAll => {
                    if let Some(engine) = self.strategy.as_mut() {
                        engine.close_all();
                    }
                }
                Stmt::Plot {
                    title,
                    value,
                    options,
                } => {
                    let value = self.eval(ctx, value, bar);
                    let options = (!options.is_empty()).then_some(options);
                    self.plots.add(title, time, value, options);
                }
            }
        }
        Ok(())
    }
}

/// Reads bar fields through the context and everything else through the
/// forward series, both relative to the current cursor.
struct LoopReader<'a> {
    program: &'a LoweredProgram,
    ctx: &'a BarContext,
    series: &'a [Option<ForwardSeries>],
    bar: usize,
}

impl SeriesReader for LoopReader<'_> {
    fn read(&self, slot: SlotId, offset: usize) -> f64 {
        match self.program.slot(slot).kind {
            SlotKind::Bar(field) => self.ctx.field(field).get(offset),
            _ => self
                .series
                .get(slot.0)
                .and_then(Option::as_ref)
                .map_or(NA, |s| s.get(offset)),
        }
    }

    fn bar_index(&self) -> usize {
        self.bar
    }
}
