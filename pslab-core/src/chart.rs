//! Chart-data artifact: bars, plots and the strategy report of one run.

use serde::Serialize;

use crate::clock::Clock;
use crate::context::BarContext;
use crate::domain::{Bar, ClosedTrade, Direction, Position};
use crate::engine::RunOutput;
use crate::plot::PlotSeries;
use crate::value::NA;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub symbol: String,
    pub timeframe: String,
    pub title: String,
    /// RFC 3339 time the artifact was assembled.
    pub timestamp: String,
    pub bars: Vec<Bar>,
    pub plots: Vec<PlotSeries>,
    pub strategy: StrategyReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub net_profit: f64,
    pub closed_trades: Vec<TradeReport>,
    pub open_trades: Vec<OpenTradeReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReport {
    pub id: String,
    pub direction: Direction,
    pub qty: f64,
    pub entry_time: i64,
    pub entry_price: f64,
    pub exit_time: i64,
    pub exit_price: f64,
    pub pnl: f64,
}

impl From<&ClosedTrade> for TradeReport {
    fn from(t: &ClosedTrade) -> Self {
        Self {
            id: t.id.clone(),
            direction: t.direction,
            qty: t.qty,
            entry_time: t.entry_time,
            entry_price: t.entry_price,
            exit_time: t.exit_time,
            exit_price: t.exit_price,
            pnl: t.pnl,
        }
    }
}

/// A position still open at the end of the run, marked at the last close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenTradeReport {
    pub id: String,
    pub direction: Direction,
    pub qty: f64,
    pub entry_time: i64,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
}

impl OpenTradeReport {
    fn marked(p: &Position, mark: f64) -> Self {
        Self {
            id: p.id.clone(),
            direction: p.direction,
            qty: p.qty,
            entry_time: p.entry_time,
            entry_price: p.entry_price,
            unrealized_pnl: p.unrealized_pnl(mark),
        }
    }
}

/// `"{title} - {symbol}"` for titled scripts, else the symbol.
pub fn chart_title(script_title: Option<&str>, symbol: &str) -> String {
    match script_title {
        Some(title) if !title.is_empty() => format!("{title} - {symbol}"),
        _ => symbol.to_string(),
    }
}

/// Build the artifact. `default_capital` stands in for scripts without
/// `strategy()`.
pub fn assemble(
    ctx: &BarContext,
    title: Option<&str>,
    output: RunOutput,
    default_capital: f64,
    clock: &dyn Clock,
) -> ChartData {
    let last_close = ctx.bars().last().map_or(NA, |b| b.close);
    let strategy = match &output.strategy {
        Some(engine) => StrategyReport {
            initial_capital: engine.initial_capital(),
            final_equity: engine.get_equity(last_close),
            net_profit: engine.net_profit(),
            closed_trades: engine.get_trade_history().iter().map(TradeReport::from).collect(),
            open_trades: engine
                .open_positions()
                .iter()
                .map(|p| OpenTradeReport::marked(p, last_close))
                .collect(),
        },
        None => StrategyReport {
            initial_capital: default_capital,
            final_equity: default_capital,
            net_profit: 0.0,
            closed_trades: Vec::new(),
            open_trades: Vec::new(),
        },
    };
    ChartData {
        symbol: ctx.symbol().to_string(),
        timeframe: ctx.timeframe().to_string(),
        title: chart_title(title, ctx.symbol()),
        timestamp: clock.now().to_rfc3339(),
        bars: ctx.bars().to_vec(),
        plots: output.plots,
        strategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::plot::PlotCollector;

    fn ctx() -> BarContext {
        BarContext::new(
            "BTCUSDT",
            "1h",
            vec![Bar {
                time: 1,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 3.0,
            }],
        )
    }

    #[test]
    fn strategy_less_run_reports_default_capital() {
        let mut plots = PlotCollector::new();
        plots.add("p", 1, NA, None);
        let output = RunOutput {
            plots: plots.into_series(),
            strategy: None,
            bars: 1,
        };
        let chart = assemble(&ctx(), Some("Demo"), output, 5_000.0, &FixedClock::deterministic());
        assert_eq!(chart.title, "Demo - BTCUSDT");
        assert_eq!(chart.strategy.final_equity, 5_000.0);
        assert_eq!(chart.timestamp, "2020-09-13T12:26:40+00:00");

        let json = serde_json::to_value(&chart).unwrap();
        assert!(json["plots"][0]["data"][0]["value"].is_null());
        assert_eq!(json["strategy"]["closed_trades"], serde_json::json!([]));
    }

    #[test]
    fn untitled_chart_uses_symbol() {
        assert_eq!(chart_title(None, "X"), "X");
        assert_eq!(chart_title(Some(""), "X"), "X");
    }
}
