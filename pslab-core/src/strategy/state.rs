//! Strategy state exposed to scripts as per-bar series.

use serde::Serialize;

use super::StrategyEngine;

/// `strategy.*` values a script may read. Sampled once per bar, right after
/// pending orders fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyField {
    PositionSize,
    PositionAvgPrice,
    Equity,
    NetProfit,
    ClosedTrades,
    OpenTrades,
}

impl StrategyField {
    pub const ALL: [StrategyField; 6] = [
        StrategyField::PositionSize,
        StrategyField::PositionAvgPrice,
        StrategyField::Equity,
        StrategyField::NetProfit,
        StrategyField::ClosedTrades,
        StrategyField::OpenTrades,
    ];

    /// Member name under `strategy.`.
    pub fn name(self) -> &'static str {
        match self {
            StrategyField::PositionSize => "position_size",
            StrategyField::PositionAvgPrice => "position_avg_price",
            StrategyField::Equity => "equity",
            StrategyField::NetProfit => "netprofit",
            StrategyField::ClosedTrades => "closedtrades",
            StrategyField::OpenTrades => "opentrades",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Current value; `mark` prices open positions for equity.
    pub fn sample(self, engine: &StrategyEngine, mark: f64) -> f64 {
        match self {
            StrategyField::PositionSize => engine.position_size(),
            StrategyField::PositionAvgPrice => engine.position_avg_price(),
            StrategyField::Equity => engine.get_equity(mark),
            StrategyField::NetProfit => engine.net_profit(),
            StrategyField::ClosedTrades => engine.get_trade_history().len() as f64,
            StrategyField::OpenTrades => engine.open_positions().len() as f64,
        }
    }
}
