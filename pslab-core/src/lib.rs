//! PSLab Core: bar-stepped evaluation engine for charting scripts.
//!
//! This crate holds everything between a decoded script and its chart data:
//! - Forward series, the append-once lookback store behind `x[n]`
//! - Bar context and OHLCV loading
//! - Technical-analysis library (batch, NA-propagating)
//! - Strategy engine with next-bar-open fills
//! - Plot collector and input overrides
//! - AST decoding, lowering to bar-loop IR, and the bar-loop executor
//! - Warm-up analysis and the chart artifact

pub mod ast;
pub mod chart;
pub mod clock;
pub mod context;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod input;
pub mod lower;
pub mod plot;
pub mod series;
pub mod strategy;
pub mod ta;
pub mod value;
pub mod warmup;

pub use error::{CoreError, ErrorKind};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: run artifacts can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<context::BarContext>();
        require_sync::<context::BarContext>();
        require_send::<lower::ir::LoweredProgram>();
        require_sync::<lower::ir::LoweredProgram>();
        require_send::<strategy::StrategyEngine>();
        require_sync::<strategy::StrategyEngine>();
        require_send::<engine::RunOutput>();
        require_sync::<engine::RunOutput>();
        require_send::<chart::ChartData>();
        require_sync::<chart::ChartData>();
        require_send::<CoreError>();
        require_sync::<CoreError>();
    }
}
