//! PSLab Runner: run orchestration around `pslab-core`.
//!
//! This crate provides:
//! - TOML run configuration (`[run]`, `[engine]`, `[inputs]`)
//! - The load → decode → lower → execute → assemble pipeline
//! - Chart JSON and trade CSV export

pub mod config;
pub mod export;
pub mod runner;

pub use config::{ConfigError, EngineSection, RunConfig, RunSection};
pub use export::{export_chart_json, export_trades_csv, write_outputs};
pub use runner::{load_program, run, RunError, RunOutcome};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn run_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<RunOutcome>();
        assert_sync::<RunOutcome>();
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }
}
