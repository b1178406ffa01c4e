//! Run orchestration: script + data loading, lowering, execution, artifact.
//!
//! Two entry points:
//! - `load_program()`: decode and lower the configured script. Used by
//!   `emit` and `inspect`, which never touch the data.
//! - `run()`: the full pipeline. Used by `run`.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use pslab_core::ast::parse_program;
use pslab_core::chart::{assemble, ChartData};
use pslab_core::clock::{Clock, FixedClock, SystemClock};
use pslab_core::context::BarContext;
use pslab_core::data::load_bars;
use pslab_core::engine::execute;
use pslab_core::lower::ir::LoweredProgram;
use pslab_core::lower::lower;
use pslab_core::warmup::{self, WarmupReport};
use pslab_core::{CoreError, ErrorKind};

use crate::config::{ConfigError, RunConfig};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{code}: {0}", code = .0.kind().code())]
    Core(#[from] CoreError),

    #[error("export failed: {0:#}")]
    Export(anyhow::Error),
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::Config(_) | RunError::Script { .. } | RunError::Export(_) => ErrorKind::Usage,
            RunError::Core(e) => e.kind(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub chart: ChartData,
    pub warmup: WarmupReport,
}

/// Read, decode and lower the configured script.
pub fn load_program(config: &RunConfig) -> Result<LoweredProgram, RunError> {
    let path = config
        .run
        .script
        .as_deref()
        .ok_or(ConfigError::Missing("run.script"))?;
    let program = lower_script(path, config)?;
    debug!(
        slots = program.slots.len(),
        precompute = program.precompute.len(),
        statements = program.body.len(),
        "script lowered"
    );
    Ok(program)
}

fn lower_script(path: &Path, config: &RunConfig) -> Result<LoweredProgram, RunError> {
    let json = std::fs::read_to_string(path).map_err(|source| RunError::Script {
        path: path.display().to_string(),
        source,
    })?;
    let ast = parse_program(&json).map_err(CoreError::from)?;
    let program = lower(&ast, &config.lower_options()).map_err(CoreError::from)?;
    Ok(program)
}

/// Run the configured script over the configured data.
///
/// Files named in `[run]` are not written here; see
/// [`crate::export::write_outputs`].
pub fn run(config: &RunConfig) -> Result<RunOutcome, RunError> {
    config.validate()?;
    let program = load_program(config)?;

    let data = config.run.data.as_deref().ok_or(ConfigError::Missing("run.data"))?;
    let bars = load_bars(data, config.run.limit).map_err(CoreError::from)?;
    let symbol = config.symbol();
    info!(symbol = %symbol, bars = bars.len(), data = %data.display(), "data loaded");

    let warmup = warmup::analyze(&program);
    if bars.len() <= warmup.bars {
        warn!(
            bars = bars.len(),
            warmup = warmup.bars,
            "data is not longer than the script warm-up; every series may stay NA"
        );
    }

    let mut ctx = BarContext::new(symbol, config.timeframe(), bars);
    let output = execute(&program, &mut ctx, &config.engine_config())?;

    let clock: Box<dyn Clock> = if config.engine.deterministic_clock {
        Box::new(FixedClock::deterministic())
    } else {
        Box::new(SystemClock)
    };
    let chart = assemble(
        &ctx,
        program.title.as_deref(),
        output,
        config.engine.default_initial_capital,
        clock.as_ref(),
    );
    Ok(RunOutcome { chart, warmup })
}
