//! Run configuration, loaded from TOML.
//!
//! ```toml
//! [run]
//! symbol = "SPY"
//! timeframe = "1D"
//! script = "scripts/cross.json"
//! data = "data/spy.json"
//! output = "out/spy_chart.json"
//! trades_csv = "out/spy_trades.csv"
//!
//! [engine]
//! fixnan = "backward"
//! commission_per_order = 1.0
//! default_initial_capital = 10000.0
//! deterministic_clock = false
//!
//! [inputs]
//! "Fast Length" = 10
//! ```
//!
//! Every field is optional in the file so that CLI flags can fill the gaps;
//! [`RunConfig::validate`] runs once all sources are merged.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pslab_core::engine::EngineConfig;
use pslab_core::input::InputOverrides;
use pslab_core::lower::LowerOptions;
use pslab_core::strategy::DEFAULT_INITIAL_CAPITAL;
use pslab_core::value::FixNanMode;

pub const DEFAULT_TIMEFRAME: &str = "1D";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub engine: EngineSection,
    /// Input overrides keyed by input title.
    #[serde(default)]
    pub inputs: InputOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    /// Defaults to the data file's stem.
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    /// AST JSON of the script.
    pub script: Option<PathBuf>,
    /// OHLCV JSON array.
    pub data: Option<PathBuf>,
    /// Chart JSON destination. Without it the CLI prints the artifact.
    pub output: Option<PathBuf>,
    pub trades_csv: Option<PathBuf>,
    /// Keep only the most recent `limit` bars.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EngineSection {
    pub fixnan: FixNanMode,
    pub commission_per_order: f64,
    /// Used when `strategy()` omits `initial_capital`, and for the report of
    /// scripts without a strategy.
    pub default_initial_capital: f64,
    pub deterministic_clock: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            fixnan: FixNanMode::default(),
            commission_per_order: 0.0,
            default_initial_capital: DEFAULT_INITIAL_CAPITAL,
            deterministic_clock: false,
        }
    }
}

impl RunConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Check the merged configuration before a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.script.is_none() {
            return Err(ConfigError::Missing("run.script"));
        }
        if self.run.data.is_none() {
            return Err(ConfigError::Missing("run.data"));
        }
        if self.run.limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "run.limit",
                reason: "must be at least 1".into(),
            });
        }
        let commission = self.engine.commission_per_order;
        if !commission.is_finite() || commission < 0.0 {
            return Err(ConfigError::Invalid {
                field: "engine.commission_per_order",
                reason: format!("{commission} is not a non-negative amount"),
            });
        }
        let capital = self.engine.default_initial_capital;
        if !capital.is_finite() || capital <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "engine.default_initial_capital",
                reason: format!("{capital} is not a positive amount"),
            });
        }
        Ok(())
    }

    /// Explicit symbol, else the data file stem, else `"UNKNOWN"`.
    pub fn symbol(&self) -> String {
        if let Some(symbol) = &self.run.symbol {
            return symbol.clone();
        }
        self.run
            .data
            .as_deref()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().to_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }

    pub fn timeframe(&self) -> &str {
        self.run.timeframe.as_deref().unwrap_or(DEFAULT_TIMEFRAME)
    }

    pub fn lower_options(&self) -> LowerOptions {
        LowerOptions {
            fixnan: self.engine.fixnan,
            overrides: self.inputs.clone(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_capital: self.engine.default_initial_capital,
            commission_per_order: self.engine.commission_per_order,
        }
    }
}
