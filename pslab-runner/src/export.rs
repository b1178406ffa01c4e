//! Artifact export: chart JSON and the closed-trade tape as CSV.
//!
//! NaN plot values serialize as JSON `null`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use pslab_core::chart::{ChartData, TradeReport};

use crate::config::RunSection;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a chart artifact to pretty JSON.
pub fn export_chart_json(chart: &ChartData) -> Result<String> {
    serde_json::to_string_pretty(chart).context("failed to serialize chart data to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export closed trades as CSV.
///
/// Columns: id, direction, qty, entry_time, entry_price, exit_time,
/// exit_price, pnl
pub fn export_trades_csv(trades: &[TradeReport]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "id",
        "direction",
        "qty",
        "entry_time",
        "entry_price",
        "exit_time",
        "exit_price",
        "pnl",
    ])?;

    for t in trades {
        wtr.write_record([
            t.id.as_str(),
            t.direction.as_str(),
            &t.qty.to_string(),
            &t.entry_time.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_time.to_string(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.2}", t.pnl),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Write the chart JSON and trade CSV named in `[run]`.
///
/// Returns the paths written, chart first.
pub fn write_outputs(run: &RunSection, chart: &ChartData) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    if let Some(path) = &run.output {
        write_file(path, &export_chart_json(chart)?)?;
        written.push(path.clone());
    }
    if let Some(path) = &run.trades_csv {
        write_file(path, &export_trades_csv(&chart.strategy.closed_trades)?)?;
        written.push(path.clone());
    }
    for path in &written {
        info!(path = %path.display(), "artifact written");
    }
    Ok(written)
}
