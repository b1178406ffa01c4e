//! PSLab CLI: run, emit and inspect commands.
//!
//! Commands:
//! - `run`: execute a script over OHLCV data and write the chart artifact
//! - `emit`: print the lowered bar-loop listing of a script
//! - `inspect`: print inputs, series and warm-up of a script
//!
//! Exit codes: 0 success, 1 usage, 2 data, 3 compile/lower, 4 runtime.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pslab_core::input::InputOverrides;
use pslab_core::lower::render::render;
use pslab_core::value::FixNanMode;
use pslab_core::warmup;
use pslab_runner::{export_chart_json, load_program, run, write_outputs, RunConfig, RunError};

#[derive(Parser)]
#[command(
    name = "pslab",
    version,
    about = "PSLab CLI: bar-stepped charting script engine"
)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script over OHLCV data and write the chart artifact.
    Run(RunArgs),
    /// Print the lowered bar-loop listing of a script.
    Emit(ScriptArgs),
    /// Print the inputs, series and warm-up of a script.
    Inspect(ScriptArgs),
}

#[derive(Args)]
struct ScriptArgs {
    /// Path to a TOML run config. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Script AST JSON.
    #[arg(long)]
    script: Option<PathBuf>,

    /// fixnan fill direction.
    #[arg(long, value_enum)]
    fixnan: Option<FixNanArg>,

    /// JSON object of input overrides keyed by input title.
    #[arg(long)]
    inputs: Option<PathBuf>,

    /// Input override `Title=value`. Repeatable; applied last.
    #[arg(long = "set", value_name = "TITLE=VALUE")]
    set: Vec<String>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    script: ScriptArgs,

    /// OHLCV JSON array.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Symbol shown in the chart title. Defaults to the data file name.
    #[arg(long)]
    symbol: Option<String>,

    #[arg(long)]
    timeframe: Option<String>,

    /// Chart JSON destination. Prints to stdout when absent.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Closed-trade CSV destination.
    #[arg(long)]
    trades_csv: Option<PathBuf>,

    /// Keep only the most recent N bars.
    #[arg(long)]
    limit: Option<usize>,

    /// Flat fee per fill.
    #[arg(long)]
    commission: Option<f64>,

    /// Capital used when `strategy()` does not set one.
    #[arg(long)]
    initial_capital: Option<f64>,

    /// Stamp the artifact with a fixed time instead of the wall clock.
    #[arg(long, default_value_t = false)]
    deterministic_clock: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FixNanArg {
    Backward,
    Forward,
}

impl From<FixNanArg> for FixNanMode {
    fn from(arg: FixNanArg) -> Self {
        match arg {
            FixNanArg::Backward => FixNanMode::Backward,
            FixNanArg::Forward => FixNanMode::Forward,
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { 1 } else { 0 });
        }
    };
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => run_cmd(args),
        Commands::Emit(args) => emit_cmd(&args),
        Commands::Inspect(args) => inspect_cmd(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<RunError>().map_or(1, RunError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn script_config(args: &ScriptArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path).map_err(RunError::from)?,
        None => RunConfig::default(),
    };
    if let Some(script) = &args.script {
        config.run.script = Some(script.clone());
    }
    if let Some(fixnan) = args.fixnan {
        config.engine.fixnan = fixnan.into();
    }
    if let Some(path) = &args.inputs {
        config.inputs.extend(load_inputs(path)?);
    }
    for assignment in &args.set {
        if config.inputs.insert_assignment(assignment).is_none() {
            bail!("--set expects TITLE=VALUE, got `{assignment}`");
        }
    }
    debug!(?config, "resolved config");
    Ok(config)
}

fn load_inputs(path: &Path) -> Result<InputOverrides> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inputs file {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("{} must be a JSON object of title to value", path.display()))
}

fn run_cmd(args: RunArgs) -> Result<()> {
    let mut config = script_config(&args.script)?;
    let run_section = &mut config.run;
    if args.data.is_some() {
        run_section.data = args.data;
    }
    if args.symbol.is_some() {
        run_section.symbol = args.symbol;
    }
    if args.timeframe.is_some() {
        run_section.timeframe = args.timeframe;
    }
    if args.output.is_some() {
        run_section.output = args.output;
    }
    if args.trades_csv.is_some() {
        run_section.trades_csv = args.trades_csv;
    }
    if args.limit.is_some() {
        run_section.limit = args.limit;
    }
    if let Some(commission) = args.commission {
        config.engine.commission_per_order = commission;
    }
    if let Some(capital) = args.initial_capital {
        config.engine.default_initial_capital = capital;
    }
    if args.deterministic_clock {
        config.engine.deterministic_clock = true;
    }

    let outcome = run(&config)?;
    write_outputs(&config.run, &outcome.chart).map_err(RunError::Export)?;

    if config.run.output.is_none() {
        println!("{}", export_chart_json(&outcome.chart).map_err(RunError::Export)?);
        return Ok(());
    }

    let chart = &outcome.chart;
    let report = &chart.strategy;
    println!("{}", chart.title);
    println!("  Bars:           {}", chart.bars.len());
    println!("  Warm-up:        {}", outcome.warmup.bars);
    println!("  Plots:          {}", chart.plots.len());
    println!("  Closed trades:  {}", report.closed_trades.len());
    println!("  Open trades:    {}", report.open_trades.len());
    println!("  Initial:        {:.2}", report.initial_capital);
    println!("  Final equity:   {:.2}", report.final_equity);
    println!("  Net profit:     {:.2}", report.net_profit);
    Ok(())
}

fn emit_cmd(args: &ScriptArgs) -> Result<()> {
    let config = script_config(args)?;
    let program = load_program(&config)?;
    print!("{}", render(&program));
    Ok(())
}

fn inspect_cmd(args: &ScriptArgs) -> Result<()> {
    let config = script_config(args)?;
    let program = load_program(&config)?;
    let report = warmup::analyze(&program);

    println!("Title:     {}", program.title.as_deref().unwrap_or("(untitled)"));
    match &program.strategy {
        Some(strategy) => {
            let capital = strategy
                .initial_capital
                .unwrap_or(config.engine.default_initial_capital);
            println!("Strategy:  yes (initial capital {capital:.2}, default qty {})", strategy.default_qty);
        }
        None => println!("Strategy:  no"),
    }
    println!("Warm-up:   {} bars", report.bars);

    if !program.inputs.is_empty() {
        println!("\nInputs:");
        for input in &program.inputs {
            let value = serde_json::to_string(&input.value)?;
            println!("  {:<24} {value}", input.title);
        }
    }

    println!("\nSeries:");
    for slot in &report.slots {
        println!("  {:<24} lookback {}", slot.name, slot.lookback);
    }
    println!("\nBatch steps: {}", program.precompute.len());
    Ok(())
}
