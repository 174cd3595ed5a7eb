use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use market_forecaster::alert::format_alert;
use market_forecaster::config::{Config, LoggingConfig};
use market_forecaster::data::{load_indicators, load_tickers, load_with_retry, JsonBarSource};
use market_forecaster::export::{write_results, ResultsExport};
use market_forecaster::pipeline::{run_batch, run_pair, SkippedPair};
use market_forecaster::scoring::{score_and_rank, Preset};
use market_forecaster::strategy_store::{load_best_strategies, update_best_strategies};

#[derive(Debug, Parser)]
#[command(name = "market-forecaster", version, about = "Forecast, backtest and rank indicator strategies")]
struct Cli {
    /// Config file; defaults to $MF_CONFIG_PATH or config/default.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scoring preset override (basic, balanced, aggressive, defensive).
    #[arg(long, global = true)]
    preset: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Backtest every ticker x indicator pair, rank and persist the best strategies.
    Backtest,
    /// Re-run the persisted best strategies and print live alerts.
    Alert,
}

fn env_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    })
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(&logging.level));
    match (&logging.file, logging.json) {
        (Some(path), json) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            let builder = builder.with_writer(Mutex::new(file)).with_ansi(false);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
        (None, true) => builder.with_writer(std::io::stderr).json().init(),
        (None, false) => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn backtest(config: &Config, preset: &str) -> Result<()> {
    let tickers = load_tickers(&config.data.tickers)?;
    let indicators = load_indicators(&config.data.indicators)?;
    if tickers.is_empty() || indicators.is_empty() {
        bail!(
            "nothing to run: {} tickers, {} indicators",
            tickers.len(),
            indicators.len()
        );
    }

    let source = JsonBarSource::new(&config.data.dir);
    let mut series = Vec::with_capacity(tickers.len());
    let mut unavailable = Vec::new();
    for ticker in &tickers {
        match load_with_retry(&source, ticker, config.run.max_attempts) {
            Ok(s) => series.push(s),
            Err(err) => {
                tracing::warn!(ticker = %ticker, error = %format!("{:#}", err), "ticker skipped");
                unavailable.extend(indicators.iter().map(|spec| SkippedPair {
                    ticker: ticker.clone(),
                    indicator: spec.label(),
                    error: format!("{:#}", err),
                }));
            }
        }
    }

    tracing::info!(
        tickers = series.len(),
        indicators = indicators.len(),
        train_size = config.forecast.train_size,
        preset = %preset,
        "starting backtest batch"
    );
    let mut batch = run_batch(&series, &indicators, config);
    batch.skipped.extend(unavailable);
    let weights = score_and_rank(&mut batch.results, preset, &config.scoring.weights)?;

    let export = ResultsExport::from_batch(&batch, preset, weights);
    let results_path = write_results(&config.output.dir, &export)?;
    let stored = update_best_strategies(&config.output.best_strategies, &batch.results, export.generated_at)?;

    #[cfg(feature = "charts")]
    if config.output.charts {
        for run in &batch.runs {
            let charts = market_forecaster::chart::render_charts(
                &config.output.dir,
                &run.summary.label,
                &run.summary.ticker,
                &run.indicator.compact_label(),
                &run.backtest.chart_series(),
            );
            if let Err(err) = charts {
                tracing::warn!(label = %run.summary.label, error = %format!("{:#}", err), "chart rendering failed");
            }
        }
    }
    #[cfg(not(feature = "charts"))]
    if config.output.charts {
        tracing::warn!("output.charts is set but the binary was built without the charts feature");
    }

    for entry in &export.ranking {
        println!("{:<10} {:<20} score {:.4}", entry.ticker, entry.label, entry.score);
    }
    tracing::info!(
        results = %results_path.display(),
        best_strategies = stored.len(),
        skipped = export.skipped.len(),
        "backtest batch exported"
    );
    Ok(())
}

fn alert(config: &Config) -> Result<()> {
    let best = load_best_strategies(&config.output.best_strategies)?;
    if best.is_empty() {
        bail!(
            "no persisted strategies in {}; run `backtest` first",
            config.output.best_strategies.display()
        );
    }

    let source = JsonBarSource::new(&config.data.dir);
    let mut failed = 0usize;
    for (ticker, strategy) in &best {
        let outcome = load_with_retry(&source, ticker, config.run.max_attempts)
            .and_then(|series| Ok(run_pair(&series, &strategy.indicator, config)?));
        match outcome {
            Ok(run) => println!("{}\n", format_alert(&run.alert)),
            Err(err) => {
                failed += 1;
                tracing::warn!(
                    ticker = %ticker,
                    indicator = %strategy.indicator,
                    error = %format!("{:#}", err),
                    "alert skipped"
                );
            }
        }
    }
    tracing::info!(tickers = best.len(), failed, "alerts generated");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            dotenvy::dotenv().ok();
            Config::load_from_path(path)
        }
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging)?;

    let preset = cli.preset.as_deref().unwrap_or(&config.scoring.preset);
    let preset = Preset::from_name(preset)?;

    match cli.command {
        Command::Backtest => backtest(&config, preset.name()),
        Command::Alert => alert(&config),
    }
}
