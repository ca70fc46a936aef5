use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use polars::prelude::CsvWriterOptions;
use returns_engine::prelude::*;
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Usage: `returns_report [prices.csv] [config.json]`
fn main() -> Result<()> {
    let _guard = init_tracing()?;

    let mut args = env::args().skip(1);
    let prices_path = args
        .next()
        .unwrap_or_else(|| "tests/fixtures/prices.csv".to_string());
    let config = match args.next() {
        Some(path) => AnalysisConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => AnalysisConfig::default(),
    };

    let daily = PriceTable::from_csv(&prices_path, config.group_keys())
        .with_context(|| format!("Failed to read prices from {prices_path}"))?;
    info!(rows = daily.len(), period = %config.period(), "Loaded daily prices");

    let prices = PeriodAggregator::new(config.period()).aggregate(&daily)?;
    let returns = ReturnCalculator::calculate(&prices)?;
    let drawdowns = DrawdownCalculator::calculate(&returns)?;
    let portfolio = PortfolioAggregator::aggregate(&returns)?;

    let stats = if config.period().is_sub_annual() {
        let yearly = PeriodAggregator::new(Period::Year).aggregate(&daily)?;
        let yearly_returns = ReturnCalculator::calculate(&yearly)?;
        StatisticsSummarizer::summarize_with_year_returns(&returns, &yearly_returns)?
    } else {
        StatisticsSummarizer::summarize(&returns)?
    };

    let out = Path::new("demos/reports");
    let csv = CsvWriterOptions::default();
    ReturnsReport::try_from(&returns)?.to_csv(out, Some(&csv), None)?;
    DrawdownsReport::try_from(&drawdowns)?.to_csv(out, Some(&csv), None)?;
    StatisticsReport::try_from(&stats)?.to_csv(out, Some(&csv), None)?;
    PortfolioReport::try_from(&portfolio)?.to_parquet(out, None, None)?;

    println!("\n--- Worst Drawdowns ---");
    for group in drawdowns.groups() {
        let last = &group[group.len() - 1];
        println!(
            "{:<10} {:>8.2}% on {}",
            last.returns.price.key, last.max_percent_drawdown, last.max_drawdown_date
        );
    }

    let benchmark = portfolio.series("Portfolio", ReturnMetric::PeriodReturn);
    println!("\n--- Information Ratio vs. Portfolio ---");
    for key in returns.keys() {
        let subject = returns.series(key, ReturnMetric::PeriodReturn)?;
        match InformationRatioCalculator::calculate(&subject, &benchmark) {
            Ok(ir) => println!("{:<10} {:>6.2}", ir.subject, ir.information_ratio),
            Err(e) => println!("{:<10} n/a ({e})", subject.name()),
        }
    }

    match TopReturns::layout(&returns, config.max_panels()) {
        Ok(layout) => {
            println!("\n--- Top Returns ({0}x{0} grid) ---", layout.grid_size());
            for panel in layout.panels() {
                if let Some((key, ret)) = panel.entries.first() {
                    println!("{:<10} {:<10} {:>8.2}%", panel.label, key, ret);
                }
            }
        }
        Err(e) => println!("\nSkipping top returns layout: {e}"),
    }

    Ok(())
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let app_name = "returns-engine";

    // Detect if running in container
    let in_container = env::var("CONTAINER").is_ok() || Path::new("/.dockerenv").exists();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if in_container {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!("Logging to stdout (container mode)");
        Ok(None)
    } else {
        let log_dir = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
            .context("Failed to find a state or home directory")?
            .join(app_name)
            .join("logs");
        fs::create_dir_all(&log_dir)?;

        let timestamp = time::OffsetDateTime::now_utc()
            .format(&format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .context("Failed to format timestamp")?;
        let file_name = format!("{app_name}-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!(log_file = %log_dir.join(&file_name).display(), "Logging to file (local mode)");
        Ok(Some(guard))
    }
}
