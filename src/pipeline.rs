use crate::chart::render_chart;
use crate::config::AnalysisConfig;
use crate::error::PipelineError;
use crate::export::write_csv;
use crate::indicators::add_moving_averages;
use crate::series::{AnalyzedSeries, SeriesSummary};
use crate::utils::{format_optional_price, format_price, Timer};
use crate::yahoo::{YahooClient, YahooError};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub summary: Option<SeriesSummary>,
    pub rows_written: usize,
    pub csv_path: PathBuf,
    pub chart_path: PathBuf,
}

/// Fetch, transform, export and render, in that order. The first failure aborts the run.
#[instrument(skip(config), fields(ticker = %config.ticker, period = %config.period))]
pub async fn run(config: &AnalysisConfig) -> Result<PipelineReport, PipelineError> {
    let fetch_error = |e: YahooError| PipelineError::data_unavailable(&config.ticker, e);

    // --- 1. Fetch ---
    println!("Downloading data for {}...", config.ticker);
    let timer = Timer::start("fetch");
    let client = YahooClient::new(config.random_agent)
        .map_err(fetch_error)?
        .with_base_url(&config.base_url)
        .with_auto_adjust(config.auto_adjust);
    let series = client
        .get_history(&config.ticker, config.period, config.interval)
        .await
        .map_err(fetch_error)?;
    timer.log_elapsed();

    // --- 2. Transform ---
    let timer = Timer::start("moving averages");
    let analyzed = add_moving_averages(&series);
    timer.log_elapsed();

    let summary = analyzed.summary();
    print_summary(&analyzed, summary.as_ref());

    // --- 3. Export ---
    let rows_written = write_csv(&analyzed, &config.csv_path)?;
    println!("Data saved to {}", config.csv_path.display());

    // --- 4. Render ---
    let timer = Timer::start("chart");
    render_chart(&analyzed, &config.ticker, &config.chart_path)?;
    timer.log_elapsed();
    println!("Chart saved to {}", config.chart_path.display());

    info!(rows_written, "Pipeline finished");

    Ok(PipelineReport {
        summary,
        rows_written,
        csv_path: config.csv_path.clone(),
        chart_path: config.chart_path.clone(),
    })
}

fn print_summary(series: &AnalyzedSeries, summary: Option<&SeriesSummary>) {
    let Some(summary) = summary else {
        return;
    };
    let currency = series.currency.as_deref();

    println!();
    println!("=== Summary Statistics ===");
    println!("Data period: {} to {}", summary.first_date, summary.last_date);
    println!("Latest Close Price: {}", format_price(summary.latest_close, currency));
    println!("Latest 20-Day MA: {}", format_optional_price(summary.latest_ma_20, currency));
    println!("Latest 50-Day MA: {}", format_optional_price(summary.latest_ma_50, currency));
    println!("1-Year High: {}", format_price(summary.high, currency));
    println!("1-Year Low: {}", format_price(summary.low, currency));
    println!();
}
