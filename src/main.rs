pub mod chart;
pub mod config;
pub mod error;
pub mod export;
pub mod indicators;
pub mod pipeline;
pub mod series;
pub mod utils;
pub mod yahoo;

use anyhow::Context;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    utils::init_logger()?;

    let app_config = config::AnalysisConfig::load().context("Failed to load configuration")?;

    let _span = tracing::info_span!("run", ticker = %app_config.ticker).entered();
    tracing::info!(
        period = %app_config.period,
        csv = %app_config.csv_path.display(),
        chart = %app_config.chart_path.display(),
        "Loaded configuration"
    );

    let report = pipeline::run(&app_config)
        .await
        .with_context(|| format!("Analysis of {} failed", app_config.ticker))?;

    tracing::info!(
        rows = report.rows_written,
        csv = %report.csv_path.display(),
        chart = %report.chart_path.display(),
        latest_close = ?report.summary.as_ref().map(|s| s.latest_close),
        "Analysis complete"
    );
    println!("✓ Analysis complete!");
    Ok(())
}
