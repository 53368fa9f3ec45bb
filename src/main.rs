//! Fraud Analysis Job - Main Entry Point
//!
//! Loads the transaction dataset, computes summary statistics and outliers,
//! and persists the results to the object store and the relational database.

use anyhow::Result;
use fraud_analysis::{
    config::{AppConfig, LogFormat},
    coordinator::PersistenceCoordinator,
    error::error_chain,
    job::AnalysisJob,
    sink::{ParquetObjectStore, PostgresSink},
    source::CsvDatasetSource,
};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("fraud_analysis={}", config.log_level).parse()?);

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

async fn run(config: AppConfig) -> Result<()> {
    let store = config.object_store();
    let source = CsvDatasetSource::new(store.clone(), &config.source_location()?)
        .with_partition_rows(config.partition_rows);
    let postgres = PostgresSink::new(config.postgres_settings());
    let layout = config.output_layout()?;

    info!(
        source = %config.source_location()?,
        output = %layout.base(),
        store_root = %store.root().display(),
        "Configuration loaded"
    );
    info!(
        quantile = config.outlier_quantile,
        relative_error = config.outlier_relative_error,
        top_n = config.top_n,
        workers = config.workers,
        "Analysis parameters"
    );
    info!(url = %postgres.settings().display_url(), "Relational sink configured");

    let coordinator = PersistenceCoordinator::new(ParquetObjectStore::new(store), postgres, layout);
    let mut job = AnalysisJob::new(
        source,
        coordinator,
        config.analysis_settings(),
        config.execution_settings(),
    );

    let report = job.run().await?;
    report.metrics.print_summary();

    if let Some(warning) = &report.warning {
        warn!(
            run_id = %report.run_id,
            status = report.status.as_str(),
            error = %error_chain(warning),
            "Fraud analysis finished with a warning"
        );
        return Ok(());
    }

    info!(
        run_id = %report.run_id,
        status = report.status.as_str(),
        "Fraud analysis finished"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fraud-analysis: configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("fraud-analysis: invalid log configuration: {:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting Fraud Analysis Job");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(status = "failure", error = %format!("{:#}", e), "Fraud analysis failed");
            ExitCode::FAILURE
        }
    }
}
