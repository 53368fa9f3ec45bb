//! End-to-end analysis job
//!
//! Load → analyze → persist, with the coordinator tracking the run state.
//! Loading and analysis are CPU and file bound and run on the blocking pool.

use crate::analysis::{analyze, AnalysisResults, AnalysisSettings};
use crate::context::{ExecutionContext, ExecutionSettings};
use crate::coordinator::{PersistenceCoordinator, PersistenceOutcome};
use crate::error::{AnalysisError, AnalysisResult, SecondaryPersistenceError};
use crate::metrics::{JobMetrics, Stage};
use crate::sink::{PrimarySink, SecondarySink};
use crate::source::DatasetSource;
use crate::types::report::{FRAUD_COUNT, FRAUD_PERCENTAGE, OUTLIER_THRESHOLD, TOTAL_TRANSACTIONS};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// How a completed run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    /// Primary results written, relational copy failed
    SuccessWithWarning,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::SuccessWithWarning => "success_with_warning",
        }
    }
}

#[derive(Debug)]
pub struct JobReport {
    pub run_id: Uuid,
    pub status: JobStatus,
    pub results: AnalysisResults,
    /// Set when the secondary sink failed
    pub warning: Option<SecondaryPersistenceError>,
    pub metrics: JobMetrics,
}

pub struct AnalysisJob<D, P, S> {
    source: Arc<D>,
    coordinator: PersistenceCoordinator<P, S>,
    analysis: AnalysisSettings,
    execution: ExecutionSettings,
}

impl<D, P, S> AnalysisJob<D, P, S>
where
    D: DatasetSource + 'static,
    P: PrimarySink,
    S: SecondarySink,
{
    pub fn new(
        source: D,
        coordinator: PersistenceCoordinator<P, S>,
        analysis: AnalysisSettings,
        execution: ExecutionSettings,
    ) -> Self {
        Self {
            source: Arc::new(source),
            coordinator,
            analysis,
            execution,
        }
    }

    pub fn coordinator(&self) -> &PersistenceCoordinator<P, S> {
        &self.coordinator
    }

    /// Run the job once. Fatal errors leave the coordinator `Aborted`.
    pub async fn run(&mut self) -> AnalysisResult<JobReport> {
        self.coordinator.begin()?;

        let (run_id, results, mut metrics) = match self.compute(JobMetrics::new()).await {
            Ok(computed) => computed,
            Err(e) => {
                self.coordinator.abort()?;
                return Err(e);
            }
        };

        let started = Instant::now();
        let outcome = self.coordinator.persist(&results).await?;
        metrics.record_stage(Stage::Persistence, started.elapsed());

        let status = if outcome.is_complete() {
            JobStatus::Success
        } else {
            JobStatus::SuccessWithWarning
        };
        metrics.outliers = results.outliers.len() as u64;
        metrics.top_rows = results.top.len() as u64;
        metrics.status = Some(status.as_str());

        let warning = match outcome {
            PersistenceOutcome::Complete => None,
            PersistenceOutcome::SecondaryFailed(e) => Some(e),
        };

        Ok(JobReport {
            run_id,
            status,
            results,
            warning,
            metrics,
        })
    }

    async fn compute(
        &self,
        mut metrics: JobMetrics,
    ) -> AnalysisResult<(Uuid, AnalysisResults, JobMetrics)> {
        let source = Arc::clone(&self.source);
        let analysis = self.analysis;
        let execution = self.execution;

        tokio::task::spawn_blocking(move || -> AnalysisResult<(Uuid, AnalysisResults, JobMetrics)> {
            let dataset = metrics.time(Stage::Load, || source.load())?;
            metrics.rows_loaded = dataset.len() as u64;
            metrics.partitions = dataset.partition_count() as u64;

            let ctx = ExecutionContext::open(execution)?;
            let run_id = ctx.run_id();
            let results = metrics.time(Stage::Analysis, || analyze(&ctx, &dataset, &analysis));
            ctx.close();
            let results = results?;

            log_results(&results);
            Ok((run_id, results, metrics))
        })
        .await
        .map_err(|e| AnalysisError::Execution(format!("analysis task failed: {}", e)))?
    }
}

fn log_results(results: &AnalysisResults) {
    let summary = &results.summary;
    info!(
        total = summary.get(TOTAL_TRANSACTIONS).unwrap_or_default(),
        fraud = summary.get(FRAUD_COUNT).unwrap_or_default(),
        fraud_percentage = summary.get(FRAUD_PERCENTAGE).unwrap_or_default(),
        "Class distribution computed"
    );
    info!(
        threshold = summary.get(OUTLIER_THRESHOLD).unwrap_or_default(),
        outliers = results.outliers.len(),
        top = results.top.len(),
        "Outliers detected"
    );
}
