//! Persistence coordinator
//!
//! Drives one run through `Idle → Computing → PersistingPrimary →
//! PersistingSecondary → Done`. `Aborted` is reachable from `Computing` and
//! `PersistingPrimary`. Primary failures abort the run; secondary failures
//! are recorded in the [`PersistenceOutcome`] and the run still completes.

use crate::analysis::AnalysisResults;
use crate::error::{
    error_chain, AnalysisError, AnalysisResult, SecondaryPersistenceError, SinkError,
};
use crate::sink::{PrimarySink, SecondarySink, SUMMARY_TABLE, TOP_OUTLIERS_TABLE};
use crate::storage::join_location;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

pub const SUMMARY_SET: &str = "summary";
pub const OUTLIERS_SET: &str = "outliers";
pub const TOP_OUTLIERS_SET: &str = "top_outliers";

/// Lifecycle of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Computing,
    PersistingPrimary,
    PersistingSecondary,
    Done,
    Aborted,
}

impl CoordinatorState {
    pub fn can_transition_to(self, next: CoordinatorState) -> bool {
        use CoordinatorState::*;
        matches!(
            (self, next),
            (Idle, Computing)
                | (Computing, PersistingPrimary)
                | (Computing, Aborted)
                | (PersistingPrimary, PersistingSecondary)
                | (PersistingPrimary, Aborted)
                | (PersistingSecondary, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CoordinatorState::Done | CoordinatorState::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CoordinatorState::Idle => "idle",
            CoordinatorState::Computing => "computing",
            CoordinatorState::PersistingPrimary => "persisting_primary",
            CoordinatorState::PersistingSecondary => "persisting_secondary",
            CoordinatorState::Done => "done",
            CoordinatorState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locations of the primary result sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    base: String,
}

impl OutputLayout {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// `s3://{bucket}/output/fraud_analysis_result`
    pub fn for_bucket(bucket: &str) -> Self {
        Self::new(format!("s3://{}/output/fraud_analysis_result", bucket))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn summary(&self) -> String {
        join_location(&self.base, SUMMARY_SET)
    }

    pub fn outliers(&self) -> String {
        join_location(&self.base, OUTLIERS_SET)
    }

    pub fn top_outliers(&self) -> String {
        join_location(&self.base, TOP_OUTLIERS_SET)
    }
}

/// How persistence ended for a run that reached `Done`
#[derive(Debug)]
pub enum PersistenceOutcome {
    /// Both sinks hold the results
    Complete,
    /// Primary results are durable; the relational copy failed
    SecondaryFailed(SecondaryPersistenceError),
}

impl PersistenceOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, PersistenceOutcome::Complete)
    }

    pub fn warning(&self) -> Option<&SecondaryPersistenceError> {
        match self {
            PersistenceOutcome::Complete => None,
            PersistenceOutcome::SecondaryFailed(e) => Some(e),
        }
    }
}

pub struct PersistenceCoordinator<P, S> {
    primary: P,
    secondary: S,
    layout: OutputLayout,
    state: CoordinatorState,
}

impl<P: PrimarySink, S: SecondarySink> PersistenceCoordinator<P, S> {
    pub fn new(primary: P, secondary: S, layout: OutputLayout) -> Self {
        Self {
            primary,
            secondary,
            layout,
            state: CoordinatorState::Idle,
        }
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    /// Enter `Computing`
    pub fn begin(&mut self) -> AnalysisResult<()> {
        self.transition(CoordinatorState::Computing)
    }

    /// Enter `Aborted` after a fatal failure
    pub fn abort(&mut self) -> AnalysisResult<()> {
        self.transition(CoordinatorState::Aborted)
    }

    /// Write results to the primary sink, then to the secondary sink.
    ///
    /// A primary failure aborts the run and is returned. A secondary failure
    /// is logged and returned inside the outcome; the run still reaches
    /// `Done`.
    pub async fn persist(&mut self, results: &AnalysisResults) -> AnalysisResult<PersistenceOutcome> {
        self.transition(CoordinatorState::PersistingPrimary)?;
        if let Err(e) = self.write_primary(results) {
            self.abort()?;
            return Err(e);
        }

        self.transition(CoordinatorState::PersistingSecondary)?;
        let outcome = match self.write_secondary(results).await {
            Ok(()) => PersistenceOutcome::Complete,
            Err(e) => {
                warn!(
                    table = e.table,
                    error = %error_chain(&e),
                    "Secondary persistence failed, primary results are intact"
                );
                PersistenceOutcome::SecondaryFailed(e)
            }
        };

        self.transition(CoordinatorState::Done)?;
        Ok(outcome)
    }

    fn transition(&mut self, next: CoordinatorState) -> AnalysisResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AnalysisError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        info!(from = %self.state, to = %next, "Coordinator state transition");
        self.state = next;
        Ok(())
    }

    fn write_primary(&self, results: &AnalysisResults) -> AnalysisResult<()> {
        self.primary
            .write_summary(&self.layout.summary(), &results.summary)
            .map_err(primary_error(SUMMARY_SET))?;
        self.primary
            .write_transactions(&self.layout.outliers(), &results.outliers.rows)
            .map_err(primary_error(OUTLIERS_SET))?;
        self.primary
            .write_transactions(&self.layout.top_outliers(), &results.top.rows)
            .map_err(primary_error(TOP_OUTLIERS_SET))?;

        info!(
            location = %self.layout.base(),
            outliers = results.outliers.len(),
            top = results.top.len(),
            "Primary persistence complete"
        );
        Ok(())
    }

    async fn write_secondary(&self, results: &AnalysisResults) -> Result<(), SecondaryPersistenceError> {
        self.secondary
            .write_summary(&results.summary)
            .await
            .map_err(|source| SecondaryPersistenceError {
                table: SUMMARY_TABLE,
                source,
            })?;
        self.secondary
            .write_top_outliers(&results.top)
            .await
            .map_err(|source| SecondaryPersistenceError {
                table: TOP_OUTLIERS_TABLE,
                source,
            })?;

        info!(tables = 2, "Secondary persistence complete");
        Ok(())
    }
}

fn primary_error(result_set: &'static str) -> impl FnOnce(SinkError) -> AnalysisError {
    move |source| AnalysisError::PrimaryPersistence { result_set, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::types::report::{OutlierSet, SummaryReport, TopNSet, OUTLIER_COUNT};
    use crate::types::transaction::{Transaction, TransactionClass};

    fn results() -> AnalysisResults {
        let big = Transaction::new(1.0, 5000.0, TransactionClass::Fraud);
        let mut summary = SummaryReport::new();
        summary.push(OUTLIER_COUNT, 1.0);
        AnalysisResults {
            summary,
            outliers: OutlierSet {
                threshold: 10.0,
                rows: vec![big.clone()],
            },
            top: TopNSet {
                k: 10,
                rows: vec![big],
            },
        }
    }

    fn coordinator(
        primary: MemorySink,
        secondary: MemorySink,
    ) -> PersistenceCoordinator<MemorySink, MemorySink> {
        PersistenceCoordinator::new(primary, secondary, OutputLayout::for_bucket("bucket"))
    }

    #[test]
    fn test_transition_table() {
        use CoordinatorState::*;
        assert!(Idle.can_transition_to(Computing));
        assert!(Computing.can_transition_to(Aborted));
        assert!(PersistingPrimary.can_transition_to(Aborted));
        assert!(!PersistingSecondary.can_transition_to(Aborted));
        assert!(!Idle.can_transition_to(PersistingPrimary));
        assert!(!Done.can_transition_to(Computing));
        assert!(!Aborted.can_transition_to(Computing));
        assert!(Done.is_terminal() && Aborted.is_terminal());
    }

    #[test]
    fn test_output_layout() {
        let layout = OutputLayout::for_bucket("ws-cc-raw-data-123");
        assert_eq!(
            layout.summary(),
            "s3://ws-cc-raw-data-123/output/fraud_analysis_result/summary"
        );
        assert_eq!(
            layout.top_outliers(),
            "s3://ws-cc-raw-data-123/output/fraud_analysis_result/top_outliers"
        );
    }

    #[tokio::test]
    async fn test_persist_without_begin_is_rejected() {
        let mut c = coordinator(MemorySink::new(), MemorySink::new());
        let err = c.persist(&results()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InvalidTransition {
                from: CoordinatorState::Idle,
                to: CoordinatorState::PersistingPrimary
            }
        ));
        assert_eq!(c.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_persist_writes_both_sinks() {
        let primary = MemorySink::new();
        let secondary = MemorySink::new();
        let mut c = coordinator(primary.clone(), secondary.clone());

        c.begin().unwrap();
        let outcome = c.persist(&results()).await.unwrap();

        assert!(outcome.is_complete());
        assert_eq!(c.state(), CoordinatorState::Done);
        assert_eq!(primary.writes().len(), 3);
        assert_eq!(
            secondary.writes(),
            vec![SUMMARY_TABLE.to_string(), TOP_OUTLIERS_TABLE.to_string()]
        );
        // The full outlier set never reaches the relational sink.
        assert!(secondary.transactions("outliers").is_none());
    }

    #[tokio::test]
    async fn test_primary_failure_aborts_before_secondary() {
        let layout = OutputLayout::for_bucket("bucket");
        let primary = MemorySink::new().fail_on(&layout.outliers());
        let secondary = MemorySink::new();
        let mut c = coordinator(primary.clone(), secondary.clone());

        c.begin().unwrap();
        let err = c.persist(&results()).await.unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::PrimaryPersistence {
                result_set: OUTLIERS_SET,
                ..
            }
        ));
        assert_eq!(c.state(), CoordinatorState::Aborted);
        assert_eq!(primary.writes(), vec![layout.summary()]);
        assert!(secondary.writes().is_empty());
    }

    #[tokio::test]
    async fn test_secondary_failure_still_completes() {
        let primary = MemorySink::new();
        let mut c = coordinator(primary.clone(), MemorySink::new().unreachable());

        c.begin().unwrap();
        let outcome = c.persist(&results()).await.unwrap();

        assert_eq!(c.state(), CoordinatorState::Done);
        assert_eq!(outcome.warning().map(|e| e.table), Some(SUMMARY_TABLE));
        assert_eq!(primary.writes().len(), 3);
    }

    #[test]
    fn test_abort_from_computing() {
        let mut c = coordinator(MemorySink::new(), MemorySink::new());
        c.begin().unwrap();
        c.abort().unwrap();
        assert_eq!(c.state(), CoordinatorState::Aborted);
        assert!(c.abort().is_err());
    }
}
