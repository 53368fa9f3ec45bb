//! Error taxonomy for the analysis job
//!
//! Everything in [`AnalysisError`] is fatal and aborts the run.
//! [`SecondaryPersistenceError`] is the only recoverable failure: the
//! coordinator logs it and still reports the run as successful.

use crate::coordinator::CoordinatorState;
use crate::types::transaction::TransactionClass;
use thiserror::Error;

/// Result alias for fallible analysis operations
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

/// Fatal analysis job errors
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Dataset source unreadable, missing or malformed
    #[error("failed to load dataset from {location}")]
    DataAccess {
        location: String,
        #[source]
        source: SourceError,
    },

    /// Zero rows make the named statistic undefined
    #[error("dataset is empty: {0} is undefined")]
    EmptyDataset(&'static str),

    /// One class has no rows, so its mean amount is undefined
    #[error("no {class} transactions in dataset: mean amount is undefined")]
    EmptyClass { class: TransactionClass },

    /// An analysis parameter is out of range
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A metric was not produced upstream
    #[error("summary report is incomplete: {0} has no value")]
    IncompleteMetrics(&'static str),

    /// Durable sink write failed
    #[error("primary persistence of '{result_set}' failed")]
    PrimaryPersistence {
        result_set: &'static str,
        #[source]
        source: SinkError,
    },

    /// Coordinator state machine misuse
    #[error("invalid coordinator transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: CoordinatorState,
        to: CoordinatorState,
    },

    /// The execution substrate failed (thread pool, worker panic)
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Dataset source failures
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("required column '{0}' not found in header")]
    MissingColumn(String),

    #[error("row {row}: column '{column}' has invalid value '{value}'")]
    InvalidValue {
        row: u64,
        column: String,
        value: String,
    },

    #[error("invalid object location '{0}'")]
    InvalidLocation(String),
}

/// Sink write failures
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("invalid object location '{0}'")]
    InvalidLocation(String),

    /// Failure reported by a non-I/O sink (in-memory sinks, tests)
    #[error("{0}")]
    Rejected(String),
}

/// Relational sink write failure. Recovered by the coordinator.
#[derive(Error, Debug)]
#[error("secondary persistence to table '{table}' failed")]
pub struct SecondaryPersistenceError {
    pub table: &'static str,
    #[source]
    pub source: SinkError,
}

/// Render an error with its full `source()` chain on one line
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_class_message() {
        let err = AnalysisError::EmptyClass {
            class: TransactionClass::Fraud,
        };
        assert_eq!(
            err.to_string(),
            "no fraud transactions in dataset: mean amount is undefined"
        );
    }

    #[test]
    fn test_error_chain_preserves_cause() {
        let err = AnalysisError::PrimaryPersistence {
            result_set: "outliers",
            source: SinkError::Rejected("disk full".to_string()),
        };
        assert_eq!(
            error_chain(&err),
            "primary persistence of 'outliers' failed: disk full"
        );
    }

    #[test]
    fn test_secondary_error_chain() {
        let err = SecondaryPersistenceError {
            table: "fraud_summary",
            source: SinkError::Rejected("connection refused".to_string()),
        };
        assert_eq!(
            error_chain(&err),
            "secondary persistence to table 'fraud_summary' failed: connection refused"
        );
    }
}
