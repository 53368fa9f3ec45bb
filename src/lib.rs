//! Fraud Analysis Library
//!
//! Batch analysis of card transactions: class distribution and amount
//! statistics, percentile-based outlier detection, and persistence of the
//! results to a durable object store with a best-effort relational copy.

pub mod analysis;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod job;
pub mod metrics;
pub mod sink;
pub mod source;
pub mod storage;
pub mod types;

pub use analysis::{analyze, AnalysisResults, AnalysisSettings};
pub use config::AppConfig;
pub use context::{ExecutionContext, ExecutionSettings};
pub use coordinator::{CoordinatorState, OutputLayout, PersistenceCoordinator};
pub use error::{AnalysisError, AnalysisResult};
pub use job::{AnalysisJob, JobReport, JobStatus};
pub use types::{report::SummaryReport, transaction::Transaction};
