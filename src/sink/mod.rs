//! Result sinks
//!
//! The primary sink is the authoritative durable store; the secondary sink
//! is a best-effort relational copy of the summary and top-N results.

pub mod memory;
pub mod object_store;
pub mod postgres;

pub use memory::MemorySink;
pub use object_store::ParquetObjectStore;
pub use postgres::{PostgresSettings, PostgresSink};

use crate::error::SinkError;
use crate::types::report::{SummaryReport, TopNSet};
use crate::types::transaction::Transaction;
use async_trait::async_trait;

/// Relational table holding the summary metrics
pub const SUMMARY_TABLE: &str = "fraud_summary";
/// Relational table holding the top-N rows
pub const TOP_OUTLIERS_TABLE: &str = "fraud_top_outliers";

/// Durable object sink. Every write replaces whatever was at `location`.
pub trait PrimarySink: Send + Sync {
    fn write_summary(&self, location: &str, report: &SummaryReport) -> Result<(), SinkError>;

    fn write_transactions(&self, location: &str, rows: &[Transaction]) -> Result<(), SinkError>;
}

/// Relational sink. Every write replaces the table contents.
#[async_trait]
pub trait SecondarySink: Send + Sync {
    async fn write_summary(&self, report: &SummaryReport) -> Result<(), SinkError>;

    async fn write_top_outliers(&self, top: &TopNSet) -> Result<(), SinkError>;
}
