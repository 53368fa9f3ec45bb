//! In-memory sink for tests and dry runs
//!
//! Implements both sink traits. Failures can be injected per target so the
//! coordinator's partial-failure handling can be exercised without real
//! infrastructure.

use crate::error::SinkError;
use crate::sink::{PrimarySink, SecondarySink, SUMMARY_TABLE, TOP_OUTLIERS_TABLE};
use crate::types::report::{SummaryReport, TopNSet};
use crate::types::transaction::Transaction;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct MemoryState {
    summaries: HashMap<String, SummaryReport>,
    transactions: HashMap<String, Vec<Transaction>>,
    /// Locations or table names whose writes fail
    failing: HashSet<String>,
    /// Every target that was written, in write order
    writes: Vec<String>,
}

/// Shared-state sink; clones observe the same contents
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<RwLock<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `target` (a location or table name) fail
    pub fn fail_on(self, target: &str) -> Self {
        self.with_state(|s| {
            s.failing.insert(target.to_string());
        });
        self
    }

    /// Make every secondary write fail, as if the database were unreachable
    pub fn unreachable(self) -> Self {
        self.fail_on(SUMMARY_TABLE).fail_on(TOP_OUTLIERS_TABLE)
    }

    pub fn summary(&self, target: &str) -> Option<SummaryReport> {
        self.read_state(|s| s.summaries.get(target).cloned())
    }

    pub fn transactions(&self, target: &str) -> Option<Vec<Transaction>> {
        self.read_state(|s| s.transactions.get(target).cloned())
    }

    /// Targets written so far, in order
    pub fn writes(&self) -> Vec<String> {
        self.read_state(|s| s.writes.clone())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn read_state<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> T {
        let guard = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&guard)
    }

    fn store_summary(&self, target: &str, report: &SummaryReport) -> Result<(), SinkError> {
        self.with_state(|s| {
            if s.failing.contains(target) {
                return Err(SinkError::Rejected(format!("write to '{}' refused", target)));
            }
            s.summaries.insert(target.to_string(), report.clone());
            s.writes.push(target.to_string());
            Ok(())
        })
    }

    fn store_transactions(&self, target: &str, rows: &[Transaction]) -> Result<(), SinkError> {
        self.with_state(|s| {
            if s.failing.contains(target) {
                return Err(SinkError::Rejected(format!("write to '{}' refused", target)));
            }
            s.transactions.insert(target.to_string(), rows.to_vec());
            s.writes.push(target.to_string());
            Ok(())
        })
    }
}

impl PrimarySink for MemorySink {
    fn write_summary(&self, location: &str, report: &SummaryReport) -> Result<(), SinkError> {
        self.store_summary(location, report)
    }

    fn write_transactions(&self, location: &str, rows: &[Transaction]) -> Result<(), SinkError> {
        self.store_transactions(location, rows)
    }
}

#[async_trait]
impl SecondarySink for MemorySink {
    async fn write_summary(&self, report: &SummaryReport) -> Result<(), SinkError> {
        self.store_summary(SUMMARY_TABLE, report)
    }

    async fn write_top_outliers(&self, top: &TopNSet) -> Result<(), SinkError> {
        self.store_transactions(TOP_OUTLIERS_TABLE, &top.rows)
    }
}
