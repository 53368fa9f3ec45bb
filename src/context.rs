//! Explicit execution context for a single analysis run
//!
//! Owns the worker pool that partition-level work runs on. Stages receive the
//! context by reference; it is opened once per run and closed when the run
//! ends.

use crate::error::{AnalysisError, AnalysisResult};
use crate::source::Dataset;
use crate::types::transaction::Transaction;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Execution substrate settings
#[derive(Debug, Clone, Copy)]
pub struct ExecutionSettings {
    /// Worker threads; 0 uses the number of available cores
    pub workers: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self { workers: 0 }
    }
}

pub struct ExecutionContext {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    opened: Instant,
    pool: ThreadPool,
}

impl ExecutionContext {
    /// Set up the context and its worker pool
    pub fn open(settings: ExecutionSettings) -> AnalysisResult<Self> {
        let run_id = Uuid::new_v4();
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.workers)
            .thread_name(|i| format!("analysis-worker-{}", i))
            .build()
            .map_err(|e| AnalysisError::Execution(format!("failed to build worker pool: {}", e)))?;

        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            started_at = %started_at.to_rfc3339(),
            workers = pool.current_num_threads(),
            "Execution context opened"
        );

        Ok(Self {
            run_id,
            started_at,
            opened: Instant::now(),
            pool,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` over every partition in parallel.
    ///
    /// Results come back in partition order regardless of scheduling.
    pub fn map_partitions<T, F>(&self, dataset: &Dataset, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&[Transaction]) -> T + Send + Sync,
    {
        let rows = dataset.rows();
        let chunk = dataset.partition_rows();
        self.pool
            .install(|| rows.par_chunks(chunk).map(|partition| f(partition)).collect())
    }

    /// Tear down the context, releasing the worker pool
    pub fn close(self) {
        info!(
            run_id = %self.run_id,
            started_at = %self.started_at.to_rfc3339(),
            lifetime_ms = self.opened.elapsed().as_millis() as u64,
            "Execution context closed"
        );
    }
}
