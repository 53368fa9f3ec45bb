//! Run metrics for the fraud analysis job.

use std::time::{Duration, Instant};
use tracing::info;

/// Named stages of a run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Analysis,
    Persistence,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Analysis => "analysis",
            Stage::Persistence => "persist",
        }
    }
}

/// Metrics collector for one job run
#[derive(Debug, Clone)]
pub struct JobMetrics {
    /// Stage durations in the order they completed
    stages: Vec<(Stage, Duration)>,
    /// Rows read from the dataset
    pub rows_loaded: u64,
    /// Partitions the dataset was split into
    pub partitions: u64,
    /// Rows above the outlier threshold
    pub outliers: u64,
    /// Rows in the top-N set
    pub top_rows: u64,
    /// Final status label, set when the run ends
    pub status: Option<&'static str>,
    /// Start time for the total duration
    start_time: Instant,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self {
            stages: Vec::with_capacity(4),
            rows_loaded: 0,
            partitions: 0,
            outliers: 0,
            top_rows: 0,
            status: None,
            start_time: Instant::now(),
        }
    }

    /// Record the duration of a completed stage
    pub fn record_stage(&mut self, stage: Stage, duration: Duration) {
        self.stages.push((stage, duration));
    }

    /// Run `f` and record its duration under `stage`
    pub fn time<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let value = f();
        self.record_stage(stage, started.elapsed());
        value
    }

    pub fn stage_duration(&self, stage: Stage) -> Option<Duration> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
    }

    pub fn stages(&self) -> &[(Stage, Duration)] {
        &self.stages
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Rows analysed per second over the analysis stage
    pub fn throughput(&self) -> f64 {
        match self.stage_duration(Stage::Analysis) {
            Some(d) if d.as_secs_f64() > 0.0 => self.rows_loaded as f64 / d.as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║               FRAUD ANALYSIS JOB - RUN SUMMARY               ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Rows Loaded:    {:>10}  │  Partitions: {:>8}            ║",
            self.rows_loaded, self.partitions
        );
        info!(
            "║ Outliers:       {:>10}  │  Top-N Rows: {:>8}            ║",
            self.outliers, self.top_rows
        );
        info!(
            "║ Throughput: {:>12.0} rows/s                                 ║",
            self.throughput()
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Stage Durations (ms):                                        ║");
        for (stage, duration) in &self.stages {
            info!(
                "║   {:10}: {:>10.1}                                       ║",
                stage.as_str(),
                duration.as_secs_f64() * 1000.0
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Status: {:22} Total: {:>10.1} ms              ║",
            self.status.unwrap_or("running"),
            self.elapsed().as_secs_f64() * 1000.0
        );
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for JobMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_recording() {
        let mut metrics = JobMetrics::new();

        metrics.record_stage(Stage::Load, Duration::from_millis(20));
        let value = metrics.time(Stage::Analysis, || 42);

        assert_eq!(value, 42);
        assert_eq!(metrics.stages().len(), 2);
        assert_eq!(metrics.stage_duration(Stage::Load), Some(Duration::from_millis(20)));
        assert!(metrics.stage_duration(Stage::Persistence).is_none());
    }

    #[test]
    fn test_throughput() {
        let mut metrics = JobMetrics::new();
        assert_eq!(metrics.throughput(), 0.0);

        metrics.rows_loaded = 1000;
        metrics.record_stage(Stage::Analysis, Duration::from_millis(500));
        assert!((metrics.throughput() - 2000.0).abs() < 1e-6);
    }
}
