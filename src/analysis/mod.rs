//! Analysis stages: statistics, outlier detection and report assembly

pub mod assembler;
pub mod outliers;
pub mod quantile;
pub mod statistics;

pub use assembler::ReportBuilder;
pub use outliers::{approx_quantile, filter_above, top_n};
pub use quantile::QuantileSummary;
pub use statistics::{amount_stats, class_averages, class_counts, AmountStats, ClassAverages, ClassCounts};

use crate::context::ExecutionContext;
use crate::error::AnalysisResult;
use crate::source::Dataset;
use crate::types::report::{OutlierSet, SummaryReport, TopNSet};
use crate::types::transaction::Column;
use serde::Deserialize;

/// Tunable analysis parameters
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AnalysisSettings {
    /// Outlier percentile, in [0, 1]
    pub quantile: f64,
    /// Rank error tolerance of the percentile sketch, in (0, 1)
    pub relative_error: f64,
    /// Size bound of the top-N set
    pub top_n: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            quantile: 0.99,
            relative_error: 0.01,
            top_n: 10,
        }
    }
}

/// Everything one run computes, materialized once and shared by both sinks
#[derive(Debug, Clone)]
pub struct AnalysisResults {
    pub summary: SummaryReport,
    pub outliers: OutlierSet,
    pub top: TopNSet,
}

/// Run statistics and outlier detection over `dataset` and assemble the
/// report.
///
/// Fails on the first undefined statistic; nothing is returned partially.
pub fn analyze(
    ctx: &ExecutionContext,
    dataset: &Dataset,
    settings: &AnalysisSettings,
) -> AnalysisResult<AnalysisResults> {
    let amount = amount_stats(ctx, dataset)?;
    let counts = class_counts(ctx, dataset);
    let averages = class_averages(ctx, dataset)?;

    let threshold = approx_quantile(
        ctx,
        dataset,
        Column::Amount,
        settings.quantile,
        settings.relative_error,
    )?;
    let outliers = filter_above(ctx, dataset, Column::Amount, threshold);
    let top = top_n(ctx, dataset, Column::Amount, settings.top_n);

    let summary = ReportBuilder::new()
        .total_rows(dataset.len() as u64)
        .class_counts(counts)
        .amount_stats(amount)
        .class_averages(averages)
        .outliers(outliers.threshold, outliers.len())
        .build()?;

    Ok(AnalysisResults {
        summary,
        outliers,
        top,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionSettings;
    use crate::error::AnalysisError;
    use crate::types::report::*;
    use crate::types::transaction::{Transaction, TransactionClass};

    fn scenario_a() -> Dataset {
        let mut rows: Vec<Transaction> = (0..990)
            .map(|i| Transaction::new(i as f64, 0.0, TransactionClass::Normal))
            .collect();
        rows.extend((990..1000).map(|i| Transaction::new(i as f64, 1000.0, TransactionClass::Fraud)));
        Dataset::new(rows, 256)
    }

    #[test]
    fn test_analyze_balanced_scenario() {
        let ctx = ExecutionContext::open(ExecutionSettings::default()).unwrap();
        let results = analyze(&ctx, &scenario_a(), &AnalysisSettings::default()).unwrap();
        let summary = &results.summary;

        assert_eq!(summary.len(), 12);
        assert_eq!(summary.get(TOTAL_TRANSACTIONS), Some(1000.0));
        assert_eq!(summary.get(FRAUD_COUNT), Some(10.0));
        assert_eq!(summary.get(NORMAL_COUNT), Some(990.0));
        assert_eq!(summary.get(FRAUD_PERCENTAGE), Some(1.0));
        assert_eq!(summary.get(FRAUD_AVG_AMOUNT), Some(1000.0));
        assert_eq!(summary.get(NORMAL_AVG_AMOUNT), Some(0.0));
        assert_eq!(summary.get(OUTLIER_COUNT), Some(results.outliers.len() as f64));
        assert_eq!(results.top.len(), 10);
        assert!(results.top.rows.iter().all(|t| t.amount == 1000.0));
    }

    #[test]
    fn test_analyze_is_deterministic() {
        let ctx = ExecutionContext::open(ExecutionSettings { workers: 4 }).unwrap();
        let data = scenario_a();
        let first = analyze(&ctx, &data, &AnalysisSettings::default()).unwrap();
        let second = analyze(&ctx, &data, &AnalysisSettings::default()).unwrap();
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.top, second.top);
    }

    #[test]
    fn test_analyze_empty_dataset() {
        let ctx = ExecutionContext::open(ExecutionSettings::default()).unwrap();
        let empty = Dataset::new(Vec::new(), 16);
        assert!(matches!(
            analyze(&ctx, &empty, &AnalysisSettings::default()),
            Err(AnalysisError::EmptyDataset(_))
        ));
    }
}
