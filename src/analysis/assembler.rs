//! Builds the ordered summary report from upstream results.
//!
//! The report is all-or-nothing: a metric that was never produced (or is not
//! a finite number) fails the build instead of being written as a
//! placeholder.

use crate::analysis::statistics::{AmountStats, ClassAverages, ClassCounts};
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::report::*;

#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    total_rows: Option<u64>,
    class_counts: Option<ClassCounts>,
    amount: Option<AmountStats>,
    class_averages: Option<ClassAverages>,
    outlier_threshold: Option<f64>,
    outlier_count: Option<usize>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_rows(mut self, total_rows: u64) -> Self {
        self.total_rows = Some(total_rows);
        self
    }

    pub fn class_counts(mut self, counts: ClassCounts) -> Self {
        self.class_counts = Some(counts);
        self
    }

    pub fn amount_stats(mut self, stats: AmountStats) -> Self {
        self.amount = Some(stats);
        self
    }

    pub fn class_averages(mut self, averages: ClassAverages) -> Self {
        self.class_averages = Some(averages);
        self
    }

    pub fn outliers(mut self, threshold: f64, count: usize) -> Self {
        self.outlier_threshold = Some(threshold);
        self.outlier_count = Some(count);
        self
    }

    /// Produce the report in presentation order
    pub fn build(self) -> AnalysisResult<SummaryReport> {
        let total_rows = require(TOTAL_TRANSACTIONS, self.total_rows.map(|n| n as f64))?;
        let counts = self.class_counts;
        let amount = self.amount;
        let averages = self.class_averages;

        let fraud_percentage = counts.and_then(|c| {
            (total_rows > 0.0).then(|| 100.0 * c.fraud as f64 / total_rows)
        });

        let values = [
            (TOTAL_TRANSACTIONS, Some(total_rows)),
            (FRAUD_COUNT, counts.map(|c| c.fraud as f64)),
            (NORMAL_COUNT, counts.map(|c| c.normal as f64)),
            (FRAUD_PERCENTAGE, fraud_percentage),
            (MIN_AMOUNT, amount.map(|a| a.min)),
            (MAX_AMOUNT, amount.map(|a| a.max)),
            (AVG_AMOUNT, amount.map(|a| a.mean)),
            (STDDEV_AMOUNT, amount.and_then(|a| a.stddev)),
            (FRAUD_AVG_AMOUNT, averages.map(|a| a.fraud_avg)),
            (NORMAL_AVG_AMOUNT, averages.map(|a| a.normal_avg)),
            (OUTLIER_THRESHOLD, self.outlier_threshold),
            (OUTLIER_COUNT, self.outlier_count.map(|n| n as f64)),
        ];

        let mut report = SummaryReport::new();
        for (metric, value) in values {
            report.push(metric, require(metric, value)?);
        }
        Ok(report)
    }
}

fn require(metric: &'static str, value: Option<f64>) -> AnalysisResult<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(AnalysisError::IncompleteMetrics(metric)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ReportBuilder {
        ReportBuilder::new()
            .total_rows(1000)
            .class_counts(ClassCounts {
                fraud: 10,
                normal: 990,
            })
            .amount_stats(AmountStats {
                count: 1000,
                min: 0.0,
                max: 1000.0,
                mean: 10.0,
                stddev: Some(99.5),
            })
            .class_averages(ClassAverages {
                fraud_avg: 1000.0,
                normal_avg: 0.0,
            })
            .outliers(0.0, 10)
    }

    #[test]
    fn test_report_order_and_values() {
        let report = complete().build().unwrap();

        assert_eq!(
            report.names(),
            vec![
                TOTAL_TRANSACTIONS,
                FRAUD_COUNT,
                NORMAL_COUNT,
                FRAUD_PERCENTAGE,
                MIN_AMOUNT,
                MAX_AMOUNT,
                AVG_AMOUNT,
                STDDEV_AMOUNT,
                FRAUD_AVG_AMOUNT,
                NORMAL_AVG_AMOUNT,
                OUTLIER_THRESHOLD,
                OUTLIER_COUNT,
            ]
        );
        assert_eq!(report.get(FRAUD_PERCENTAGE), Some(1.0));
        assert_eq!(report.get(OUTLIER_COUNT), Some(10.0));
    }

    #[test]
    fn test_missing_upstream_value_fails() {
        let builder = ReportBuilder::new().total_rows(3);
        match builder.build() {
            Err(AnalysisError::IncompleteMetrics(metric)) => assert_eq!(metric, FRAUD_COUNT),
            other => panic!("expected IncompleteMetrics, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_stddev_fails() {
        let builder = complete().amount_stats(AmountStats {
            count: 1,
            min: 5.0,
            max: 5.0,
            mean: 5.0,
            stddev: None,
        });
        assert!(matches!(
            builder.build(),
            Err(AnalysisError::IncompleteMetrics(STDDEV_AMOUNT))
        ));
    }

    #[test]
    fn test_non_finite_value_fails() {
        let builder = complete().outliers(f64::NAN, 0);
        assert!(matches!(
            builder.build(),
            Err(AnalysisError::IncompleteMetrics(OUTLIER_THRESHOLD))
        ));
    }
}
