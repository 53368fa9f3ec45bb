//! Summary report and result set data structures

use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};

pub const TOTAL_TRANSACTIONS: &str = "total_transactions";
pub const FRAUD_COUNT: &str = "fraud_count";
pub const NORMAL_COUNT: &str = "normal_count";
pub const FRAUD_PERCENTAGE: &str = "fraud_percentage";
pub const MIN_AMOUNT: &str = "min_amount";
pub const MAX_AMOUNT: &str = "max_amount";
pub const AVG_AMOUNT: &str = "avg_amount";
pub const STDDEV_AMOUNT: &str = "stddev_amount";
pub const FRAUD_AVG_AMOUNT: &str = "fraud_avg_amount";
pub const NORMAL_AVG_AMOUNT: &str = "normal_avg_amount";
pub const OUTLIER_THRESHOLD: &str = "outlier_threshold";
pub const OUTLIER_COUNT: &str = "outlier_count";

/// A single named metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub metric: String,
    pub value: f64,
}

/// Ordered (metric, value) pairs. Order is presentation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    metrics: Vec<Metric>,
}

impl SummaryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a metric. Returns false and leaves the report unchanged if the
    /// name is already present.
    pub fn push(&mut self, metric: &str, value: f64) -> bool {
        if self.get(metric).is_some() {
            return false;
        }
        self.metrics.push(Metric {
            metric: metric.to_string(),
            value,
        });
        true
    }

    /// Look up a metric value by name
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.metric == metric)
            .map(|m| m.value)
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.metric.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// Transactions whose amount exceeds the outlier threshold
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierSet {
    /// Threshold the members were filtered against (strictly greater)
    pub threshold: f64,
    /// Members in source row order
    pub rows: Vec<Transaction>,
}

impl OutlierSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The K largest transactions by amount, descending, ties in source order
#[derive(Debug, Clone, PartialEq)]
pub struct TopNSet {
    pub k: usize,
    pub rows: Vec<Transaction>,
}

impl TopNSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_preserves_insertion_order() {
        let mut report = SummaryReport::new();
        assert!(report.push(TOTAL_TRANSACTIONS, 1000.0));
        assert!(report.push(FRAUD_COUNT, 10.0));
        assert!(report.push(NORMAL_COUNT, 990.0));

        assert_eq!(
            report.names(),
            vec![TOTAL_TRANSACTIONS, FRAUD_COUNT, NORMAL_COUNT]
        );
        assert_eq!(report.get(FRAUD_COUNT), Some(10.0));
        assert_eq!(report.get(OUTLIER_COUNT), None);
    }

    #[test]
    fn test_report_rejects_duplicate_names() {
        let mut report = SummaryReport::new();
        assert!(report.push(MIN_AMOUNT, 0.0));
        assert!(!report.push(MIN_AMOUNT, 5.0));

        assert_eq!(report.len(), 1);
        assert_eq!(report.get(MIN_AMOUNT), Some(0.0));
    }

    #[test]
    fn test_report_serialization() {
        let mut report = SummaryReport::new();
        report.push(AVG_AMOUNT, 88.35);

        let json = serde_json::to_string(&report).unwrap();
        let deserialized: SummaryReport = serde_json::from_str(&json).unwrap();

        assert_eq!(report, deserialized);
    }
}
