//! Amount distribution and class balance statistics
//!
//! Each operation makes one pass over the dataset. Partitions are reduced in
//! parallel and merged in partition order.

use crate::context::ExecutionContext;
use crate::error::{AnalysisError, AnalysisResult};
use crate::source::Dataset;
use crate::types::transaction::{Transaction, TransactionClass};
use serde::Serialize;
use tracing::{debug, info};

/// Streaming min/max/mean/variance accumulator (Welford).
///
/// Partial accumulators combine with Chan's parallel update, so the merged
/// result does not depend on how rows were split.
#[derive(Debug, Clone, Copy)]
pub struct MomentAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for MomentAccumulator {
    fn default() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl MomentAccumulator {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &MomentAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let weight = other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * self.count as f64 * weight;
        self.mean += delta * weight;
        self.count = count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample standard deviation (divisor n - 1). Undefined below two rows.
    pub fn sample_stddev(&self) -> Option<f64> {
        (self.count > 1).then(|| (self.m2 / (self.count - 1) as f64).sqrt())
    }

    /// Population standard deviation (divisor n)
    pub fn population_stddev(&self) -> Option<f64> {
        (self.count > 0).then(|| (self.m2 / self.count as f64).sqrt())
    }
}

/// Amount distribution statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmountStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; `None` for a single-row dataset
    pub stddev: Option<f64>,
}

/// Row counts per class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub fraud: u64,
    pub normal: u64,
}

impl ClassCounts {
    pub fn total(&self) -> u64 {
        self.fraud + self.normal
    }

    /// `100 * fraud / total`; `None` when there are no rows
    pub fn fraud_percentage(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| 100.0 * self.fraud as f64 / total as f64)
    }

    fn merge(mut self, other: ClassCounts) -> Self {
        self.fraud += other.fraud;
        self.normal += other.normal;
        self
    }
}

/// Mean amount per class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassAverages {
    pub fraud_avg: f64,
    pub normal_avg: f64,
}

/// min, max, mean and sample stddev of the amount column
pub fn amount_stats(ctx: &ExecutionContext, dataset: &Dataset) -> AnalysisResult<AmountStats> {
    if dataset.is_empty() {
        return Err(AnalysisError::EmptyDataset("amount statistics"));
    }

    let acc = ctx
        .map_partitions(dataset, |partition| {
            let mut acc = MomentAccumulator::default();
            for tx in partition {
                acc.push(tx.amount);
            }
            acc
        })
        .into_iter()
        .fold(MomentAccumulator::default(), |mut total, part| {
            total.merge(&part);
            total
        });

    let mean = acc
        .mean()
        .ok_or(AnalysisError::EmptyDataset("amount statistics"))?;
    let stats = AmountStats {
        count: acc.count(),
        min: acc.min,
        max: acc.max,
        mean,
        stddev: acc.sample_stddev(),
    };

    info!(
        min = stats.min,
        max = stats.max,
        mean = stats.mean,
        stddev = ?stats.stddev,
        "Amount statistics computed"
    );
    Ok(stats)
}

/// Number of fraud and normal rows
pub fn class_counts(ctx: &ExecutionContext, dataset: &Dataset) -> ClassCounts {
    let counts = ctx
        .map_partitions(dataset, |partition| {
            partition
                .iter()
                .fold(ClassCounts::default(), |mut counts, tx| {
                    match tx.class {
                        TransactionClass::Fraud => counts.fraud += 1,
                        TransactionClass::Normal => counts.normal += 1,
                    }
                    counts
                })
        })
        .into_iter()
        .fold(ClassCounts::default(), ClassCounts::merge);

    if let Some(pct) = counts.fraud_percentage() {
        info!(
            fraud = counts.fraud,
            normal = counts.normal,
            fraud_pct = format!("{:.4}%", pct),
            normal_pct = format!("{:.4}%", 100.0 - pct),
            "Class balance computed"
        );
    }
    counts
}

/// Mean amount for each class
pub fn class_averages(ctx: &ExecutionContext, dataset: &Dataset) -> AnalysisResult<ClassAverages> {
    let (fraud, normal) = ctx
        .map_partitions(dataset, per_class_moments)
        .into_iter()
        .fold(
            (MomentAccumulator::default(), MomentAccumulator::default()),
            |(mut fraud, mut normal), (f, n)| {
                fraud.merge(&f);
                normal.merge(&n);
                (fraud, normal)
            },
        );

    let fraud_avg = fraud.mean().ok_or(AnalysisError::EmptyClass {
        class: TransactionClass::Fraud,
    })?;
    let normal_avg = normal.mean().ok_or(AnalysisError::EmptyClass {
        class: TransactionClass::Normal,
    })?;

    info!(fraud_avg, normal_avg, "Class average amounts computed");
    Ok(ClassAverages {
        fraud_avg,
        normal_avg,
    })
}

fn per_class_moments(partition: &[Transaction]) -> (MomentAccumulator, MomentAccumulator) {
    let mut fraud = MomentAccumulator::default();
    let mut normal = MomentAccumulator::default();
    for tx in partition {
        match tx.class {
            TransactionClass::Fraud => fraud.push(tx.amount),
            TransactionClass::Normal => normal.push(tx.amount),
        }
    }
    debug!(
        rows = partition.len(),
        fraud = fraud.count(),
        "Partition class moments"
    );
    (fraud, normal)
}
