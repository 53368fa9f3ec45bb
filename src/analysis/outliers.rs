//! Amount-based outlier detection: percentile threshold, strict filter, top-N

use crate::analysis::quantile::QuantileSummary;
use crate::context::ExecutionContext;
use crate::error::{AnalysisError, AnalysisResult};
use crate::source::Dataset;
use crate::types::report::{OutlierSet, TopNSet};
use crate::types::transaction::{Column, Transaction};
use std::cmp::Ordering;
use tracing::info;

/// Approximate `q`-quantile of `column`, rank error bounded by
/// `relative_error * n`.
///
/// Each partition builds its own summary; summaries are merged in partition
/// order.
pub fn approx_quantile(
    ctx: &ExecutionContext,
    dataset: &Dataset,
    column: Column,
    q: f64,
    relative_error: f64,
) -> AnalysisResult<f64> {
    if !(0.0..=1.0).contains(&q) {
        return Err(AnalysisError::InvalidParameter {
            name: "quantile",
            reason: format!("{} is outside [0, 1]", q),
        });
    }
    if !(relative_error > 0.0 && relative_error < 1.0) {
        return Err(AnalysisError::InvalidParameter {
            name: "relative_error",
            reason: format!("{} is outside (0, 1)", relative_error),
        });
    }
    if dataset.is_empty() {
        return Err(AnalysisError::EmptyDataset("amount quantile"));
    }

    let summary = ctx
        .map_partitions(dataset, |partition| {
            let mut summary = QuantileSummary::new(relative_error);
            for tx in partition {
                summary.insert(tx.value(column));
            }
            summary.finish()
        })
        .into_iter()
        .reduce(QuantileSummary::merge)
        .ok_or(AnalysisError::EmptyDataset("amount quantile"))?;

    let threshold = summary
        .query(q)
        .ok_or(AnalysisError::EmptyDataset("amount quantile"))?;

    info!(
        column = %column.name(),
        quantile = q,
        relative_error,
        threshold,
        retained_samples = summary.sample_count(),
        "Percentile threshold computed"
    );
    Ok(threshold)
}

/// Rows whose `column` value is strictly greater than `threshold`, in source
/// order
pub fn filter_above(
    ctx: &ExecutionContext,
    dataset: &Dataset,
    column: Column,
    threshold: f64,
) -> OutlierSet {
    let rows: Vec<Transaction> = ctx
        .map_partitions(dataset, |partition| {
            partition
                .iter()
                .filter(|tx| tx.value(column) > threshold)
                .cloned()
                .collect::<Vec<_>>()
        })
        .into_iter()
        .flatten()
        .collect();

    info!(
        column = %column.name(),
        threshold,
        outliers = rows.len(),
        "Outliers above threshold extracted"
    );
    OutlierSet { threshold, rows }
}

/// The `k` rows with the largest `column` value, descending. Equal values
/// keep source order.
pub fn top_n(ctx: &ExecutionContext, dataset: &Dataset, column: Column, k: usize) -> TopNSet {
    if k == 0 {
        return TopNSet { k, rows: Vec::new() };
    }

    // Partitions are contiguous and returned in order, so concatenating the
    // partition winners keeps source order among ties.
    let candidates: Vec<Transaction> = ctx
        .map_partitions(dataset, |partition| {
            let mut best: Vec<&Transaction> = partition.iter().collect();
            best.sort_by(|a, b| descending(a.value(column), b.value(column)));
            best.truncate(k);
            best.into_iter().cloned().collect::<Vec<_>>()
        })
        .into_iter()
        .flatten()
        .collect();

    let mut rows = candidates;
    rows.sort_by(|a, b| descending(a.value(column), b.value(column)));
    rows.truncate(k);

    info!(column = %column.name(), k, rows = rows.len(), "Top transactions extracted");
    TopNSet { k, rows }
}

/// Descending total order; NaN sorts last
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}
