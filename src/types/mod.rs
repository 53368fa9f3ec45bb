//! Type definitions for the fraud analysis job

pub mod report;
pub mod transaction;

pub use report::{Metric, OutlierSet, SummaryReport, TopNSet};
pub use transaction::{Column, Transaction, TransactionClass};
