//! Transaction record for the anonymized credit card dataset

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of anonymized PCA feature columns (`V1` .. `V28`)
pub const FEATURE_COUNT: usize = 28;

/// Binary class label of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionClass {
    /// Label 0
    Normal,
    /// Label 1
    Fraud,
}

impl TransactionClass {
    /// Parse the integer label used by the dataset
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            0 => Some(TransactionClass::Normal),
            1 => Some(TransactionClass::Fraud),
            _ => None,
        }
    }

    /// Integer label as written to the sinks
    pub fn label(self) -> i32 {
        match self {
            TransactionClass::Normal => 0,
            TransactionClass::Fraud => 1,
        }
    }

    pub fn is_fraud(self) -> bool {
        self == TransactionClass::Fraud
    }
}

impl fmt::Display for TransactionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionClass::Normal => write!(f, "normal"),
            TransactionClass::Fraud => write!(f, "fraud"),
        }
    }
}

/// Typed numeric column selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Seconds elapsed since the first transaction in the dataset
    Time,
    /// Anonymized feature `V{n}`, 1-based
    Feature(usize),
    /// Transaction amount
    Amount,
}

impl Column {
    /// Column name as it appears in the dataset header
    pub fn name(self) -> String {
        match self {
            Column::Time => "Time".to_string(),
            Column::Feature(n) => format!("V{}", n),
            Column::Amount => "Amount".to_string(),
        }
    }
}

/// A single card transaction. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Time offset in seconds
    pub time: f64,

    /// Anonymized features `V1` .. `V28`
    pub features: [f64; FEATURE_COUNT],

    /// Transaction amount (non-negative)
    pub amount: f64,

    /// Fraud label
    pub class: TransactionClass,
}

impl Transaction {
    /// Create a transaction with zeroed features
    pub fn new(time: f64, amount: f64, class: TransactionClass) -> Self {
        Self {
            time,
            features: [0.0; FEATURE_COUNT],
            amount,
            class,
        }
    }

    /// Attach feature values
    pub fn with_features(mut self, features: [f64; FEATURE_COUNT]) -> Self {
        self.features = features;
        self
    }

    /// Read a numeric column.
    ///
    /// Feature indices outside `1..=28` read as NaN, which never passes a
    /// comparison filter.
    pub fn value(&self, column: Column) -> f64 {
        match column {
            Column::Time => self.time,
            Column::Amount => self.amount,
            Column::Feature(n) if (1..=FEATURE_COUNT).contains(&n) => self.features[n - 1],
            Column::Feature(_) => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_labels() {
        assert_eq!(TransactionClass::from_label(0), Some(TransactionClass::Normal));
        assert_eq!(TransactionClass::from_label(1), Some(TransactionClass::Fraud));
        assert_eq!(TransactionClass::from_label(2), None);
        assert_eq!(TransactionClass::Fraud.label(), 1);
        assert!(!TransactionClass::Normal.is_fraud());
    }

    #[test]
    fn test_column_access() {
        let mut features = [0.0; FEATURE_COUNT];
        features[0] = -1.5;
        features[27] = 2.25;
        let tx = Transaction::new(10.0, 149.62, TransactionClass::Normal).with_features(features);

        assert_eq!(tx.value(Column::Time), 10.0);
        assert_eq!(tx.value(Column::Amount), 149.62);
        assert_eq!(tx.value(Column::Feature(1)), -1.5);
        assert_eq!(tx.value(Column::Feature(28)), 2.25);
        assert!(tx.value(Column::Feature(29)).is_nan());
        assert_eq!(Column::Feature(7).name(), "V7");
    }

    #[test]
    fn test_transaction_serialization() {
        let tx = Transaction::new(0.0, 2.69, TransactionClass::Fraud);

        let json = serde_json::to_string(&tx).unwrap();
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();

        assert_eq!(tx, deserialized);
        assert!(json.contains("\"fraud\""));
    }
}
