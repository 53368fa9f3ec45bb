//! Dataset source: loads the transaction CSV into an immutable, partitioned
//! in-memory dataset.

use crate::error::{AnalysisError, AnalysisResult, SourceError};
use crate::storage::ObjectStore;
use crate::types::transaction::{Transaction, TransactionClass, FEATURE_COUNT};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Default number of rows per partition
pub const DEFAULT_PARTITION_ROWS: usize = 65_536;

/// Immutable, partitioned collection of transactions for one run.
///
/// Cloning is cheap: all clones share the same rows.
#[derive(Debug, Clone)]
pub struct Dataset {
    rows: Arc<[Transaction]>,
    partition_rows: usize,
}

impl Dataset {
    pub fn new(rows: Vec<Transaction>, partition_rows: usize) -> Self {
        Self {
            rows: rows.into(),
            partition_rows: partition_rows.max(1),
        }
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn partition_rows(&self) -> usize {
        self.partition_rows
    }

    pub fn partition_count(&self) -> usize {
        self.rows.len().div_ceil(self.partition_rows)
    }

    /// Partitions in source order
    pub fn partitions(&self) -> std::slice::Chunks<'_, Transaction> {
        self.rows.chunks(self.partition_rows)
    }
}

/// Supplier of the run's dataset
pub trait DatasetSource: Send + Sync {
    /// Location the dataset is read from, for logging and errors
    fn location(&self) -> &str;

    /// Load and materialize the full dataset
    fn load(&self) -> AnalysisResult<Dataset>;
}

/// Column positions resolved from the CSV header
#[derive(Debug)]
struct ColumnIndex {
    time: usize,
    features: [usize; FEATURE_COUNT],
    amount: usize,
    class: usize,
}

impl ColumnIndex {
    fn from_header(header: &StringRecord) -> Result<Self, SourceError> {
        let find = |name: &str| -> Result<usize, SourceError> {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| SourceError::MissingColumn(name.to_string()))
        };

        let mut features = [0usize; FEATURE_COUNT];
        for (i, slot) in features.iter_mut().enumerate() {
            *slot = find(&format!("V{}", i + 1))?;
        }

        Ok(Self {
            time: find("Time")?,
            features,
            amount: find("Amount")?,
            class: find("Class")?,
        })
    }
}

/// Reads `Time, V1..V28, Amount, Class` CSV through the object store
pub struct CsvDatasetSource {
    store: ObjectStore,
    location: String,
    partition_rows: usize,
}

impl CsvDatasetSource {
    pub fn new(store: ObjectStore, location: &str) -> Self {
        Self {
            store,
            location: location.to_string(),
            partition_rows: DEFAULT_PARTITION_ROWS,
        }
    }

    pub fn with_partition_rows(mut self, partition_rows: usize) -> Self {
        self.partition_rows = partition_rows.max(1);
        self
    }

    fn read_rows(&self) -> Result<Vec<Transaction>, SourceError> {
        let path = self
            .store
            .resolve(&self.location)
            .ok_or_else(|| SourceError::InvalidLocation(self.location.clone()))?;

        debug!(path = %path.display(), "Opening dataset file");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_path(&path)?;

        let columns = ColumnIndex::from_header(reader.headers()?)?;

        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        let mut row: u64 = 0;
        while reader.read_record(&mut record)? {
            row += 1;
            rows.push(parse_record(&record, &columns, row)?);
        }

        Ok(rows)
    }
}

impl DatasetSource for CsvDatasetSource {
    fn location(&self) -> &str {
        &self.location
    }

    fn load(&self) -> AnalysisResult<Dataset> {
        let start = Instant::now();
        info!(location = %self.location, "Reading dataset");

        let rows = self.read_rows().map_err(|source| AnalysisError::DataAccess {
            location: self.location.clone(),
            source,
        })?;

        let dataset = Dataset::new(rows, self.partition_rows);
        info!(
            location = %self.location,
            rows = dataset.len(),
            partitions = dataset.partition_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset loaded"
        );

        Ok(dataset)
    }
}

fn parse_record(
    record: &StringRecord,
    columns: &ColumnIndex,
    row: u64,
) -> Result<Transaction, SourceError> {
    let mut features = [0.0; FEATURE_COUNT];
    for (i, value) in features.iter_mut().enumerate() {
        *value = number_field(record, columns.features[i], &format!("V{}", i + 1), row)?;
    }

    let raw_class = text_field(record, columns.class, "Class", row)?;
    let class = parse_label(raw_class).ok_or_else(|| SourceError::InvalidValue {
        row,
        column: "Class".to_string(),
        value: raw_class.to_string(),
    })?;

    Ok(Transaction {
        time: number_field(record, columns.time, "Time", row)?,
        features,
        amount: number_field(record, columns.amount, "Amount", row)?,
        class,
    })
}

fn text_field<'r>(
    record: &'r StringRecord,
    idx: usize,
    column: &str,
    row: u64,
) -> Result<&'r str, SourceError> {
    record.get(idx).ok_or_else(|| SourceError::InvalidValue {
        row,
        column: column.to_string(),
        value: String::new(),
    })
}

fn number_field(
    record: &StringRecord,
    idx: usize,
    column: &str,
    row: u64,
) -> Result<f64, SourceError> {
    let raw = text_field(record, idx, column, row)?;
    raw.parse::<f64>().map_err(|_| SourceError::InvalidValue {
        row,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

/// Accepts `0`/`1` and their float spellings (`0.0`, `1.0`)
fn parse_label(raw: &str) -> Option<TransactionClass> {
    if let Ok(label) = raw.parse::<i64>() {
        return TransactionClass::from_label(label);
    }
    match raw.parse::<f64>() {
        Ok(v) if v == 0.0 => Some(TransactionClass::Normal),
        Ok(v) if v == 1.0 => Some(TransactionClass::Fraud),
        _ => None,
    }
}
