//! Primary sink: Parquet result sets in the object store
//!
//! Each result set is a directory holding `part-00000.parquet` and an empty
//! `_SUCCESS` marker. A write lands in a staging directory next to the
//! target and is swapped in only once complete, so a failed write never
//! leaves a half-written result set behind.

use crate::error::SinkError;
use crate::sink::PrimarySink;
use crate::storage::ObjectStore;
use crate::types::report::SummaryReport;
use crate::types::transaction::{Transaction, TransactionClass, FEATURE_COUNT};
use arrow::array::{Array, ArrayRef, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const PART_FILE: &str = "part-00000.parquet";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Parquet writer over the local object store
#[derive(Debug, Clone)]
pub struct ParquetObjectStore {
    store: ObjectStore,
}

impl ParquetObjectStore {
    pub fn new(store: ObjectStore) -> Self {
        Self { store }
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, SinkError> {
        self.store
            .resolve(location)
            .ok_or_else(|| SinkError::InvalidLocation(location.to_string()))
    }

    fn write_batch(&self, location: &str, batch: &RecordBatch) -> Result<(), SinkError> {
        let target = self.resolve(location)?;
        let (parent, name) = match (target.parent(), target.file_name()) {
            (Some(parent), Some(name)) => (parent, name.to_string_lossy()),
            _ => return Err(SinkError::InvalidLocation(location.to_string())),
        };

        fs::create_dir_all(parent)?;
        let staging = parent.join(format!(".{}.staging-{}", name, Uuid::new_v4()));
        fs::create_dir_all(&staging)?;

        let result = write_part(&staging, batch).and_then(|()| swap_into_place(&staging, &target));
        if result.is_err() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %e, "Failed to clean up staging directory");
            }
        }
        result?;

        info!(
            location = %location,
            rows = batch.num_rows(),
            "Result set written"
        );
        Ok(())
    }

    fn read_batches(&self, location: &str) -> Result<Vec<RecordBatch>, SinkError> {
        let path = self.resolve(location)?.join(PART_FILE);
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?.build()?;
        Ok(reader.collect::<Result<Vec<_>, _>>()?)
    }

    /// Read a summary result set back
    pub fn read_summary(&self, location: &str) -> Result<SummaryReport, SinkError> {
        let mut report = SummaryReport::new();
        for batch in self.read_batches(location)? {
            let metrics = string_column(&batch, "metric")?;
            let values = f64_column(&batch, "value")?;
            for row in 0..batch.num_rows() {
                report.push(metrics.value(row), values.value(row));
            }
        }
        Ok(report)
    }

    /// Read a transaction result set back, in stored order
    pub fn read_transactions(&self, location: &str) -> Result<Vec<Transaction>, SinkError> {
        let mut rows = Vec::new();
        for batch in self.read_batches(location)? {
            let time = f64_column(&batch, "Time")?;
            let amount = f64_column(&batch, "Amount")?;
            let class = batch
                .column_by_name("Class")
                .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
                .ok_or_else(|| column_error("Class"))?;
            let features = (1..=FEATURE_COUNT)
                .map(|i| f64_column(&batch, &format!("V{}", i)))
                .collect::<Result<Vec<_>, _>>()?;

            for row in 0..batch.num_rows() {
                let mut values = [0.0; FEATURE_COUNT];
                for (slot, column) in values.iter_mut().zip(&features) {
                    *slot = column.value(row);
                }
                let label = TransactionClass::from_label(class.value(row) as i64)
                    .ok_or_else(|| column_error("Class"))?;
                rows.push(
                    Transaction::new(time.value(row), amount.value(row), label).with_features(values),
                );
            }
        }
        Ok(rows)
    }
}

impl PrimarySink for ParquetObjectStore {
    fn write_summary(&self, location: &str, report: &SummaryReport) -> Result<(), SinkError> {
        self.write_batch(location, &summary_batch(report)?)
    }

    fn write_transactions(&self, location: &str, rows: &[Transaction]) -> Result<(), SinkError> {
        self.write_batch(location, &transaction_batch(rows)?)
    }
}

fn write_part(dir: &Path, batch: &RecordBatch) -> Result<(), SinkError> {
    let file = File::create(dir.join(PART_FILE))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;

    File::create(dir.join(SUCCESS_MARKER))?;
    debug!(path = %dir.display(), "Staged result set");
    Ok(())
}

/// Replace `target` with the fully written `staging` directory
fn swap_into_place(staging: &Path, target: &Path) -> Result<(), SinkError> {
    if target.is_dir() {
        fs::remove_dir_all(target)?;
    } else if target.exists() {
        fs::remove_file(target)?;
    }
    fs::rename(staging, target)?;
    Ok(())
}

pub fn summary_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("metric", DataType::Utf8, false),
        Field::new("value", DataType::Float64, false),
    ]))
}

pub fn transaction_schema() -> SchemaRef {
    let mut fields = Vec::with_capacity(FEATURE_COUNT + 3);
    fields.push(Field::new("Time", DataType::Float64, false));
    for i in 1..=FEATURE_COUNT {
        fields.push(Field::new(format!("V{}", i), DataType::Float64, false));
    }
    fields.push(Field::new("Amount", DataType::Float64, false));
    fields.push(Field::new("Class", DataType::Int32, false));
    Arc::new(Schema::new(fields))
}

fn summary_batch(report: &SummaryReport) -> Result<RecordBatch, SinkError> {
    let metrics = report.metrics();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            metrics.iter().map(|m| m.metric.as_str()),
        )),
        Arc::new(Float64Array::from_iter_values(metrics.iter().map(|m| m.value))),
    ];
    Ok(RecordBatch::try_new(summary_schema(), columns)?)
}

fn transaction_batch(rows: &[Transaction]) -> Result<RecordBatch, SinkError> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(FEATURE_COUNT + 3);
    columns.push(Arc::new(Float64Array::from_iter_values(
        rows.iter().map(|t| t.time),
    )));
    for i in 0..FEATURE_COUNT {
        columns.push(Arc::new(Float64Array::from_iter_values(
            rows.iter().map(|t| t.features[i]),
        )));
    }
    columns.push(Arc::new(Float64Array::from_iter_values(
        rows.iter().map(|t| t.amount),
    )));
    columns.push(Arc::new(Int32Array::from_iter_values(
        rows.iter().map(|t| t.class.label()),
    )));
    Ok(RecordBatch::try_new(transaction_schema(), columns)?)
}

fn f64_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b Float64Array, SinkError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| column_error(name))
}

fn string_column<'b>(batch: &'b RecordBatch, name: &str) -> Result<&'b StringArray, SinkError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| column_error(name))
}

fn column_error(name: &str) -> SinkError {
    SinkError::Rejected(format!("stored result set has no readable '{}' column", name))
}
