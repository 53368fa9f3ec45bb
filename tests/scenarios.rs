//! End-to-end runs over a CSV dataset in a temporary object store.

use fraud_analysis::analysis::AnalysisSettings;
use fraud_analysis::context::ExecutionSettings;
use fraud_analysis::coordinator::{CoordinatorState, OutputLayout, PersistenceCoordinator};
use fraud_analysis::error::AnalysisError;
use fraud_analysis::job::{AnalysisJob, JobStatus};
use fraud_analysis::sink::object_store::{PART_FILE, SUCCESS_MARKER};
use fraud_analysis::sink::{MemorySink, ParquetObjectStore, PostgresSettings, PostgresSink, SecondarySink};
use fraud_analysis::source::CsvDatasetSource;
use fraud_analysis::storage::ObjectStore;
use fraud_analysis::types::report::*;
use fraud_analysis::types::transaction::FEATURE_COUNT;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const BUCKET: &str = "ws-cc-raw-data-000000000000";
const SOURCE: &str = "s3://ws-cc-raw-data-000000000000/data/creditcard.csv";

/// Write `(amount, class)` rows as a creditcard CSV into the store
fn write_dataset(root: &Path, rows: &[(f64, u8)]) {
    let mut csv = String::from("Time");
    for i in 1..=FEATURE_COUNT {
        write!(csv, ",V{}", i).unwrap();
    }
    csv.push_str(",Amount,Class\n");
    for (i, (amount, class)) in rows.iter().enumerate() {
        write!(csv, "{}", i).unwrap();
        for _ in 0..FEATURE_COUNT {
            csv.push_str(",0.5");
        }
        writeln!(csv, ",{},\"{}\"", amount, class).unwrap();
    }

    let path = root.join(BUCKET).join("data/creditcard.csv");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, csv).unwrap();
}

fn scenario_a_rows() -> Vec<(f64, u8)> {
    let mut rows = vec![(0.0, 0); 990];
    rows.extend(vec![(1000.0, 1); 10]);
    rows
}

fn job<S: SecondarySink>(
    root: &Path,
    secondary: S,
    settings: AnalysisSettings,
) -> AnalysisJob<CsvDatasetSource, ParquetObjectStore, S> {
    let store = ObjectStore::new(root);
    AnalysisJob::new(
        CsvDatasetSource::new(store.clone(), SOURCE).with_partition_rows(128),
        PersistenceCoordinator::new(
            ParquetObjectStore::new(store),
            secondary,
            OutputLayout::for_bucket(BUCKET),
        ),
        settings,
        ExecutionSettings { workers: 2 },
    )
}

#[tokio::test]
async fn test_balanced_dataset_is_profiled_and_persisted() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &scenario_a_rows());
    let secondary = MemorySink::new();

    let mut job = job(dir.path(), secondary.clone(), AnalysisSettings::default());
    let report = job.run().await.unwrap();

    assert_eq!(report.status, JobStatus::Success);
    let summary = &report.results.summary;
    assert_eq!(summary.get(TOTAL_TRANSACTIONS), Some(1000.0));
    assert_eq!(summary.get(FRAUD_COUNT), Some(10.0));
    assert_eq!(summary.get(NORMAL_COUNT), Some(990.0));
    assert_eq!(summary.get(FRAUD_PERCENTAGE), Some(1.0));
    assert_eq!(summary.get(FRAUD_AVG_AMOUNT), Some(1000.0));
    assert_eq!(summary.get(NORMAL_AVG_AMOUNT), Some(0.0));

    let layout = OutputLayout::for_bucket(BUCKET);
    let primary = ParquetObjectStore::new(ObjectStore::new(dir.path()));
    assert_eq!(&primary.read_summary(&layout.summary()).unwrap(), summary);
    assert_eq!(
        primary.read_transactions(&layout.top_outliers()).unwrap(),
        report.results.top.rows
    );
    assert_eq!(secondary.summary(SUMMARY_TABLE_NAME).as_ref(), Some(summary));
}

const SUMMARY_TABLE_NAME: &str = fraud_analysis::sink::SUMMARY_TABLE;

#[tokio::test]
async fn test_unreachable_secondary_keeps_primary_results() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &scenario_a_rows());

    let mut job = job(dir.path(), MemorySink::new().unreachable(), AnalysisSettings::default());
    let report = job.run().await.unwrap();

    assert_eq!(report.status, JobStatus::SuccessWithWarning);
    assert_eq!(job.coordinator().state(), CoordinatorState::Done);

    let layout = OutputLayout::for_bucket(BUCKET);
    let primary = ParquetObjectStore::new(ObjectStore::new(dir.path()));
    assert_eq!(
        primary.read_summary(&layout.summary()).unwrap(),
        report.results.summary
    );
    assert_eq!(
        primary.read_transactions(&layout.outliers()).unwrap(),
        report.results.outliers.rows
    );
}

#[tokio::test]
async fn test_refused_database_connection_is_a_warning() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &scenario_a_rows());
    let postgres = PostgresSink::new(PostgresSettings {
        host: "127.0.0.1".to_string(),
        port: 1,
        database: "fraud_detection".to_string(),
        user: "wsadmin".to_string(),
        password: "unused".to_string(),
        connect_timeout: Duration::from_secs(1),
    });

    let mut job = job(dir.path(), postgres, AnalysisSettings::default());
    let report = job.run().await.unwrap();

    assert_eq!(report.status, JobStatus::SuccessWithWarning);
    assert_eq!(report.warning.map(|w| w.table), Some(SUMMARY_TABLE_NAME));

    let summary_dir = dir
        .path()
        .join(BUCKET)
        .join("output/fraud_analysis_result/summary");
    assert!(summary_dir.join(PART_FILE).is_file());
    assert!(summary_dir.join(SUCCESS_MARKER).is_file());
}

#[tokio::test]
async fn test_empty_dataset_aborts_without_output() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &[]);
    let secondary = MemorySink::new();

    let mut job = job(dir.path(), secondary.clone(), AnalysisSettings::default());
    let err = job.run().await.unwrap_err();

    assert!(matches!(err, AnalysisError::EmptyDataset(_)));
    assert_eq!(job.coordinator().state(), CoordinatorState::Aborted);
    assert!(!dir.path().join(BUCKET).join("output").exists());
    assert!(secondary.writes().is_empty());
}

#[tokio::test]
async fn test_single_large_amount_is_the_only_outlier() {
    let dir = TempDir::new().unwrap();
    let mut rows = vec![(10.0, 0); 1000];
    rows[500] = (5000.0, 1);
    write_dataset(dir.path(), &rows);

    let settings = AnalysisSettings {
        relative_error: 0.005,
        ..AnalysisSettings::default()
    };
    let mut job = job(dir.path(), MemorySink::new(), settings);
    let report = job.run().await.unwrap();

    let outliers = &report.results.outliers;
    assert_eq!(outliers.threshold, 10.0);
    assert_eq!(outliers.len(), 1);
    assert_eq!(outliers.rows[0].amount, 5000.0);
    assert_eq!(outliers.rows[0].time, 500.0);
    assert_eq!(report.results.summary.get(OUTLIER_COUNT), Some(1.0));
}

#[tokio::test]
async fn test_single_large_amount_with_default_settings() {
    let dir = TempDir::new().unwrap();
    let mut rows = vec![(10.0, 0); 1000];
    rows[500] = (5000.0, 1);
    write_dataset(dir.path(), &rows);

    let mut job = job(dir.path(), MemorySink::new(), AnalysisSettings::default());
    let report = job.run().await.unwrap();

    let outliers = &report.results.outliers;
    assert_eq!(outliers.threshold, 10.0);
    assert_eq!(outliers.len(), 1);
    assert_eq!(outliers.rows[0].time, 500.0);

    let primary = ParquetObjectStore::new(ObjectStore::new(dir.path()));
    let stored = primary
        .read_transactions(&OutputLayout::for_bucket(BUCKET).outliers())
        .unwrap();
    assert_eq!(stored, outliers.rows);
}

#[tokio::test]
async fn test_rerun_replaces_previous_results() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), &scenario_a_rows());

    let first = job(dir.path(), MemorySink::new(), AnalysisSettings::default())
        .run()
        .await
        .unwrap();
    let second = job(dir.path(), MemorySink::new(), AnalysisSettings::default())
        .run()
        .await
        .unwrap();
    assert_eq!(first.results.summary, second.results.summary);

    let layout = OutputLayout::for_bucket(BUCKET);
    let primary = ParquetObjectStore::new(ObjectStore::new(dir.path()));
    assert_eq!(
        primary.read_summary(&layout.summary()).unwrap(),
        second.results.summary
    );

    let mut entries: Vec<String> = fs::read_dir(dir.path().join(BUCKET).join("output/fraud_analysis_result"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    assert_eq!(entries, vec!["outliers", "summary", "top_outliers"]);
}
