//! Configuration management for the fraud analysis job
//!
//! Values come from built-in defaults, an optional `config/fraud_analysis.toml`
//! and the process environment, in increasing precedence. Environment
//! variables use the upper-case form of each key (`RDS_HOST` → `rds_host`).

use crate::analysis::AnalysisSettings;
use crate::context::ExecutionSettings;
use crate::coordinator::OutputLayout;
use crate::sink::PostgresSettings;
use crate::storage::ObjectStore;
use anyhow::{bail, ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE: &str = "config/fraud_analysis.toml";

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// A credential that never shows up in `Debug` output
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bucket receiving the primary result sets
    pub s3_bucket: Option<String>,
    /// Account id used to derive the raw-data bucket
    pub aws_account_id: Option<String>,
    /// Dataset location override
    pub source_path: Option<String>,
    /// Local directory standing in for the object store
    pub object_store_root: String,

    #[serde(default)]
    pub rds_host: String,
    pub rds_port: u16,
    pub rds_database: String,
    pub rds_user: String,
    #[serde(default)]
    pub rds_password: Secret,
    pub rds_connect_timeout_secs: u64,

    /// Outlier percentile in [0, 1]
    pub outlier_quantile: f64,
    /// Rank error tolerance of the percentile sketch
    pub outlier_relative_error: f64,
    pub top_n: usize,
    /// Rows per partition
    pub partition_rows: usize,
    /// Analysis threads; 0 uses every core
    pub workers: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the default file and the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(CONFIG_FILE, Environment::default())
    }

    /// Load configuration from a specific file and environment source
    pub fn load_from<P: AsRef<Path>>(path: P, env: Environment) -> Result<Self> {
        let config = Config::builder()
            .set_default("object_store_root", "./object-store")?
            .set_default("rds_port", 5433)?
            .set_default("rds_database", "fraud_detection")?
            .set_default("rds_user", "wsadmin")?
            .set_default("rds_connect_timeout_secs", 10)?
            .set_default("outlier_quantile", 0.99)?
            .set_default("outlier_relative_error", 0.01)?
            .set_default("top_n", 10)?
            .set_default("partition_rows", 65_536)?
            .set_default("workers", 0)?
            .set_default("log_level", "info")?
            .set_default("log_format", "pretty")?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(env)
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app.validate()?;
        Ok(app)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.rds_host.trim().is_empty(), "RDS_HOST must be set");
        ensure!(!self.rds_password.expose().is_empty(), "RDS_PASSWORD must be set");
        ensure!(
            (0.0..=1.0).contains(&self.outlier_quantile),
            "OUTLIER_QUANTILE must be in [0, 1], got {}",
            self.outlier_quantile
        );
        ensure!(
            self.outlier_relative_error > 0.0 && self.outlier_relative_error < 1.0,
            "OUTLIER_RELATIVE_ERROR must be in (0, 1), got {}",
            self.outlier_relative_error
        );
        ensure!(self.partition_rows > 0, "PARTITION_ROWS must be positive");
        self.output_bucket()?;
        self.source_location()?;
        Ok(())
    }

    fn raw_bucket(&self) -> Option<String> {
        self.aws_account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("ws-cc-raw-data-{}", id))
    }

    /// Bucket for the primary result sets
    pub fn output_bucket(&self) -> Result<String> {
        if let Some(bucket) = self.s3_bucket.as_deref().filter(|b| !b.is_empty()) {
            return Ok(bucket.to_string());
        }
        match self.raw_bucket() {
            Some(bucket) => Ok(bucket),
            None => bail!("either S3_BUCKET or AWS_ACCOUNT_ID must be set"),
        }
    }

    /// Dataset location: `SOURCE_PATH`, else `creditcard.csv` in the raw bucket
    pub fn source_location(&self) -> Result<String> {
        if let Some(path) = self.source_path.as_deref().filter(|p| !p.is_empty()) {
            return Ok(path.to_string());
        }
        let bucket = match self.raw_bucket() {
            Some(bucket) => bucket,
            None => self.output_bucket()?,
        };
        Ok(format!("s3://{}/data/creditcard.csv", bucket))
    }

    pub fn object_store(&self) -> ObjectStore {
        ObjectStore::new(&self.object_store_root)
    }

    pub fn output_layout(&self) -> Result<OutputLayout> {
        Ok(OutputLayout::for_bucket(&self.output_bucket()?))
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            quantile: self.outlier_quantile,
            relative_error: self.outlier_relative_error,
            top_n: self.top_n,
        }
    }

    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            workers: self.workers,
        }
    }

    pub fn postgres_settings(&self) -> PostgresSettings {
        PostgresSettings {
            host: self.rds_host.clone(),
            port: self.rds_port,
            database: self.rds_database.clone(),
            user: self.rds_user.clone(),
            password: self.rds_password.expose().to_string(),
            connect_timeout: Duration::from_secs(self.rds_connect_timeout_secs),
        }
    }
}
