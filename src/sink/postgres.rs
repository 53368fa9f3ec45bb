//! Secondary sink: PostgreSQL tables in overwrite mode
//!
//! Each write drops and recreates its table and inserts the rows inside one
//! transaction. The connection pool is created on first use, so an
//! unreachable database surfaces as a write error rather than a startup
//! failure.

use crate::error::SinkError;
use crate::sink::{SecondarySink, SUMMARY_TABLE, TOP_OUTLIERS_TABLE};
use crate::types::report::{SummaryReport, TopNSet};
use crate::types::transaction::FEATURE_COUNT;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// Relational connection parameters
#[derive(Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for PostgresSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl PostgresSettings {
    /// Connection URL without credentials, safe to log
    pub fn display_url(&self) -> String {
        format!(
            "postgresql://{}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

pub struct PostgresSink {
    settings: PostgresSettings,
    pool: OnceCell<PgPool>,
}

impl PostgresSink {
    pub fn new(settings: PostgresSettings) -> Self {
        Self {
            settings,
            pool: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &PostgresSettings {
        &self.settings
    }

    async fn pool(&self) -> Result<&PgPool, SinkError> {
        let pool = self
            .pool
            .get_or_try_init(|| async {
                let s = &self.settings;
                info!(url = %s.display_url(), "Connecting to relational sink");
                let options = PgConnectOptions::new()
                    .host(&s.host)
                    .port(s.port)
                    .database(&s.database)
                    .username(&s.user)
                    .password(&s.password);
                PgPoolOptions::new()
                    .max_connections(2)
                    .acquire_timeout(s.connect_timeout)
                    .connect_with(options)
                    .await
            })
            .await?;
        Ok(pool)
    }
}

/// Bind parameters PostgreSQL accepts in one statement
const BIND_LIMIT: usize = u16::MAX as usize;

/// Rows per multi-row INSERT that stay under the bind limit
fn rows_per_insert(columns: usize) -> usize {
    (BIND_LIMIT / columns.max(1)).max(1)
}

fn top_outlier_columns() -> Vec<String> {
    let mut columns = Vec::with_capacity(FEATURE_COUNT + 3);
    columns.push("\"time\"".to_string());
    columns.extend((1..=FEATURE_COUNT).map(|i| format!("v{}", i)));
    columns.push("amount".to_string());
    columns.push("class".to_string());
    columns
}

fn create_top_outliers_sql() -> String {
    let defs: Vec<String> = top_outlier_columns()
        .into_iter()
        .map(|c| {
            let sql_type = if c == "class" { "INTEGER" } else { "DOUBLE PRECISION" };
            format!("{} {} NOT NULL", c, sql_type)
        })
        .collect();
    format!("CREATE TABLE {} ({})", TOP_OUTLIERS_TABLE, defs.join(", "))
}

#[async_trait]
impl SecondarySink for PostgresSink {
    async fn write_summary(&self, report: &SummaryReport) -> Result<(), SinkError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", SUMMARY_TABLE))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "CREATE TABLE {} (metric TEXT NOT NULL, value DOUBLE PRECISION NOT NULL)",
            SUMMARY_TABLE
        ))
        .execute(&mut *tx)
        .await?;

        if !report.is_empty() {
            let mut insert: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} (metric, value) ", SUMMARY_TABLE));
            insert.push_values(report.metrics(), |mut row, m| {
                row.push_bind(m.metric.clone()).push_bind(m.value);
            });
            insert.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!(table = SUMMARY_TABLE, rows = report.len(), "Relational table replaced");
        Ok(())
    }

    async fn write_top_outliers(&self, top: &TopNSet) -> Result<(), SinkError> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", TOP_OUTLIERS_TABLE))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&create_top_outliers_sql())
            .execute(&mut *tx)
            .await?;

        let columns = top_outlier_columns();
        let insert_sql = format!("INSERT INTO {} ({}) ", TOP_OUTLIERS_TABLE, columns.join(", "));
        for chunk in top.rows.chunks(rows_per_insert(columns.len())) {
            let mut insert: QueryBuilder<Postgres> = QueryBuilder::new(insert_sql.as_str());
            insert.push_values(chunk, |mut row, t| {
                row.push_bind(t.time);
                for value in t.features {
                    row.push_bind(value);
                }
                row.push_bind(t.amount).push_bind(t.class.label());
            });
            insert.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!(table = TOP_OUTLIERS_TABLE, rows = top.len(), "Relational table replaced");
        Ok(())
    }
}
