use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::ledger::RecordSource;
use crate::logs::models::LogRecord;
use crate::logs::query::{LogPage, LogQuery};

/// SQLite-backed store of full log records
#[derive(Clone)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        // SQLite creates the file but not its directory
        if let Some(path) = database_url.strip_prefix("sqlite:") {
            if !path.starts_with(':') {
                let normalized = path.trim_start_matches("//");
                let file = normalized.split('?').next().unwrap_or(normalized);
                if let Some(parent) = std::path::Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        LedgerError::Database(format!("Failed to create database directory {}: {}", parent.display(), e))
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!("Connected to log database {}", database_url);
        Ok(Self { pool })
    }

    /// Private in-memory database, migrated and ready
    pub async fn new_in_memory() -> Result<Self> {
        // Every connection to :memory: is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn insert(&self, record: &LogRecord) -> Result<()> {
        let document = serde_json::to_string(record)?;

        sqlx::query(
            r#"
            INSERT INTO logs (id, log_type, severity, is_anomaly, timestamp_ms, document)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.log_type.as_str())
        .bind(record.severity.as_str())
        .bind(record.is_anomaly)
        .bind(record.timestamp.timestamp_millis())
        .bind(document)
        .execute(&self.pool)
        .await?;

        debug!("Stored log record {}", record.id);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<LogRecord>> {
        let document: Option<String> = sqlx::query_scalar("SELECT document FROM logs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match document {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    pub async fn query(&self, query: &LogQuery) -> Result<LogPage> {
        query.range.validate()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM logs");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT document FROM logs");
        push_filters(&mut select, query);
        select
            .push(" ORDER BY timestamp_ms DESC, id ASC LIMIT ")
            .push_bind(i64::from(query.limit()))
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);
        let documents: Vec<String> = select.build_query_scalar().fetch_all(&self.pool).await?;

        let logs = documents
            .iter()
            .map(|doc| serde_json::from_str(doc))
            .collect::<std::result::Result<Vec<LogRecord>, _>>()?;

        Ok(LogPage::new(logs, total.max(0) as u64, query))
    }

    pub async fn anomalies(&self, page: u32, limit: u32) -> Result<LogPage> {
        self.query(&LogQuery::new().anomalies().paginate(page, limit)).await
    }

    /// Overwrite a stored record in place, bypassing the ledger. Only for
    /// exercising tamper detection.
    #[cfg(any(test, feature = "test-util"))]
    pub async fn replace_document(&self, record: &LogRecord) -> Result<bool> {
        let document = serde_json::to_string(record)?;
        let result = sqlx::query("UPDATE logs SET document = ? WHERE id = ?")
            .bind(document)
            .bind(record.id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &LogQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(log_type) = query.log_type {
        builder.push(" AND log_type = ").push_bind(log_type.as_str());
    }
    if let Some(severity) = query.severity {
        builder.push(" AND severity = ").push_bind(severity.as_str());
    }
    if let Some(from) = query.range.from {
        builder.push(" AND timestamp_ms >= ").push_bind(from.timestamp_millis());
    }
    if let Some(to) = query.range.to {
        builder.push(" AND timestamp_ms <= ").push_bind(to.timestamp_millis());
    }
    if query.anomalies_only {
        builder.push(" AND is_anomaly = 1");
    }
}

#[async_trait]
impl RecordSource for LogStore {
    async fn fetch_payload(&self, entry_id: &str) -> Result<Option<Value>> {
        self.get(entry_id)
            .await?
            .map(|record| record.payload())
            .transpose()
    }
}
