use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use crate::models::resume::{AnalysisRecord, AnalysisStatus};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Object storage error: {0}")]
    Object(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Corrupt record {resume_id}: {reason}")]
    Corrupt { resume_id: String, reason: String },
}

/// Persisted analysis records keyed by `resume_id`.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn create(&self, record: &AnalysisRecord) -> Result<(), StoreError>;

    async fn get(&self, resume_id: &str) -> Result<Option<AnalysisRecord>, StoreError>;

    async fn mark_completed(&self, resume_id: &str, results: &Value) -> Result<(), StoreError>;

    async fn mark_failed(&self, resume_id: &str, message: &str) -> Result<(), StoreError>;
}

/// PostgreSQL-backed store. The table name comes from configuration and is
/// validated as a plain identifier before it reaches this type.
#[derive(Clone)]
pub struct PgAnalysisStore {
    pool: PgPool,
    table: String,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                resume_id        TEXT PRIMARY KEY,
                object_key       TEXT NOT NULL,
                file_name        TEXT NOT NULL,
                status           TEXT NOT NULL,
                analysis_results JSONB,
                error_message    TEXT,
                uploaded_at      TIMESTAMPTZ NOT NULL,
                analyzed_at      TIMESTAMPTZ
            )
            "#,
            table = self.table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        info!("Analysis table '{}' ready", self.table);
        Ok(())
    }

    async fn finish(
        &self,
        resume_id: &str,
        status: AnalysisStatus,
        results: Option<&Value>,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let sql = format!(
            "UPDATE {} SET status = $1, analysis_results = $2, error_message = $3, analyzed_at = $4 \
             WHERE resume_id = $5",
            self.table
        );
        let outcome = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(results)
            .bind(message)
            .bind(Utc::now())
            .bind(resume_id)
            .execute(&self.pool)
            .await?;
        if outcome.rows_affected() == 0 {
            return Err(StoreError::NotFound(resume_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn create(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (resume_id, object_key, file_name, status, analysis_results, \
             error_message, uploaded_at, analyzed_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&record.resume_id)
            .bind(&record.object_key)
            .bind(&record.file_name)
            .bind(&record.status)
            .bind(&record.analysis_results)
            .bind(&record.error_message)
            .bind(record.uploaded_at)
            .bind(record.analyzed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, resume_id: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        let sql = format!("SELECT * FROM {} WHERE resume_id = $1", self.table);
        let record = sqlx::query_as::<_, AnalysisRecord>(&sql)
            .bind(resume_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn mark_completed(&self, resume_id: &str, results: &Value) -> Result<(), StoreError> {
        self.finish(resume_id, AnalysisStatus::Completed, Some(results), None)
            .await
    }

    async fn mark_failed(&self, resume_id: &str, message: &str) -> Result<(), StoreError> {
        self.finish(resume_id, AnalysisStatus::Failed, None, Some(message))
            .await
    }
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct InMemoryAnalysisStore {
    records: DashMap<String, AnalysisRecord>,
}

impl InMemoryAnalysisStore {
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    fn finish(
        &self,
        resume_id: &str,
        status: AnalysisStatus,
        results: Option<&Value>,
        message: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut record = self
            .records
            .get_mut(resume_id)
            .ok_or_else(|| StoreError::NotFound(resume_id.to_string()))?;
        record.status = status.as_str().to_string();
        record.analysis_results = results.cloned();
        record.error_message = message.map(String::from);
        record.analyzed_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn create(&self, record: &AnalysisRecord) -> Result<(), StoreError> {
        self.records
            .insert(record.resume_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, resume_id: &str) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(self.records.get(resume_id).map(|r| r.clone()))
    }

    async fn mark_completed(&self, resume_id: &str, results: &Value) -> Result<(), StoreError> {
        self.finish(resume_id, AnalysisStatus::Completed, Some(results), None)
    }

    async fn mark_failed(&self, resume_id: &str, message: &str) -> Result<(), StoreError> {
        self.finish(resume_id, AnalysisStatus::Failed, None, Some(message))
    }
}
