//! Per-thread output persistence
//!
//! Each run thread owns at most one [`OutputRecord`]: the document the
//! writing team produced and the chart the chart team rendered. Updates to a
//! missing record fail with [`CohortError::NotFound`]; only
//! [`OutputStore::upsert_content`] and [`OutputStore::ensure`] create one.

use crate::db::Database;
use crate::error::{CohortError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sqlx::Row;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub thread_id: String,
    pub content: String,
    /// `data:` URL of the rendered chart
    pub chart: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutputRecord {
    fn empty(thread_id: &str) -> Self {
        let now = Utc::now();
        Self {
            thread_id: thread_id.to_string(),
            content: String::new(),
            chart: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait OutputStore: Send + Sync {
    async fn read(&self, thread_id: &str) -> Result<Option<OutputRecord>>;

    /// Create an empty record unless one exists
    async fn ensure(&self, thread_id: &str) -> Result<()>;

    /// Create or replace the document content
    async fn upsert_content(&self, thread_id: &str, content: &str) -> Result<OutputRecord>;

    /// Replace the content of an existing record
    async fn update_content(&self, thread_id: &str, content: &str) -> Result<OutputRecord>;

    /// Attach a chart to an existing record
    async fn update_chart(&self, thread_id: &str, chart: &str) -> Result<OutputRecord>;
}

fn missing(thread_id: &str) -> CohortError {
    CohortError::NotFound(format!("no output record for thread {}", thread_id))
}

/// Process-local store used when the database is disabled, and in tests
#[derive(Default)]
pub struct InMemoryOutputStore {
    records: Mutex<HashMap<String, OutputRecord>>,
}

impl InMemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn modify(
        &self,
        thread_id: &str,
        apply: impl FnOnce(&mut OutputRecord),
    ) -> Result<OutputRecord> {
        let mut records = self.records.lock();
        let record = records.get_mut(thread_id).ok_or_else(|| missing(thread_id))?;
        apply(record);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

#[async_trait]
impl OutputStore for InMemoryOutputStore {
    async fn read(&self, thread_id: &str) -> Result<Option<OutputRecord>> {
        Ok(self.records.lock().get(thread_id).cloned())
    }

    async fn ensure(&self, thread_id: &str) -> Result<()> {
        self.records
            .lock()
            .entry(thread_id.to_string())
            .or_insert_with(|| OutputRecord::empty(thread_id));
        Ok(())
    }

    async fn upsert_content(&self, thread_id: &str, content: &str) -> Result<OutputRecord> {
        let mut records = self.records.lock();
        let record = records
            .entry(thread_id.to_string())
            .or_insert_with(|| OutputRecord::empty(thread_id));
        record.content = content.to_string();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn update_content(&self, thread_id: &str, content: &str) -> Result<OutputRecord> {
        self.modify(thread_id, |r| r.content = content.to_string())
    }

    async fn update_chart(&self, thread_id: &str, chart: &str) -> Result<OutputRecord> {
        self.modify(thread_id, |r| r.chart = Some(chart.to_string()))
    }
}

/// SQLite-backed store over the `outputs` table
#[derive(Clone)]
pub struct SqliteOutputStore {
    db: Database,
}

impl SqliteOutputStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| CohortError::Database(sqlx::Error::Decode(Box::new(e))))
    }

    async fn fetch(&self, thread_id: &str) -> Result<Option<OutputRecord>> {
        let row = sqlx::query(
            "SELECT thread_id, content, chart, created_at, updated_at FROM outputs WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        Ok(Some(OutputRecord {
            thread_id: row.try_get("thread_id")?,
            content: row.try_get("content")?,
            chart: row.try_get("chart")?,
            created_at: Self::parse_time(&created_at)?,
            updated_at: Self::parse_time(&updated_at)?,
        }))
    }

    async fn fetch_existing(&self, thread_id: &str) -> Result<OutputRecord> {
        self.fetch(thread_id).await?.ok_or_else(|| missing(thread_id))
    }
}

#[async_trait]
impl OutputStore for SqliteOutputStore {
    async fn read(&self, thread_id: &str) -> Result<Option<OutputRecord>> {
        self.fetch(thread_id).await
    }

    async fn ensure(&self, thread_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO outputs (thread_id, content, chart, created_at, updated_at)
             VALUES (?, '', NULL, ?, ?)
             ON CONFLICT(thread_id) DO NOTHING",
        )
        .bind(thread_id)
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    async fn upsert_content(&self, thread_id: &str, content: &str) -> Result<OutputRecord> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO outputs (thread_id, content, chart, created_at, updated_at)
             VALUES (?, ?, NULL, ?, ?)
             ON CONFLICT(thread_id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
        )
        .bind(thread_id)
        .bind(content)
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await?;

        self.fetch_existing(thread_id).await
    }

    async fn update_content(&self, thread_id: &str, content: &str) -> Result<OutputRecord> {
        let result = sqlx::query("UPDATE outputs SET content = ?, updated_at = ? WHERE thread_id = ?")
            .bind(content)
            .bind(Utc::now().to_rfc3339())
            .bind(thread_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(missing(thread_id));
        }
        self.fetch_existing(thread_id).await
    }

    async fn update_chart(&self, thread_id: &str, chart: &str) -> Result<OutputRecord> {
        let result = sqlx::query("UPDATE outputs SET chart = ?, updated_at = ? WHERE thread_id = ?")
            .bind(chart)
            .bind(Utc::now().to_rfc3339())
            .bind(thread_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(missing(thread_id));
        }
        self.fetch_existing(thread_id).await
    }
}
