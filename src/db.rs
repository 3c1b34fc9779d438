use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::TryStreamExt;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, FromRow};
use tracing::debug;

use crate::error::StorageError;
use crate::models::Paste;
use crate::storage::{Storage, StorageResult};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS paste (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    language TEXT NOT NULL,
    created_at BIGINT NOT NULL,
    expires_at BIGINT
)";

const CREATE_EXPIRES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS paste_expires_at ON paste (expires_at)";

#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
}

/// A paste as stored, with timestamps in Unix milliseconds.
#[derive(FromRow)]
struct PasteRow {
    id: String,
    title: String,
    content: String,
    language: String,
    created_at: i64,
    expires_at: Option<i64>,
}

impl TryFrom<PasteRow> for Paste {
    type Error = StorageError;

    fn try_from(row: PasteRow) -> Result<Self, Self::Error> {
        let created_at = from_millis(&row.id, row.created_at)?;
        let expires_at = row
            .expires_at
            .map(|millis| from_millis(&row.id, millis))
            .transpose()?;
        Ok(Paste {
            id: row.id,
            title: row.title,
            content: row.content,
            language: row.language,
            created_at,
            expires_at,
        })
    }
}

impl Database {
    /// Connect to a database by URL and create the schema if needed.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        create_sqlite_parent_dir(url).await?;

        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .with_context(|| format!("failed to connect to database at {url}"))?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .context("failed to create paste table")?;
        sqlx::query(CREATE_EXPIRES_INDEX)
            .execute(&pool)
            .await
            .context("failed to create expiration index")?;

        Ok(Self { pool })
    }
}

impl Storage for Database {
    async fn insert(&self, paste: &Paste) -> StorageResult<bool> {
        let result = sqlx::query(
            "INSERT INTO paste (id, title, content, language, created_at, expires_at) VALUES \
             ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
        )
        .bind(paste.id.as_str())
        .bind(paste.title.as_str())
        .bind(paste.content.as_str())
        .bind(paste.language.as_str())
        .bind(paste.created_at.timestamp_millis())
        .bind(paste.expires_at.map(|deadline| deadline.timestamp_millis()))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fetch(&self, id: &str) -> StorageResult<Option<Paste>> {
        let row = sqlx::query_as::<_, PasteRow>(
            "SELECT id, title, content, language, created_at, expires_at FROM paste WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Paste::try_from).transpose()
    }

    async fn delete_expired(&self, id: &str, now: DateTime<Utc>) -> StorageResult<bool> {
        let result = sqlx::query(
            "DELETE FROM paste WHERE id = $1 AND expires_at IS NOT NULL AND expires_at <= $2",
        )
        .bind(id)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn scan_expirable(
        &self,
        cutoff: DateTime<Utc>,
    ) -> StorageResult<Vec<(String, DateTime<Utc>)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as::<_, (String, i64)>(
            "SELECT id, expires_at FROM paste WHERE expires_at IS NOT NULL AND expires_at <= $1",
        )
        .bind(cutoff.timestamp_millis())
        .fetch(&self.pool)
        .try_collect()
        .await?;

        rows.into_iter()
            .map(|(id, millis)| {
                let deadline = from_millis(&id, millis)?;
                Ok((id, deadline))
            })
            .collect()
    }
}

fn from_millis(id: &str, millis: i64) -> StorageResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StorageError::Corrupt {
            id: id.to_owned(),
            reason: format!("timestamp {millis} out of range"),
        })
}

/// SQLite creates missing database files but not their directories.
async fn create_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(':') {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("creating database directory {}", parent.display());
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
