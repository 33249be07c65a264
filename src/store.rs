//! On-disk persistence for the retrieval index.
//!
//! A persisted index is a SQLite database at `<persist_dir>/index.sqlite`
//! holding document metadata, chunk text and one embedding BLOB per chunk.
//! Whether the persist directory is populated is the only signal used to
//! decide between reloading and rebuilding, so [`save`] writes into a
//! sibling staging directory and only renames it into place once the
//! transaction has committed.

use chrono::{DateTime, Utc};
use sqlx::Row;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::Chunk;

/// Document metadata kept alongside the persisted chunks.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub content_type: String,
    pub modified_at: i64,
}

/// Everything needed to reconstruct an [`Index`](crate::index::Index).
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub model: String,
    pub dims: usize,
    pub built_at: DateTime<Utc>,
    pub documents: Vec<DocumentRecord>,
    pub entries: Vec<(Chunk, Vec<f32>)>,
}

/// `true` when `dir` exists and contains at least one entry.
pub fn is_populated(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Persist `snapshot` to `persist_dir`, which must be missing or empty.
/// On failure nothing is left at `persist_dir`.
pub async fn save(persist_dir: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    if is_populated(persist_dir) {
        return Err(Error::Store(format!(
            "{} already holds a persisted index",
            persist_dir.display()
        )));
    }

    let staging = staging_dir(persist_dir)?;
    if staging.exists() {
        std::fs::remove_dir_all(&staging).map_err(|e| Error::io(&staging, e))?;
    }

    if let Err(e) = write_snapshot(&staging, snapshot).await {
        if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
            warn!(path = %staging.display(), error = %cleanup, "failed to remove staging directory");
        }
        return Err(e);
    }

    if persist_dir.exists() {
        std::fs::remove_dir(persist_dir).map_err(|e| Error::io(persist_dir, e))?;
    }
    std::fs::rename(&staging, persist_dir).map_err(|e| Error::io(persist_dir, e))?;
    Ok(())
}

/// `.<name>.partial` next to the persist directory.
fn staging_dir(persist_dir: &Path) -> Result<PathBuf> {
    let name = persist_dir.file_name().ok_or_else(|| {
        Error::Store(format!(
            "persist directory {} has no file name",
            persist_dir.display()
        ))
    })?;
    Ok(persist_dir.with_file_name(format!(".{}.partial", name.to_string_lossy())))
}

async fn write_snapshot(dir: &Path, snapshot: &IndexSnapshot) -> Result<()> {
    let pool = db::connect(dir, true).await?;
    let result = insert_snapshot(&pool, snapshot).await;
    pool.close().await;
    result
}

async fn insert_snapshot(pool: &sqlx::SqlitePool, snapshot: &IndexSnapshot) -> Result<()> {
    migrate::run_migrations(pool).await?;

    let mut tx = pool.begin().await?;

    for (key, value) in [
        ("model", snapshot.model.clone()),
        ("dims", snapshot.dims.to_string()),
        ("built_at", snapshot.built_at.timestamp().to_string()),
    ] {
        sqlx::query("INSERT INTO meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    for doc in &snapshot.documents {
        sqlx::query(
            "INSERT INTO documents (id, title, content_type, modified_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.content_type)
        .bind(doc.modified_at)
        .execute(&mut *tx)
        .await?;
    }

    for (chunk, vector) in &snapshot.entries {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, text, hash, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(vec_to_blob(vector))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn load(persist_dir: &Path) -> Result<IndexSnapshot> {
    let db_path = db::index_db_path(persist_dir);
    if !db_path.is_file() {
        return Err(Error::Store(format!(
            "{} is not empty but has no {}",
            persist_dir.display(),
            db::INDEX_DB_FILE
        )));
    }

    let pool = db::connect(persist_dir, false).await?;

    let meta_rows = sqlx::query("SELECT key, value FROM meta")
        .fetch_all(&pool)
        .await?;
    let mut model = None;
    let mut dims = 0usize;
    let mut built_at = 0i64;
    for row in &meta_rows {
        let key: String = row.get("key");
        let value: String = row.get("value");
        match key.as_str() {
            "model" => model = Some(value),
            "dims" => dims = value.parse().unwrap_or(0),
            "built_at" => built_at = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    let model = model.ok_or_else(|| Error::Store("persisted index has no model".to_string()))?;

    let documents: Vec<DocumentRecord> = sqlx::query(
        "SELECT id, title, content_type, modified_at FROM documents ORDER BY id ASC",
    )
    .fetch_all(&pool)
    .await?
    .iter()
    .map(|row| DocumentRecord {
        id: row.get("id"),
        title: row.get("title"),
        content_type: row.get("content_type"),
        modified_at: row.get("modified_at"),
    })
    .collect();

    let entries: Vec<(Chunk, Vec<f32>)> = sqlx::query(
        r#"
        SELECT id, document_id, chunk_index, text, hash, embedding
        FROM chunks
        ORDER BY document_id ASC, chunk_index ASC
        "#,
    )
    .fetch_all(&pool)
    .await?
    .iter()
    .map(|row| {
        let blob: Vec<u8> = row.get("embedding");
        (
            Chunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                hash: row.get("hash"),
            },
            blob_to_vec(&blob),
        )
    })
    .collect();

    pool.close().await;

    Ok(IndexSnapshot {
        model,
        dims,
        built_at: DateTime::from_timestamp(built_at, 0).unwrap_or_default(),
        documents,
        entries,
    })
}
