//! Schema for the persisted index database.
//!
//! `meta` holds the embedding model, vector width and build time;
//! `documents` lists the files the index was built from; `chunks` stores
//! chunk text with its embedding as a little-endian `f32` BLOB.

use sqlx::SqlitePool;

use crate::error::Result;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS documents (
        id           TEXT PRIMARY KEY,
        title        TEXT NOT NULL,
        content_type TEXT NOT NULL,
        modified_at  INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chunks (
        id          TEXT PRIMARY KEY,
        document_id TEXT NOT NULL REFERENCES documents(id),
        chunk_index INTEGER NOT NULL,
        text        TEXT NOT NULL,
        hash        TEXT NOT NULL,
        embedding   BLOB NOT NULL,
        UNIQUE (document_id, chunk_index)
    )",
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id, chunk_index)",
];

/// Create the index tables. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
