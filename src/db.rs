use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File name of the index database inside the persist directory.
pub const INDEX_DB_FILE: &str = "index.sqlite";

pub fn index_db_path(persist_dir: &Path) -> PathBuf {
    persist_dir.join(INDEX_DB_FILE)
}

/// Open (or create) the index database in `persist_dir`.
pub async fn connect(persist_dir: &Path, create: bool) -> Result<SqlitePool> {
    if create {
        std::fs::create_dir_all(persist_dir).map_err(|e| Error::io(persist_dir, e))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(index_db_path(persist_dir))
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}
