//! Document directory scanner.
//!
//! Walks the document directory, applies include/exclude globs, and turns
//! every readable file into a [`Document`] with extracted text. PDFs that
//! already have a `.txt` sidecar (written at upload time) are skipped so
//! their text is indexed once. Files that cannot be read or extracted are
//! skipped with a warning.

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::extract::{self, content_type_for};
use crate::models::Document;

pub fn scan_documents(store: &StoreConfig) -> Result<Vec<Document>> {
    scan_directory(
        &store.documents_dir,
        &store.include_globs,
        &store.exclude_globs,
    )
}

pub fn scan_directory(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(Error::io(
            root,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "document directory does not exist",
            ),
        ));
    }

    let include_set = build_globset(include_globs)?;

    let mut default_excludes = vec!["**/.*".to_string(), "**/.*/**".to_string()];
    default_excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            Error::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let Some(content_type) = content_type_for(path) else {
            debug!(file = %rel_str, "skipping file with unknown type");
            continue;
        };

        if extract::is_pdf(path) && path.with_extension("txt").is_file() {
            debug!(file = %rel_str, "skipping PDF with text sidecar");
            continue;
        }

        match file_to_document(path, &rel_str, content_type) {
            Ok(Some(doc)) => documents.push(doc),
            Ok(None) => debug!(file = %rel_str, "skipping file with no text"),
            Err(e) => warn!(file = %rel_str, error = %e, "skipping unreadable document"),
        }
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(documents)
}

fn file_to_document(
    path: &Path,
    relative_path: &str,
    content_type: &str,
) -> Result<Option<Document>> {
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let body = extract::extract_text(&bytes, content_type)?;
    if body.trim().is_empty() {
        return Ok(None);
    }

    let modified: DateTime<Utc> = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(Some(Document {
        id: relative_path.to_string(),
        path: path.to_path_buf(),
        title,
        content_type: content_type.to_string(),
        modified_at: modified,
        body,
    }))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {}", e)))
}
