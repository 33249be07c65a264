//! Document upload handling.
//!
//! Stores an uploaded file in the document directory under its original
//! name. PDFs additionally get a `<basename>.txt` sidecar with their
//! extracted text, which is what the index picks up on the next rebuild.
//! The PDF is parsed before anything is written, so a rejected upload
//! leaves the store untouched.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::extract;

/// What an upload wrote to the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub stored: PathBuf,
    pub bytes: usize,
    /// Sidecar text file, for PDFs.
    pub text_sidecar: Option<PathBuf>,
    pub text_chars: usize,
}

pub fn ingest(store_dir: &Path, filename: &str, bytes: &[u8]) -> Result<IngestReport> {
    if bytes.is_empty() {
        return Err(Error::InvalidUpload(format!("{} is empty", filename)));
    }
    validate_filename(filename)?;

    let stored = store_dir.join(filename);

    let extracted = if extract::is_pdf(&stored) {
        Some(extract::extract_pdf(bytes)?)
    } else {
        None
    };

    std::fs::create_dir_all(store_dir).map_err(|e| Error::io(store_dir, e))?;
    std::fs::write(&stored, bytes).map_err(|e| Error::io(&stored, e))?;

    let (text_sidecar, text_chars) = match extracted {
        Some(text) => {
            let sidecar = stored.with_extension("txt");
            std::fs::write(&sidecar, &text).map_err(|e| Error::io(&sidecar, e))?;
            (Some(sidecar), text.chars().count())
        }
        None => (None, 0),
    };

    info!(
        file = %stored.display(),
        bytes = bytes.len(),
        extracted_chars = text_chars,
        "stored upload"
    );

    Ok(IngestReport {
        stored,
        bytes: bytes.len(),
        text_sidecar,
        text_chars,
    })
}

/// Read a local file and ingest it under its own file name.
pub fn ingest_path(store_dir: &Path, source: &Path) -> Result<IngestReport> {
    let filename = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidUpload(format!("{} has no file name", source.display())))?;
    let bytes = std::fs::read(source).map_err(|e| Error::io(source, e))?;
    ingest(store_dir, filename, &bytes)
}

fn validate_filename(filename: &str) -> Result<()> {
    let trimmed = filename.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(Error::InvalidUpload(format!(
            "'{}' is not a usable file name",
            filename
        )));
    }
    if filename.contains('/') || filename.contains('\\') || filename.contains('\0') {
        return Err(Error::InvalidUpload(format!(
            "'{}' must be a bare file name",
            filename
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_text_file_without_sidecar() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = tmp.path().join("data");
        let report = ingest(&store, "notes.txt", b"The sky is blue.").unwrap();
        assert_eq!(report.stored, store.join("notes.txt"));
        assert_eq!(report.text_sidecar, None);
        assert_eq!(std::fs::read(store.join("notes.txt")).unwrap(), b"The sky is blue.");
    }

    #[test]
    fn rejects_empty_upload() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = ingest(tmp.path(), "a.pdf", b"").unwrap_err();
        assert!(matches!(err, Error::InvalidUpload(_)));
    }

    #[test]
    fn rejects_path_like_names() {
        let tmp = tempfile::TempDir::new().unwrap();
        for name in ["../escape.txt", "a/b.txt", "..", "", "c\\d.txt"] {
            let err = ingest(tmp.path(), name, b"x").unwrap_err();
            assert!(matches!(err, Error::InvalidUpload(_)), "accepted {:?}", name);
        }
    }

    #[test]
    fn unparseable_pdf_writes_nothing() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = tmp.path().join("data");
        let err = ingest(&store, "bad.pdf", b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(!store.join("bad.pdf").exists());
        assert!(!store.join("bad.txt").exists());
    }

    #[test]
    fn unwritable_store_is_io_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let err = ingest(&blocker.join("data"), "a.txt", b"hello").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
