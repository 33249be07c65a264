//! Error taxonomy for the assistant.
//!
//! Every user-triggered action (upload, index build, query) returns one of
//! these variants. The [`session`](crate::session) layer catches them at the
//! action boundary and renders them as non-fatal notices.

use std::path::PathBuf;

use thiserror::Error;

use crate::extract::ExtractError;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The supplied API key does not have the provider's prefix.
    #[error("invalid API key: {0}")]
    InvalidCredential(String),

    /// The document store or index directory could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An upload was rejected before touching the store.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// A PDF could not be parsed.
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// The document directory holds no indexable text.
    #[error("no indexable text found in {}", .0.display())]
    EmptyCorpus(PathBuf),

    /// The knowledge lookup service failed.
    #[error("knowledge lookup failed: {0}")]
    Augmentation(String),

    /// A prompt template was expanded without one of its variables.
    #[error("missing input variable: {0}")]
    MissingVariable(String),

    /// Retrieval or chat completion failed, or the model response was malformed.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// The embedding service failed or returned an unusable response.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The persisted index could not be read or written.
    #[error("index store error: {0}")]
    Store(String),

    /// Configuration is incomplete or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable code, used in CLI output and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredential(_) => "invalid_credential",
            Error::Io { .. } => "io",
            Error::InvalidUpload(_) => "invalid_upload",
            Error::Extraction(_) => "extraction",
            Error::EmptyCorpus(_) => "empty_corpus",
            Error::Augmentation(_) => "augmentation",
            Error::MissingVariable(_) => "missing_variable",
            Error::Pipeline(_) => "pipeline",
            Error::Embedding(_) => "embedding",
            Error::Store(_) => "store",
            Error::Config(_) => "config",
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_path() {
        let err = Error::io(
            "/nope/file.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/nope/file.pdf"));
        assert!(msg.contains("denied"));
        assert_eq!(err.code(), "io");
    }

    #[test]
    fn missing_variable_message() {
        let err = Error::MissingVariable("topic".to_string());
        assert_eq!(err.to_string(), "missing input variable: topic");
    }
}
