//! Core data models.
//!
//! These types represent the documents and chunks that flow from the
//! document directory into the retrieval index.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A file from the document directory with its extracted text.
#[derive(Debug, Clone)]
pub struct Document {
    /// Path relative to the document directory, `/`-separated.
    pub id: String,
    pub path: PathBuf,
    pub title: String,
    pub content_type: String,
    pub modified_at: DateTime<Utc>,
    pub body: String,
}

/// A chunk of a document's body text; the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from [`Index::retrieve`](crate::index::Index::retrieve).
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}
