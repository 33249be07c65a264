//! Retrieval index over the document directory.
//!
//! [`load_or_build_index`] either reloads a persisted index or scans the
//! document directory, chunks and embeds every document, and builds a fresh
//! one. There is no incremental update: a document added after the build is
//! invisible until the next rebuild.
//!
//! Retrieval is brute-force cosine similarity over all chunk vectors, which
//! is adequate for a personal document folder. Without persistence every
//! process start pays one full embedding pass over the corpus.

use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, StoreConfig};
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{Error, Result};
use crate::models::{Chunk, Document, RetrievedChunk};
use crate::scan;
use crate::store::{self, DocumentRecord, IndexSnapshot};

/// How an [`Index`] came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Built,
    Reloaded,
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

pub struct Index {
    entries: Vec<IndexEntry>,
    documents: Vec<DocumentRecord>,
    model: String,
    built_at: DateTime<Utc>,
    origin: IndexOrigin,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("chunks", &self.entries.len())
            .field("documents", &self.documents.len())
            .field("model", &self.model)
            .field("origin", &self.origin)
            .finish()
    }
}

impl Index {
    /// Chunk and embed `documents` into a new index.
    pub async fn build(
        documents: &[Document],
        embedder: Arc<dyn Embedder>,
        max_tokens: usize,
    ) -> Result<Self> {
        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| chunk_text(&doc.id, &doc.body, max_tokens))
            .collect();

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed_texts(&texts).await?
        };
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        let documents = documents
            .iter()
            .map(|doc| DocumentRecord {
                id: doc.id.clone(),
                title: doc.title.clone(),
                content_type: doc.content_type.clone(),
                modified_at: doc.modified_at.timestamp(),
            })
            .collect();

        Ok(Self {
            entries,
            documents,
            model: embedder.model_name().to_string(),
            built_at: Utc::now(),
            origin: IndexOrigin::Built,
            embedder,
        })
    }

    /// Rehydrate a persisted index. Query embeddings must come from the
    /// same model, with the same width, as the index was built with. A width
    /// of 0 on either side means unknown and is not compared.
    pub fn from_snapshot(snapshot: IndexSnapshot, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if snapshot.model != embedder.model_name() {
            return Err(Error::Store(format!(
                "persisted index was built with model '{}' but the configured model is '{}'; \
                 remove the persist directory to rebuild",
                snapshot.model,
                embedder.model_name()
            )));
        }
        if snapshot.dims != 0 && embedder.dims() != 0 && snapshot.dims != embedder.dims() {
            return Err(Error::Store(format!(
                "persisted index has {}-dimensional vectors but the embedder produces {}; \
                 remove the persist directory to rebuild",
                snapshot.dims,
                embedder.dims()
            )));
        }
        if let Some(entry) = snapshot.entries.iter().find(|(_, v)| v.len() != snapshot.dims) {
            return Err(Error::Store(format!(
                "persisted chunk {} has {} dimensions, expected {}",
                entry.0.id,
                entry.1.len(),
                snapshot.dims
            )));
        }

        Ok(Self {
            entries: snapshot
                .entries
                .into_iter()
                .map(|(chunk, vector)| IndexEntry { chunk, vector })
                .collect(),
            documents: snapshot.documents,
            model: snapshot.model,
            built_at: snapshot.built_at,
            origin: IndexOrigin::Reloaded,
            embedder,
        })
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            model: self.model.clone(),
            dims: self.entries.first().map(|e| e.vector.len()).unwrap_or(0),
            built_at: self.built_at,
            documents: self.documents.clone(),
            entries: self
                .entries
                .iter()
                .map(|e| (e.chunk.clone(), e.vector.clone()))
                .collect(),
        }
    }

    /// The `k` chunks most similar to `query`, best first. Ties keep
    /// index order.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(&query_vec, &e.vector)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievedChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn documents(&self) -> &[DocumentRecord] {
        &self.documents
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn origin(&self) -> IndexOrigin {
        self.origin
    }
}

/// Reload the index from `persist_dir` if it is populated; otherwise scan
/// the document directory and build a fresh index, persisting it when
/// `persist_dir` is set.
///
/// # Errors
///
/// [`Error::EmptyCorpus`] when the directory yields no indexable text.
pub async fn load_or_build_index(
    store_config: &StoreConfig,
    persist_dir: Option<&Path>,
    chunking: &ChunkingConfig,
    embedder: Arc<dyn Embedder>,
) -> Result<Index> {
    if let Some(dir) = persist_dir {
        if store::is_populated(dir) {
            let index = Index::from_snapshot(store::load(dir).await?, embedder)?;
            info!(
                persist_dir = %dir.display(),
                chunks = index.len(),
                built_at = %index.built_at(),
                "reusing persisted index"
            );
            return Ok(index);
        }
    }

    let documents = scan::scan_documents(store_config)?;
    let index = Index::build(&documents, embedder, chunking.max_tokens).await?;
    if index.is_empty() {
        return Err(Error::EmptyCorpus(store_config.documents_dir.clone()));
    }

    info!(
        documents = index.documents().len(),
        chunks = index.len(),
        model = index.model(),
        "built index"
    );

    if let Some(dir) = persist_dir {
        store::save(dir, &index.snapshot()).await?;
        info!(persist_dir = %dir.display(), "persisted index");
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    fn doc(id: &str, body: &str) -> Document {
        Document {
            id: id.to_string(),
            path: id.into(),
            title: id.to_string(),
            content_type: "text/plain".to_string(),
            modified_at: Utc::now(),
            body: body.to_string(),
        }
    }

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(HashEmbedder::new(256))
    }

    #[tokio::test]
    async fn retrieves_most_similar_chunk() {
        let docs = vec![
            doc("sky.txt", "The sky is blue."),
            doc("k8s.txt", "Kubernetes schedules containers onto nodes."),
        ];
        let index = Index::build(&docs, embedder(), 250).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.origin(), IndexOrigin::Built);

        let hits = index.retrieve("What color is the sky?", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.document_id, "sky.txt");
        assert_eq!(hits[0].chunk.text, "The sky is blue.");
    }

    #[tokio::test]
    async fn k_bounds_results() {
        let docs = vec![doc("a.txt", "alpha"), doc("b.txt", "beta"), doc("c.txt", "gamma")];
        let index = Index::build(&docs, embedder(), 250).await.unwrap();
        assert_eq!(index.retrieve("alpha", 2).await.unwrap().len(), 2);
        assert_eq!(index.retrieve("alpha", 10).await.unwrap().len(), 3);
        assert!(index.retrieve("alpha", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_roundtrip_preserves_results() {
        let docs = vec![doc("sky.txt", "The sky is blue."), doc("sea.txt", "The sea is wet.")];
        let built = Index::build(&docs, embedder(), 250).await.unwrap();
        let reloaded = Index::from_snapshot(built.snapshot(), embedder()).unwrap();
        assert_eq!(reloaded.origin(), IndexOrigin::Reloaded);

        let a = built.retrieve("sky colour", 2).await.unwrap();
        let b = reloaded.retrieve("sky colour", 2).await.unwrap();
        let ids_a: Vec<_> = a.iter().map(|h| h.chunk.id.clone()).collect();
        let ids_b: Vec<_> = b.iter().map(|h| h.chunk.id.clone()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[tokio::test]
    async fn snapshot_from_other_model_is_rejected() {
        let docs = vec![doc("sky.txt", "The sky is blue.")];
        let mut snapshot = Index::build(&docs, embedder(), 250).await.unwrap().snapshot();
        snapshot.model = "text-embedding-ada-002".to_string();
        let err = Index::from_snapshot(snapshot, embedder()).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[tokio::test]
    async fn snapshot_with_other_width_is_rejected() {
        let docs = vec![doc("sky.txt", "The sky is blue.")];
        let snapshot = Index::build(&docs, embedder(), 250).await.unwrap().snapshot();
        assert_eq!(snapshot.dims, 256);

        let narrow: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64));
        match Index::from_snapshot(snapshot, narrow) {
            Err(Error::Store(msg)) => assert!(msg.contains("256-dimensional")),
            other => panic!("unexpected: {:?}", other.map(|i| i.len())),
        }
    }

    #[tokio::test]
    async fn empty_directory_is_empty_corpus() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("blank.txt"), "  ").unwrap();
        let store_config = StoreConfig {
            documents_dir: tmp.path().to_path_buf(),
            ..StoreConfig::default()
        };
        let err = load_or_build_index(&store_config, None, &ChunkingConfig::default(), embedder())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus(_)));
    }
}
