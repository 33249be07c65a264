//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAiEmbedder`]**: calls an OpenAI-compatible `/embeddings` endpoint with
//!   batching, retry, and backoff.
//! - **[`HashEmbedder`]**: deterministic feature-hashing vectors computed locally;
//!   no network, no key. Useful offline and in tests.
//!
//! Also provides vector utilities used by the index:
//! - [`cosine_similarity`]: compute similarity between two embedding vectors
//! - [`vec_to_blob`]: encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`]: decode a SQLite BLOB back into a `Vec<f32>`
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the provider named in the
//! configuration:
//!
//! ```rust
//! # use custom_ai::config::EmbeddingConfig;
//! # use custom_ai::embedding::create_embedder;
//! let config = EmbeddingConfig {
//!     provider: "hash".to_string(),
//!     dims: Some(64),
//!     ..EmbeddingConfig::default()
//! };
//! let embedder = create_embedder(&config, None).unwrap();
//! assert_eq!(embedder.dims(), 64);
//! ```

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::credentials::ApiKey;
use crate::error::{Error, Result};
use crate::http;

/// A text embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Returns the vector dimensionality, or 0 when unknown until the first call.
    fn dims(&self) -> usize;

    /// Embed a batch of texts. Output order matches input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_texts(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response".to_string()))
    }
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::Embedding(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI embeddings API.
///
/// Calls `POST {base_url}/embeddings`. Texts are sent in batches of
/// `batch_size`.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    endpoint: String,
    key: ApiKey,
    client: reqwest::Client,
    batch_size: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, key: ApiKey) -> Result<Self> {
        let client = http::client(config.timeout_secs).map_err(Error::Embedding)?;
        Ok(Self {
            model: config.model_or_default().to_string(),
            dims: config.dims.unwrap_or(0),
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            key,
            client,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = http::send_json("OpenAI embeddings", self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(self.key.expose())
                .json(&body)
        })
        .await
        .map_err(Error::Embedding)?;

        let vectors = parse_openai_response(&json)?;
        if vectors.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by each item's `index`
/// field when present.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Embedding("invalid response: missing data array".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| Error::Embedding("invalid response: missing embedding".to_string()))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Hash Provider ============

/// Local bag-of-words embedder using feature hashing.
///
/// Lowercased alphanumeric tokens are hashed (FNV-1a, stable across
/// builds) into `dims` buckets with a sign bit, then L2-normalized. Texts
/// sharing words get positive cosine similarity.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let h = fnv1a(token.as_bytes());
            let bucket = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider | Needs key |
/// |-------------|----------|-----------|
/// | `"disabled"` | [`DisabledEmbedder`] | no |
/// | `"openai"` | [`OpenAiEmbedder`] | yes |
/// | `"hash"` | [`HashEmbedder`] | no |
pub fn create_embedder(
    config: &EmbeddingConfig,
    key: Option<&ApiKey>,
) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "openai" => {
            let key = key.ok_or_else(|| {
                Error::InvalidCredential("the openai embedding provider needs an API key".to_string())
            })?;
            Ok(Box::new(OpenAiEmbedder::new(config, key.clone())?))
        }
        "hash" => {
            let dims = config
                .dims
                .filter(|d| *d > 0)
                .ok_or_else(|| Error::Config("embedding.dims required for hash provider".to_string()))?;
            Ok(Box::new(HashEmbedder::new(dims)))
        }
        other => Err(Error::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use custom_ai::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or vectors
/// of different lengths.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_parse_openai_response_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_openai_response_rejects_bad_shape() {
        let err = parse_openai_response(&serde_json::json!({ "object": "list" })).unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }

    #[test]
    fn test_hash_embedder_related_texts_score_higher() {
        let e = HashEmbedder::new(256);
        let doc = e.embed("The sky is blue.");
        let query = e.embed("What color is the sky?");
        let other = e.embed("Kubernetes deployment manifests");
        assert!(cosine_similarity(&doc, &query) > cosine_similarity(&other, &query));
    }

    #[test]
    fn test_hash_embedder_is_deterministic_and_normalized() {
        let e = HashEmbedder::new(32);
        let a = e.embed("Hello hello world");
        let b = e.embed("hello HELLO world!");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_create_openai_requires_key() {
        let config = EmbeddingConfig::default();
        let err = create_embedder(&config, None).err().unwrap();
        assert!(matches!(err, Error::InvalidCredential(_)));
    }

    #[tokio::test]
    async fn test_disabled_embedder_errors() {
        let err = DisabledEmbedder
            .embed_texts(&["x".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Embedding(_)));
    }
}
