//! TOML configuration, loaded from `./config/cai.toml` by default.
//!
//! Every section is optional and falls back to its `Default`. After parsing,
//! [`load_config`] runs [`validate`], which rejects unknown provider names
//! and zero limits with a message naming the offending key.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_key_prefix() -> String {
    "sk-".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Save the built index and reuse it on later runs.
    #[serde(default)]
    pub persist: bool,
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist: false,
            persist_dir: default_persist_dir(),
        }
    }
}

impl IndexConfig {
    /// The persist directory when persistence is enabled.
    pub fn persist_path(&self) -> Option<&Path> {
        self.persist.then_some(self.persist_dir.as_path())
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("persist")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    250
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            base_url: default_openai_base_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn model_or_default(&self) -> &str {
        match self.model.as_deref() {
            Some(m) => m,
            None if self.provider == "openai" => "text-embedding-ada-002",
            None => "hash",
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Rewrite follow-up prompts into standalone questions before retrieval.
    #[serde(default = "default_true")]
    pub condense_question: bool,
    #[serde(default = "default_chat_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            base_url: default_openai_base_url(),
            temperature: None,
            condense_question: true,
            max_retries: default_chat_max_retries(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_true() -> bool {
    true
}
fn default_chat_max_retries() -> u32 {
    2
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_provider")]
    pub provider: String,
    #[serde(default = "default_wikipedia_base_url")]
    pub base_url: String,
    #[serde(default = "default_top_k_results")]
    pub top_k_results: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_knowledge_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_knowledge_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            provider: default_knowledge_provider(),
            base_url: default_wikipedia_base_url(),
            top_k_results: default_top_k_results(),
            max_chars: default_max_chars(),
            max_retries: default_knowledge_max_retries(),
            timeout_secs: default_knowledge_timeout_secs(),
        }
    }
}

fn default_knowledge_provider() -> String {
    "wikipedia".to_string()
}
fn default_wikipedia_base_url() -> String {
    "https://en.wikipedia.org".to_string()
}
fn default_top_k_results() -> usize {
    3
}
fn default_max_chars() -> usize {
    4000
}
fn default_knowledge_max_retries() -> u32 {
    1
}
fn default_knowledge_timeout_secs() -> u64 {
    10
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.credentials.key_prefix.is_empty() {
        anyhow::bail!("credentials.key_prefix must not be empty");
    }

    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.k < 1 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        "hash" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'hash'");
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or hash.",
            other
        ),
    }

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.knowledge.provider.as_str() {
        "disabled" | "wikipedia" => {}
        other => anyhow::bail!(
            "Unknown knowledge provider: '{}'. Must be disabled or wikipedia.",
            other
        ),
    }

    Ok(())
}
