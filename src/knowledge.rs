//! Knowledge augmentation from an open encyclopedia.
//!
//! [`WikipediaSource`] searches the MediaWiki API for the raw query, fetches
//! the plain-text intro of the top hits, and formats them as
//!
//! ```text
//! Page: <title>
//! Summary: <intro>
//!
//! Page: <title>
//! Summary: <intro>
//! ```
//!
//! truncated to `max_chars`. No hits yields an empty string. Requests have
//! an explicit timeout and, by default, a single retry.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::KnowledgeConfig;
use crate::error::{Error, Result};
use crate::http;

#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;

    /// Supplementary text for `query`; empty when nothing matches.
    async fn augment(&self, query: &str) -> Result<String>;
}

/// Knowledge lookup turned off; always returns an empty string.
pub struct DisabledSource;

#[async_trait]
impl KnowledgeSource for DisabledSource {
    fn name(&self) -> &str {
        "disabled"
    }
    async fn augment(&self, _query: &str) -> Result<String> {
        Ok(String::new())
    }
}

pub struct WikipediaSource {
    api_url: String,
    client: reqwest::Client,
    top_k_results: usize,
    max_chars: usize,
    max_retries: u32,
}

impl WikipediaSource {
    pub fn new(config: &KnowledgeConfig) -> Result<Self> {
        let client = http::client(config.timeout_secs).map_err(Error::Augmentation)?;
        Ok(Self {
            api_url: format!("{}/w/api.php", config.base_url.trim_end_matches('/')),
            client,
            top_k_results: config.top_k_results.max(1),
            max_chars: config.max_chars,
            max_retries: config.max_retries,
        })
    }

    async fn get(&self, params: &[(&str, &str)]) -> Result<Value> {
        http::send_json("Wikipedia", self.max_retries, || {
            self.client.get(&self.api_url).query(params)
        })
        .await
        .map_err(Error::Augmentation)
    }

    async fn search_titles(&self, query: &str) -> Result<Vec<String>> {
        let limit = self.top_k_results.to_string();
        let json = self
            .get(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .await?;

        let hits = json
            .pointer("/query/search")
            .and_then(|s| s.as_array())
            .ok_or_else(|| Error::Augmentation("unexpected search response".to_string()))?;

        Ok(hits
            .iter()
            .filter_map(|h| h.get("title").and_then(|t| t.as_str()))
            .map(str::to_string)
            .take(self.top_k_results)
            .collect())
    }

    async fn summary(&self, title: &str) -> Result<Option<String>> {
        let json = self
            .get(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
                ("formatversion", "2"),
            ])
            .await?;

        let extract = json
            .pointer("/query/pages/0/extract")
            .and_then(|e| e.as_str())
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        Ok(extract)
    }
}

#[async_trait]
impl KnowledgeSource for WikipediaSource {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn augment(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(String::new());
        }

        let titles = self.search_titles(query).await?;
        debug!(hits = titles.len(), "wikipedia search");

        let mut pages = Vec::new();
        for title in titles {
            if let Some(summary) = self.summary(&title).await? {
                pages.push(format_page(&title, &summary));
            }
        }

        Ok(truncate_chars(&pages.join("\n\n"), self.max_chars))
    }
}

pub fn create_source(config: &KnowledgeConfig) -> Result<Box<dyn KnowledgeSource>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledSource)),
        "wikipedia" => Ok(Box::new(WikipediaSource::new(config)?)),
        other => Err(Error::Config(format!(
            "unknown knowledge provider: {}",
            other
        ))),
    }
}

fn format_page(title: &str, summary: &str) -> String {
    format!("Page: {}\nSummary: {}", title, summary)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
