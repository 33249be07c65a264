//! Chat-completion models.
//!
//! [`OpenAiChat`] calls an OpenAI-compatible `POST {base_url}/chat/completions`
//! endpoint and returns `choices[0].message.content`. A response without that
//! field is reported as a pipeline error rather than an empty answer.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ChatConfig;
use crate::credentials::ApiKey;
use crate::error::{Error, Result};
use crate::http;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Run one completion over `messages` and return the reply text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct OpenAiChat {
    model: String,
    endpoint: String,
    key: ApiKey,
    temperature: Option<f32>,
    client: reqwest::Client,
    max_retries: u32,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig, key: ApiKey) -> Result<Self> {
        let client = http::client(config.timeout_secs).map_err(Error::Pipeline)?;
        Ok(Self {
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            key,
            temperature: config.temperature,
            client,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let (Some(t), Some(obj)) = (self.temperature, body.as_object_mut()) {
            obj.insert("temperature".to_string(), serde_json::json!(t));
        }

        let json = http::send_json("OpenAI chat", self.max_retries, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(self.key.expose())
                .json(&body)
        })
        .await
        .map_err(Error::Pipeline)?;

        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::Pipeline("unexpected chat response: missing choices[0].message.content".to_string())
        })
}
