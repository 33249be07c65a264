//! Interactive session: the key gate, uploads, and the two-step query flow.
//!
//! A [`Session`] owns everything one user interaction needs: the validated
//! API key, the built index, and the collaborators (embedder, chat model,
//! knowledge source). Each action catches its own errors and reports them as
//! [`Notice`]s, so no failure ends the session.
//!
//! The query flow for [`Session::ask`]:
//!
//! 1. Expand the `Title` template with the query and answer it.
//! 2. Look the raw query up in the knowledge source. A failed lookup
//!    degrades to empty research text plus a warning.
//! 3. Expand `ScriptWithResearch` with the query and the research text and
//!    answer it with the first turn as history.
//!
//! The history is fresh for every call and returned in the outcome.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatModel, OpenAiChat};
use crate::config::Config;
use crate::credentials::{ApiKey, CredentialGate, KeyStatus};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::history::History;
use crate::index::{load_or_build_index, Index, IndexOrigin};
use crate::ingest::{self, IngestReport};
use crate::knowledge::{create_source, KnowledgeSource};
use crate::models::RetrievedChunk;
use crate::pipeline::RetrievalChain;
use crate::prompt::{compose, vars, TemplateId};

/// Inputs that end an additional-questions exchange without a model call.
const QUIT_WORDS: &[&str] = &["", "quit", "q", "exit"];

/// A user-visible message produced by a session action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Warning(String),
    Success(String),
    Answer(String),
    Error(String),
}

impl Notice {
    fn from_error(err: &Error) -> Self {
        error!(code = err.code(), "{}", err);
        Notice::Error(err.to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notice::Error(_))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Warning(m) => write!(f, "warning: {}", m),
            Notice::Success(m) => write!(f, "{}", m),
            Notice::Answer(m) => write!(f, "AI: {}", m),
            Notice::Error(m) => write!(f, "An error occurred: {}", m),
        }
    }
}

/// Result of one query batch.
#[derive(Debug, Clone, Default)]
pub struct QueryOutcome {
    pub notices: Vec<Notice>,
    /// Answer to the restated-topic prompt.
    pub title_answer: Option<String>,
    /// Final answer shown to the user.
    pub answer: Option<String>,
    pub history: History,
}

impl QueryOutcome {
    pub fn is_empty(&self) -> bool {
        self.notices.is_empty() && self.answer.is_none() && self.history.is_empty()
    }
}

pub struct Session {
    config: Config,
    gate: CredentialGate,
    key: Option<ApiKey>,
    index: Option<Arc<Index>>,
    embedder: Option<Arc<dyn Embedder>>,
    chat: Option<Arc<dyn ChatModel>>,
    knowledge: Option<Arc<dyn KnowledgeSource>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let gate = CredentialGate::new(config.credentials.key_prefix.clone());
        Self {
            config,
            gate,
            key: None,
            index: None,
            embedder: None,
            chat: None,
            knowledge: None,
        }
    }

    /// Use `embedder` instead of the configured provider.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Use `model` instead of the configured chat endpoint.
    pub fn with_chat_model(mut self, model: Arc<dyn ChatModel>) -> Self {
        self.chat = Some(model);
        self
    }

    /// Use `source` instead of the configured knowledge provider.
    pub fn with_knowledge_source(mut self, source: Arc<dyn KnowledgeSource>) -> Self {
        self.knowledge = Some(source);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_api_key(&self) -> bool {
        self.key.is_some()
    }

    /// The current index, if one has been built since the last upload.
    pub fn index(&self) -> Option<&Index> {
        self.index.as_deref()
    }

    /// Validate and remember `raw`. An invalid key clears any previous one.
    ///
    /// The index was embedded with the previous key's provider access, so a
    /// changed key also drops it.
    pub fn set_api_key(&mut self, raw: &str) -> Notice {
        let raw = raw.trim();
        match self.gate.check(raw) {
            KeyStatus::Valid => match ApiKey::parse(raw, &self.gate) {
                Ok(key) => {
                    self.replace_key(Some(key));
                    Notice::Success(KeyStatus::Valid.message().to_string())
                }
                Err(e) => {
                    self.replace_key(None);
                    Notice::from_error(&e)
                }
            },
            KeyStatus::Invalid => {
                self.replace_key(None);
                Notice::Warning(KeyStatus::Invalid.message().to_string())
            }
        }
    }

    fn replace_key(&mut self, key: Option<ApiKey>) {
        if self.key != key && self.index.take().is_some() {
            debug!("api key changed; dropping index");
        }
        self.key = key;
    }

    /// Store an uploaded file in the document directory.
    ///
    /// Requires a valid key. On success the in-memory index is dropped so the
    /// next query rebuilds it from the directory.
    pub fn upload(&mut self, filename: &str, bytes: &[u8]) -> Vec<Notice> {
        if let Some(notice) = self.require_key_for_upload() {
            return vec![notice];
        }
        let result = ingest::ingest(&self.config.store.documents_dir, filename, bytes);
        self.after_upload(result)
    }

    /// Read a local file and upload it under its own name.
    pub fn upload_path(&mut self, path: &Path) -> Vec<Notice> {
        if let Some(notice) = self.require_key_for_upload() {
            return vec![notice];
        }
        let result = ingest::ingest_path(&self.config.store.documents_dir, path);
        self.after_upload(result)
    }

    fn require_key_for_upload(&self) -> Option<Notice> {
        self.key
            .is_none()
            .then(|| Notice::Warning("Enter a valid API key before uploading".to_string()))
    }

    fn after_upload(&mut self, result: Result<IngestReport>) -> Vec<Notice> {
        let report = match result {
            Ok(report) => report,
            Err(e) => return vec![Notice::from_error(&e)],
        };

        self.index = None;
        let filename = report
            .stored
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut notices = vec![Notice::Success(format!(
            "File '{}' has been saved successfully!",
            filename
        ))];
        if let Some(sidecar) = &report.text_sidecar {
            notices.push(Notice::Success(format!(
                "Extracted {} characters to {}",
                report.text_chars,
                sidecar.display()
            )));
        }
        if let Some(dir) = self.config.index.persist_path() {
            if crate::store::is_populated(dir) {
                notices.push(Notice::Warning(format!(
                    "a persisted index exists in {}; remove it to index the new file",
                    dir.display()
                )));
            }
        }
        notices
    }

    /// Drop the current index and build (or reload) it now.
    pub async fn rebuild_index(&mut self) -> Vec<Notice> {
        self.index = None;
        match self.ensure_index().await {
            Ok(notices) => {
                let mut notices = notices;
                if let Some(index) = self.index() {
                    notices.push(Notice::Success(format!(
                        "Indexed {} chunks from {} documents",
                        index.len(),
                        index.documents().len()
                    )));
                }
                notices
            }
            Err(e) => vec![Notice::from_error(&e)],
        }
    }

    /// The `k` chunks most similar to `query`, building the index if needed.
    pub async fn retrieve(&mut self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.ensure_index().await?;
        self.current_index()?.retrieve(query, k).await
    }

    /// Answer `query` with the two-step title / research flow.
    ///
    /// A blank query does nothing.
    pub async fn ask(&mut self, query: &str) -> QueryOutcome {
        let mut outcome = QueryOutcome::default();
        let query = query.trim();
        if query.is_empty() {
            return outcome;
        }

        if let Err(e) = self.run_query(query, &mut outcome).await {
            outcome.notices.push(Notice::from_error(&e));
        }
        outcome
    }

    /// Answer a follow-up question on its own, with a fresh history.
    ///
    /// Empty input and the quit words (`quit`, `q`, `exit`) are ignored.
    pub async fn additional_question(&mut self, text: &str) -> QueryOutcome {
        let mut outcome = QueryOutcome::default();
        let text = text.trim();
        if QUIT_WORDS.contains(&text) {
            return outcome;
        }

        let result = async {
            outcome.notices.extend(self.ensure_index().await?);
            let chain = self.chain()?;
            let answer = chain.answer(text, &outcome.history).await?;
            outcome.history.push(text, answer.clone());
            Ok::<_, Error>(answer)
        }
        .await;

        match result {
            Ok(answer) => {
                outcome.notices.push(Notice::Answer(answer.clone()));
                outcome.answer = Some(answer);
            }
            Err(e) => outcome.notices.push(Notice::from_error(&e)),
        }
        outcome
    }

    async fn run_query(&mut self, query: &str, outcome: &mut QueryOutcome) -> Result<()> {
        outcome.notices.extend(self.ensure_index().await?);
        let chain = self.chain()?;

        let title_prompt = compose(TemplateId::Title, &vars([("topic", query)]))?;
        let title_answer = chain.answer(&title_prompt, &outcome.history).await?;
        outcome.history.push(title_prompt, title_answer.clone());
        outcome.title_answer = Some(title_answer);

        let research = match self.augment(query).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "continuing without knowledge lookup");
                outcome
                    .notices
                    .push(Notice::Warning(format!("{}; answering without research", e)));
                String::new()
            }
        };

        let script_prompt = compose(
            TemplateId::ScriptWithResearch,
            &vars([("title", query), ("wikipedia_research", research.as_str())]),
        )?;
        let answer = chain.answer(&script_prompt, &outcome.history).await?;
        outcome.history.push(script_prompt, answer.clone());
        outcome.notices.push(Notice::Answer(answer.clone()));
        outcome.answer = Some(answer);
        Ok(())
    }

    async fn augment(&mut self, query: &str) -> Result<String> {
        let source = match &self.knowledge {
            Some(source) => source.clone(),
            None => {
                let source: Arc<dyn KnowledgeSource> =
                    Arc::from(create_source(&self.config.knowledge)?);
                self.knowledge = Some(source.clone());
                source
            }
        };
        debug!(source = source.name(), "looking up research text");
        source.augment(query).await
    }

    async fn ensure_index(&mut self) -> Result<Vec<Notice>> {
        if self.index.is_some() {
            return Ok(Vec::new());
        }

        let embedder = self.embedder()?;
        let index = load_or_build_index(
            &self.config.store,
            self.config.index.persist_path(),
            &self.config.chunking,
            embedder,
        )
        .await?;

        let mut notices = Vec::new();
        if index.origin() == IndexOrigin::Reloaded {
            info!(chunks = index.len(), "reusing index");
            notices.push(Notice::Success("Reusing index...".to_string()));
        }
        self.index = Some(Arc::new(index));
        Ok(notices)
    }

    fn current_index(&self) -> Result<&Arc<Index>> {
        self.index
            .as_ref()
            .ok_or_else(|| Error::Pipeline("index has not been built".to_string()))
    }

    fn chain(&self) -> Result<RetrievalChain> {
        let index = self.current_index()?.clone();
        let model = self.chat_model()?;
        Ok(RetrievalChain::new(index, model, self.config.retrieval.k)
            .with_condense_question(self.config.chat.condense_question))
    }

    fn embedder(&mut self) -> Result<Arc<dyn Embedder>> {
        if let Some(embedder) = &self.embedder {
            return Ok(embedder.clone());
        }
        let embedder: Arc<dyn Embedder> =
            Arc::from(create_embedder(&self.config.embedding, self.key.as_ref())?);
        Ok(embedder)
    }

    fn chat_model(&self) -> Result<Arc<dyn ChatModel>> {
        if let Some(model) = &self.chat {
            return Ok(model.clone());
        }
        let key = self.key.clone().ok_or_else(|| {
            Error::InvalidCredential("enter a valid API key before asking questions".to_string())
        })?;
        Ok(Arc::new(OpenAiChat::new(&self.config.chat, key)?))
    }
}
