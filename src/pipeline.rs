//! Conversational retrieval: retrieve supporting chunks for a prompt, then
//! ask the chat model to answer with that context and the conversation so far.
//!
//! With a non-empty history and `condense_question` on, the model first
//! rewrites the prompt into a standalone question, which is what gets
//! embedded for retrieval. The answer call always sees the original prompt.
//!
//! [`RetrievalChain::answer`] never touches the history; the caller appends
//! the returned answer.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::chat::{ChatMessage, ChatModel};
use crate::error::{Error, Result};
use crate::history::History;
use crate::index::Index;
use crate::models::RetrievedChunk;
use crate::prompt::PromptTemplate;

const CONDENSE_TEMPLATE: PromptTemplate = PromptTemplate {
    input_variables: &["chat_history", "question"],
    template: "Given the following conversation and a follow up question, rephrase the follow up \
               question to be a standalone question, in its original language.\n\n\
               Chat History:\n{chat_history}\nFollow Up Input: {question}\nStandalone question:",
};

const CONTEXT_TEMPLATE: PromptTemplate = PromptTemplate {
    input_variables: &["context"],
    template: "Use the following pieces of context to answer the user's question. \n\
               If you don't know the answer, just say that you don't know, don't try to make up \
               an answer.\n----------------\n{context}",
};

pub struct RetrievalChain {
    index: Arc<Index>,
    model: Arc<dyn ChatModel>,
    k: usize,
    condense_question: bool,
}

impl RetrievalChain {
    pub fn new(index: Arc<Index>, model: Arc<dyn ChatModel>, k: usize) -> Self {
        Self {
            index,
            model,
            k,
            condense_question: true,
        }
    }

    pub fn with_condense_question(mut self, enabled: bool) -> Self {
        self.condense_question = enabled;
        self
    }

    /// Answer `prompt` given the conversation so far.
    ///
    /// # Errors
    ///
    /// Every failure (retrieval, model call, malformed response) is reported
    /// as [`Error::Pipeline`].
    pub async fn answer(&self, prompt: &str, history: &History) -> Result<String> {
        let question = if self.condense_question && !history.is_empty() {
            self.condense(prompt, history).await?
        } else {
            prompt.to_string()
        };

        let hits = self
            .index
            .retrieve(&question, self.k)
            .await
            .map_err(|e| into_pipeline("retrieval", e))?;
        debug!(hits = hits.len(), model = self.model.model_name(), "retrieved context");

        let system = CONTEXT_TEMPLATE.format(&context_vars(&hits))?;
        let messages = build_messages(system, history, prompt);

        self.model
            .complete(&messages)
            .await
            .map_err(|e| into_pipeline("chat completion", e))
    }

    async fn condense(&self, prompt: &str, history: &History) -> Result<String> {
        let vars = HashMap::from([
            ("chat_history".to_string(), history.transcript()),
            ("question".to_string(), prompt.to_string()),
        ]);
        let condense_prompt = CONDENSE_TEMPLATE.format(&vars)?;

        let standalone = self
            .model
            .complete(&[ChatMessage::user(condense_prompt)])
            .await
            .map_err(|e| into_pipeline("question condensing", e))?;

        let standalone = standalone.trim();
        if standalone.is_empty() {
            Ok(prompt.to_string())
        } else {
            debug!(question = standalone, "condensed follow-up");
            Ok(standalone.to_string())
        }
    }
}

fn context_vars(hits: &[RetrievedChunk]) -> HashMap<String, String> {
    let context = hits
        .iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    HashMap::from([("context".to_string(), context)])
}

fn build_messages(system: String, history: &History, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 2);
    messages.push(ChatMessage::system(system));
    for turn in history.turns() {
        messages.push(ChatMessage::user(turn.prompt.clone()));
        messages.push(ChatMessage::assistant(turn.answer.clone()));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

fn into_pipeline(stage: &str, err: Error) -> Error {
    match err {
        Error::Pipeline(msg) => Error::Pipeline(format!("{}: {}", stage, msg)),
        other => Error::Pipeline(format!("{}: {}", stage, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    #[test]
    fn messages_thread_history_between_context_and_prompt() {
        let mut history = History::new();
        history.push("first", "one");
        let messages = build_messages("ctx".to_string(), &history, "second");
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(messages[0].content, "ctx");
        assert_eq!(messages[3].content, "second");
    }

    #[test]
    fn context_template_embeds_chunks() {
        let system = CONTEXT_TEMPLATE
            .format(&HashMap::from([(
                "context".to_string(),
                "The sky is blue.".to_string(),
            )]))
            .unwrap();
        assert!(system.starts_with("Use the following pieces of context"));
        assert!(system.ends_with("----------------\nThe sky is blue."));
    }

    #[test]
    fn condense_template_lists_history() {
        let text = CONDENSE_TEMPLATE
            .format(&HashMap::from([
                ("chat_history".to_string(), "Human: a\nAssistant: b".to_string()),
                ("question".to_string(), "and c?".to_string()),
            ]))
            .unwrap();
        assert!(text.contains("Chat History:\nHuman: a\nAssistant: b\nFollow Up Input: and c?"));
        assert!(text.ends_with("Standalone question:"));
    }

    #[test]
    fn wraps_errors_as_pipeline() {
        let err = into_pipeline("retrieval", Error::Embedding("boom".to_string()));
        match err {
            Error::Pipeline(msg) => assert_eq!(msg, "retrieval: embedding failed: boom"),
            other => panic!("unexpected: {other}"),
        }
    }
}
