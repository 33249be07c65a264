//! # Custom AI
//!
//! A document-grounded conversational assistant. Upload files into a
//! document directory, index them, and ask questions that are answered by a
//! chat model using the most relevant chunks plus a short encyclopedia
//! lookup.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ data/ + .txt │──▶│    Index     │
//! │ (ingest) │   │   sidecars   │   │ chunk+embed  │
//! └──────────┘   └──────────────┘   └──────┬───────┘
//!                                          │ retrieve(k)
//!      ┌───────────┐   ┌──────────┐   ┌────▼─────┐
//!      │ Knowledge │──▶│  Prompt  │──▶│ Pipeline │──▶ answer
//!      │ Wikipedia │   │ templates│   │  + chat  │
//!      └───────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! cai ingest report.pdf         # store + extract text
//! cai index                     # build (or reload) the index
//! cai ask "sky color"           # title + research answer
//! cai chat                      # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`credentials`] | API key gate |
//! | [`ingest`] | Upload storage and PDF text sidecars |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`scan`] | Document directory walk |
//! | [`chunk`] | Paragraph chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Build, reload, and query the vector index |
//! | [`store`] | Index persistence in SQLite |
//! | [`knowledge`] | Encyclopedia lookup |
//! | [`prompt`] | Prompt templates |
//! | [`chat`] | Chat-completion models |
//! | [`history`] | Conversation history |
//! | [`pipeline`] | Conversational retrieval chain |
//! | [`session`] | Query flow and user notices |
//! | [`error`] | Error taxonomy |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod credentials;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod history;
mod http;
pub mod index;
pub mod ingest;
pub mod knowledge;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod scan;
pub mod session;
pub mod store;

pub use error::{Error, Result};
