//! # ragchat
//!
//! A retrieval-augmented chat assistant over PDF, Word, and web documents.
//!
//! Documents are extracted to plain text, embedded into a vector space, and
//! indexed for exact nearest-neighbour search. Each question retrieves the
//! closest documents, folds them and the conversation so far into a prompt,
//! and sends it to a hosted chat-completion API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌─────────────┐
//! │   extract    │──▶│ embedding  │──▶│    index    │
//! │ PDF/DOCX/URL │   │ local/hash │   │  exact L2   │
//! └──────────────┘   └────────────┘   └──────┬──────┘
//!                                            │ top-k
//!                    ┌────────────┐   ┌──────▼──────┐
//!                    │    llm     │◀──│   prompt    │
//!                    │ chat API   │   │ ctx+history │
//!                    └────────────┘   └─────────────┘
//! ```
//!
//! [`session::Session`] owns one conversation's corpus, embeddings, index,
//! and dialogue, and drives the pipeline.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | PDF, DOCX, and web page text extraction |
//! | [`embedding`] | Embedding providers and the model cache |
//! | [`index`] | Exact nearest-neighbour search |
//! | [`prompt`] | Prompt composition |
//! | [`llm`] | Chat-completion client |
//! | [`session`] | Conversation state and pipeline |
//! | [`export`] | Transcript export |
//! | [`progress`] | Embedding progress reporting |
//! | [`logging`] | Tracing subscriber setup |
//! | [`cli`] | One-shot command handlers |
//! | [`chat`] | Interactive chat loop |

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod extract;
pub mod index;
pub mod llm;
pub mod logging;
pub mod models;
pub mod progress;
pub mod prompt;
pub mod session;
