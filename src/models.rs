//! Core data models used throughout the retrieval pipeline.
//!
//! These types represent the documents, conversation turns, and transcript
//! entries that flow between ingestion, retrieval, and the chat loop.

use std::fmt;

/// Where an ingested document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// Local file, identified by its file name.
    File(String),
    /// Web page.
    Url(String),
}

impl fmt::Display for DocumentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentOrigin::File(name) => write!(f, "{}", name),
            DocumentOrigin::Url(url) => write!(f, "{}", url),
        }
    }
}

/// A unit of ingested content.
///
/// `ordinal` is the document's position in the corpus and the join key
/// between documents, embeddings, and retrieval results.
#[derive(Debug, Clone)]
pub struct Document {
    pub ordinal: usize,
    pub origin: DocumentOrigin,
    pub text: String,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalised label used in prompts and exports.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }

    /// Wire name used by chat-completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of the dialogue sent back to the model as history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
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

/// One line of the displayed chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: Role,
    pub message: String,
}

impl ChatEntry {
    pub fn new(role: Role, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
        }
    }
}

/// A ranked retrieval hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}
