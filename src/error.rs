//! Error types for the retrieval pipeline.
//!
//! Extraction and indexing failures are local to the action that raised
//! them; the session never mutates its corpus before an operation has
//! succeeded. LLM failures carry their own [`LlmError`] so the chat edge
//! can render them in-band.

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum RagError {
    /// The file extension is not one the extractor understands.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// Network or HTTP failure while fetching a URL.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The document was recognised but could not be parsed.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// I/O error reading a local source.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding or index build attempted with no documents.
    #[error("no documents to index; add a file or URL first")]
    EmptyCorpus,

    /// The embedding set or index no longer matches the corpus.
    #[error(
        "index is stale: {documents} documents but {embeddings} embeddings; regenerate embeddings and rebuild the index"
    )]
    StaleIndex { documents: usize, embeddings: usize },

    /// Vectors of different dimensions were mixed.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Model loading or inference failed.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The requested LLM is not in the configured catalogue.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// LLM call failed.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),
}

/// Failures at the hosted LLM boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// No API key has been configured for this session.
    #[error("no API key configured")]
    MissingCredential,

    /// Transport, HTTP status, or response-shape failure.
    #[error("{message}")]
    Transport { message: String },
}

impl LlmError {
    pub fn transport(message: impl ToString) -> Self {
        LlmError::Transport {
            message: message.to_string(),
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
