//! Conversation state: corpus, embeddings, index, and dialogue.
//!
//! A [`Session`] is driven by one actor at a time through the sequence
//! ingest → embed → build index → ask. Each step either succeeds and
//! updates state, or fails and leaves state exactly as it was.
//!
//! The embedding set and index are rebuilt in full, never appended to.
//! Retrieval checks that documents, embeddings, and index still agree in
//! size and fails with [`RagError::StaleIndex`] when they do not.
//!
//! ```rust,no_run
//! # use ragchat::config::Config;
//! # use ragchat::progress::NoProgress;
//! # use ragchat::session::Session;
//! # async fn run() -> ragchat::error::Result<()> {
//! let mut session = Session::new(&Config::minimal(), None)?;
//! session.ingest("docs/handbook.pdf").await?;
//! session.generate_embeddings(&NoProgress).await?;
//! session.build_index()?;
//! let answer = session.ask("What is the refund policy?").await?;
//! # Ok(()) }
//! ```

use std::path::Path;

use tracing::{debug, info};

use crate::config::{Config, EmbeddingConfig};
use crate::embedding::{self, ModelHandle};
use crate::error::{RagError, Result};
use crate::export;
use crate::extract::{self, Source, UrlFetcher};
use crate::index::VectorIndex;
use crate::llm::{self, ApiKey, LlmClient};
use crate::models::{ChatEntry, Document, DocumentOrigin, Neighbor, Role, Turn};
use crate::progress::{EmbedProgressEvent, EmbedProgressReporter};
use crate::prompt;

/// Prefix of summary messages in the transcript.
pub const SUMMARY_PREFIX: &str = "Document summary: ";

pub struct Session {
    config: Config,
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
    index: Option<VectorIndex>,
    history: Vec<Turn>,
    transcript: Vec<ChatEntry>,
    model: String,
    embedder: Option<ModelHandle>,
    llm: LlmClient,
    fetcher: UrlFetcher,
}

impl Session {
    pub fn new(config: &Config, api_key: Option<ApiKey>) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            documents: Vec::new(),
            embeddings: Vec::new(),
            index: None,
            history: Vec::new(),
            transcript: Vec::new(),
            model: config.llm.model.clone(),
            embedder: None,
            llm: LlmClient::new(&config.llm, api_key)?,
            fetcher: UrlFetcher::new(&config.fetch)?,
        })
    }

    // ============ Ingestion ============

    /// Append a document with already-extracted text. Returns its ordinal.
    pub fn add_document(&mut self, origin: DocumentOrigin, text: String) -> usize {
        let ordinal = self.documents.len();
        info!(ordinal, origin = %origin, chars = text.chars().count(), "added document");
        self.documents.push(Document {
            ordinal,
            origin,
            text,
        });
        ordinal
    }

    /// Ingest a file path or `http(s)://` URL.
    pub async fn ingest(&mut self, input: &str) -> Result<usize> {
        match Source::parse(input) {
            Source::File(path) => self.ingest_file(&path),
            Source::Url(url) => self.ingest_url(&url).await,
        }
    }

    pub fn ingest_file(&mut self, path: &Path) -> Result<usize> {
        let text = extract::extract_file(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.add_document(DocumentOrigin::File(name), text))
    }

    /// Ingest an upload held in memory; the extension is taken from `name`.
    pub fn ingest_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<usize> {
        let text = extract::extract_bytes(bytes, &extract::extension_of(name))?;
        Ok(self.add_document(DocumentOrigin::File(name.to_string()), text))
    }

    pub async fn ingest_url(&mut self, url: &str) -> Result<usize> {
        let text = self.fetcher.fetch_text(url).await?;
        Ok(self.add_document(DocumentOrigin::Url(url.to_string()), text))
    }

    // ============ Embedding & indexing ============

    /// Embed every document, replacing the previous embedding set.
    ///
    /// Any existing index is dropped; call [`build_index`](Self::build_index)
    /// afterwards. On failure the previous embeddings and index are kept.
    pub async fn generate_embeddings(
        &mut self,
        progress: &dyn EmbedProgressReporter,
    ) -> Result<usize> {
        if self.documents.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        let handle = self.embedder().await?;
        let total = self.documents.len();
        let batch_size = self.config.embedding.batch_size.max(1);

        let mut fresh = Vec::with_capacity(total);
        for batch in self.documents.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = embedding::embed_texts(&handle, texts).await?;
            fresh.extend(vectors);
            progress.report(EmbedProgressEvent {
                model: handle.model_name().to_string(),
                n: fresh.len() as u64,
                total: total as u64,
            });
        }

        self.embeddings = fresh;
        if self.index.take().is_some() {
            debug!("embeddings regenerated, index cleared");
        }
        info!(count = total, model = handle.model_name(), "generated embeddings");
        Ok(total)
    }

    /// Build the search index from the current embedding set.
    pub fn build_index(&mut self) -> Result<usize> {
        if self.embeddings.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        if self.embeddings.len() != self.documents.len() {
            return Err(RagError::StaleIndex {
                documents: self.documents.len(),
                embeddings: self.embeddings.len(),
            });
        }
        let index = VectorIndex::build(self.embeddings.clone())?;
        let size = index.len();
        info!(size, dims = index.dims(), "built search index");
        self.index = Some(index);
        Ok(size)
    }

    // ============ Retrieval & chat ============

    /// Rank documents against `query`. Empty when no index has been built.
    pub async fn search(&mut self, query: &str, k: usize) -> Result<Vec<Neighbor>> {
        let index_len = match &self.index {
            Some(index) => index.len(),
            None => return Ok(Vec::new()),
        };
        if index_len != self.documents.len() || self.embeddings.len() != self.documents.len() {
            return Err(RagError::StaleIndex {
                documents: self.documents.len(),
                embeddings: self.embeddings.len(),
            });
        }

        let handle = self.embedder().await?;
        let vector = embedding::embed_query(&handle, query).await?;
        match &self.index {
            Some(index) => index.search(&vector, k),
            None => Ok(Vec::new()),
        }
    }

    /// Ordinals of the top-`k` documents for `query`.
    pub async fn retrieve(&mut self, query: &str, k: usize) -> Result<Vec<usize>> {
        Ok(self
            .search(query, k)
            .await?
            .into_iter()
            .map(|n| n.ordinal)
            .collect())
    }

    /// Answer `question` using retrieved context and the conversation so far.
    ///
    /// Without an API key the advisory is returned and nothing is recorded.
    /// Other LLM failures come back as the answer text and are recorded like
    /// any answer. Retrieval failures are returned as errors and leave the
    /// conversation untouched.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        if !self.llm.has_api_key() {
            debug!("no API key configured, question not sent");
            return Ok(llm::MISSING_KEY_ADVISORY.to_string());
        }
        let top_k = self.config.retrieval.top_k;
        let ordinals = self.retrieve(question, top_k).await?;
        let retrieved: Vec<&str> = ordinals
            .iter()
            .filter_map(|&i| self.documents.get(i))
            .map(|d| d.text.as_str())
            .collect();

        let full_prompt = prompt::compose_with_limit(
            question,
            &retrieved,
            &self.history,
            self.config.retrieval.context_chars,
        );
        debug!(
            retrieved = ordinals.len(),
            history = self.history.len(),
            "composed prompt"
        );

        let answer = self.llm.complete_or_advisory(&full_prompt, &self.model).await;

        self.history.push(Turn::user(question));
        self.history.push(Turn::assistant(answer.clone()));
        self.transcript.push(ChatEntry::new(Role::User, question));
        self.transcript
            .push(ChatEntry::new(Role::Assistant, answer.clone()));
        Ok(answer)
    }

    /// Summarise the whole corpus and add the summary to the transcript.
    pub async fn summarize(&mut self) -> Result<String> {
        if self.documents.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        let texts: Vec<&str> = self.documents.iter().map(|d| d.text.as_str()).collect();
        let summary = self
            .llm
            .complete_or_advisory(&prompt::summary_prompt(&texts), &self.model)
            .await;
        self.transcript.push(ChatEntry::new(
            Role::Assistant,
            format!("{}{}", SUMMARY_PREFIX, summary),
        ));
        Ok(summary)
    }

    // ============ Settings ============

    pub fn set_api_key(&mut self, api_key: Option<ApiKey>) {
        self.llm.set_api_key(api_key);
    }

    pub fn has_api_key(&self) -> bool {
        self.llm.has_api_key()
    }

    pub fn available_models(&self) -> &[String] {
        self.llm.available_models()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn select_model(&mut self, name: &str) -> Result<()> {
        if !self.available_models().iter().any(|m| m == name) {
            return Err(RagError::UnknownModel(name.to_string()));
        }
        self.model = name.to_string();
        Ok(())
    }

    pub fn embedding_config(&self) -> &EmbeddingConfig {
        &self.config.embedding
    }

    /// Drop corpus, embeddings, index, history, and transcript. The API key,
    /// model selection, and loaded embedding model are kept.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.embeddings.clear();
        self.index = None;
        self.history.clear();
        self.transcript.clear();
        info!("cleared session data");
    }

    // ============ Accessors ============

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn embedding_count(&self) -> usize {
        self.embeddings.len()
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    /// True when an index exists but no longer covers the corpus.
    pub fn is_index_stale(&self) -> bool {
        match &self.index {
            Some(index) => index.len() != self.documents.len(),
            None => false,
        }
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn export_transcript(&self) -> String {
        export::format_transcript(&self.transcript)
    }

    pub fn processed_files(&self) -> Vec<&str> {
        self.documents
            .iter()
            .filter_map(|d| match &d.origin {
                DocumentOrigin::File(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn processed_urls(&self) -> Vec<&str> {
        self.documents
            .iter()
            .filter_map(|d| match &d.origin {
                DocumentOrigin::Url(url) => Some(url.as_str()),
                _ => None,
            })
            .collect()
    }

    async fn embedder(&mut self) -> Result<ModelHandle> {
        if let Some(handle) = &self.embedder {
            return Ok(handle.clone());
        }
        let config = self.config.embedding.clone();
        let handle = tokio::task::spawn_blocking(move || embedding::load(&config))
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))??;
        self.embedder = Some(handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;

    fn test_config() -> Config {
        let mut config = Config::minimal();
        config.embedding.provider = "hash".to_string();
        config.embedding.dims = Some(384);
        config.embedding.batch_size = 2;
        config
    }

    fn session() -> Session {
        Session::new(&test_config(), None).unwrap()
    }

    fn named(label: &str) -> DocumentOrigin {
        DocumentOrigin::File(label.to_string())
    }

    async fn capitals() -> Session {
        let mut s = session();
        s.add_document(named("d0"), "Paris is the capital of France.".into());
        s.add_document(named("d1"), "Tokyo is the capital of Japan.".into());
        s.generate_embeddings(&NoProgress).await.unwrap();
        s.build_index().unwrap();
        s
    }

    #[tokio::test]
    async fn capital_of_france_ranks_paris_first() {
        let mut s = capitals().await;
        assert_eq!(s.retrieve("capital of France", 1).await.unwrap(), vec![0]);
        assert_eq!(s.retrieve("capital of Japan", 1).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn retrieve_without_index_is_empty() {
        let mut s = session();
        s.add_document(named("d0"), "text".into());
        assert!(s.retrieve("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embed_with_no_documents_is_empty_corpus() {
        let mut s = session();
        assert!(matches!(
            s.generate_embeddings(&NoProgress).await,
            Err(RagError::EmptyCorpus)
        ));
        assert!(matches!(s.build_index(), Err(RagError::EmptyCorpus)));
    }

    #[tokio::test]
    async fn ingesting_after_index_makes_it_stale() {
        let mut s = capitals().await;
        s.add_document(named("d2"), "Rome is the capital of Italy.".into());
        assert!(s.is_index_stale());
        assert!(matches!(
            s.retrieve("capital", 1).await,
            Err(RagError::StaleIndex {
                documents: 3,
                embeddings: 2
            })
        ));
        assert!(matches!(s.build_index(), Err(RagError::StaleIndex { .. })));

        s.generate_embeddings(&NoProgress).await.unwrap();
        assert!(s.index().is_none());
        s.build_index().unwrap();
        assert_eq!(s.retrieve("capital of Italy", 1).await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn failed_ingest_keeps_corpus() {
        let mut s = session();
        s.add_document(named("d0"), "kept".into());
        assert!(s.ingest_bytes("notes.txt", b"hello").is_err());
        assert!(s.ingest_bytes("broken.pdf", b"not a pdf").is_err());
        assert!(s.ingest("/no/such/file.docx").await.is_err());
        assert_eq!(s.documents().len(), 1);
        assert_eq!(s.documents()[0].text, "kept");
    }

    #[tokio::test]
    async fn ask_without_key_returns_advisory_and_records_nothing() {
        let mut s = capitals().await;
        let answer = s.ask("capital of France").await.unwrap();
        assert_eq!(answer, crate::llm::MISSING_KEY_ADVISORY);
        assert!(s.history().is_empty());
        assert!(s.transcript().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_recorded_as_answer() {
        let mut config = test_config();
        config.llm.api_base = "http://127.0.0.1:9/v1".to_string();
        config.llm.timeout_secs = 5;
        let mut s = Session::new(&config, ApiKey::new("k")).unwrap();
        let answer = s.ask("hello").await.unwrap();
        assert!(answer.starts_with("An error occurred while querying the LLM: "));
        assert_eq!(s.history()[0], Turn::user("hello"));
        assert_eq!(s.history()[1], Turn::assistant(answer.clone()));
        assert_eq!(s.transcript().len(), 2);
        assert_eq!(s.transcript()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn stale_ask_leaves_conversation_untouched() {
        let mut s = capitals().await;
        s.set_api_key(ApiKey::new("k"));
        s.add_document(named("d2"), "new".into());
        assert!(s.ask("question").await.is_err());
        assert!(s.history().is_empty());
        assert!(s.transcript().is_empty());
    }

    #[tokio::test]
    async fn summary_goes_to_transcript_only() {
        let mut s = capitals().await;
        s.summarize().await.unwrap();
        assert!(s.history().is_empty());
        assert_eq!(s.transcript().len(), 1);
        assert!(s.transcript()[0].message.starts_with(SUMMARY_PREFIX));
    }

    #[tokio::test]
    async fn summary_needs_documents() {
        let mut s = session();
        assert!(matches!(s.summarize().await, Err(RagError::EmptyCorpus)));
    }

    #[tokio::test]
    async fn clear_resets_state_but_keeps_settings() {
        let mut s = capitals().await;
        s.set_api_key(ApiKey::new("k"));
        s.select_model("gemma-7b-it").unwrap();
        s.clear();
        assert!(s.documents().is_empty());
        assert_eq!(s.embedding_count(), 0);
        assert!(s.index().is_none());
        assert!(s.transcript().is_empty());
        assert!(s.has_api_key());
        assert_eq!(s.model(), "gemma-7b-it");
    }

    #[test]
    fn unknown_model_rejected() {
        let mut s = session();
        assert!(matches!(
            s.select_model("gpt-4"),
            Err(RagError::UnknownModel(_))
        ));
        assert_eq!(s.model(), "mixtral-8x7b-32768");
    }

    #[test]
    fn processed_sources_split_by_kind() {
        let mut s = session();
        s.add_document(DocumentOrigin::File("a.pdf".into()), "a".into());
        s.add_document(DocumentOrigin::Url("https://x.test".into()), "b".into());
        assert_eq!(s.processed_files(), vec!["a.pdf"]);
        assert_eq!(s.processed_urls(), vec!["https://x.test"]);
    }

    #[tokio::test]
    async fn embeddings_match_document_count_across_batches() {
        let mut s = session();
        for i in 0..5 {
            s.add_document(named(&format!("d{}", i)), format!("document {}", i));
        }
        assert_eq!(s.generate_embeddings(&NoProgress).await.unwrap(), 5);
        assert_eq!(s.embedding_count(), 5);
        assert_eq!(s.build_index().unwrap(), 5);
    }
}
