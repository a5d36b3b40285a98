//! Embedding provider abstraction, implementations, and the model cache.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`HashProvider`]**: deterministic feature-hashing bag of words. No
//!   model download; used offline and in tests.
//! - **`LocalProvider`**: sentence-transformer models run locally via
//!   fastembed. Models are downloaded from Hugging Face on first use.
//!
//! Providers are loaded through [`load`], which keeps one handle per model
//! name for the lifetime of the process. Handles are read-only after load
//! and may be shared between sessions.
//!
//! ```rust
//! # use ragchat::config::EmbeddingConfig;
//! # use ragchat::embedding::load;
//! let config = EmbeddingConfig {
//!     provider: "hash".to_string(),
//!     dims: Some(64),
//!     ..EmbeddingConfig::default()
//! };
//! let a = load(&config).unwrap();
//! let b = load(&config).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&a, &b));
//! assert_eq!(a.embed(&["".to_string()]).unwrap()[0].len(), 64);
//! ```

mod hash;
#[cfg(feature = "local-embeddings-fastembed")]
mod local;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::info;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

pub use hash::HashProvider;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalProvider;

/// Trait for embedding providers.
///
/// Implementations must be deterministic for a given model and input and
/// must return vectors of exactly [`dims`](EmbeddingProvider::dims)
/// entries for every input, the empty string included.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input in input order.
    ///
    /// May block on model inference; async callers go through [`embed_texts`].
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Shared, loaded embedding model.
pub type ModelHandle = Arc<dyn EmbeddingProvider>;

static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelHandle>>> = OnceLock::new();

/// Load the model described by `config`, reusing a cached handle when one
/// with the same name has been loaded before.
pub fn load(config: &EmbeddingConfig) -> Result<ModelHandle> {
    let key = config.model_name();
    let cache = MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut models = cache
        .lock()
        .map_err(|_| RagError::Embedding("model cache poisoned".to_string()))?;
    if let Some(handle) = models.get(&key) {
        return Ok(Arc::clone(handle));
    }

    info!(model = %key, "loading embedding model");
    let handle = create_provider(config)?;
    models.insert(key, Arc::clone(&handle));
    Ok(handle)
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration,
/// bypassing the cache.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"hash"` | [`HashProvider`] |
/// | `"local"` | `LocalProvider` (requires the `local-embeddings-fastembed` feature) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<ModelHandle> {
    match config.provider.as_str() {
        "hash" => {
            let dims = config.dims.filter(|d| *d > 0).ok_or_else(|| {
                RagError::Embedding("embedding.dims required for hash provider".into())
            })?;
            Ok(Arc::new(HashProvider::new(dims)))
        }
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => Err(RagError::Embedding(
            "local embedding provider requires --features local-embeddings-fastembed".into(),
        )),
        other => Err(RagError::Embedding(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Embed `texts` on the blocking pool.
pub async fn embed_texts(handle: &ModelHandle, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    let handle = Arc::clone(handle);
    let expected = texts.len();
    let vectors = tokio::task::spawn_blocking(move || handle.embed(&texts))
        .await
        .map_err(|e| RagError::Embedding(e.to_string()))??;
    if vectors.len() != expected {
        return Err(RagError::Embedding(format!(
            "model returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    Ok(vectors)
}

/// Embed a single query text.
pub async fn embed_query(handle: &ModelHandle, text: &str) -> Result<Vec<f32>> {
    embed_texts(handle, vec![text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::Embedding("empty embedding response".to_string()))
}
