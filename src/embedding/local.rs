//! Local sentence-transformer inference via fastembed.

use std::sync::Mutex;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// Embedding provider for local inference.
///
/// The model is downloaded on first construction and cached on disk by
/// fastembed; afterwards embeddings run offline.
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Mutex<fastembed::TextEmbedding>,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let fastembed_model = config_to_fastembed_model(&model_name)?;
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
        )
        .map_err(|e| {
            RagError::Embedding(format!("failed to initialize local embedding model: {}", e))
        })?;

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: Mutex::new(model),
        })
    }
}

impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| RagError::Embedding("embedding model poisoned".to_string()))?;
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| RagError::Embedding(format!("local embedding failed: {}", e)))
    }
}

fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config.model_name();
    // Fixed by the model; `embedding.dims` is rejected for this provider.
    let dims = match model_name.as_str() {
        "bge-base-en-v1.5" => 768,
        _ => 384,
    };
    (model_name, dims)
}

fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => Err(RagError::Embedding(format!(
            "unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, multilingual-e5-small",
            other
        ))),
    }
}
