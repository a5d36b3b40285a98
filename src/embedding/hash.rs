use sha2::{Digest, Sha256};

use super::EmbeddingProvider;
use crate::error::Result;

/// Feature-hashing bag-of-words embedder.
///
/// Each lower-cased alphanumeric token increments one of `dims` buckets
/// chosen by SHA-256; the result is L2-normalised. Texts that share words
/// land close together. Text with no tokens maps to the zero vector.
pub struct HashProvider {
    name: String,
    dims: usize,
}

impl HashProvider {
    pub fn new(dims: usize) -> Self {
        Self {
            name: format!("hash-{}", dims),
            dims,
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(head) % self.dims as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            v[self.bucket(&token.to_lowercase())] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_vector() {
        let p = HashProvider::new(16);
        let v = p.embed(&["".to_string()]).unwrap();
        assert_eq!(v[0], vec![0.0; 16]);
    }

    #[test]
    fn output_is_unit_length() {
        let p = HashProvider::new(64);
        let v = &p.embed(&["The quick brown fox".to_string()]).unwrap()[0];
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn deterministic_and_case_insensitive() {
        let p = HashProvider::new(64);
        let a = p.embed(&["Capital of France".to_string()]).unwrap();
        let b = p.embed(&["capital OF france".to_string()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn model_name_includes_dims() {
        assert_eq!(HashProvider::new(384).model_name(), "hash-384");
    }
}
