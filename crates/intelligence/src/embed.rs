//! Embedder capability
//!
//! The model that turns text or an image into a vector lives outside this
//! crate. Search only needs the [`Embedder`] trait: deterministic output for
//! identical input, and a recognizable error on failure. A failed embedding
//! is reported, never replaced by a zero vector.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tread_core::TreadError;

/// Embedder failure
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Image file missing or unreadable
    #[error("cannot read image {path}: {reason}")]
    Image { path: PathBuf, reason: String },

    /// Input the model cannot embed (empty text, unsupported format)
    #[error("unsupported input: {0}")]
    Unsupported(String),

    /// Model failure
    #[error("embedding model failed: {0}")]
    Model(String),
}

impl From<EmbedError> for TreadError {
    fn from(e: EmbedError) -> Self {
        TreadError::Embedding(e.to_string())
    }
}

/// Text and image embedding into one shared space
///
/// Object-safe for use as `Arc<dyn Embedder>`.
pub trait Embedder: Send + Sync {
    /// Length of every returned vector
    fn dimension(&self) -> usize;

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError>;

    /// Name for debugging and logging
    fn name(&self) -> &str {
        "embedder"
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Deterministic hashing embedder for tests

    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    /// Hashes the input into a unit vector
    ///
    /// Texts sharing a pinned vector embed to it exactly; everything else
    /// gets a pseudo-random direction. Image paths embed by file name.
    pub struct HashEmbedder {
        pub dim: usize,
        pub pinned: Vec<(String, Vec<f32>)>,
    }

    impl HashEmbedder {
        pub fn new(dim: usize) -> Self {
            HashEmbedder {
                dim,
                pinned: Vec::new(),
            }
        }

        pub fn pin(mut self, input: &str, vector: Vec<f32>) -> Self {
            self.pinned.push((input.to_string(), vector));
            self
        }

        fn hashed(&self, input: &str) -> Vec<f32> {
            if let Some((_, v)) = self.pinned.iter().find(|(k, _)| k == input) {
                return v.clone();
            }
            let mut v: Vec<f32> = (0..self.dim)
                .map(|i| {
                    let mut h = DefaultHasher::new();
                    (input, i).hash(&mut h);
                    (h.finish() % 2000) as f32 / 1000.0 - 1.0
                })
                .collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
            v.iter_mut().for_each(|x| *x /= norm);
            v
        }
    }

    impl Embedder for HashEmbedder {
        fn dimension(&self) -> usize {
            self.dim
        }

        fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
            if text.trim().is_empty() {
                return Err(EmbedError::Unsupported("empty text".into()));
            }
            Ok(self.hashed(text))
        }

        fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| EmbedError::Unsupported(path.display().to_string()))?;
            Ok(self.hashed(name))
        }
    }
}
