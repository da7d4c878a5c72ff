//! Shared test utilities for the root integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use serde_json::json;
use tempfile::TempDir;
use tread::{DistanceMetric, EmbedError, Embedder, Metadata, TreadConfig, VectorIndex};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tread::*` logs to the test writer once per process.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// CaptionEmbedder
// ============================================================================

/// Bag-of-words embedder
///
/// Every word is hashed (FNV-1a) into one of `dim` buckets and the counts
/// are normalized. An "image" is a text file holding its caption, so an
/// image and its caption embed identically.
pub struct CaptionEmbedder {
    dim: usize,
}

impl CaptionEmbedder {
    pub fn new(dim: usize) -> Self {
        CaptionEmbedder { dim }
    }

    fn bucket(&self, word: &str) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in word.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % self.dim as u64) as usize
    }
}

impl Embedder for CaptionEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            v[self.bucket(&word.to_lowercase())] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(EmbedError::Unsupported(format!("no words in '{}'", text)));
        }
        v.iter_mut().for_each(|x| *x /= norm);
        Ok(v)
    }

    fn embed_image(&self, path: &Path) -> Result<Vec<f32>, EmbedError> {
        let caption = std::fs::read_to_string(path).map_err(|e| EmbedError::Image {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.embed_text(&caption)
    }

    fn name(&self) -> &str {
        "caption"
    }
}

// ============================================================================
// Catalog fixture
// ============================================================================

pub const DIM: usize = 32;

/// (filename, caption, brand, color, style)
pub const CATALOG: &[(&str, &str, &str, &str, &str)] = &[
    ("air_max.png", "red running trainer mesh", "nike", "red", "running"),
    ("pegasus.png", "blue running trainer knit", "nike", "blue", "running"),
    ("samba.png", "white leather court classic", "adidas", "white", "casual"),
    ("gazelle.png", "red suede court classic", "adidas", "red", "casual"),
    ("chuck.png", "black canvas high top", "converse", "black", "casual"),
    ("suede.png", "red suede low top", "puma", "red", "casual"),
];

/// Config for a cosine, flat collection of [`DIM`] dimensions
pub fn test_config() -> TreadConfig {
    let mut config = TreadConfig::default();
    config.index.dimension = DIM;
    config.index.metric = DistanceMetric::Cosine;
    config
}

/// Write every catalog image into `dir`
pub fn write_images(dir: &Path) -> Vec<PathBuf> {
    CATALOG
        .iter()
        .map(|(file, caption, ..)| {
            let path = dir.join(file);
            std::fs::write(&path, caption).unwrap();
            path
        })
        .collect()
}

/// Embed and add the catalog images; returns their ids in catalog order
pub fn index_catalog(index: &VectorIndex, images: &[PathBuf]) -> Vec<String> {
    let embedder = CaptionEmbedder::new(DIM);
    let mut vectors = Vec::new();
    let mut metadata: Vec<Metadata> = Vec::new();
    for ((file, _, brand, color, style), path) in CATALOG.iter().zip(images) {
        vectors.push(embedder.embed_image(path).unwrap());
        metadata.push(
            json!({
                "filename": file,
                "original_path": path.to_string_lossy(),
                "brand": brand,
                "color": color,
                "style": style,
            })
            .as_object()
            .unwrap()
            .clone(),
        );
    }
    index.add(vectors, metadata, None).unwrap()
}

/// A temp dir holding the catalog images, and an embedder for them
pub fn catalog_dir() -> (TempDir, Vec<PathBuf>, Arc<dyn Embedder>) {
    let dir = tempfile::tempdir().unwrap();
    let images_dir = dir.path().join("images");
    std::fs::create_dir(&images_dir).unwrap();
    let images = write_images(&images_dir);
    (dir, images, Arc::new(CaptionEmbedder::new(DIM)))
}
