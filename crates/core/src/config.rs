//! Configuration via `tread.toml`
//!
//! Every field carries a serde default, so an empty file (or a file with only
//! the sections you care about) is a valid configuration. On first start,
//! [`TreadConfig::write_default_if_missing`] drops a commented default file
//! into the data directory.

use crate::error::{TreadError, TreadResult};
use crate::primitives::{DistanceMetric, VectorConfig};
use crate::search_types::Modality;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "tread.toml";

/// Extension of the collection snapshot file.
pub const SNAPSHOT_EXTENSION: &str = "tread";

// ============================================================================
// Index
// ============================================================================

/// Index backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Exact scan over all live vectors
    #[default]
    Flat,
    /// k-means inverted lists, exact scan until trained
    Clustered,
    /// External vector service
    Managed,
}

impl BackendKind {
    /// Lowercase name, as reported by index stats
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Flat => "flat",
            BackendKind::Clustered => "clustered",
            BackendKind::Managed => "managed",
        }
    }
}

/// `[index]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Collection name
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Embedding dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// `"euclidean"` or `"cosine"`
    #[serde(default)]
    pub metric: DistanceMetric,
    /// `"flat"`, `"clustered"` or `"managed"`
    #[serde(default)]
    pub backend: BackendKind,
    /// Number of clusters for the clustered backend
    #[serde(default = "default_nlist")]
    pub nlist: usize,
    /// Clusters probed per query
    #[serde(default = "default_nprobe")]
    pub nprobe: usize,
    /// Maximum vectors used to train the clustered backend
    #[serde(default = "default_training_sample")]
    pub training_sample: usize,
    /// Live vectors required before training kicks in
    #[serde(default = "default_min_train_vectors")]
    pub min_train_vectors: usize,
    /// Directory holding the collection snapshot; in-memory only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_collection() -> String {
    "shoe_images".to_string()
}

fn default_dimension() -> usize {
    512
}

fn default_nlist() -> usize {
    16
}

fn default_nprobe() -> usize {
    4
}

fn default_training_sample() -> usize {
    1000
}

fn default_min_train_vectors() -> usize {
    32
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            dimension: default_dimension(),
            metric: DistanceMetric::default(),
            backend: BackendKind::default(),
            nlist: default_nlist(),
            nprobe: default_nprobe(),
            training_sample: default_training_sample(),
            min_train_vectors: default_min_train_vectors(),
            data_dir: None,
        }
    }
}

impl IndexConfig {
    /// Vector configuration derived from this section
    pub fn vector_config(&self) -> TreadResult<VectorConfig> {
        VectorConfig::new(self.dimension, self.metric)
    }

    /// `<data_dir>/<collection>.tread`, when persistence is enabled
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| {
            dir.join(format!("{}.{}", self.collection, SNAPSHOT_EXTENSION))
        })
    }
}

// ============================================================================
// Search
// ============================================================================

/// Per-modality fusion weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Weight of image similarity
    #[serde(default = "default_visual_weight")]
    pub visual: f32,
    /// Weight of text similarity
    #[serde(default = "default_text_weight")]
    pub text: f32,
    /// Weight of a metadata filter match
    #[serde(default = "default_metadata_weight")]
    pub metadata: f32,
}

fn default_visual_weight() -> f32 {
    0.4
}

fn default_text_weight() -> f32 {
    0.3
}

fn default_metadata_weight() -> f32 {
    0.3
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            visual: default_visual_weight(),
            text: default_text_weight(),
            metadata: default_metadata_weight(),
        }
    }
}

impl FusionWeights {
    /// Weight configured for a modality
    pub fn weight(&self, modality: Modality) -> f32 {
        match modality {
            Modality::Visual => self.visual,
            Modality::Text => self.text,
            Modality::Metadata => self.metadata,
        }
    }
}

/// `[search]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Upper bound on any requested limit
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Post-filter applied when a request sets no threshold (0.0 = off)
    #[serde(default)]
    pub similarity_threshold: f32,
    /// Candidates fetched per modality = limit * multiplier
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Fusion weights
    #[serde(default)]
    pub weights: FusionWeights,
    /// Maximum query variants used by semantic search
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
    /// Capacity of the analytics channel
    #[serde(default = "default_analytics_capacity")]
    pub analytics_capacity: usize,
}

fn default_max_results() -> usize {
    50
}

fn default_candidate_multiplier() -> usize {
    2
}

fn default_max_expansions() -> usize {
    6
}

fn default_analytics_capacity() -> usize {
    1024
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            similarity_threshold: 0.0,
            candidate_multiplier: default_candidate_multiplier(),
            weights: FusionWeights::default(),
            max_expansions: default_max_expansions(),
            analytics_capacity: default_analytics_capacity(),
        }
    }
}

// ============================================================================
// Category registry
// ============================================================================

/// Recognized catalog categories, used by intent extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRegistry {
    /// Known brands (`other` is the catch-all)
    #[serde(default = "default_brands")]
    pub brands: Vec<String>,
    /// Known sole patterns
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
    /// Known sole shapes
    #[serde(default = "default_shapes")]
    pub shapes: Vec<String>,
    /// Known sizes
    #[serde(default = "default_sizes")]
    pub sizes: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_brands() -> Vec<String> {
    strings(&[
        "nike",
        "adidas",
        "puma",
        "converse",
        "vans",
        "reebok",
        "new_balance",
        "asics",
        "under_armour",
        "jordan",
        "other",
    ])
}

fn default_patterns() -> Vec<String> {
    strings(&["zigzag", "circular", "square", "diamond", "brand_logo", "other"])
}

fn default_shapes() -> Vec<String> {
    strings(&["round", "square", "oval", "irregular", "elongated"])
}

fn default_sizes() -> Vec<String> {
    strings(&["small", "medium", "large", "extra_large"])
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self {
            brands: default_brands(),
            patterns: default_patterns(),
            shapes: default_shapes(),
            sizes: default_sizes(),
        }
    }
}

impl CategoryRegistry {
    pub fn is_brand(&self, value: &str) -> bool {
        self.brands.iter().any(|b| b == value)
    }

    pub fn is_pattern(&self, value: &str) -> bool {
        self.patterns.iter().any(|p| p == value)
    }

    pub fn is_shape(&self, value: &str) -> bool {
        self.shapes.iter().any(|s| s == value)
    }

    pub fn is_size(&self, value: &str) -> bool {
        self.sizes.iter().any(|s| s == value)
    }
}

// ============================================================================
// TreadConfig
// ============================================================================

/// Configuration loaded from `tread.toml`.
///
/// # Example
///
/// ```toml
/// [index]
/// collection = "shoe_images"
/// dimension = 512
/// backend = "clustered"
///
/// [search.weights]
/// visual = 0.5
/// text = 0.3
/// metadata = 0.2
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreadConfig {
    /// Index settings
    #[serde(default)]
    pub index: IndexConfig,
    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,
    /// Category registry
    #[serde(default)]
    pub categories: CategoryRegistry,
}

impl TreadConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Tread configuration

[index]
# Collection name; the snapshot is stored as <data_dir>/<collection>.tread
collection = "shoe_images"
# Embedding dimension (CLIP ViT-B/32 = 512)
dimension = 512
# "euclidean" (default) or "cosine"
metric = "euclidean"
# "flat" (exact), "clustered" (k-means inverted lists) or "managed"
backend = "flat"
# Clustered backend tuning
nlist = 16
nprobe = 4
training_sample = 1000
min_train_vectors = 32
# Uncomment to persist the collection
# data_dir = "data"

[search]
max_results = 50
# Drop results below this score when a request sets no threshold (0.0 = off)
similarity_threshold = 0.0
candidate_multiplier = 2
max_expansions = 6
analytics_capacity = 1024

[search.weights]
visual = 0.4
text = 0.3
metadata = 0.3

# [categories]
# brands = ["nike", "adidas", "puma", "converse", "vans", "reebok",
#           "new_balance", "asics", "under_armour", "jordan", "other"]
# patterns = ["zigzag", "circular", "square", "diamond", "brand_logo", "other"]
# shapes = ["round", "square", "oval", "irregular", "elongated"]
# sizes = ["small", "medium", "large", "extra_large"]
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> TreadResult<Self> {
        let config: TreadConfig = toml::from_str(content)
            .map_err(|e| TreadError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> TreadResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TreadError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            TreadError::Config(msg) => TreadError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Write the default config file into `dir` if it does not already exist.
    ///
    /// Returns the path of the config file.
    pub fn write_default_if_missing(dir: &Path) -> TreadResult<PathBuf> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            std::fs::write(&path, Self::default_toml()).map_err(|e| {
                TreadError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(path)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> TreadResult<()> {
        let index = &self.index;
        if index.collection.trim().is_empty() {
            return Err(TreadError::Config("index.collection must not be empty".into()));
        }
        if index.dimension == 0 {
            return Err(TreadError::Config("index.dimension must be > 0".into()));
        }
        if index.nlist == 0 || index.nprobe == 0 {
            return Err(TreadError::Config(
                "index.nlist and index.nprobe must be > 0".into(),
            ));
        }
        if index.training_sample == 0 {
            return Err(TreadError::Config("index.training_sample must be > 0".into()));
        }

        let search = &self.search;
        if search.max_results == 0 || search.candidate_multiplier == 0 {
            return Err(TreadError::Config(
                "search.max_results and search.candidate_multiplier must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&search.similarity_threshold) {
            return Err(TreadError::Config(
                "search.similarity_threshold must be within [0, 1]".into(),
            ));
        }
        for modality in Modality::ALL {
            let w = search.weights.weight(modality);
            if !w.is_finite() || w < 0.0 {
                return Err(TreadError::Config(format!(
                    "search.weights.{} must be a non-negative number",
                    modality
                )));
            }
        }
        if search.analytics_capacity == 0 {
            return Err(TreadError::Config("search.analytics_capacity must be > 0".into()));
        }
        Ok(())
    }
}
