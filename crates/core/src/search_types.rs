//! Core search types
//!
//! This module defines the value types that flow through a query:
//! - Modality: signal type a score came from (visual, text, metadata)
//! - Candidate: per-modality, pre-fusion result
//! - RankedResult: fused, ranked output row
//! - QueryType: classification of a parsed query
//! - SearchMode: strategy the orchestrator executes
//! - SearchRequest / SearchResponse: one orchestrated query and its answer

use crate::primitives::{Metadata, MetadataFilter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Modality
// ============================================================================

/// Independent signal type contributing to a ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Image embedding similarity
    Visual,
    /// Text embedding similarity
    Text,
    /// Passed the metadata filter (constant 1.0)
    Metadata,
}

impl Modality {
    /// All modalities in canonical order
    pub const ALL: [Modality; 3] = [Modality::Visual, Modality::Text, Modality::Metadata];

    /// Lowercase name, as used in configuration and score maps
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Visual => "visual",
            Modality::Text => "text",
            Modality::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// Single-modality search hit, before fusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Id of the matched vector record
    pub vector_id: String,
    /// Similarity in `[0, 1]`
    pub score: f32,
    /// Modality that produced the score
    pub modality: Modality,
    /// Record metadata at query time
    pub metadata: Metadata,
}

impl Candidate {
    /// Re-tag this candidate with a different modality
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = modality;
        self
    }
}

// ============================================================================
// RankedResult
// ============================================================================

/// Final ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Id of the matched vector record
    pub vector_id: String,
    /// Display filename (metadata `filename`, else the vector id)
    pub filename: String,
    /// Record metadata
    pub metadata: Metadata,
    /// Score per contributing modality
    pub scores: BTreeMap<Modality, f32>,
    /// Combined score in `[0, 1]`
    pub fused_score: f32,
    /// 1-indexed position in the result list
    pub rank: u32,
}

impl RankedResult {
    /// Score for one modality, if it contributed
    pub fn score(&self, modality: Modality) -> Option<f32> {
        self.scores.get(&modality).copied()
    }
}

// ============================================================================
// QueryType
// ============================================================================

/// Classification of a free-text query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Plain text description (default)
    #[default]
    Text,
    /// "Similar to this image" style query
    Image,
    /// Text plus filters or an image
    Hybrid,
    /// Expanded-query semantic search
    Semantic,
    /// Filters only
    Metadata,
}

impl QueryType {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Text => "text",
            QueryType::Image => "image",
            QueryType::Hybrid => "hybrid",
            QueryType::Semantic => "semantic",
            QueryType::Metadata => "metadata",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SearchMode
// ============================================================================

/// Search mode - determines the retrieval strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Text embedding search
    Text,
    /// Image embedding search
    Image,
    /// Weighted fusion of text, image, and filters
    Hybrid,
    /// Text search over expanded query variants
    Semantic,
    /// Filter-only scan
    Metadata,
    /// Image search excluding the reference image
    Recommendation,
}

impl SearchMode {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Text => "text",
            SearchMode::Image => "image",
            SearchMode::Hybrid => "hybrid",
            SearchMode::Semantic => "semantic",
            SearchMode::Metadata => "metadata",
            SearchMode::Recommendation => "recommendation",
        }
    }
}

impl From<QueryType> for SearchMode {
    fn from(q: QueryType) -> Self {
        match q {
            QueryType::Text => SearchMode::Text,
            QueryType::Image => SearchMode::Image,
            QueryType::Hybrid => SearchMode::Hybrid,
            QueryType::Semantic => SearchMode::Semantic,
            QueryType::Metadata => SearchMode::Metadata,
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SearchRequest
// ============================================================================

/// Request for one orchestrated search
///
/// Build with the constructor matching the mode, then refine:
///
/// ```
/// use tread_core::{MetadataFilter, SearchMode, SearchRequest};
///
/// let req = SearchRequest::text("red running shoes")
///     .with_filters(MetadataFilter::new().eq("brand", "nike"))
///     .with_limit(20);
///
/// assert_eq!(req.mode, SearchMode::Text);
/// assert_eq!(req.limit, Some(20));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Strategy to run
    pub mode: SearchMode,

    /// Text query (text, hybrid, semantic)
    pub query: Option<String>,

    /// Reference image (image, hybrid, recommendation)
    pub image_path: Option<PathBuf>,

    /// Metadata filters; empty means unfiltered
    pub filters: MetadataFilter,

    /// Maximum results; `None` uses the configured maximum
    pub limit: Option<usize>,

    /// Minimum per-modality similarity; `None` uses the configured threshold
    pub threshold: Option<f32>,
}

impl SearchRequest {
    fn empty(mode: SearchMode) -> Self {
        SearchRequest {
            mode,
            query: None,
            image_path: None,
            filters: MetadataFilter::new(),
            limit: None,
            threshold: None,
        }
    }

    /// Text-to-image search
    pub fn text(query: impl Into<String>) -> Self {
        SearchRequest::empty(SearchMode::Text).with_query(query)
    }

    /// Image-to-image search
    pub fn image(path: impl Into<PathBuf>) -> Self {
        SearchRequest::empty(SearchMode::Image).with_image(path)
    }

    /// Fusion of text, image and filters; set at least a query or an image
    pub fn hybrid() -> Self {
        SearchRequest::empty(SearchMode::Hybrid)
    }

    /// Text search over expanded query variants
    pub fn semantic(query: impl Into<String>) -> Self {
        SearchRequest::empty(SearchMode::Semantic).with_query(query)
    }

    /// Filter-only scan
    pub fn metadata(filters: MetadataFilter) -> Self {
        SearchRequest::empty(SearchMode::Metadata).with_filters(filters)
    }

    /// Items similar to a reference image, excluding the image itself
    pub fn recommendation(path: impl Into<PathBuf>) -> Self {
        SearchRequest::empty(SearchMode::Recommendation).with_image(path)
    }

    /// Builder: set text query
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Builder: set reference image
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Builder: set metadata filters
    pub fn with_filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = filters;
        self
    }

    /// Builder: set result limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builder: set similarity threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

// ============================================================================
// SearchResponse
// ============================================================================

/// Ranked answer to a [`SearchRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Results, rank 1 first
    pub results: Vec<RankedResult>,

    /// Mode that produced the results
    pub mode: SearchMode,

    /// Whether more results than the limit were available
    pub truncated: bool,

    /// Wall time spent, in microseconds
    pub elapsed_micros: u64,
}

impl SearchResponse {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Vector ids in rank order
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.vector_id.as_str()).collect()
    }
}
