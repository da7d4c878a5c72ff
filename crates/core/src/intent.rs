//! Structured interpretation of a free-text query
//!
//! A [`QueryIntent`] is a value object: it is validated once by
//! [`QueryIntentBuilder::build`] and exposes read-only accessors afterwards.

use crate::error::{TreadError, TreadResult};
use crate::primitives::MetadataFilter;
use crate::search_types::QueryType;
use serde::{Deserialize, Serialize};

/// Results returned when a query does not ask for a count
pub const DEFAULT_LIMIT: usize = 10;

/// Threshold used when a query does not express one
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// Confidence attached to an intent produced by the degraded path
pub const FALLBACK_CONFIDENCE: f32 = 0.2;

/// Parsed query: terms, filters, modality, limit, threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    query_type: QueryType,
    search_terms: Vec<String>,
    filters: MetadataFilter,
    image_path: Option<String>,
    similarity_threshold: f32,
    limit: usize,
    confidence: f32,
}

impl QueryIntent {
    /// Start building an intent of the given type
    pub fn builder(query_type: QueryType) -> QueryIntentBuilder {
        QueryIntentBuilder {
            query_type,
            search_terms: Vec::new(),
            filters: MetadataFilter::new(),
            image_path: None,
            similarity_threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
            confidence: 1.0,
        }
    }

    /// Degraded intent: plain text search over the raw query
    pub fn fallback(text: &str) -> Self {
        QueryIntent {
            query_type: QueryType::Text,
            search_terms: vec![text.to_string()],
            filters: MetadataFilter::new(),
            image_path: None,
            similarity_threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
            confidence: FALLBACK_CONFIDENCE,
        }
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Deduplicated search terms
    pub fn search_terms(&self) -> &[String] {
        &self.search_terms
    }

    pub fn filters(&self) -> &MetadataFilter {
        &self.filters
    }

    pub fn image_path(&self) -> Option<&str> {
        self.image_path.as_deref()
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Search terms joined with single spaces
    pub fn terms_text(&self) -> String {
        self.search_terms.join(" ")
    }
}

/// Builder for [`QueryIntent`]
#[derive(Debug, Clone)]
pub struct QueryIntentBuilder {
    query_type: QueryType,
    search_terms: Vec<String>,
    filters: MetadataFilter,
    image_path: Option<String>,
    similarity_threshold: f32,
    limit: usize,
    confidence: f32,
}

impl QueryIntentBuilder {
    /// Append terms; duplicates are dropped, first occurrence kept
    pub fn terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for term in terms {
            let term = term.into();
            if !self.search_terms.contains(&term) {
                self.search_terms.push(term);
            }
        }
        self
    }

    pub fn filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = filters;
        self
    }

    pub fn image_path(mut self, path: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Validate and freeze
    ///
    /// # Errors
    ///
    /// `Validation` if threshold or confidence fall outside `[0, 1]`, or
    /// limit is zero.
    pub fn build(self) -> TreadResult<QueryIntent> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(TreadError::validation(format!(
                "similarity threshold {} must be within [0, 1]",
                self.similarity_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(TreadError::validation(format!(
                "confidence {} must be within [0, 1]",
                self.confidence
            )));
        }
        if self.limit == 0 {
            return Err(TreadError::validation("limit must be at least 1"));
        }
        Ok(QueryIntent {
            query_type: self.query_type,
            search_terms: self.search_terms,
            filters: self.filters,
            image_path: self.image_path,
            similarity_threshold: self.similarity_threshold,
            limit: self.limit,
            confidence: self.confidence,
        })
    }
}
