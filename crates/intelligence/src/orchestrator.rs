//! Search orchestrator
//!
//! This module provides:
//! - SearchOrchestrator: runs a [`SearchRequest`] in one of six modes
//! - Per-mode input validation before any embedding or index work
//! - Natural-language entry point through the intent extractor
//!
//! # Modes
//!
//! | Mode | Needs | Signals |
//! |------|-------|---------|
//! | text | query | text embedding |
//! | image | existing image | image embedding |
//! | hybrid | query and/or image, optional filters | weighted fusion |
//! | semantic | query | expanded variants, agreement boost |
//! | metadata | filters | filter scan, score 1.0 |
//! | recommendation | existing image | image embedding, reference excluded |
//!
//! # Stateless Design
//!
//! The orchestrator holds only `Arc` collaborators and immutable config.
//! Every query is independent; nothing carries over between calls.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;
use tread_core::{
    Candidate, MetadataFilter, Modality, QueryIntent, QueryType, RankedResult, SearchConfig,
    SearchMode, SearchRequest, SearchResponse, TreadConfig, TreadError, TreadResult,
};
use tread_engine::{IndexStats, VectorIndex};

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::embed::Embedder;
use crate::expand::{QueryExpander, SynonymExpander};
use crate::fuser::{rank_candidates, semantic_boost_fuse, FusedResult, Fuser, WeightedFuser};
use crate::intent::{validate_query, QueryIntentExtractor, MAX_QUERY_CHARS};

/// Metadata key recording where an indexed image came from
pub const ORIGINAL_PATH_KEY: &str = "original_path";

/// Retrieval strategy selection and execution over one collection
#[derive(Clone)]
pub struct SearchOrchestrator {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    extractor: QueryIntentExtractor,
    expander: Arc<dyn QueryExpander>,
    fuser: Arc<dyn Fuser>,
    config: SearchConfig,
    analytics: Option<AnalyticsSink>,
}

impl std::fmt::Debug for SearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOrchestrator")
            .field("collection", &self.index.name())
            .field("embedder", &self.embedder.name())
            .field("expander", &self.expander.name())
            .field("fuser", &self.fuser.name())
            .field("analytics", &self.analytics.is_some())
            .finish()
    }
}

impl SearchOrchestrator {
    /// Wire an orchestrator from `[search]` and `[categories]`
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` when the embedder's output does not fit the index.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        config: &TreadConfig,
    ) -> TreadResult<Self> {
        if embedder.dimension() != index.dimension() {
            return Err(TreadError::DimensionMismatch {
                expected: index.dimension(),
                got: embedder.dimension(),
            });
        }
        Ok(SearchOrchestrator {
            index,
            embedder,
            extractor: QueryIntentExtractor::new(config.categories.clone()),
            expander: Arc::new(SynonymExpander::new(config.search.max_expansions)),
            fuser: Arc::new(WeightedFuser::new(config.search.weights)),
            config: config.search.clone(),
            analytics: None,
        })
    }

    /// Builder: set custom query expander
    pub fn with_expander(mut self, expander: Arc<dyn QueryExpander>) -> Self {
        self.expander = expander;
        self
    }

    /// Builder: set custom fuser for hybrid mode
    pub fn with_fuser(mut self, fuser: Arc<dyn Fuser>) -> Self {
        self.fuser = fuser;
        self
    }

    /// Builder: report every completed query to `sink`
    pub fn with_analytics(mut self, sink: AnalyticsSink) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn extractor(&self) -> &QueryIntentExtractor {
        &self.extractor
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Statistics of the underlying index
    pub fn stats(&self) -> IndexStats {
        self.index.get_stats()
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Run a request in its mode
    ///
    /// # Errors
    ///
    /// - `Validation` for missing or invalid inputs of the mode
    /// - `Embedding` when the embedder fails
    /// - index errors (`DimensionMismatch`, `Storage`) as they occur
    pub fn search(&self, req: &SearchRequest) -> TreadResult<SearchResponse> {
        let response = self.execute(req)?;
        self.record(describe(req), req, &response);
        Ok(response)
    }

    /// Validate free text, extract its intent, and run the matching mode
    ///
    /// The intent's limit and similarity threshold apply.
    pub fn search_natural(&self, text: &str) -> TreadResult<SearchResponse> {
        let intent = self.extractor.parse(text)?;
        let req = request_for_intent(text, &intent);
        debug!(
            target: "tread::search",
            query_type = intent.query_type().as_str(),
            mode = req.mode.as_str(),
            confidence = intent.confidence(),
            "Natural query mapped"
        );
        let response = self.execute(&req)?;
        self.record(text.trim().to_string(), &req, &response);
        Ok(response)
    }

    /// Image search keeping only results at or above `threshold`
    pub fn search_by_similarity(
        &self,
        image_path: impl AsRef<Path>,
        threshold: f32,
        limit: Option<usize>,
    ) -> TreadResult<SearchResponse> {
        let mut req = SearchRequest::image(image_path.as_ref()).with_threshold(threshold);
        req.limit = limit;
        self.search(&req)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    fn execute(&self, req: &SearchRequest) -> TreadResult<SearchResponse> {
        let start = Instant::now();
        let limit = self.resolve_limit(req.limit)?;
        let threshold = self.resolve_threshold(req.threshold)?;
        let filters = (!req.filters.is_empty()).then_some(&req.filters);

        let fused = match req.mode {
            SearchMode::Text => {
                let query = require_query(req)?;
                let candidates = self.text_candidates(query, limit, filters, threshold)?;
                rank_candidates(candidates, limit)
            }
            SearchMode::Image => {
                let path = require_image(req)?;
                let candidates = self.image_candidates(path, limit, filters, threshold)?;
                rank_candidates(candidates, limit)
            }
            SearchMode::Hybrid => self.hybrid(req, limit, filters, threshold)?,
            SearchMode::Semantic => {
                let query = require_query(req)?;
                self.semantic(query, limit, filters, threshold)?
            }
            SearchMode::Metadata => {
                let filters = filters.ok_or_else(|| {
                    TreadError::validation("metadata search requires at least one filter")
                })?;
                // one extra row tells whether the scan was cut short
                let candidates = self.index.filter(filters, limit + 1)?;
                rank_candidates(candidates, limit)
            }
            SearchMode::Recommendation => {
                let path = require_image(req)?;
                self.recommend(path, limit, filters, threshold)?
            }
        };

        let elapsed_micros = start.elapsed().as_micros() as u64;
        debug!(
            target: "tread::search",
            mode = req.mode.as_str(),
            results = fused.results.len(),
            elapsed_us = elapsed_micros,
            "Search complete"
        );
        Ok(SearchResponse {
            results: fused.results,
            mode: req.mode,
            truncated: fused.truncated,
            elapsed_micros,
        })
    }

    fn hybrid(
        &self,
        req: &SearchRequest,
        limit: usize,
        filters: Option<&MetadataFilter>,
        threshold: f32,
    ) -> TreadResult<FusedResult> {
        if req.query.is_none() && req.image_path.is_none() {
            return Err(TreadError::validation(
                "hybrid search requires a query or an image",
            ));
        }
        let k = self.candidate_pool(limit);
        let mut lists: Vec<Vec<Candidate>> = Vec::new();

        if req.query.is_some() {
            let query = require_query(req)?;
            lists.push(self.text_candidates(query, k, filters, threshold)?);
        }
        if req.image_path.is_some() {
            let path = require_image(req)?;
            lists.push(self.image_candidates(path, k, filters, threshold)?);
        }
        if let Some(filters) = filters {
            // everything retrieved above passed the filters
            let mut matched: Vec<Candidate> = lists
                .iter()
                .flatten()
                .map(|c| Candidate {
                    score: 1.0,
                    ..c.clone().with_modality(Modality::Metadata)
                })
                .collect();
            matched.extend(self.index.filter(filters, k)?);
            lists.push(matched);
        }

        Ok(similarity_first(self.fuser.fuse(lists, usize::MAX), limit))
    }

    fn semantic(
        &self,
        query: &str,
        limit: usize,
        filters: Option<&MetadataFilter>,
        threshold: f32,
    ) -> TreadResult<FusedResult> {
        let variants = self.expander.expand(query)?;
        debug!(
            target: "tread::search",
            expander = self.expander.name(),
            variants = variants.len(),
            "Expanded query"
        );
        let mut lists = Vec::with_capacity(variants.len());
        for variant in &variants {
            lists.push(self.text_candidates(variant, limit, filters, threshold)?);
        }
        Ok(semantic_boost_fuse(lists, limit))
    }

    fn recommend(
        &self,
        path: &Path,
        limit: usize,
        filters: Option<&MetadataFilter>,
        threshold: f32,
    ) -> TreadResult<FusedResult> {
        let reference = path.to_string_lossy();
        let candidates: Vec<Candidate> = self
            .image_candidates(path, self.candidate_pool(limit), filters, threshold)?
            .into_iter()
            .filter(|c| {
                c.metadata.get(ORIGINAL_PATH_KEY).and_then(|v| v.as_str())
                    != Some(reference.as_ref())
            })
            .collect();
        Ok(rank_candidates(candidates, limit))
    }

    // ========================================================================
    // Per-modality retrieval
    // ========================================================================

    fn text_candidates(
        &self,
        query: &str,
        k: usize,
        filters: Option<&MetadataFilter>,
        threshold: f32,
    ) -> TreadResult<Vec<Candidate>> {
        let embedding = self.embedder.embed_text(query)?;
        self.retrieve(&embedding, k, filters, threshold, Modality::Text)
    }

    fn image_candidates(
        &self,
        path: &Path,
        k: usize,
        filters: Option<&MetadataFilter>,
        threshold: f32,
    ) -> TreadResult<Vec<Candidate>> {
        let embedding = self.embedder.embed_image(path)?;
        self.retrieve(&embedding, k, filters, threshold, Modality::Visual)
    }

    fn retrieve(
        &self,
        embedding: &[f32],
        k: usize,
        filters: Option<&MetadataFilter>,
        threshold: f32,
        modality: Modality,
    ) -> TreadResult<Vec<Candidate>> {
        Ok(self
            .index
            .search(embedding, k, filters)?
            .into_iter()
            .filter(|c| c.score >= threshold)
            .map(|c| c.with_modality(modality))
            .collect())
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    fn resolve_limit(&self, requested: Option<usize>) -> TreadResult<usize> {
        match requested {
            Some(0) => Err(TreadError::validation("limit must be at least 1")),
            Some(n) => Ok(n.min(self.config.max_results)),
            None => Ok(self.config.max_results),
        }
    }

    fn resolve_threshold(&self, requested: Option<f32>) -> TreadResult<f32> {
        let threshold = requested.unwrap_or(self.config.similarity_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(TreadError::validation(format!(
                "similarity threshold {} must be within [0, 1]",
                threshold
            )));
        }
        Ok(threshold)
    }

    /// Per-modality depth for modes that fuse or post-filter
    fn candidate_pool(&self, limit: usize) -> usize {
        limit.saturating_mul(self.config.candidate_multiplier.max(1))
    }

    fn record(&self, query_text: String, req: &SearchRequest, response: &SearchResponse) {
        if let Some(sink) = &self.analytics {
            sink.emit(AnalyticsEvent {
                query_text,
                query_type: req.mode,
                filters: req.filters.to_json_map(),
                result_count: response.len(),
            });
        }
    }
}

// ============================================================================
// Request helpers
// ============================================================================

/// Rank matches with a text or visual score ahead of filter-only matches
///
/// A filter-only match fuses to its metadata score of 1.0 alone, so it keeps
/// its place among the other filter-only matches but never displaces a
/// similarity match.
fn similarity_first(fused: FusedResult, limit: usize) -> FusedResult {
    let (mut results, filter_only): (Vec<RankedResult>, Vec<RankedResult>) = fused
        .results
        .into_iter()
        .partition(|r| r.scores.keys().any(|m| *m != Modality::Metadata));
    results.extend(filter_only);
    let truncated = results.len() > limit;
    results.truncate(limit);
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = (i + 1) as u32;
    }
    FusedResult::new(results, truncated)
}

fn require_query(req: &SearchRequest) -> TreadResult<&str> {
    let query = req.query.as_deref().ok_or_else(|| {
        TreadError::validation(format!("{} search requires a query", req.mode))
    })?;
    validate_query(query)?;
    Ok(query.trim())
}

fn require_image(req: &SearchRequest) -> TreadResult<&Path> {
    let path = req.image_path.as_deref().ok_or_else(|| {
        TreadError::validation(format!("{} search requires an image", req.mode))
    })?;
    if !path.is_file() {
        return Err(TreadError::validation(format!(
            "image not found: {}",
            path.display()
        )));
    }
    Ok(path)
}

/// Analytics label of a request
fn describe(req: &SearchRequest) -> String {
    match (req.query.as_deref(), req.image_path.as_deref()) {
        (Some(q), None) => q.trim().to_string(),
        (None, Some(p)) => format!("image: {}", p.display()),
        (Some(q), Some(p)) => format!("{} + image: {}", q.trim(), p.display()),
        (None, None) => "metadata filter".to_string(),
    }
}

/// Map an extracted intent onto a request
///
/// The query is the intent's terms, or the raw text when extraction kept
/// none. An image intent without an image path runs as hybrid search.
pub fn request_for_intent(text: &str, intent: &QueryIntent) -> SearchRequest {
    let terms = intent.terms_text();
    let query = if terms.is_empty() || terms.chars().count() > MAX_QUERY_CHARS {
        text.trim().to_string()
    } else {
        terms
    };

    let filters = intent.filters().clone();
    let req = match (intent.query_type(), intent.image_path()) {
        (QueryType::Image, Some(path)) => SearchRequest::image(path).with_filters(filters),
        (QueryType::Text, _) => SearchRequest::text(query).with_filters(filters),
        (QueryType::Image | QueryType::Hybrid, path) => {
            let req = SearchRequest::hybrid().with_query(query).with_filters(filters);
            match path {
                Some(path) => req.with_image(path),
                None => req,
            }
        }
        (QueryType::Semantic, _) => SearchRequest::semantic(query).with_filters(filters),
        (QueryType::Metadata, _) => SearchRequest::metadata(filters),
    };
    req.with_limit(intent.limit())
        .with_threshold(intent.similarity_threshold())
}
