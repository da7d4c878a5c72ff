//! Intelligence layer for Tread
//!
//! Everything between a user's query and the vector index:
//! - QueryIntentExtractor: free text to a typed [`QueryIntent`](tread_core::QueryIntent)
//! - Fuser trait and WeightedFuser for multi-modal score fusion
//! - QueryExpander for semantic search variants
//! - Embedder capability trait (the model itself lives outside)
//! - SearchOrchestrator for per-mode validation and execution
//! - Analytics channel for completed queries
//!
//! # Usage
//!
//! ```ignore
//! use tread_intelligence::SearchOrchestrator;
//!
//! let orchestrator = SearchOrchestrator::new(index, embedder, &config)?;
//! let response = orchestrator.search_natural("red nike running shoes")?;
//! ```

#![warn(clippy::all)]

pub mod analytics;
pub mod embed;
pub mod expand;
pub mod fuser;
pub mod intent;
pub mod orchestrator;

// Re-export commonly used types
pub use analytics::{
    analytics_channel, AnalyticsEvent, AnalyticsReceiver, AnalyticsSink, AnalyticsSummary,
};
pub use embed::{EmbedError, Embedder};
pub use expand::{QueryExpander, SynonymExpander};
pub use fuser::{
    fuse_scores, rank_candidates, semantic_boost_fuse, FusedResult, Fuser, WeightedFuser,
};
pub use intent::{validate_query, QueryIntentExtractor, QueryRejection};
pub use orchestrator::{request_for_intent, SearchOrchestrator, ORIGINAL_PATH_KEY};
