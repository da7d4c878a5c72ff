//! Core types for Tread
//!
//! This crate defines the foundational types used throughout the system:
//! - Error: the `TreadError` taxonomy
//! - Primitives: vector configuration, records, metadata filters
//! - Search types: Modality, Candidate, RankedResult, QueryType, SearchMode
//! - Intent: the `QueryIntent` value object
//! - Config: `tread.toml` and the metadata category registry

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod intent;
pub mod primitives;
pub mod search_types;

pub use config::{
    BackendKind, CategoryRegistry, FusionWeights, IndexConfig, SearchConfig, TreadConfig,
    CONFIG_FILE_NAME,
};
pub use error::{TreadError, TreadResult};
pub use intent::{QueryIntent, QueryIntentBuilder, DEFAULT_LIMIT, DEFAULT_THRESHOLD};
pub use primitives::{
    DistanceMetric, FilterValue, JsonScalar, Metadata, MetadataFilter, VectorConfig, VectorRecord,
};
pub use search_types::{
    Candidate, Modality, QueryType, RankedResult, SearchMode, SearchRequest, SearchResponse,
};
