//! Primitive types for Tread
//!
//! Canonical data structures shared between the `engine` and
//! `intelligence` crates.

pub mod vector;

pub use vector::{
    DistanceMetric, FilterValue, JsonScalar, Metadata, MetadataFilter, VectorConfig, VectorRecord,
};
