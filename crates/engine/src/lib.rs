//! Vector index engine for Tread
//!
//! This crate owns the stored side of retrieval:
//! - VectorIndex: add/search/delete/update/rebuild/clear over one collection
//! - Backends: exact scan, clustered approximate search, managed service
//! - Persistence: snapshot codec and atomic file sidecar
//!
//! Everything here is synchronous. Concurrency control is a per-collection
//! reader/writer lock inside `VectorIndex`.

#![warn(clippy::all)]

pub mod vector;

pub use vector::{
    FileSidecar, IndexBackend, IndexStats, LocalCollection, ManagedCollection, ManagedError,
    ManagedHit, Sidecar, VectorIndex,
};
