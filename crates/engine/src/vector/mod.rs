//! Vector collections
//!
//! ## Module Structure
//!
//! - `arena`: slot storage with tombstones and compaction
//! - `distance`: similarity functions
//! - `flat`, `clustered`, `managed`: the three search backends
//! - `backend`: the closed `IndexBackend` enum dispatching to them
//! - `snapshot`: on-disk format and the atomic persistence sidecar
//! - `index`: the `VectorIndex` facade tying it together

pub mod arena;
pub mod backend;
pub mod clustered;
pub mod collection;
pub mod distance;
pub mod flat;
pub mod index;
pub mod managed;
pub mod snapshot;

pub use arena::{SlotArena, AUTO_ID_PREFIX};
pub use backend::IndexBackend;
pub use clustered::{ClusterParams, ClusteredAnn};
pub use collection::validate_collection_name;
pub use distance::compute_similarity;
pub use index::{IndexStats, VectorIndex};
pub use managed::{LocalCollection, ManagedCollection, ManagedError, ManagedHit, ManagedService};
pub use snapshot::{CollectionSnapshot, FileSidecar, Sidecar, SNAPSHOT_VERSION};
