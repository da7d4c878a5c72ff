//! Index backends
//!
//! The closed set of search structures a collection can use. Every backend
//! reads records from the shared [`SlotArena`]; a backend only owns whatever
//! extra structure it needs to answer nearest-neighbour queries.
//!
//! - `FlatExact`: exact O(n) scan, no extra state
//! - `ClusteredAnn`: k-means inverted lists, trained lazily
//! - `ManagedService`: external service client

use std::sync::Arc;

use tread_core::{BackendKind, DistanceMetric, IndexConfig, MetadataFilter, TreadError, TreadResult};

use super::arena::SlotArena;
use super::clustered::{ClusterParams, ClusteredAnn};
use super::flat::exact_search;
use super::managed::{ManagedCollection, ManagedService};

/// Search structure of a collection
#[derive(Debug, Clone)]
pub enum IndexBackend {
    /// Exact scan
    FlatExact,
    /// Clustered approximate search
    ClusteredAnn(ClusteredAnn),
    /// External vector service
    ManagedService(ManagedService),
}

impl IndexBackend {
    /// Build a local backend from the `[index]` section
    ///
    /// # Errors
    ///
    /// `Config` for `backend = "managed"`: a service client has to be
    /// supplied through [`IndexBackend::managed`].
    pub fn from_config(config: &IndexConfig) -> TreadResult<Self> {
        match config.backend {
            BackendKind::Flat => Ok(IndexBackend::FlatExact),
            BackendKind::Clustered => Ok(IndexBackend::ClusteredAnn(ClusteredAnn::new(
                ClusterParams {
                    nlist: config.nlist,
                    nprobe: config.nprobe,
                    training_sample: config.training_sample,
                    min_train_vectors: config.min_train_vectors,
                },
                config.metric,
            ))),
            BackendKind::Managed => Err(TreadError::Config(
                "managed backend requires a service client".to_string(),
            )),
        }
    }

    /// Managed backend over the given client
    pub fn managed(client: Arc<dyn ManagedCollection>, metric: DistanceMetric) -> Self {
        IndexBackend::ManagedService(ManagedService::new(client, metric))
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            IndexBackend::FlatExact => BackendKind::Flat,
            IndexBackend::ClusteredAnn(_) => BackendKind::Clustered,
            IndexBackend::ManagedService(_) => BackendKind::Managed,
        }
    }

    /// Whether the backend can answer approximate queries yet
    ///
    /// Only the clustered backend has a training phase.
    pub fn is_trained(&self) -> bool {
        match self {
            IndexBackend::ClusteredAnn(c) => c.is_trained(),
            _ => true,
        }
    }

    /// Whether mutations reach outside the process
    pub fn is_remote(&self) -> bool {
        matches!(self, IndexBackend::ManagedService(_))
    }

    // ========================================================================
    // Mutation hooks, called after the arena changed
    // ========================================================================

    pub(crate) fn on_insert(&mut self, arena: &SlotArena, new_slots: &[usize]) -> TreadResult<()> {
        match self {
            IndexBackend::FlatExact => Ok(()),
            IndexBackend::ClusteredAnn(c) => {
                c.on_insert(arena, new_slots);
                Ok(())
            }
            IndexBackend::ManagedService(m) => m.on_insert(arena, new_slots),
        }
    }

    pub(crate) fn on_delete(&mut self, id: &str) -> TreadResult<()> {
        match self {
            IndexBackend::ManagedService(m) => m.on_delete(id),
            // tombstones are skipped at search time
            _ => Ok(()),
        }
    }

    pub(crate) fn on_update(&mut self, arena: &SlotArena, slot: usize) -> TreadResult<()> {
        match self {
            IndexBackend::ManagedService(m) => m.on_update(arena, slot),
            _ => Ok(()),
        }
    }

    /// Reconstruct the structure from a freshly compacted arena
    pub(crate) fn on_rebuild(&mut self, arena: &SlotArena) -> TreadResult<()> {
        match self {
            IndexBackend::FlatExact => Ok(()),
            IndexBackend::ClusteredAnn(c) => {
                c.retrain(arena);
                Ok(())
            }
            IndexBackend::ManagedService(m) => m.resync(arena),
        }
    }

    pub(crate) fn on_clear(&mut self) -> TreadResult<()> {
        match self {
            IndexBackend::FlatExact => Ok(()),
            IndexBackend::ClusteredAnn(c) => {
                c.reset();
                Ok(())
            }
            IndexBackend::ManagedService(m) => m.reset(),
        }
    }

    /// Bring an external copy back to `arena` after a change was abandoned
    ///
    /// Local structures live in the discarded staged copy and need nothing.
    pub(crate) fn on_restore(&self, arena: &SlotArena) -> TreadResult<()> {
        match self {
            IndexBackend::ManagedService(m) => m.resync(arena),
            _ => Ok(()),
        }
    }

    /// Rebuild local state after loading a snapshot
    ///
    /// The managed service is assumed to hold its own copy and is not touched.
    pub(crate) fn on_load(&mut self, arena: &SlotArena) {
        if let IndexBackend::ClusteredAnn(c) = self {
            c.retrain(arena);
        }
    }

    /// Top-k live slots matching `filter`, (score desc, slot asc)
    pub(crate) fn search(
        &self,
        arena: &SlotArena,
        query: &[f32],
        k: usize,
        metric: DistanceMetric,
        filter: Option<&MetadataFilter>,
    ) -> TreadResult<Vec<(usize, f32)>> {
        match self {
            IndexBackend::FlatExact => Ok(exact_search(arena, query, k, metric, filter)),
            IndexBackend::ClusteredAnn(c) => Ok(c.search(arena, query, k, filter)),
            IndexBackend::ManagedService(m) => m.search(arena, query, k, filter),
        }
    }
}
