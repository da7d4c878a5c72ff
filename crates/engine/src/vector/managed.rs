//! Managed-service backend
//!
//! Nearest-neighbour lookup is delegated to an external vector service
//! through the [`ManagedCollection`] client trait. The local arena stays the
//! source of truth for metadata, tombstones, and filtering: the service is
//! asked for distances and the results are filtered and re-ranked locally.
//!
//! Client failures surface as `TreadError::Storage` so callers can retry them.

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tread_core::{DistanceMetric, Metadata, MetadataFilter, TreadError, TreadResult};

use super::arena::SlotArena;
use super::distance::{compute_similarity, distance_to_similarity, squared_euclidean};

/// Failure reported by a managed vector service client
#[derive(Debug, Error)]
#[error("managed service error: {0}")]
pub struct ManagedError(pub String);

impl From<ManagedError> for TreadError {
    fn from(e: ManagedError) -> Self {
        TreadError::Storage(e.to_string())
    }
}

/// A raw neighbour returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedHit {
    pub id: String,
    /// Distance under the collection metric (lower = closer)
    pub distance: f32,
}

/// Client for an external vector collection
pub trait ManagedCollection: Send + Sync {
    /// Insert or replace vectors by id
    fn upsert(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        metadata: &[Metadata],
    ) -> Result<(), ManagedError>;

    /// Remove vectors by id; unknown ids are ignored
    fn remove(&self, ids: &[String]) -> Result<(), ManagedError>;

    /// Up to `n` nearest neighbours, closest first
    fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<ManagedHit>, ManagedError>;

    /// Drop every vector
    fn reset(&self) -> Result<(), ManagedError>;
}

/// Backend state wrapping a service client
#[derive(Clone)]
pub struct ManagedService {
    client: Arc<dyn ManagedCollection>,
    metric: DistanceMetric,
}

impl std::fmt::Debug for ManagedService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedService")
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

impl ManagedService {
    pub fn new(client: Arc<dyn ManagedCollection>, metric: DistanceMetric) -> Self {
        ManagedService { client, metric }
    }

    pub fn on_insert(&self, arena: &SlotArena, new_slots: &[usize]) -> TreadResult<()> {
        if new_slots.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = new_slots.iter().map(|&s| arena.id(s).to_string()).collect();
        let embeddings: Vec<Vec<f32>> = new_slots
            .iter()
            .map(|&s| arena.embedding(s).to_vec())
            .collect();
        let metadata: Vec<Metadata> = new_slots
            .iter()
            .map(|&s| arena.metadata(s).clone())
            .collect();
        self.client.upsert(&ids, &embeddings, &metadata)?;
        Ok(())
    }

    pub fn on_delete(&self, id: &str) -> TreadResult<()> {
        self.client.remove(&[id.to_string()])?;
        Ok(())
    }

    /// Push a metadata change so the service copy stays current
    pub fn on_update(&self, arena: &SlotArena, slot: usize) -> TreadResult<()> {
        self.on_insert(arena, &[slot])
    }

    /// Replace the service contents with the live arena
    pub fn resync(&self, arena: &SlotArena) -> TreadResult<()> {
        self.client.reset()?;
        let live: Vec<usize> = arena.live_slots().collect();
        self.on_insert(arena, &live)
    }

    pub fn reset(&self) -> TreadResult<()> {
        self.client.reset()?;
        Ok(())
    }

    /// Ask the service for neighbours, then filter and rank locally
    ///
    /// With a filter the whole live set is requested, so a selective filter
    /// still fills `k` results. Tombstones the service may still hold are
    /// over-fetched and dropped here.
    pub fn search(
        &self,
        arena: &SlotArena,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> TreadResult<Vec<(usize, f32)>> {
        if k == 0 || arena.live_len() == 0 {
            return Ok(Vec::new());
        }
        let n = match filter {
            Some(f) if !f.is_empty() => arena.len(),
            _ => k + arena.deleted_len(),
        };

        let mut ranked: Vec<(usize, f32)> = self
            .client
            .query(query, n)?
            .into_iter()
            .filter_map(|hit| {
                let slot = arena.slot_of(&hit.id)?;
                Some((slot, distance_to_similarity(hit.distance, self.metric)))
            })
            .filter(|(slot, _)| filter.map_or(true, |f| f.matches(arena.metadata(*slot))))
            .collect();

        ranked.sort_by(|(slot_a, score_a), (slot_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(Ordering::Equal)
                .then_with(|| slot_a.cmp(slot_b))
        });
        ranked.dedup_by_key(|(slot, _)| *slot);
        ranked.truncate(k);
        Ok(ranked)
    }
}

// ============================================================================
// In-process client
// ============================================================================

/// In-process [`ManagedCollection`] holding vectors in memory
///
/// Useful for development and tests; the production client talks to a
/// remote service.
#[derive(Debug, Default)]
pub struct LocalCollection {
    metric: DistanceMetric,
    entries: RwLock<Vec<(String, Vec<f32>)>>,
}

impl LocalCollection {
    pub fn new(metric: DistanceMetric) -> Self {
        LocalCollection {
            metric,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ManagedCollection for LocalCollection {
    fn upsert(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        _metadata: &[Metadata],
    ) -> Result<(), ManagedError> {
        if ids.len() != embeddings.len() {
            return Err(ManagedError("ids and embeddings differ in length".into()));
        }
        let mut entries = self.entries.write();
        for (id, embedding) in ids.iter().zip(embeddings) {
            match entries.iter_mut().find(|(existing, _)| existing == id) {
                Some(entry) => entry.1 = embedding.clone(),
                None => entries.push((id.clone(), embedding.clone())),
            }
        }
        Ok(())
    }

    fn remove(&self, ids: &[String]) -> Result<(), ManagedError> {
        self.entries.write().retain(|(id, _)| !ids.contains(id));
        Ok(())
    }

    fn query(&self, embedding: &[f32], n: usize) -> Result<Vec<ManagedHit>, ManagedError> {
        let entries = self.entries.read();
        let mut hits: Vec<ManagedHit> = entries
            .iter()
            .filter(|(_, v)| v.len() == embedding.len())
            .map(|(id, v)| {
                let distance = match self.metric {
                    DistanceMetric::Euclidean => squared_euclidean(embedding, v).sqrt(),
                    DistanceMetric::Cosine => 1.0 - compute_similarity(embedding, v, self.metric),
                };
                ManagedHit {
                    id: id.clone(),
                    distance,
                }
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
        hits.truncate(n);
        Ok(hits)
    }

    fn reset(&self) -> Result<(), ManagedError> {
        self.entries.write().clear();
        Ok(())
    }
}
