//! VectorIndex - the collection facade
//!
//! Owns one collection: the slot arena holding records, the backend search
//! structure, and an optional persistence sidecar.
//!
//! # Concurrency
//!
//! The collection sits behind a `parking_lot::RwLock`. Searches share the
//! read lock; mutations take the write lock, so there is one writer per
//! collection at a time. A mutation that has to persist (or reach a managed
//! service) is staged on a copy of the collection, written to the sidecar,
//! and only then swapped in. Readers therefore never see a state that is not
//! durable, and a failed write leaves memory and disk on the old state. A
//! managed service that already applied the change is resynced to the old
//! state when persisting fails.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tread_core::{
    BackendKind, Candidate, DistanceMetric, IndexConfig, Metadata, MetadataFilter, Modality,
    TreadError, TreadResult, VectorConfig, VectorRecord,
};

use super::arena::SlotArena;
use super::backend::IndexBackend;
use super::collection::validate_collection_name;
use super::snapshot::{CollectionSnapshot, FileSidecar, Sidecar};

/// Point-in-time collection statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub collection: String,
    pub backend: BackendKind,
    /// Stored records, tombstones included
    pub total_vectors: usize,
    /// Records visible to search
    pub live_vectors: usize,
    /// Tombstoned records awaiting rebuild
    pub deleted_vectors: usize,
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// False only for a clustered index that has not been trained yet
    pub trained: bool,
}

#[derive(Debug, Clone)]
struct CollectionState {
    arena: SlotArena,
    backend: IndexBackend,
}

/// A single vector collection with metadata, soft delete, and compaction
pub struct VectorIndex {
    name: String,
    config: VectorConfig,
    state: RwLock<CollectionState>,
    sidecar: Option<Arc<dyn Sidecar>>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("persistent", &self.sidecar.is_some())
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Create an empty in-memory collection
    pub fn new(name: &str, config: VectorConfig, backend: IndexBackend) -> TreadResult<Self> {
        validate_collection_name(name)?;
        Ok(VectorIndex {
            name: name.to_string(),
            config,
            state: RwLock::new(CollectionState {
                arena: SlotArena::new(config.dimension),
                backend,
            }),
            sidecar: None,
        })
    }

    /// Open a persistent collection, loading the last stored snapshot
    ///
    /// # Errors
    ///
    /// `Config` if the stored collection has another name or metric,
    /// `DimensionMismatch` if it has another dimension, `Serialization` for
    /// a corrupt snapshot, `Storage` if the sidecar cannot be read.
    pub fn open(
        name: &str,
        config: VectorConfig,
        backend: IndexBackend,
        sidecar: Arc<dyn Sidecar>,
    ) -> TreadResult<Self> {
        let mut index = VectorIndex::new(name, config, backend)?;

        if let Some(blob) = sidecar.load()? {
            let snapshot = CollectionSnapshot::decode(&blob)?;
            if snapshot.collection != name {
                return Err(TreadError::Config(format!(
                    "snapshot belongs to collection '{}', not '{}'",
                    snapshot.collection, name
                )));
            }
            if snapshot.config.dimension != config.dimension {
                return Err(TreadError::DimensionMismatch {
                    expected: config.dimension,
                    got: snapshot.config.dimension,
                });
            }
            if snapshot.config.metric != config.metric {
                return Err(TreadError::Config(format!(
                    "snapshot uses metric '{}', configured '{}'",
                    snapshot.config.metric.name(),
                    config.metric.name()
                )));
            }

            let state = index.state.get_mut();
            state.arena = snapshot.into_arena()?;
            state.backend.on_load(&state.arena);
            info!(
                target: "tread::vector",
                collection = name,
                records = state.arena.len(),
                live = state.arena.live_len(),
                "Loaded collection snapshot"
            );
        }

        index.sidecar = Some(sidecar);
        Ok(index)
    }

    /// Build from the `[index]` section: local backend, file sidecar when
    /// `data_dir` is set
    pub fn from_config(config: &IndexConfig) -> TreadResult<Self> {
        let vector_config = config.vector_config()?;
        let backend = IndexBackend::from_config(config)?;
        match config.snapshot_path() {
            Some(path) => VectorIndex::open(
                &config.collection,
                vector_config,
                backend,
                Arc::new(FileSidecar::new(path)),
            ),
            None => VectorIndex::new(&config.collection, vector_config, backend),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> VectorConfig {
        self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Stored records, tombstones included
    pub fn len(&self) -> usize {
        self.state.read().arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_len() == 0
    }

    pub fn live_len(&self) -> usize {
        self.state.read().arena.live_len()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Add a batch of vectors with metadata
    ///
    /// Ids are generated as `item_<counter>` when `ids` is `None`. The whole
    /// batch is validated before anything is stored; a bad row rejects the
    /// batch. Returns the ids in input order.
    ///
    /// # Errors
    ///
    /// - `Validation` for length disagreements, empty, duplicate, or
    ///   already-present ids, or non-finite components
    /// - `DimensionMismatch` for a vector of the wrong length
    /// - `Storage` if persisting fails (nothing is added)
    pub fn add(
        &self,
        vectors: Vec<Vec<f32>>,
        metadata: Vec<Metadata>,
        ids: Option<Vec<String>>,
    ) -> TreadResult<Vec<String>> {
        if vectors.len() != metadata.len() {
            return Err(TreadError::validation(format!(
                "{} vectors but {} metadata entries",
                vectors.len(),
                metadata.len()
            )));
        }
        if let Some(ids) = &ids {
            if ids.len() != vectors.len() {
                return Err(TreadError::validation(format!(
                    "{} vectors but {} ids",
                    vectors.len(),
                    ids.len()
                )));
            }
        }
        for vector in &vectors {
            self.config.check_dimension(vector)?;
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(TreadError::validation("vector contains NaN or infinity"));
            }
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let count = vectors.len();
        let assigned = self.write(|state| {
            if let Some(ids) = &ids {
                let mut seen = HashSet::with_capacity(ids.len());
                for id in ids {
                    if id.is_empty() {
                        return Err(TreadError::validation("vector id cannot be empty"));
                    }
                    if !seen.insert(id.as_str()) {
                        return Err(TreadError::validation(format!(
                            "duplicate id '{}' in batch",
                            id
                        )));
                    }
                    if state.arena.contains(id) {
                        return Err(TreadError::validation(format!(
                            "id '{}' already exists",
                            id
                        )));
                    }
                }
            }

            let mut assigned = Vec::with_capacity(count);
            let mut slots = Vec::with_capacity(count);
            let mut ids = ids.map(Vec::into_iter);
            for (vector, meta) in vectors.into_iter().zip(metadata) {
                let id = match ids.as_mut().and_then(Iterator::next) {
                    Some(id) => id,
                    None => state.arena.allocate_id(),
                };
                slots.push(state.arena.push(id.clone(), &vector, meta));
                assigned.push(id);
            }
            state.backend.on_insert(&state.arena, &slots)?;
            Ok((assigned, true))
        })?;

        debug!(target: "tread::vector", collection = %self.name, count, "Added vectors");
        Ok(assigned)
    }

    /// Soft-delete a record
    ///
    /// Returns false for an unknown or already-deleted id. Capacity is only
    /// reclaimed by [`rebuild`](Self::rebuild).
    pub fn delete(&self, id: &str) -> TreadResult<bool> {
        let deleted = self.write(|state| {
            if !state.arena.contains(id) {
                return Ok((false, false));
            }
            state.backend.on_delete(id)?;
            state.arena.tombstone(id);
            Ok((true, true))
        })?;
        if deleted {
            debug!(target: "tread::vector", collection = %self.name, id, "Deleted vector");
        }
        Ok(deleted)
    }

    /// Merge `patch` into a record's metadata
    ///
    /// Keys absent from `patch` are kept. Returns false for an unknown id.
    pub fn update_metadata(&self, id: &str, patch: Metadata) -> TreadResult<bool> {
        self.write(|state| {
            let Some(slot) = state.arena.slot_of(id) else {
                return Ok((false, false));
            };
            state.arena.merge_metadata(id, &patch);
            state.backend.on_update(&state.arena, slot)?;
            Ok((true, true))
        })
    }

    /// Compact out tombstoned records and rebuild the backend structure
    ///
    /// Every live record keeps its embedding, metadata, and relative order.
    /// A no-op on an index without tombstones. Returns the number of records
    /// removed.
    pub fn rebuild(&self) -> TreadResult<usize> {
        let removed = self.write(|state| {
            if state.arena.deleted_len() == 0 {
                return Ok((0, false));
            }
            let removed = state.arena.compact();
            state.backend.on_rebuild(&state.arena)?;
            Ok((removed, true))
        })?;
        if removed > 0 {
            info!(
                target: "tread::vector",
                collection = %self.name,
                removed,
                "Rebuilt collection"
            );
        }
        Ok(removed)
    }

    /// Remove every record, keeping the collection configured and usable
    pub fn clear(&self) -> TreadResult<()> {
        self.write(|state| {
            state.backend.on_clear()?;
            state.arena.clear();
            Ok(((), true))
        })?;
        info!(target: "tread::vector", collection = %self.name, "Cleared collection");
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Nearest live records to `query`, best first
    ///
    /// Results hold at most `k` records, each satisfying `filter`. Equal
    /// scores keep insertion order. Candidates are tagged
    /// [`Modality::Visual`], the modality of the stored embeddings; callers
    /// searching with a text embedding re-tag them.
    ///
    /// # Errors
    ///
    /// `Validation` for `k == 0`, `DimensionMismatch` for a query of the
    /// wrong length, `Storage` if a managed service fails.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> TreadResult<Vec<Candidate>> {
        if k == 0 {
            return Err(TreadError::validation("k must be greater than zero"));
        }
        self.config.check_dimension(query)?;
        let filter = filter.filter(|f| !f.is_empty());

        let state = self.state.read();
        let hits = state
            .backend
            .search(&state.arena, query, k, self.config.metric, filter)?;
        debug!(
            target: "tread::vector",
            collection = %self.name,
            k,
            filtered = filter.is_some(),
            results = hits.len(),
            "Vector search"
        );
        Ok(hits
            .into_iter()
            .map(|(slot, score)| candidate(&state.arena, slot, score, Modality::Visual))
            .collect())
    }

    /// Live records satisfying `filter`, in insertion order, each scored 1.0
    pub fn filter(&self, filter: &MetadataFilter, limit: usize) -> TreadResult<Vec<Candidate>> {
        if limit == 0 {
            return Err(TreadError::validation("limit must be greater than zero"));
        }
        let state = self.state.read();
        Ok(state
            .arena
            .live_slots()
            .filter(|&slot| filter.matches(state.arena.metadata(slot)))
            .take(limit)
            .map(|slot| candidate(&state.arena, slot, 1.0, Modality::Metadata))
            .collect())
    }

    /// Fetch a live record
    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        let state = self.state.read();
        state.arena.slot_of(id).map(|slot| state.arena.record(slot))
    }

    /// Fetch a live record that must exist
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown or deleted id.
    pub fn get_required(&self, id: &str) -> TreadResult<VectorRecord> {
        self.get(id)
            .ok_or_else(|| TreadError::NotFound { id: id.to_string() })
    }

    pub fn get_stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            collection: self.name.clone(),
            backend: state.backend.kind(),
            total_vectors: state.arena.len(),
            live_vectors: state.arena.live_len(),
            deleted_vectors: state.arena.deleted_len(),
            dimension: self.config.dimension,
            metric: self.config.metric,
            trained: state.backend.is_trained(),
        }
    }

    // ========================================================================
    // Commit protocol
    // ========================================================================

    /// Run a mutation under the write lock
    ///
    /// `op` returns its result and whether it changed anything. Changes are
    /// persisted before they become visible. Without a sidecar or remote
    /// backend the mutation runs in place; `op` then validates before it
    /// touches the state.
    fn write<T>(
        &self,
        op: impl FnOnce(&mut CollectionState) -> TreadResult<(T, bool)>,
    ) -> TreadResult<T> {
        let mut state = self.state.write();

        if self.sidecar.is_none() && !state.backend.is_remote() {
            return op(&mut *state).map(|(value, _)| value);
        }

        let mut staged = state.clone();
        let (value, changed) = op(&mut staged)?;
        if !changed {
            return Ok(value);
        }
        if let Some(sidecar) = &self.sidecar {
            let stored = CollectionSnapshot::capture(&self.name, self.config, &staged.arena)
                .encode()
                .and_then(|blob| sidecar.store(&blob));
            if let Err(e) = stored {
                // the service already saw the staged change
                if state.backend.is_remote() {
                    if let Err(undo) = state.backend.on_restore(&state.arena) {
                        warn!(
                            target: "tread::vector",
                            collection = %self.name,
                            error = %undo,
                            "Managed service could not be restored after a failed persist"
                        );
                    }
                }
                return Err(e);
            }
        }
        *state = staged;
        Ok(value)
    }
}

fn candidate(arena: &SlotArena, slot: usize, score: f32, modality: Modality) -> Candidate {
    Candidate {
        vector_id: arena.id(slot).to_string(),
        score,
        modality,
        metadata: arena.metadata(slot).clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::managed::LocalCollection;
    use serde_json::json;
    use tempfile::TempDir;

    fn meta(v: serde_json::Value) -> Metadata {
        v.as_object().cloned().unwrap()
    }

    fn flat(dim: usize) -> VectorIndex {
        VectorIndex::new(
            "shoes",
            VectorConfig::new(dim, DistanceMetric::Euclidean).unwrap(),
            IndexBackend::FlatExact,
        )
        .unwrap()
    }

    fn seeded() -> VectorIndex {
        let index = flat(2);
        index
            .add(
                vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]],
                vec![
                    meta(json!({"brand": "nike", "filename": "a.jpg"})),
                    meta(json!({"brand": "adidas"})),
                    meta(json!({"brand": "nike"})),
                ],
                None,
            )
            .unwrap();
        index
    }

    // ====================================================================
    // add
    // ====================================================================

    #[test]
    fn test_add_generates_sequential_ids() {
        let index = flat(2);
        let ids = index
            .add(vec![vec![0.0, 0.0], vec![1.0, 1.0]], vec![Metadata::new(); 2], None)
            .unwrap();
        assert_eq!(ids, vec!["item_0", "item_1"]);
        let more = index
            .add(vec![vec![2.0, 2.0]], vec![Metadata::new()], None)
            .unwrap();
        assert_eq!(more, vec!["item_2"]);
        assert_eq!(index.get_stats().total_vectors, 3);
    }

    #[test]
    fn test_add_with_explicit_ids() {
        let index = flat(2);
        index
            .add(
                vec![vec![0.0, 0.0]],
                vec![Metadata::new()],
                Some(vec!["shoe-1".into()]),
            )
            .unwrap();
        assert!(index.get("shoe-1").is_some());
    }

    #[test]
    fn test_add_dimension_mismatch_rejects_whole_batch() {
        let index = flat(2);
        let err = index
            .add(
                vec![vec![0.0, 0.0], vec![1.0]],
                vec![Metadata::new(); 2],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, TreadError::DimensionMismatch { expected: 2, got: 1 }));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_add_length_mismatch() {
        let index = flat(2);
        assert!(index
            .add(vec![vec![0.0, 0.0]], vec![], None)
            .unwrap_err()
            .is_validation_error());
        assert!(index
            .add(vec![vec![0.0, 0.0]], vec![Metadata::new()], Some(vec![]))
            .unwrap_err()
            .is_validation_error());
    }

    #[test]
    fn test_add_rejects_existing_and_duplicate_ids() {
        let index = seeded();
        let err = index
            .add(
                vec![vec![5.0, 5.0], vec![6.0, 6.0]],
                vec![Metadata::new(); 2],
                Some(vec!["fresh".into(), "item_1".into()]),
            )
            .unwrap_err();
        assert!(err.is_validation_error());
        assert!(index.get("fresh").is_none());

        let err = index
            .add(
                vec![vec![5.0, 5.0], vec![6.0, 6.0]],
                vec![Metadata::new(); 2],
                Some(vec!["dup".into(), "dup".into()]),
            )
            .unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_add_rejects_nan() {
        let index = flat(2);
        assert!(index
            .add(vec![vec![f32::NAN, 0.0]], vec![Metadata::new()], None)
            .is_err());
    }

    #[test]
    fn test_add_empty_batch_is_noop() {
        let index = flat(2);
        assert!(index.add(vec![], vec![], None).unwrap().is_empty());
    }

    // ====================================================================
    // search
    // ====================================================================

    #[test]
    fn test_search_exact_match_first() {
        let index = seeded();
        let results = index.search(&[1.0, 0.0], 3, None).unwrap();
        assert_eq!(results[0].vector_id, "item_1");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].modality, Modality::Visual);
    }

    #[test]
    fn test_search_with_filter() {
        let index = seeded();
        let filter = MetadataFilter::new().eq("brand", "nike");
        let results = index.search(&[1.0, 0.0], 3, Some(&filter)).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|c| c.metadata["brand"] == "nike"));
    }

    #[test]
    fn test_search_validates_input() {
        let index = seeded();
        assert!(index.search(&[1.0, 0.0], 0, None).unwrap_err().is_validation_error());
        assert!(matches!(
            index.search(&[1.0], 1, None),
            Err(TreadError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_filter_scan() {
        let index = seeded();
        let results = index
            .filter(&MetadataFilter::new().eq("brand", "nike"), 10)
            .unwrap();
        let ids: Vec<_> = results.iter().map(|c| c.vector_id.as_str()).collect();
        assert_eq!(ids, vec!["item_0", "item_2"]);
        assert!(results.iter().all(|c| c.score == 1.0 && c.modality == Modality::Metadata));
        assert_eq!(
            index
                .filter(&MetadataFilter::new().eq("brand", "nike"), 1)
                .unwrap()
                .len(),
            1
        );
    }

    // ====================================================================
    // delete / update / rebuild / clear
    // ====================================================================

    #[test]
    fn test_delete_is_idempotent() {
        let index = seeded();
        assert!(index.delete("item_1").unwrap());
        assert!(!index.delete("item_1").unwrap());
        assert!(!index.delete("nope").unwrap());
        let stats = index.get_stats();
        assert_eq!(stats.total_vectors, 3);
        assert_eq!(stats.live_vectors, 2);
        assert_eq!(stats.deleted_vectors, 1);
        assert!(index
            .search(&[1.0, 0.0], 3, None)
            .unwrap()
            .iter()
            .all(|c| c.vector_id != "item_1"));
        assert!(index.get("item_1").is_none());
    }

    #[test]
    fn test_get_required() {
        let index = seeded();
        assert_eq!(index.get_required("item_2").unwrap().embedding, vec![0.0, 1.0]);
        index.delete("item_2").unwrap();
        assert!(matches!(
            index.get_required("item_2"),
            Err(TreadError::NotFound { id }) if id == "item_2"
        ));
        assert!(matches!(
            index.get_required("nope"),
            Err(TreadError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_metadata_merges() {
        let index = seeded();
        assert!(index
            .update_metadata("item_0", meta(json!({"color": "red"})))
            .unwrap());
        let record = index.get("item_0").unwrap();
        assert_eq!(record.metadata["brand"], "nike");
        assert_eq!(record.metadata["color"], "red");
        assert!(!index.update_metadata("nope", Metadata::new()).unwrap());
    }

    #[test]
    fn test_rebuild_is_lossless() {
        let index = seeded();
        let before = index.search(&[0.2, 0.9], 3, None).unwrap();
        index.delete("item_1").unwrap();
        assert_eq!(index.rebuild().unwrap(), 1);

        let stats = index.get_stats();
        assert_eq!(stats.total_vectors, 2);
        assert_eq!(stats.deleted_vectors, 0);

        let after = index.search(&[0.2, 0.9], 3, None).unwrap();
        let expected: Vec<_> = before.into_iter().filter(|c| c.vector_id != "item_1").collect();
        assert_eq!(after, expected);
        assert_eq!(index.get("item_2").unwrap().embedding, vec![0.0, 1.0]);
    }

    #[test]
    fn test_rebuild_noop_on_compact_or_empty() {
        assert_eq!(flat(2).rebuild().unwrap(), 0);
        assert_eq!(seeded().rebuild().unwrap(), 0);
    }

    #[test]
    fn test_clear() {
        let index = seeded();
        index.clear().unwrap();
        assert!(index.is_empty());
        assert_eq!(index.get_stats().total_vectors, 0);
        // still usable
        index
            .add(vec![vec![1.0, 1.0]], vec![Metadata::new()], None)
            .unwrap();
        assert_eq!(index.live_len(), 1);
    }

    #[test]
    fn test_deleted_id_can_be_added_again() {
        let index = seeded();
        index.delete("item_0").unwrap();
        index
            .add(
                vec![vec![9.0, 9.0]],
                vec![Metadata::new()],
                Some(vec!["item_0".into()]),
            )
            .unwrap();
        assert_eq!(index.get("item_0").unwrap().embedding, vec![9.0, 9.0]);
    }

    // ====================================================================
    // persistence
    // ====================================================================

    #[test]
    fn test_persist_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shoes.tread");
        let config = VectorConfig::new(2, DistanceMetric::Euclidean).unwrap();
        {
            let index = VectorIndex::open(
                "shoes",
                config,
                IndexBackend::FlatExact,
                Arc::new(FileSidecar::new(&path)),
            )
            .unwrap();
            index
                .add(
                    vec![vec![0.0, 0.0], vec![1.0, 1.0]],
                    vec![meta(json!({"brand": "vans"})), Metadata::new()],
                    None,
                )
                .unwrap();
            index.delete("item_1").unwrap();
        }

        let index = VectorIndex::open(
            "shoes",
            config,
            IndexBackend::FlatExact,
            Arc::new(FileSidecar::new(&path)),
        )
        .unwrap();
        assert_eq!(index.live_len(), 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("item_0").unwrap().metadata["brand"], "vans");
        // counter survived the restart
        let ids = index
            .add(vec![vec![3.0, 3.0]], vec![Metadata::new()], None)
            .unwrap();
        assert_eq!(ids, vec!["item_2"]);
    }

    #[test]
    fn test_reopen_with_other_dimension_fails() {
        let dir = TempDir::new().unwrap();
        let sidecar: Arc<dyn Sidecar> = Arc::new(FileSidecar::new(dir.path().join("s.tread")));
        let index = VectorIndex::open(
            "shoes",
            VectorConfig::new(2, DistanceMetric::Euclidean).unwrap(),
            IndexBackend::FlatExact,
            sidecar.clone(),
        )
        .unwrap();
        index
            .add(vec![vec![0.0, 0.0]], vec![Metadata::new()], None)
            .unwrap();

        let err = VectorIndex::open(
            "shoes",
            VectorConfig::new(3, DistanceMetric::Euclidean).unwrap(),
            IndexBackend::FlatExact,
            sidecar,
        )
        .unwrap_err();
        assert!(matches!(err, TreadError::DimensionMismatch { .. }));
    }

    struct BrokenSidecar;

    impl Sidecar for BrokenSidecar {
        fn load(&self) -> TreadResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn store(&self, _: &[u8]) -> TreadResult<()> {
            Err(TreadError::Storage("disk full".into()))
        }
    }

    #[test]
    fn test_failed_persist_leaves_state_untouched() {
        let index = VectorIndex::open(
            "shoes",
            VectorConfig::new(2, DistanceMetric::Euclidean).unwrap(),
            IndexBackend::FlatExact,
            Arc::new(BrokenSidecar),
        )
        .unwrap();
        let err = index
            .add(vec![vec![0.0, 0.0]], vec![Metadata::new()], None)
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(index.len(), 0);
        assert!(index.get("item_0").is_none());
    }

    /// Accepts the first `ok` stores, then fails every one after
    struct FlakySidecar {
        ok: usize,
        stores: std::sync::atomic::AtomicUsize,
    }

    impl Sidecar for FlakySidecar {
        fn load(&self) -> TreadResult<Option<Vec<u8>>> {
            Ok(None)
        }
        fn store(&self, _: &[u8]) -> TreadResult<()> {
            let n = self
                .stores
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n < self.ok {
                Ok(())
            } else {
                Err(TreadError::Storage("disk full".into()))
            }
        }
    }

    #[test]
    fn test_failed_persist_restores_managed_service() {
        let client = Arc::new(LocalCollection::new(DistanceMetric::Euclidean));
        let index = VectorIndex::open(
            "shoes",
            VectorConfig::new(2, DistanceMetric::Euclidean).unwrap(),
            IndexBackend::managed(client.clone(), DistanceMetric::Euclidean),
            Arc::new(FlakySidecar {
                ok: 1,
                stores: Default::default(),
            }),
        )
        .unwrap();
        index
            .add(
                vec![vec![0.0, 0.0], vec![1.0, 0.0]],
                vec![Metadata::new(); 2],
                None,
            )
            .unwrap();

        let err = index.delete("item_0").unwrap_err();
        assert!(err.is_retryable());
        assert!(index.get("item_0").is_some());
        assert_eq!(client.len(), 2);
        let results = index.search(&[0.0, 0.0], 5, None).unwrap();
        assert_eq!(results[0].vector_id, "item_0");
        assert_eq!(results.len(), 2);

        assert!(index
            .add(vec![vec![5.0, 5.0]], vec![Metadata::new()], None)
            .is_err());
        assert_eq!(client.len(), 2);
        assert!(index.get("item_2").is_none());
    }

    #[test]
    fn test_from_config_in_memory() {
        let mut config = IndexConfig::default();
        config.dimension = 4;
        let index = VectorIndex::from_config(&config).unwrap();
        assert_eq!(index.name(), "shoe_images");
        assert_eq!(index.dimension(), 4);
        assert_eq!(index.get_stats().backend, BackendKind::Flat);
    }

    #[test]
    fn test_invalid_collection_name() {
        assert!(VectorIndex::new(
            "../etc",
            VectorConfig::new(2, DistanceMetric::Cosine).unwrap(),
            IndexBackend::FlatExact
        )
        .is_err());
    }

    #[test]
    fn test_managed_backend_stays_in_sync() {
        let client = Arc::new(LocalCollection::new(DistanceMetric::Euclidean));
        let index = VectorIndex::new(
            "shoes",
            VectorConfig::new(2, DistanceMetric::Euclidean).unwrap(),
            IndexBackend::managed(client.clone(), DistanceMetric::Euclidean),
        )
        .unwrap();
        index
            .add(
                vec![vec![0.0, 0.0], vec![1.0, 0.0]],
                vec![Metadata::new(); 2],
                None,
            )
            .unwrap();
        assert_eq!(client.len(), 2);
        index.delete("item_0").unwrap();
        assert_eq!(client.len(), 1);

        let results = index.search(&[0.0, 0.0], 5, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].vector_id, "item_1");
        assert!(index.get_stats().trained);
    }
}
