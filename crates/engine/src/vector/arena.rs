//! Slot arena - contiguous embedding storage with tombstones
//!
//! Every record occupies one slot. Slots are appended in insertion order and
//! never reordered, so slot number doubles as the insertion-order tie-break
//! for search. Deleting a record only sets its tombstone bit; compaction
//! physically drops tombstoned slots and renumbers the survivors in order.
//!
//! # Invariants
//!
//! - `data.len() == slots.len() * dimension`
//! - `by_id` maps each live id to exactly one live slot
//! - the auto-id counter never decreases, across compaction and restarts

use std::collections::HashMap;

use tread_core::{Metadata, TreadError, TreadResult, VectorRecord};

/// Prefix of generated record ids
pub const AUTO_ID_PREFIX: &str = "item_";

#[derive(Debug, Clone)]
struct Slot {
    id: String,
    metadata: Metadata,
    deleted: bool,
}

/// Per-collection record arena
#[derive(Debug, Clone)]
pub struct SlotArena {
    dimension: usize,

    /// Layout: [s0_dim0, s0_dim1, ..., s1_dim0, ...]
    data: Vec<f32>,

    slots: Vec<Slot>,

    /// Live id -> slot
    by_id: HashMap<String, usize>,

    /// Next auto-id suffix; persisted in snapshots
    next_counter: u64,
}

impl SlotArena {
    pub fn new(dimension: usize) -> Self {
        SlotArena {
            dimension,
            data: Vec::new(),
            slots: Vec::new(),
            by_id: HashMap::new(),
            next_counter: 0,
        }
    }

    /// Rebuild an arena from snapshot records (slot order = record order)
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` for a record of the wrong length, `Serialization`
    /// for two live records sharing an id.
    pub fn from_records(
        dimension: usize,
        records: Vec<VectorRecord>,
        next_counter: u64,
    ) -> TreadResult<Self> {
        let mut arena = SlotArena::new(dimension);
        arena.next_counter = next_counter;
        for record in records {
            if record.embedding.len() != dimension {
                return Err(TreadError::DimensionMismatch {
                    expected: dimension,
                    got: record.embedding.len(),
                });
            }
            if !record.deleted && arena.by_id.contains_key(&record.id) {
                return Err(TreadError::Serialization(format!(
                    "duplicate live id '{}' in snapshot",
                    record.id
                )));
            }
            let slot = arena.slots.len();
            arena.data.extend_from_slice(&record.embedding);
            if !record.deleted {
                arena.by_id.insert(record.id.clone(), slot);
            }
            arena.slots.push(Slot {
                id: record.id,
                metadata: record.metadata,
                deleted: record.deleted,
            });
        }
        Ok(arena)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Total slots, including tombstoned ones
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn live_len(&self) -> usize {
        self.by_id.len()
    }

    pub fn deleted_len(&self) -> usize {
        self.slots.len() - self.by_id.len()
    }

    pub fn next_counter(&self) -> u64 {
        self.next_counter
    }

    /// Check if a live record has this id
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Generate the next free `item_<counter>` id
    ///
    /// Skips counters whose id was taken by a caller-supplied id.
    pub fn allocate_id(&mut self) -> String {
        loop {
            let id = format!("{}{}", AUTO_ID_PREFIX, self.next_counter);
            self.next_counter += 1;
            if !self.by_id.contains_key(&id) {
                return id;
            }
        }
    }

    /// Append a live record. Caller has checked dimension and id uniqueness.
    pub fn push(&mut self, id: String, embedding: &[f32], metadata: Metadata) -> usize {
        debug_assert_eq!(embedding.len(), self.dimension);
        let slot = self.slots.len();
        self.data.extend_from_slice(embedding);
        self.by_id.insert(id.clone(), slot);
        self.slots.push(Slot {
            id,
            metadata,
            deleted: false,
        });
        slot
    }

    /// Set the tombstone bit of a live record
    ///
    /// Returns the slot, or `None` if the id is unknown or already deleted.
    pub fn tombstone(&mut self, id: &str) -> Option<usize> {
        let slot = self.by_id.remove(id)?;
        self.slots[slot].deleted = true;
        Some(slot)
    }

    /// Merge `patch` into a live record's metadata. Unspecified keys are kept.
    ///
    /// Returns false if the id is unknown.
    pub fn merge_metadata(&mut self, id: &str, patch: &Metadata) -> bool {
        let Some(&slot) = self.by_id.get(id) else {
            return false;
        };
        let metadata = &mut self.slots[slot].metadata;
        for (key, value) in patch {
            metadata.insert(key.clone(), value.clone());
        }
        true
    }

    /// Drop tombstoned slots, keeping survivors in insertion order
    ///
    /// Returns the number of slots removed.
    pub fn compact(&mut self) -> usize {
        let removed = self.deleted_len();
        if removed == 0 {
            return 0;
        }

        let dim = self.dimension;
        let mut data = Vec::with_capacity(self.by_id.len() * dim);
        let mut slots = Vec::with_capacity(self.by_id.len());
        let mut by_id = HashMap::with_capacity(self.by_id.len());

        for (old, entry) in self.slots.drain(..).enumerate() {
            if entry.deleted {
                continue;
            }
            let start = old * dim;
            data.extend_from_slice(&self.data[start..start + dim]);
            by_id.insert(entry.id.clone(), slots.len());
            slots.push(entry);
        }

        self.data = data;
        self.slots = slots;
        self.by_id = by_id;
        removed
    }

    /// Remove every record. The auto-id counter is kept.
    pub fn clear(&mut self) {
        self.data.clear();
        self.slots.clear();
        self.by_id.clear();
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn embedding(&self, slot: usize) -> &[f32] {
        let start = slot * self.dimension;
        &self.data[start..start + self.dimension]
    }

    pub fn id(&self, slot: usize) -> &str {
        &self.slots[slot].id
    }

    pub fn metadata(&self, slot: usize) -> &Metadata {
        &self.slots[slot].metadata
    }

    pub fn is_live(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(|s| !s.deleted)
    }

    /// Live slot numbers in insertion order
    pub fn live_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .map(|(i, _)| i)
    }

    /// Materialize one slot as a record
    pub fn record(&self, slot: usize) -> VectorRecord {
        let entry = &self.slots[slot];
        VectorRecord {
            id: entry.id.clone(),
            embedding: self.embedding(slot).to_vec(),
            metadata: entry.metadata.clone(),
            deleted: entry.deleted,
        }
    }

    /// All slots, tombstones included, in slot order
    pub fn records(&self) -> Vec<VectorRecord> {
        (0..self.slots.len()).map(|slot| self.record(slot)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: serde_json::Value) -> Metadata {
        v.as_object().cloned().unwrap()
    }

    fn arena_with(ids: &[&str]) -> SlotArena {
        let mut arena = SlotArena::new(2);
        for (i, id) in ids.iter().enumerate() {
            arena.push(id.to_string(), &[i as f32, 0.0], Metadata::new());
        }
        arena
    }

    #[test]
    fn test_push_and_read() {
        let mut arena = SlotArena::new(2);
        let slot = arena.push("a".into(), &[1.0, 2.0], meta(json!({"k": 1})));
        assert_eq!(slot, 0);
        assert_eq!(arena.embedding(0), &[1.0, 2.0]);
        assert_eq!(arena.id(0), "a");
        assert_eq!(arena.metadata(0)["k"], 1);
        assert!(arena.contains("a"));
        assert_eq!(arena.live_len(), 1);
    }

    #[test]
    fn test_allocate_id_is_sequential() {
        let mut arena = SlotArena::new(2);
        assert_eq!(arena.allocate_id(), "item_0");
        assert_eq!(arena.allocate_id(), "item_1");
        assert_eq!(arena.next_counter(), 2);
    }

    #[test]
    fn test_allocate_id_skips_taken() {
        let mut arena = arena_with(&["item_0", "item_1"]);
        assert_eq!(arena.allocate_id(), "item_2");
    }

    #[test]
    fn test_tombstone() {
        let mut arena = arena_with(&["a", "b"]);
        assert_eq!(arena.tombstone("a"), Some(0));
        assert_eq!(arena.tombstone("a"), None);
        assert_eq!(arena.tombstone("zzz"), None);
        assert!(!arena.is_live(0));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.live_len(), 1);
        assert_eq!(arena.deleted_len(), 1);
        assert_eq!(arena.live_slots().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_merge_metadata_keeps_unspecified_keys() {
        let mut arena = SlotArena::new(1);
        arena.push("a".into(), &[0.0], meta(json!({"brand": "nike", "size": "small"})));
        assert!(arena.merge_metadata("a", &meta(json!({"size": "large", "color": "red"}))));
        assert_eq!(
            arena.metadata(0),
            &meta(json!({"brand": "nike", "size": "large", "color": "red"}))
        );
        assert!(!arena.merge_metadata("missing", &Metadata::new()));
    }

    #[test]
    fn test_compact_preserves_order_and_embeddings() {
        let mut arena = arena_with(&["a", "b", "c", "d"]);
        arena.tombstone("b");
        arena.tombstone("d");
        assert_eq!(arena.compact(), 2);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.id(0), "a");
        assert_eq!(arena.id(1), "c");
        assert_eq!(arena.embedding(1), &[2.0, 0.0]);
        assert_eq!(arena.slot_of("c"), Some(1));
        assert_eq!(arena.compact(), 0);
    }

    #[test]
    fn test_clear_keeps_counter() {
        let mut arena = SlotArena::new(1);
        let id = arena.allocate_id();
        arena.push(id, &[0.0], Metadata::new());
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.allocate_id(), "item_1");
    }

    #[test]
    fn test_from_records_round_trip() {
        let mut arena = arena_with(&["a", "b"]);
        arena.tombstone("a");
        let restored = SlotArena::from_records(2, arena.records(), 7).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(!restored.is_live(0));
        assert!(restored.contains("b"));
        assert_eq!(restored.next_counter(), 7);
    }

    #[test]
    fn test_from_records_allows_reused_id_after_delete() {
        let mut arena = arena_with(&["a"]);
        arena.tombstone("a");
        arena.push("a".into(), &[9.0, 9.0], Metadata::new());
        let restored = SlotArena::from_records(2, arena.records(), 0).unwrap();
        assert_eq!(restored.slot_of("a"), Some(1));
    }

    #[test]
    fn test_from_records_rejects_bad_dimension() {
        let record = VectorRecord {
            id: "a".into(),
            embedding: vec![1.0],
            metadata: Metadata::new(),
            deleted: false,
        };
        let err = SlotArena::from_records(2, vec![record], 0).unwrap_err();
        assert!(matches!(err, TreadError::DimensionMismatch { .. }));
    }
}
