//! Clustered (IVF-style) approximate search
//!
//! Live vectors are partitioned into `nlist` inverted lists around k-means
//! centroids. A query scores only the members of the `nprobe` closest lists.
//!
//! Training is lazy: nothing happens until the collection holds at least
//! `min_train_vectors` live vectors, at which point centroids are fit on the
//! first `training_sample` live vectors (insertion order) and every live slot
//! is assigned. Until then search falls back to an exact scan. Rebuild
//! retrains from the survivors.
//!
//! A vector is assigned to its most similar centroid under the collection
//! metric, and probes rank centroids the same way, so an exact self-query
//! always probes the list holding the vector.

use std::cmp::Ordering;

use tracing::info;
use tread_core::{DistanceMetric, MetadataFilter};

use super::arena::SlotArena;
use super::distance::compute_similarity;
use super::flat::{exact_search, top_k_over};

/// Lloyd iterations per training run
const KMEANS_ITERATIONS: usize = 12;

/// Tuning knobs for [`ClusteredAnn`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterParams {
    pub nlist: usize,
    pub nprobe: usize,
    pub training_sample: usize,
    pub min_train_vectors: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        ClusterParams {
            nlist: 16,
            nprobe: 4,
            training_sample: 1000,
            min_train_vectors: 32,
        }
    }
}

/// Inverted-list index over arena slots
#[derive(Debug, Clone)]
pub struct ClusteredAnn {
    params: ClusterParams,
    metric: DistanceMetric,
    centroids: Vec<Vec<f32>>,
    /// Slot numbers per centroid, ascending
    lists: Vec<Vec<usize>>,
}

impl ClusteredAnn {
    pub fn new(params: ClusterParams, metric: DistanceMetric) -> Self {
        ClusteredAnn {
            params,
            metric,
            centroids: Vec::new(),
            lists: Vec::new(),
        }
    }

    pub fn params(&self) -> ClusterParams {
        self.params
    }

    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    pub fn centroid_count(&self) -> usize {
        self.centroids.len()
    }

    /// Index freshly appended slots, training first if the threshold is met
    pub fn on_insert(&mut self, arena: &SlotArena, new_slots: &[usize]) {
        if self.is_trained() {
            for &slot in new_slots {
                self.assign(arena, slot);
            }
        } else {
            self.maybe_train(arena);
        }
    }

    /// Discard the structure and retrain from the current live set
    pub fn retrain(&mut self, arena: &SlotArena) {
        self.reset();
        self.maybe_train(arena);
    }

    pub fn reset(&mut self) {
        self.centroids.clear();
        self.lists.clear();
    }

    pub fn search(
        &self,
        arena: &SlotArena,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Vec<(usize, f32)> {
        if !self.is_trained() {
            return exact_search(arena, query, k, self.metric, filter);
        }

        let mut probed: Vec<usize> = self
            .ranked_centroids(query)
            .into_iter()
            .take(self.params.nprobe)
            .flat_map(|c| self.lists[c].iter().copied())
            .collect();
        probed.sort_unstable();
        top_k_over(arena, probed, query, k, self.metric, filter)
    }

    // ========================================================================
    // Training
    // ========================================================================

    fn maybe_train(&mut self, arena: &SlotArena) {
        let live = arena.live_len();
        let threshold = self.params.min_train_vectors.max(1);
        if live < threshold {
            return;
        }

        let sample: Vec<&[f32]> = arena
            .live_slots()
            .take(self.params.training_sample.max(1))
            .map(|slot| arena.embedding(slot))
            .collect();
        let k = self.params.nlist.min(sample.len()).max(1);

        self.centroids = kmeans(&sample, k, self.metric);
        self.lists = vec![Vec::new(); self.centroids.len()];
        for slot in arena.live_slots() {
            self.assign(arena, slot);
        }

        info!(
            target: "tread::vector",
            centroids = self.centroids.len(),
            sample = sample.len(),
            live,
            "Trained clustered index"
        );
    }

    fn assign(&mut self, arena: &SlotArena, slot: usize) {
        if let Some(c) = nearest_centroid(&self.centroids, arena.embedding(slot), self.metric) {
            self.lists[c].push(slot);
        }
    }

    /// Centroid indices, most similar first; ties by index
    fn ranked_centroids(&self, query: &[f32]) -> Vec<usize> {
        let mut scored: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, compute_similarity(query, c, self.metric)))
            .collect();
        scored.sort_by(|(ia, sa), (ib, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| ia.cmp(ib))
        });
        scored.into_iter().map(|(i, _)| i).collect()
    }
}

/// Most similar centroid; first index wins ties
fn nearest_centroid(centroids: &[Vec<f32>], v: &[f32], metric: DistanceMetric) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, c) in centroids.iter().enumerate() {
        let score = compute_similarity(v, c, metric);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Deterministic Lloyd's k-means
///
/// Seeds are spread evenly over the sample. Empty clusters keep their
/// previous centroid.
fn kmeans(sample: &[&[f32]], k: usize, metric: DistanceMetric) -> Vec<Vec<f32>> {
    if sample.is_empty() || k == 0 {
        return Vec::new();
    }
    let dim = sample[0].len();
    let n = sample.len();

    let mut centroids: Vec<Vec<f32>> = (0..k).map(|i| sample[i * n / k].to_vec()).collect();

    for _ in 0..KMEANS_ITERATIONS {
        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];

        for v in sample {
            if let Some(c) = nearest_centroid(&centroids, v, metric) {
                counts[c] += 1;
                for (acc, x) in sums[c].iter_mut().zip(v.iter()) {
                    *acc += x;
                }
            }
        }

        let mut moved = false;
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            let inv = 1.0 / counts[c] as f32;
            let next: Vec<f32> = sums[c].iter().map(|s| s * inv).collect();
            if next != centroids[c] {
                moved = true;
                centroids[c] = next;
            }
        }
        if !moved {
            break;
        }
    }

    centroids
}
