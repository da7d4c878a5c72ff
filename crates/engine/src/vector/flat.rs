//! Exact-scan search
//!
//! O(n) over live slots. Also the fallback path of the clustered backend
//! before it is trained, and the scoring kernel it runs over probed lists.

use std::cmp::Ordering;

use tread_core::{DistanceMetric, MetadataFilter};

use super::arena::SlotArena;
use super::distance::compute_similarity;

/// Score the given slots and keep the best `k`
///
/// Tombstoned slots and slots failing `filter` are skipped before ranking,
/// so the result holds up to `k` matching records. Sorted by
/// (score desc, slot asc): equal scores resolve to the earlier insertion.
pub fn top_k_over<I>(
    arena: &SlotArena,
    slots: I,
    query: &[f32],
    k: usize,
    metric: DistanceMetric,
    filter: Option<&MetadataFilter>,
) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = usize>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut results: Vec<(usize, f32)> = slots
        .into_iter()
        .filter(|&slot| arena.is_live(slot))
        .filter(|&slot| filter.map_or(true, |f| f.matches(arena.metadata(slot))))
        .map(|slot| (slot, compute_similarity(query, arena.embedding(slot), metric)))
        .collect();

    results.sort_by(|(slot_a, score_a), (slot_b, score_b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(Ordering::Equal)
            .then_with(|| slot_a.cmp(slot_b))
    });

    results.truncate(k);
    results
}

/// Exact search over every live slot
pub fn exact_search(
    arena: &SlotArena,
    query: &[f32],
    k: usize,
    metric: DistanceMetric,
    filter: Option<&MetadataFilter>,
) -> Vec<(usize, f32)> {
    top_k_over(arena, arena.live_slots(), query, k, metric, filter)
}
