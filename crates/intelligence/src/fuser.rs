//! Fusion infrastructure for combining per-modality results
//!
//! This module provides:
//! - Fuser trait for pluggable fusion algorithms
//! - WeightedFuser: weighted average over the modalities present (default)
//! - semantic_boost_fuse: agreement boost for expanded-query results
//! - rank_candidates: ranking of a single candidate list
//!
//! Every fuser is deterministic: equal scores keep the order in which their
//! vector ids were first encountered.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use tread_core::{Candidate, FusionWeights, Metadata, Modality, RankedResult};

/// Boost per agreeing query variant
pub const SEMANTIC_BOOST_STEP: f32 = 0.1;

/// Variants counted towards the boost
pub const SEMANTIC_BOOST_MAX_MATCHES: usize = 3;

/// Metadata key holding the catalog filename
pub const FILENAME_KEY: &str = "filename";

// ============================================================================
// FusedResult
// ============================================================================

/// Result of fusing candidate lists
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    /// Final ranked list, ranks starting at 1
    pub results: Vec<RankedResult>,
    /// Whether more distinct items than the limit were available
    pub truncated: bool,
}

impl FusedResult {
    pub fn new(results: Vec<RankedResult>, truncated: bool) -> Self {
        FusedResult { results, truncated }
    }

    pub fn empty() -> Self {
        FusedResult::new(Vec::new(), false)
    }
}

// ============================================================================
// Fuser Trait
// ============================================================================

/// Pluggable fusion interface
///
/// Fusers combine candidate lists from several modalities into a single
/// ranked list truncated to `limit` items.
///
/// # Thread Safety
///
/// Fusers must be Send + Sync for concurrent search operations.
pub trait Fuser: Send + Sync {
    /// Fuse candidate lists, in the order the modalities were searched
    fn fuse(&self, lists: Vec<Vec<Candidate>>, limit: usize) -> FusedResult;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

// ============================================================================
// Shared helpers
// ============================================================================

/// One vector id with every score it collected
#[derive(Debug)]
struct Group {
    vector_id: String,
    metadata: Metadata,
    scores: BTreeMap<Modality, f32>,
    lists_seen: usize,
    last_list: Option<usize>,
}

/// Group candidates by vector id, in first-encounter order
///
/// A repeated (id, modality) pair keeps its best score.
fn group_candidates(lists: Vec<Vec<Candidate>>) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut by_id: HashMap<String, usize> = HashMap::new();

    for (list_idx, list) in lists.into_iter().enumerate() {
        for candidate in list {
            let idx = match by_id.get(&candidate.vector_id) {
                Some(&idx) => idx,
                None => {
                    by_id.insert(candidate.vector_id.clone(), groups.len());
                    groups.push(Group {
                        vector_id: candidate.vector_id,
                        metadata: candidate.metadata,
                        scores: BTreeMap::new(),
                        lists_seen: 0,
                        last_list: None,
                    });
                    groups.len() - 1
                }
            };
            let group = &mut groups[idx];
            if group.last_list != Some(list_idx) {
                group.last_list = Some(list_idx);
                group.lists_seen += 1;
            }
            let slot = group.scores.entry(candidate.modality).or_insert(candidate.score);
            if candidate.score > *slot {
                *slot = candidate.score;
            }
        }
    }
    groups
}

fn filename_of(vector_id: &str, metadata: &Metadata) -> String {
    metadata
        .get(FILENAME_KEY)
        .and_then(|v| v.as_str())
        .unwrap_or(vector_id)
        .to_string()
}

/// Stable sort by score descending, truncate, assign ranks from 1
fn build_ranked_result(mut scored: Vec<(Group, f32)>, limit: usize) -> FusedResult {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    let truncated = scored.len() > limit;
    let results = scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (group, fused_score))| RankedResult {
            filename: filename_of(&group.vector_id, &group.metadata),
            vector_id: group.vector_id,
            metadata: group.metadata,
            scores: group.scores,
            fused_score,
            rank: (i + 1) as u32,
        })
        .collect();
    FusedResult::new(results, truncated)
}

// ============================================================================
// Weighted average
// ============================================================================

/// Weighted average over the modalities present in `scores`
///
/// Weights are renormalized to the contributing modalities, so a single
/// modality fuses to its own score. No contributing weight gives 0.0.
pub fn fuse_scores(scores: &BTreeMap<Modality, f32>, weights: &FusionWeights) -> f32 {
    let (total_score, total_weight) =
        scores
            .iter()
            .fold((0.0f32, 0.0f32), |(s, w), (&modality, &score)| {
                let weight = weights.weight(modality);
                (s + score * weight, w + weight)
            });
    if total_weight > 0.0 {
        total_score / total_weight
    } else {
        0.0
    }
}

/// Weighted-average fuser
///
/// Candidates from every list are grouped by vector id; each group's
/// fused score is [`fuse_scores`] over its per-modality scores.
///
/// # Example
///
/// ```text
/// weights: visual 0.4, text 0.3, metadata 0.3
///
///   a: visual 0.8, text 0.6, metadata 1.0
///      (0.32 + 0.18 + 0.30) / 1.0 = 0.80
///   b: text 0.9
///      0.27 / 0.3 = 0.90
///
/// Final ranking: [b, a]
/// ```
#[derive(Debug, Clone, Default)]
pub struct WeightedFuser {
    weights: FusionWeights,
}

impl WeightedFuser {
    pub fn new(weights: FusionWeights) -> Self {
        WeightedFuser { weights }
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }
}

impl Fuser for WeightedFuser {
    fn fuse(&self, lists: Vec<Vec<Candidate>>, limit: usize) -> FusedResult {
        let scored = group_candidates(lists)
            .into_iter()
            .map(|group| {
                let fused = fuse_scores(&group.scores, &self.weights);
                (group, fused)
            })
            .collect();
        build_ranked_result(scored, limit)
    }

    fn name(&self) -> &str {
        "weighted"
    }
}

// ============================================================================
// Semantic boost (for expanded-query fusion)
// ============================================================================

/// Fuse one candidate list per query variant, boosting agreement
///
/// `boosted = min(best_score + 0.1 * min(matches, 3), 1.0)` where `matches`
/// is the number of variant lists that returned the id.
pub fn semantic_boost_fuse(lists: Vec<Vec<Candidate>>, limit: usize) -> FusedResult {
    let scored = group_candidates(lists)
        .into_iter()
        .map(|group| {
            let best = group.scores.values().copied().fold(0.0f32, f32::max);
            let matches = group.lists_seen.min(SEMANTIC_BOOST_MAX_MATCHES) as f32;
            let boosted = (best + SEMANTIC_BOOST_STEP * matches).min(1.0);
            (group, boosted)
        })
        .collect();
    build_ranked_result(scored, limit)
}

/// Rank a single list: the fused score is the candidate's own score
pub fn rank_candidates(candidates: Vec<Candidate>, limit: usize) -> FusedResult {
    let scored = group_candidates(vec![candidates])
        .into_iter()
        .map(|group| {
            let score = group.scores.values().copied().fold(0.0f32, f32::max);
            (group, score)
        })
        .collect();
    build_ranked_result(scored, limit)
}

// ============================================================================
// Tests
// ============================================================================
