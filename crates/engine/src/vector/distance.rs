//! Shared distance functions for vector similarity computation.
//!
//! Used by every backend and by k-means training.
//!
//! All scores are normalized to "higher = more similar" and bounded in
//! `[0, 1]`, with `1.0` meaning identical. No implicit normalization of the
//! stored vectors.

use tread_core::DistanceMetric;

/// Compute similarity score between two vectors
pub fn compute_similarity(a: &[f32], b: &[f32], metric: DistanceMetric) -> f32 {
    debug_assert_eq!(
        a.len(),
        b.len(),
        "Dimension mismatch in similarity computation"
    );

    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b).max(0.0),
        DistanceMetric::Euclidean => euclidean_similarity(a, b),
    }
}

/// Convert a raw distance reported by an external service into a similarity
pub fn distance_to_similarity(distance: f32, metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Euclidean => 1.0 / (1.0 + distance.max(0.0)),
        DistanceMetric::Cosine => (1.0 - distance).clamp(0.0, 1.0),
    }
}

/// Cosine similarity: dot(a,b) / (||a|| * ||b||)
///
/// Range: [-1, 1]. Returns 0.0 if either vector has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Euclidean similarity: 1 / (1 + l2_distance)
///
/// Range: (0, 1]
fn euclidean_similarity(a: &[f32], b: &[f32]) -> f32 {
    1.0 / (1.0 + squared_euclidean(a, b).sqrt())
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Squared L2 distance
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
