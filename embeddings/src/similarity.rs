//! Similarity computation and ranking for embeddings.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// Vectors of different length, empty vectors and zero-magnitude vectors
/// all score 0.0. This function never fails.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    let similarity = dot_product / (magnitude_a * magnitude_b);
    if similarity.is_finite() { similarity } else { 0.0 }
}

/// A candidate paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranked<T> {
    /// The candidate's payload.
    pub item: T,

    /// Cosine similarity to the query vector.
    pub similarity: f32,
}

/// Rank candidates by cosine similarity to `query`, most similar first.
///
/// Ties keep the order the candidates were supplied in.
pub fn rank<V, T>(query: &[f32], candidates: impl IntoIterator<Item = (V, T)>) -> Vec<Ranked<T>>
where
    V: AsRef<[f32]>,
{
    let mut scored: Vec<Ranked<T>> = candidates
        .into_iter()
        .map(|(vector, item)| Ranked {
            similarity: cosine_similarity(query, vector.as_ref()),
            item,
        })
        .collect();

    // `sort_by` is stable, which keeps equal scores in input order.
    scored.sort_by(|a, b| OrderedFloat(b.similarity).cmp(&OrderedFloat(a.similarity)));
    scored
}

/// Keep the ranked entries scoring at or above `threshold`, up to `limit`.
pub fn above_threshold<T>(ranked: &[Ranked<T>], threshold: f32, limit: usize) -> Vec<&Ranked<T>> {
    ranked
        .iter()
        .filter(|r| r.similarity >= threshold)
        .take(limit)
        .collect()
}
