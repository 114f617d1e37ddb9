//! Vector similarity ranking.

use gradwise_core::memory::{MemoryRecord, ScoredRecord};
use std::cmp::Ordering;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the vectors differ in length, are empty, or either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank embedded `candidates` by similarity to `query_embedding`, best first.
///
/// Candidates are given oldest-first; equal similarities favour the most
/// recent record. Candidates without an embedding are not ranked.
pub fn vector_rank(query_embedding: &[f32], candidates: &[MemoryRecord], limit: usize) -> Vec<ScoredRecord> {
    let mut scored: Vec<(f32, usize)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(position, record)| {
            let embedding = record.embedding.as_ref()?;
            Some((cosine_similarity(embedding, query_embedding), position))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then(b.1.cmp(&a.1))
    });
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(similarity, position)| ScoredRecord {
            record: candidates[position].clone(),
            relevance: similarity,
        })
        .collect()
}
