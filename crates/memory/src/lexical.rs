//! Lexical (word-overlap) ranking, used whenever similarity search is not
//! available for a call.
//!
//! Tokens are whitespace-separated words folded to lowercase. A record's
//! score is the fraction of distinct query tokens it contains; records that
//! share no token with the query are dropped.

use gradwise_core::memory::{MemoryRecord, ScoredRecord};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Distinct lowercase whitespace tokens of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Rank `candidates` against `query`, best first, at most `limit` results.
///
/// Candidates are given oldest-first. Equal overlap scores are broken by, in
/// order: a case-insensitive exact body match, how fully the query covers the
/// record's own words, then recency. Querying a record's exact body therefore
/// returns that record first.
pub fn lexical_rank(query: &str, candidates: &[MemoryRecord], limit: usize) -> Vec<ScoredRecord> {
    let query_tokens = tokenize(query);
    let query_folded = query.trim().to_lowercase();
    if query_tokens.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f64, bool, f64, usize)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(position, record)| {
            let body_tokens = tokenize(&record.body);
            let overlap = query_tokens.intersection(&body_tokens).count();
            if overlap == 0 {
                return None;
            }
            let score = overlap as f64 / query_tokens.len() as f64;
            let exact = record.body.trim().to_lowercase() == query_folded;
            let coverage = overlap as f64 / body_tokens.len() as f64;
            Some((score, exact, coverage, position))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then(b.1.cmp(&a.1))
            .then(b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal))
            .then(b.3.cmp(&a.3))
    });
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(score, _, _, position)| ScoredRecord {
            record: candidates[position].clone(),
            relevance: score as f32,
        })
        .collect()
}
