//! Vector similarity and rank fusion over indexed chunks.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Brute-force nearest-neighbour ranking
//! - Reciprocal Rank Fusion (RRF) for merging keyword and vector rankings

use std::collections::HashMap;

use ragbridge_core::retrieval::ContextFragment;

use crate::index::IndexedChunk;

/// Standard RRF constant.
pub const RRF_K: u32 = 60;

/// A chunk paired with the relevance score a search assigned it.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: IndexedChunk,
    pub score: f32,
}

impl ScoredChunk {
    pub fn into_fragment(self) -> ContextFragment {
        ContextFragment::new(self.chunk.source_id, self.chunk.text).with_score(self.score)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]. Returns 0.0 for empty, zero, or
/// mismatched-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (*x as f64, *y as f64);
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank chunks by cosine similarity to `query`, best first.
///
/// Chunks without embeddings, outside `filter`, or below `min_score` are
/// skipped.
pub fn vector_search(
    chunks: &[IndexedChunk],
    query: &[f32],
    limit: usize,
    min_score: f32,
    filter: Option<&str>,
) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .iter()
        .filter(|c| filter.is_none_or(|source| c.source_id == source))
        .filter_map(|chunk| {
            let emb = chunk.embedding.as_ref()?;
            let score = cosine_similarity(emb, query);
            (score >= min_score).then(|| ScoredChunk {
                chunk: chunk.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Merge two ranked lists with Reciprocal Rank Fusion.
///
/// Ordering follows the summed `1/(k + rank)` contributions; ties keep the
/// order in which chunks were first seen. The returned `score` is the best
/// relevance the chunk had in either list, so downstream thresholds still
/// compare against a meaningful similarity.
pub fn reciprocal_rank_fusion(
    keyword_results: &[ScoredChunk],
    vector_results: &[ScoredChunk],
    k: u32,
    limit: usize,
) -> Vec<ScoredChunk> {
    let k = k as f32;
    let mut fused: Vec<(f32, ScoredChunk)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for list in [keyword_results, vector_results] {
        for (rank, hit) in list.iter().enumerate() {
            let rrf = 1.0 / (k + rank as f32 + 1.0);
            match positions.get(&hit.chunk.id) {
                Some(&pos) => {
                    let (total, best) = &mut fused[pos];
                    *total += rrf;
                    best.score = best.score.max(hit.score);
                }
                None => {
                    positions.insert(hit.chunk.id.clone(), fused.len());
                    fused.push((rrf, hit.clone()));
                }
            }
        }
    }

    fused.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused.into_iter().map(|(_, hit)| hit).collect()
}
