use std::cmp::Ordering;

use scr_core::config::RetrievalParams;
use scr_core::error::{AppError, RETRIEVAL_FAILED};
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::index::SearchIndex;
use crate::segment::Segment;

pub(crate) mod similarity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedSegment {
    pub segment: Segment,
    /// Cosine similarity to the query.
    pub score: f32,
}

impl SearchIndex {
    /// Embed `query` with the index's own model, then select by maximal marginal relevance.
    pub fn retrieve(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        params: &RetrievalParams,
    ) -> Result<Vec<RetrievedSegment>, AppError> {
        let q = query.trim();
        if q.is_empty() {
            return Err(AppError::new(RETRIEVAL_FAILED, "Query must not be empty"));
        }
        let qv = embedder.embed(&self.manifest().model, q).map_err(|e| {
            AppError::new(RETRIEVAL_FAILED, "Failed to embed query")
                .with_details(e.to_string())
                .with_retryable(e.retryable)
        })?;
        self.retrieve_by_vector(&qv, params)
    }

    /// Take the `fetch_k` nearest segments, then greedily pick `k` of them maximizing
    /// `diversity * sim(query, d) - (1 - diversity) * max sim(d, picked)`.
    pub fn retrieve_by_vector(
        &self,
        qv: &[f32],
        params: &RetrievalParams,
    ) -> Result<Vec<RetrievedSegment>, AppError> {
        params.validate()?;
        let dims = self.manifest().dims as usize;
        if qv.len() != dims {
            return Err(AppError::new(
                RETRIEVAL_FAILED,
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={dims}; query_dims={}", qv.len())));
        }
        let qnorm = similarity::l2_norm(qv);
        if qnorm == 0.0 {
            return Err(AppError::new(RETRIEVAL_FAILED, "Query embedding norm is zero"));
        }

        let vectors = self.vectors();
        let norms = self.norms();
        let candidates = nearest(qv, qnorm, vectors, norms, params.fetch_k);
        let picked = mmr_select(&candidates, vectors, norms, params.k, params.diversity);

        Ok(picked
            .into_iter()
            .map(|(idx, score)| RetrievedSegment {
                segment: self.segments()[idx].clone(),
                score,
            })
            .collect())
    }
}

/// Indices and scores of the `n` most similar vectors, best first; ties keep index order.
fn nearest(qv: &[f32], qnorm: f32, vectors: &[Vec<f32>], norms: &[f32], n: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .zip(norms)
        .enumerate()
        .map(|(i, (v, &vn))| (i, similarity::cosine_similarity(qv, v, qnorm, vn)))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(n);
    scored
}

fn mmr_select(
    candidates: &[(usize, f32)],
    vectors: &[Vec<f32>],
    norms: &[f32],
    k: usize,
    diversity: f32,
) -> Vec<(usize, f32)> {
    let mut remaining: Vec<(usize, f32)> = candidates.to_vec();
    let mut picked: Vec<(usize, f32)> = Vec::with_capacity(k.min(candidates.len()));

    while picked.len() < k && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &(idx, rel)) in remaining.iter().enumerate() {
            let redundancy = picked
                .iter()
                .map(|&(p, _)| {
                    similarity::cosine_similarity(&vectors[idx], &vectors[p], norms[idx], norms[p])
                })
                .fold(f32::NEG_INFINITY, f32::max);
            let redundancy = if picked.is_empty() { 0.0 } else { redundancy };
            let score = diversity * rel - (1.0 - diversity) * redundancy;
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }
        picked.push(remaining.remove(best_pos));
    }
    picked
}
