//! Maximal marginal relevance selection.
//!
//! Greedy: the most query-similar candidate goes first, then each step
//! takes the candidate maximizing
//!
//! ```text
//! lambda * sim(query, c) - (1 - lambda) * max(sim(c, s) for s in selected)
//! ```
//!
//! Similarity is cosine. Equal scores go to the earlier (closer) candidate.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use ragstore_embeddings::Embedding;

/// Candidate over-fetch factor used by MMR search.
pub const FETCH_FACTOR: usize = 3;

/// Indices into `candidates` in selection order, at most `k` and never
/// repeated.
pub fn select(query: &Embedding, candidates: &[Embedding], k: usize, lambda: f32) -> Vec<usize> {
    let n = candidates.len();
    let k = k.min(n);
    if k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| query.cosine_similarity(c))
        .collect();
    let mut redundancy = vec![f32::NEG_INFINITY; n];
    let mut taken = vec![false; n];
    let mut selected = Vec::with_capacity(k);

    while selected.len() < k {
        let best = (0..n)
            .filter(|&i| !taken[i])
            .map(|i| {
                let score = if selected.is_empty() {
                    relevance[i]
                } else {
                    lambda * relevance[i] - (1.0 - lambda) * redundancy[i]
                };
                (i, score)
            })
            .max_by(|a, b| by_score_then_earliest(*a, *b));

        let Some((chosen, _)) = best else {
            break;
        };
        taken[chosen] = true;
        selected.push(chosen);

        for i in (0..n).filter(|&i| !taken[i]) {
            let similarity = candidates[i].cosine_similarity(&candidates[chosen]);
            redundancy[i] = redundancy[i].max(similarity);
        }
    }

    selected
}

fn by_score_then_earliest(a: (usize, f32), b: (usize, f32)) -> Ordering {
    OrderedFloat(a.1)
        .cmp(&OrderedFloat(b.1))
        .then(b.0.cmp(&a.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_diversity_beats_near_duplicate() {
        let query = e(&[1.0, 0.5]);
        let candidates = vec![e(&[1.0, 0.0]), e(&[0.99, 0.01]), e(&[0.0, 1.0])];

        assert_eq!(select(&query, &candidates, 2, 0.5), vec![1, 2]);
        // Pure relevance ignores redundancy
        assert_eq!(select(&query, &candidates, 2, 1.0), vec![1, 0]);
    }

    #[test]
    fn test_bounds() {
        let query = e(&[1.0, 0.0]);
        let candidates = vec![e(&[1.0, 0.0]), e(&[0.0, 1.0])];
        assert!(select(&query, &candidates, 0, 0.5).is_empty());
        assert_eq!(select(&query, &candidates, 10, 0.5).len(), 2);
        assert!(select(&query, &[], 3, 0.5).is_empty());
    }

    #[test]
    fn test_equal_scores_prefer_earlier_candidate() {
        let query = e(&[1.0, 0.0]);
        let candidates = vec![e(&[0.0, 1.0]), e(&[0.0, 1.0]), e(&[0.0, 1.0])];
        assert_eq!(select(&query, &candidates, 1, 0.5), vec![0]);
    }

    #[test]
    fn test_never_repeats() {
        use rand::Rng;
        let mut rng = rand::rng();

        for _ in 0..20 {
            let query = Embedding::new((0..8).map(|_| rng.random::<f32>() - 0.5).collect());
            let candidates: Vec<Embedding> = (0..12)
                .map(|_| Embedding::new((0..8).map(|_| rng.random::<f32>() - 0.5).collect()))
                .collect();
            let k = rng.random_range(0..15);
            let lambda = rng.random::<f32>();

            let picked = select(&query, &candidates, k, lambda);
            assert_eq!(picked.len(), k.min(candidates.len()));
            let mut unique = picked.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), picked.len());
        }
    }
}
