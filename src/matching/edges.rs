// src/matching/edges.rs - Scoring candidate pairs into retained edges
use anyhow::{Context, Result};
use futures::future::join_all;
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::matching::blocking::{build_blocks, CandidatePairStream};
use crate::matching::similarity::score;
use crate::models::core::NormalizedRecord;
use crate::models::matching::Edge;
use crate::utils::config::EngineConfig;
use crate::utils::constants::EDGE_BATCH_SIZE;

/// Scores `(i, j)` record positions and keeps pairs at or above `min_score`.
pub fn score_pair_batch(
    records: &[NormalizedRecord],
    pairs: &[(usize, usize)],
    min_score: f64,
    config: &EngineConfig,
) -> Vec<Edge> {
    pairs
        .iter()
        .filter_map(|&(i, j)| {
            let (a, b) = (records.get(i)?, records.get(j)?);
            let pair = score(a, b, config);
            (pair.score >= min_score).then(|| Edge::new(a.id, b.id, pair))
        })
        .collect()
}

/// Highest score first; ties broken by `(a, b)` ascending.
pub fn compare_edges(x: &Edge, y: &Edge) -> Ordering {
    y.score
        .total_cmp(&x.score)
        .then(x.a.cmp(&y.a))
        .then(x.b.cmp(&y.b))
}

pub fn sort_edges(edges: &mut [Edge]) {
    edges.sort_by(compare_edges);
}

/// Blocks, scores and sorts in one call. Pairs shared by several blocks are
/// scored once.
pub fn build_edges(records: &[NormalizedRecord], min_score: f64, config: &EngineConfig) -> Vec<Edge> {
    let index = build_blocks(records);
    let mut stream = CandidatePairStream::new(&index, config.thresholds.block_chunk_size);
    let mut edges = Vec::new();
    loop {
        let pairs = stream.next_batch(EDGE_BATCH_SIZE);
        if pairs.is_empty() {
            break;
        }
        edges.extend(score_pair_batch(records, &pairs, min_score, config));
    }
    sort_edges(&mut edges);
    edges
}

/// Scores one batch of pairs across `workers` blocking tasks. Output order
/// follows the input order of `pairs`.
pub async fn score_pairs_parallel(
    records: Arc<Vec<NormalizedRecord>>,
    pairs: &[(usize, usize)],
    min_score: f64,
    config: Arc<EngineConfig>,
    workers: usize,
) -> Result<Vec<Edge>> {
    if pairs.is_empty() {
        return Ok(Vec::new());
    }
    let per_worker = (pairs.len() + workers.max(1) - 1) / workers.max(1);

    let tasks: Vec<_> = pairs
        .chunks(per_worker.max(1))
        .map(|slice| {
            let slice = slice.to_vec();
            let records = Arc::clone(&records);
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || {
                score_pair_batch(&records, &slice, min_score, &config)
            })
        })
        .collect();
    debug!("Scoring {} pairs on {} workers", pairs.len(), tasks.len());

    let mut edges = Vec::new();
    for join_result in join_all(tasks).await {
        edges.extend(join_result.context("Edge scoring worker panicked or was cancelled")?);
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::similarity::test_support::person;
    use crate::models::matching::{PairScore, ReasonTag};

    fn household() -> Vec<NormalizedRecord> {
        let mut records = vec![
            person(0, "فاطمة احمد علي", "حسن محمود"),
            person(1, "فاطمة احمد علي", "حسن محمود"),
            person(2, "احمد علي فاطمة", ""),
            person(3, "رقيه سليمان داود", "طارق منصور"),
        ];
        records[0].national_id = "123456".into();
        records[1].national_id = "123456".into();
        records
    }

    #[test]
    fn test_edges_sorted_and_thresholded() {
        let config = EngineConfig::default();
        let edges = build_edges(&household(), config.thresholds.min_pair, &config);
        assert!(!edges.is_empty());
        assert_eq!(edges[0].pair_key(), (0, 1));
        assert_eq!(edges[0].score, 0.99);
        assert!(edges.iter().all(|e| e.score >= config.thresholds.min_pair));
        assert!(edges.iter().all(|e| e.a < e.b));
        assert!(edges.iter().all(|e| e.a != 3 && e.b != 3));
        for w in edges.windows(2) {
            assert_ne!(compare_edges(&w[0], &w[1]), Ordering::Greater);
        }
    }

    #[test]
    fn test_tie_break_is_by_pair() {
        let mut edges = vec![
            Edge::new(5, 2, PairScore::single(0.8, ReasonTag::TokenReorder)),
            Edge::new(1, 9, PairScore::single(0.8, ReasonTag::TokenReorder)),
            Edge::new(1, 4, PairScore::single(0.8, ReasonTag::TokenReorder)),
            Edge::new(7, 8, PairScore::single(0.9, ReasonTag::TokenReorder)),
        ];
        sort_edges(&mut edges);
        let keys: Vec<_> = edges.iter().map(Edge::pair_key).collect();
        assert_eq!(keys, vec![(7, 8), (1, 4), (1, 9), (2, 5)]);
    }

    #[test]
    fn test_edges_use_record_ids() {
        let config = EngineConfig::default();
        let mut records = household();
        for (offset, r) in records.iter_mut().enumerate() {
            r.id = 100 + offset;
        }
        let edges = build_edges(&records, config.thresholds.min_pair, &config);
        assert_eq!(edges[0].pair_key(), (100, 101));
    }

    #[tokio::test]
    async fn test_parallel_scoring_matches_sequential() {
        let config = EngineConfig::default();
        let records = household();
        let pairs: Vec<(usize, usize)> = (0..4)
            .flat_map(|i| (i + 1..4).map(move |j| (i, j)))
            .collect();
        let sequential = score_pair_batch(&records, &pairs, 0.0, &config);
        let parallel = score_pairs_parallel(
            Arc::new(records),
            &pairs,
            0.0,
            Arc::new(config),
            3,
        )
        .await
        .unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 6);
    }
}
