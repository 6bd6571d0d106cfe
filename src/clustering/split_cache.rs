// src/clustering/split_cache.rs
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;

use crate::matching::edges::compare_edges;
use crate::matching::similarity::score;
use crate::models::core::NormalizedRecord;
use crate::models::matching::{Edge, PairScore};
use crate::utils::config::EngineConfig;
use crate::utils::constants::SPLIT_SCORE_CACHE_CAPACITY;

/// Pair scores reused while splitting oversized groups, keyed by the
/// unordered pair of record ids.
pub struct SplitScoreCache {
    scores: LruCache<(usize, usize), PairScore>,
    pub hits: usize,
    pub misses: usize,
}

impl Default for SplitScoreCache {
    fn default() -> Self {
        Self::new(SPLIT_SCORE_CACHE_CAPACITY)
    }
}

impl SplitScoreCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            scores: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn pair_key(a: usize, b: usize) -> (usize, usize) {
        (a.min(b), a.max(b))
    }

    /// Pre-loads scores that edge building already computed. When there are
    /// more edges than capacity the highest-scored ones stay resident.
    pub fn seed(&mut self, edges: &[Edge]) {
        let mut ordered: Vec<&Edge> = edges.iter().collect();
        ordered.sort_by(|x, y| compare_edges(y, x));
        for edge in ordered {
            self.scores.put(
                edge.pair_key(),
                PairScore {
                    score: edge.score,
                    reasons: edge.reasons.clone(),
                },
            );
        }
    }

    pub fn get_or_score(
        &mut self,
        a: &NormalizedRecord,
        b: &NormalizedRecord,
        config: &EngineConfig,
    ) -> PairScore {
        let key = Self::pair_key(a.id, b.id);
        if let Some(pair) = self.scores.get(&key) {
            self.hits += 1;
            return pair.clone();
        }
        self.misses += 1;
        let pair = score(a, b, config);
        self.scores.put(key, pair.clone());
        pair
    }

    pub fn log_stats(&self) {
        let total = self.hits + self.misses;
        if total > 0 {
            debug!(
                "Split score cache: {} hits, {} misses ({:.1}% hit rate)",
                self.hits,
                self.misses,
                self.hits as f64 / total as f64 * 100.0
            );
        }
    }
}
