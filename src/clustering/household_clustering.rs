// src/clustering/household_clustering.rs - Greedy size-capped household clustering
use log::{debug, info};
use std::collections::HashMap;

use crate::clustering::split_cache::SplitScoreCache;
use crate::clustering::union_find::{CappedUnionFind, UnionOutcome};
use crate::matching::edges::{compare_edges, sort_edges};
use crate::models::core::NormalizedRecord;
use crate::models::matching::{Edge, ReasonSet};
use crate::utils::config::EngineConfig;
use crate::utils::constants::{HOUSEHOLD_SIZE_CAP, SPLIT_THRESHOLD_FLOOR};

/// A household before annotation. `members` are record ids, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterGroup {
    pub members: Vec<usize>,
    pub reasons: ReasonSet,
    /// Intra-group pairs scoring at or above the internal threshold.
    pub pair_scores: Vec<Edge>,
}

impl ClusterGroup {
    pub fn smallest_member(&self) -> usize {
        self.members.first().copied().unwrap_or(usize::MAX)
    }
}

fn pairwise_edges(
    records: &[NormalizedRecord],
    positions: &[usize],
    threshold: f64,
    config: &EngineConfig,
    cache: &mut SplitScoreCache,
) -> Vec<(usize, usize, Edge)> {
    let mut scored = Vec::new();
    for (k, &x) in positions.iter().enumerate() {
        for &y in &positions[k + 1..] {
            let pair = cache.get_or_score(&records[x], &records[y], config);
            if pair.score >= threshold {
                scored.push((x, y, Edge::new(records[x].id, records[y].id, pair)));
            }
        }
    }
    scored.sort_by(|l, r| compare_edges(&l.2, &r.2));
    scored
}

fn group_from(
    records: &[NormalizedRecord],
    positions: &[usize],
    edges: Vec<Edge>,
) -> ClusterGroup {
    let mut members: Vec<usize> = positions.iter().map(|&p| records[p].id).collect();
    members.sort_unstable();
    let reasons: ReasonSet = edges.iter().flat_map(|e| e.reasons.iter().copied()).collect();
    let mut pair_scores = edges;
    sort_edges(&mut pair_scores);
    ClusterGroup {
        members,
        reasons,
        pair_scores,
    }
}

/// Splits a set of record positions into groups of at most four.
///
/// Sets within the cap come back whole. Larger sets are re-clustered from
/// their own pairwise scores, highest first, with the same cap; members left
/// alone are dropped.
pub fn split_cluster(
    records: &[NormalizedRecord],
    positions: &[usize],
    min_internal: f64,
    config: &EngineConfig,
    cache: &mut SplitScoreCache,
) -> Vec<ClusterGroup> {
    let mut positions = positions.to_vec();
    positions.sort_unstable();
    positions.dedup();
    if positions.len() < 2 {
        return Vec::new();
    }

    if positions.len() <= HOUSEHOLD_SIZE_CAP {
        let kept = pairwise_edges(records, &positions, min_internal, config, cache)
            .into_iter()
            .map(|(_, _, e)| e)
            .collect();
        return vec![group_from(records, &positions, kept)];
    }

    let threshold = min_internal.max(SPLIT_THRESHOLD_FLOOR);
    let scored = pairwise_edges(records, &positions, threshold, config, cache);
    let local: HashMap<usize, usize> = positions
        .iter()
        .enumerate()
        .map(|(local, &p)| (p, local))
        .collect();

    let mut uf = CappedUnionFind::new(positions.len(), HOUSEHOLD_SIZE_CAP);
    let mut merges = 0usize;
    for (x, y, _) in &scored {
        if let (Some(&lx), Some(&ly)) = (local.get(x), local.get(y)) {
            if let UnionOutcome::Merged { .. } = uf.union(lx, ly) {
                merges += 1;
            }
        }
    }

    let mut groups = Vec::new();
    for root in uf.multi_member_roots() {
        let members: Vec<usize> = uf.members(root).iter().map(|&l| positions[l]).collect();
        let inside: Vec<Edge> = scored
            .iter()
            .filter(|(x, y, _)| members.contains(x) && members.contains(y))
            .map(|(_, _, e)| e.clone())
            .collect();
        groups.push(group_from(records, &members, inside));
    }
    debug!(
        "Split {} records into {} groups at threshold {:.2} ({} merges)",
        positions.len(),
        groups.len(),
        threshold,
        merges
    );
    groups.sort_by_key(ClusterGroup::smallest_member);
    groups
}

/// Greedy clustering over edges, highest score first, never letting a group
/// grow past four records.
pub fn cluster_households(
    records: &[NormalizedRecord],
    edges: &[Edge],
    config: &EngineConfig,
) -> Vec<ClusterGroup> {
    let position_of: HashMap<usize, usize> = records
        .iter()
        .enumerate()
        .map(|(pos, r)| (r.id, pos))
        .collect();
    let min_internal = config.thresholds.min_internal;

    let mut ordered = edges.to_vec();
    sort_edges(&mut ordered);

    let mut cache = SplitScoreCache::default();
    cache.seed(&ordered);

    let mut uf = CappedUnionFind::new(records.len(), HOUSEHOLD_SIZE_CAP);
    let mut finalized = vec![false; records.len()];
    let mut clusters: Vec<ClusterGroup> = Vec::new();
    let mut splits = 0usize;

    for edge in &ordered {
        let (Some(&a), Some(&b)) = (position_of.get(&edge.a), position_of.get(&edge.b)) else {
            continue;
        };
        if a == b || finalized[a] || finalized[b] {
            continue;
        }
        match uf.union(a, b) {
            UnionOutcome::Merged { root } | UnionOutcome::AlreadyJoined { root } => {
                uf.add_reasons(root, &edge.reasons);
            }
            UnionOutcome::WouldExceedCap => {
                let mut combined = uf.detach_component(a);
                combined.extend(uf.detach_component(b));
                splits += 1;
                for group in split_cluster(records, &combined, min_internal, config, &mut cache) {
                    if group.members.len() > 1 {
                        for id in &group.members {
                            if let Some(&p) = position_of.get(id) {
                                finalized[p] = true;
                            }
                        }
                        clusters.push(group);
                    }
                }
            }
        }
    }

    // Leftover components still go through the same split step.
    for root in uf.multi_member_roots() {
        let members = uf.members(root);
        let reasons = uf.reasons(root);
        for mut group in split_cluster(records, &members, min_internal, config, &mut cache) {
            if group.members.len() > 1 {
                if group.members.len() == members.len() {
                    group.reasons.extend(reasons.iter().copied());
                }
                clusters.push(group);
            }
        }
    }

    clusters.sort_by_key(ClusterGroup::smallest_member);
    cache.log_stats();
    info!(
        "🏠 Clustered {} records into {} households ({} oversize splits)",
        records.len(),
        clusters.len(),
        splits
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::edges::build_edges;
    use crate::matching::similarity::test_support::person;
    use crate::models::matching::{PairScore, ReasonTag};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

    fn co_wives(n: usize) -> Vec<NormalizedRecord> {
        const FIRST: [&str; 8] = ["مريم", "سعاد", "هدى", "رنا", "ليلى", "امل", "نجوى", "دعاء"];
        (0..n)
            .map(|i| {
                let mut r = person(i, &format!("{} خالد يوسف", FIRST[i % FIRST.len()]), "محمود علي حسن");
                r.village = "الميدان".into();
                r
            })
            .collect()
    }

    fn edge(a: usize, b: usize, score: f64) -> Edge {
        Edge::new(a, b, PairScore::single(score, ReasonTag::WeightedComposite))
    }

    #[test]
    fn test_oversized_household_is_split_four_and_two() {
        let config = EngineConfig::default();
        let records = co_wives(6);
        let edges = build_edges(&records, config.thresholds.min_pair, &config);
        assert_eq!(edges.len(), 15);

        let clusters = cluster_households(&records, &edges, &config);
        let members: Vec<Vec<usize>> = clusters.iter().map(|c| c.members.clone()).collect();
        assert_eq!(members, vec![vec![0, 1, 2, 3], vec![4, 5]]);
        assert!(clusters
            .iter()
            .all(|c| c.reasons.contains(&ReasonTag::PolygamyPattern)));
        assert_eq!(clusters[0].pair_scores.len(), 6);
    }

    #[test]
    fn test_chain_respects_cap_and_drops_singletons() {
        let config = EngineConfig::default();
        let records: Vec<NormalizedRecord> = (0..7).map(|i| person(i, "x", "")).collect();
        let edges: Vec<Edge> = (0..6).map(|i| edge(i, i + 1, 0.9 - i as f64 * 0.01)).collect();
        let clusters = cluster_households(&records, &edges, &config);
        let members: Vec<Vec<usize>> = clusters.iter().map(|c| c.members.clone()).collect();
        assert_eq!(members, vec![vec![0, 1, 2, 3], vec![4, 5, 6]]);
        assert!(clusters[0].reasons.contains(&ReasonTag::WeightedComposite));
        assert!(clusters[1].reasons.contains(&ReasonTag::WeightedComposite));
    }

    #[test]
    fn test_unsplittable_overflow_releases_members() {
        let mut config = EngineConfig::default();
        config.thresholds.min_internal = 2.0;
        let records: Vec<NormalizedRecord> = (0..7).map(|i| person(i, "x", "")).collect();
        let edges: Vec<Edge> = (0..6).map(|i| edge(i, i + 1, 0.9 - i as f64 * 0.01)).collect();
        let clusters = cluster_households(&records, &edges, &config);
        // the first five dissolve; the tail still forms a household
        let members: Vec<Vec<usize>> = clusters.iter().map(|c| c.members.clone()).collect();
        assert_eq!(members, vec![vec![4, 5, 6]]);
    }

    #[test]
    fn test_records_without_edges_never_cluster() {
        let records: Vec<NormalizedRecord> = (0..4).map(|i| person(i, "x", "")).collect();
        let clusters = cluster_households(&records, &[edge(0, 1, 0.8)], &EngineConfig::default());
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, vec![0, 1]);
    }

    #[test]
    fn test_split_small_set_returns_whole() {
        let config = EngineConfig::default();
        let records = co_wives(3);
        let mut cache = SplitScoreCache::default();
        let groups = split_cluster(&records, &[2, 0, 1], config.thresholds.min_internal, &config, &mut cache);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1, 2]);
        assert_eq!(groups[0].pair_scores.len(), 3);
    }

    #[test]
    fn test_split_terminates_on_dense_input() {
        let config = EngineConfig::default();
        let records = co_wives(40);
        let positions: Vec<usize> = (0..40).collect();
        let mut cache = SplitScoreCache::default();
        let groups = split_cluster(&records, &positions, config.thresholds.min_internal, &config, &mut cache);
        assert_eq!(groups.len(), 10);
        for g in &groups {
            assert_eq!(g.members.len(), HOUSEHOLD_SIZE_CAP);
        }

        // nothing can pass a threshold above 1.0
        let isolated = split_cluster(&records, &positions, 1.5, &config, &mut cache);
        assert!(isolated.is_empty());
    }

    #[test]
    fn test_split_terminates_on_random_input() {
        const FIRST: [&str; 6] = ["مريم", "سعاد", "هدى", "رنا", "ليلى", "امل"];
        const FATHER: [&str; 3] = ["خالد", "احمد", "سالم"];
        const HUSBAND: [&str; 3] = ["محمود علي حسن", "طارق منصور", "سالم عمر"];
        let config = EngineConfig::default();
        let mut rng = StdRng::seed_from_u64(42);

        for round in 0..40 {
            let n = rng.gen_range(5..=60);
            let records: Vec<NormalizedRecord> = (0..n)
                .map(|i| {
                    let woman = format!(
                        "{} {} يوسف",
                        FIRST[rng.gen_range(0..FIRST.len())],
                        FATHER[rng.gen_range(0..FATHER.len())]
                    );
                    let mut r = person(i, &woman, HUSBAND[rng.gen_range(0..HUSBAND.len())]);
                    if rng.gen_bool(0.5) {
                        r.village = "الميدان".into();
                    }
                    r
                })
                .collect();
            let mut positions: Vec<usize> = (0..n).collect();
            positions.shuffle(&mut rng);
            let min_internal = rng.gen_range(0.0..=1.2);

            let mut cache = SplitScoreCache::new(256);
            let groups = split_cluster(&records, &positions, min_internal, &config, &mut cache);

            let mut seen = HashSet::new();
            for g in &groups {
                assert!(
                    (2..=HOUSEHOLD_SIZE_CAP).contains(&g.members.len()),
                    "round {round}: group {:?} at threshold {min_internal:.3}",
                    g.members
                );
                for id in &g.members {
                    assert!(*id < n, "round {round}: unknown member {id}");
                    assert!(seen.insert(*id), "round {round}: member {id} in two groups");
                }
            }
            if min_internal > 1.0 {
                assert!(groups.is_empty(), "round {round}");
            }
        }
    }

    #[test]
    fn test_clustering_is_independent_of_edge_order() {
        let config = EngineConfig::default();
        let records = co_wives(9);
        let edges = build_edges(&records, config.thresholds.min_pair, &config);
        let mut reversed = edges.clone();
        reversed.reverse();
        assert_eq!(
            cluster_households(&records, &edges, &config),
            cluster_households(&records, &reversed, &config)
        );
    }
}
