// src/clustering/annotation.rs - Turns raw groups into reviewable clusters
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::clustering::household_clustering::ClusterGroup;
use crate::matching::similarity::composite_breakdown;
use crate::models::core::NormalizedRecord;
use crate::models::stats_models::{Cluster, ClusterCoherence, ClusterPairScore};
use crate::utils::config::EngineConfig;

/// Stable id derived from the member ids, independent of their order.
pub fn cluster_id(members: &[usize]) -> String {
    let mut sorted = members.to_vec();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    for id in sorted {
        hasher.update(format!("{};", id).as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

pub fn coherence(pair_scores: &[ClusterPairScore], member_count: usize) -> ClusterCoherence {
    if pair_scores.is_empty() {
        return ClusterCoherence::default();
    }
    let total: f64 = pair_scores.iter().map(|p| p.final_score).sum();
    let min_score = pair_scores
        .iter()
        .map(|p| p.final_score)
        .fold(f64::INFINITY, f64::min);
    let possible = member_count * member_count.saturating_sub(1) / 2;
    ClusterCoherence {
        average_score: total / pair_scores.len() as f64,
        min_score,
        density: if possible == 0 {
            0.0
        } else {
            pair_scores.len() as f64 / possible as f64
        },
    }
}

pub fn annotate_clusters(
    records: &[NormalizedRecord],
    groups: &[ClusterGroup],
    config: &EngineConfig,
) -> Vec<Cluster> {
    let by_id: HashMap<usize, &NormalizedRecord> = records.iter().map(|r| (r.id, r)).collect();

    groups
        .iter()
        .map(|group| {
            let members: Vec<NormalizedRecord> = group
                .members
                .iter()
                .filter_map(|id| by_id.get(id).map(|r| (*r).clone()))
                .collect();
            let pair_scores: Vec<ClusterPairScore> = group
                .pair_scores
                .iter()
                .filter_map(|edge| {
                    let (a, b) = (by_id.get(&edge.a)?, by_id.get(&edge.b)?);
                    Some(ClusterPairScore {
                        a: edge.a,
                        b: edge.b,
                        final_score: edge.score,
                        reasons: edge.reasons.clone(),
                        component_scores_used: composite_breakdown(
                            a,
                            b,
                            &config.final_score_weights,
                        ),
                    })
                })
                .collect();

            Cluster {
                cluster_id: cluster_id(&group.members),
                coherence: coherence(&pair_scores, members.len()),
                records: members,
                reasons: group.reasons.clone(),
                pair_scores,
            }
        })
        .collect()
}
