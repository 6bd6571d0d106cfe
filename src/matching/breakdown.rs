// src/matching/breakdown.rs - Exhaustive pair inspection for review tooling
use crate::matching::similarity::score_with_breakdown;
use crate::models::core::NormalizedRecord;
use crate::models::matching::PairBreakdown;
use crate::utils::config::EngineConfig;

/// Scores every pair of `records` (no blocking) and returns them highest
/// score first, ties ordered by `(a, b)`.
pub fn full_pairwise_breakdown(
    records: &[NormalizedRecord],
    config: &EngineConfig,
) -> Vec<PairBreakdown> {
    let mut rows = Vec::with_capacity(records.len() * records.len().saturating_sub(1) / 2);
    for (k, a) in records.iter().enumerate() {
        for b in &records[k + 1..] {
            let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
            let (pair, breakdown) = score_with_breakdown(first, second, config);
            rows.push(PairBreakdown {
                a: first.id,
                b: second.id,
                score: pair.score,
                reasons: pair.reasons,
                breakdown,
            });
        }
    }
    rows.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then(x.a.cmp(&y.a))
            .then(x.b.cmp(&y.b))
    });
    rows
}
