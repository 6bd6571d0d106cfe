// src/matching/similarity.rs - Pair scoring: override cascade, then weighted composite
use std::collections::{BTreeSet, HashSet};

use crate::matching::rules::evaluate_overrides;
use crate::models::core::NormalizedRecord;
use crate::models::matching::{PairScore, ReasonTag, ScoreBreakdown};
use crate::utils::config::{EngineConfig, ScoreWeights};
use crate::utils::constants::{
    ADVANCED_NAME_CAP, COMPOUNDING_BONUS, COMPOUNDING_COMPONENT_MIN, ID_SUFFIX_LEN,
    ID_SUFFIX_SCORE, LOCATION_CAP, NAME_STEM_LEN, ORDER_FREE_JACCARD_WEIGHT,
    ORDER_FREE_SORTED_WEIGHT, PHONE_LONG_SUFFIX_LEN, PHONE_LONG_SUFFIX_SCORE,
    PHONE_SHORT_SUFFIX_LEN, PHONE_SHORT_SUFFIX_SCORE, SUBDISTRICT_MATCH_SCORE,
    TOKEN_REORDER_COMPONENT_TAG_MIN, VILLAGE_MATCH_SCORE, WINKLER_MAX_PREFIX,
    WINKLER_PREFIX_SCALE,
};

pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Jaro-Winkler with the prefix bonus capped at four characters.
/// Returns 0 when either side is empty.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    // fixed argument order keeps the result symmetric
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let jaro = strsim::jaro(a, b);
    let prefix = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .take(WINKLER_MAX_PREFIX)
        .count();
    clamp01(jaro + prefix as f64 * WINKLER_PREFIX_SCALE * (1.0 - jaro))
}

/// Jaccard similarity of two token lists treated as sets; 0 when either is empty.
pub fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let sa: HashSet<&str> = a.iter().map(String::as_str).collect();
    let sb: HashSet<&str> = b.iter().map(String::as_str).collect();
    let union = sa.union(&sb).count();
    if union == 0 {
        return 0.0;
    }
    sa.intersection(&sb).count() as f64 / union as f64
}

fn sorted_join(tokens: &[String]) -> String {
    let mut sorted: Vec<&str> = tokens.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.join(" ")
}

/// Name similarity that ignores token order.
pub fn order_free(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    ORDER_FREE_JACCARD_WEIGHT * jaccard(a, b)
        + ORDER_FREE_SORTED_WEIGHT * jaro_winkler(&sorted_join(a), &sorted_join(b))
}

fn stems(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| t.chars().take(NAME_STEM_LEN).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

fn suffix(digits: &str, len: usize) -> Option<&str> {
    let count = digits.chars().count();
    if count < len {
        return None;
    }
    digits.char_indices().nth(count - len).map(|(i, _)| &digits[i..])
}

fn suffixes_match(a: &str, b: &str, len: usize) -> bool {
    matches!((suffix(a, len), suffix(b, len)), (Some(x), Some(y)) if x == y)
}

pub fn id_score(a: &NormalizedRecord, b: &NormalizedRecord) -> f64 {
    if !a.national_id.is_empty() && a.national_id == b.national_id {
        1.0
    } else if suffixes_match(&a.national_id_digits, &b.national_id_digits, ID_SUFFIX_LEN) {
        ID_SUFFIX_SCORE
    } else {
        0.0
    }
}

pub fn phone_score(a: &NormalizedRecord, b: &NormalizedRecord) -> f64 {
    if !a.phone_digits.is_empty() && a.phone_digits == b.phone_digits {
        1.0
    } else if suffixes_match(&a.phone_digits, &b.phone_digits, PHONE_LONG_SUFFIX_LEN) {
        PHONE_LONG_SUFFIX_SCORE
    } else if suffixes_match(&a.phone_digits, &b.phone_digits, PHONE_SHORT_SUFFIX_LEN) {
        PHONE_SHORT_SUFFIX_SCORE
    } else {
        0.0
    }
}

pub fn location_score(a: &NormalizedRecord, b: &NormalizedRecord) -> f64 {
    let mut score = 0.0;
    if !a.village.is_empty() && a.village == b.village {
        score += VILLAGE_MATCH_SCORE;
    }
    if !a.subdistrict.is_empty() && a.subdistrict == b.subdistrict {
        score += SUBDISTRICT_MATCH_SCORE;
    }
    score.min(LOCATION_CAP)
}

/// Component scores and the weighted total of the fallback formula.
pub fn composite_breakdown(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    weights: &ScoreWeights,
) -> ScoreBreakdown {
    let first_name = jaro_winkler(a.woman_token(0), b.woman_token(0));
    let rest_a = a.woman_tokens.get(1..).unwrap_or(&[]).join(" ");
    let rest_b = b.woman_tokens.get(1..).unwrap_or(&[]).join(" ");
    let family_name = jaro_winkler(&rest_a, &rest_b);
    let advanced_name =
        jaro_winkler(&stems(&a.woman_tokens), &stems(&b.woman_tokens)).min(ADVANCED_NAME_CAP);
    let token_reorder = order_free(&a.woman_tokens, &b.woman_tokens);
    let husband = jaro_winkler(&a.husband_name, &b.husband_name)
        .max(order_free(&a.husband_tokens, &b.husband_tokens));
    let id = id_score(a, b);
    let phone = phone_score(a, b);
    let children = jaccard(&a.children, &b.children);
    let location = location_score(a, b);

    let strong = [first_name, family_name, token_reorder]
        .iter()
        .filter(|s| **s >= COMPOUNDING_COMPONENT_MIN)
        .count();
    let compounding_bonus = if strong >= 2 { COMPOUNDING_BONUS } else { 0.0 };

    let weighted = weights.first_name * first_name
        + weights.family_name * family_name
        + weights.advanced_name * advanced_name
        + weights.token_reorder * token_reorder
        + weights.husband * husband
        + weights.id * id
        + weights.phone * phone
        + weights.children * children
        + weights.location * location;

    ScoreBreakdown {
        first_name,
        family_name,
        advanced_name,
        token_reorder,
        husband,
        id,
        phone,
        children,
        location,
        compounding_bonus,
        weighted_total: clamp01(weighted + compounding_bonus),
    }
}

fn composite_score(breakdown: &ScoreBreakdown) -> PairScore {
    let mut reasons = BTreeSet::from([ReasonTag::WeightedComposite]);
    if breakdown.token_reorder > TOKEN_REORDER_COMPONENT_TAG_MIN {
        reasons.insert(ReasonTag::TokenReorder);
    }
    PairScore {
        score: breakdown.weighted_total,
        reasons,
    }
}

/// Scores a pair. The first override rule that fires decides the result;
/// otherwise the weighted composite is used.
pub fn score(a: &NormalizedRecord, b: &NormalizedRecord, config: &EngineConfig) -> PairScore {
    match evaluate_overrides(a, b, config) {
        Some(mut pair) => {
            pair.score = clamp01(pair.score);
            pair
        }
        None => composite_score(&composite_breakdown(a, b, &config.final_score_weights)),
    }
}

/// Like [`score`], but always returns the composite components for display.
pub fn score_with_breakdown(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> (PairScore, ScoreBreakdown) {
    let breakdown = composite_breakdown(a, b, &config.final_score_weights);
    let pair = match evaluate_overrides(a, b, config) {
        Some(mut pair) => {
            pair.score = clamp01(pair.score);
            pair
        }
        None => composite_score(&breakdown),
    };
    (pair, breakdown)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::matching::normalize::{normalize_text, tokenize};
    use crate::models::core::NormalizedRecord;

    pub fn person(id: usize, woman: &str, husband: &str) -> NormalizedRecord {
        let woman_name = normalize_text(woman);
        let husband_name = normalize_text(husband);
        NormalizedRecord {
            id,
            woman_tokens: tokenize(&woman_name),
            husband_tokens: tokenize(&husband_name),
            woman_name,
            husband_name,
            ..Default::default()
        }
    }
}
