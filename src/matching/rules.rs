// src/matching/rules.rs - Override rules evaluated ahead of the weighted composite
//
// Rules run in a fixed order and the first one that fires decides the pair.
// Rule scores above the fixed ones are expressed as `minPair + boost`.

use crate::matching::normalize::normalize_text;
use crate::matching::similarity::{clamp01, jaccard, jaro_winkler, order_free};
use crate::models::core::NormalizedRecord;
use crate::models::matching::{PairScore, ReasonTag};
use crate::utils::config::EngineConfig;
use crate::utils::constants::*;

type Rule = fn(&NormalizedRecord, &NormalizedRecord, &EngineConfig) -> Option<PairScore>;

const CASCADE: [Rule; 8] = [
    exact_id,
    polygamy_pattern,
    token_reorder,
    household_children,
    woman_lineage,
    dominant_lineage,
    polygamy_shared_household,
    investigation_flag,
];

/// Returns the score of the first rule that matches, or `None` when the pair
/// should fall through to the composite formula.
pub fn evaluate_overrides(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    CASCADE.iter().find_map(|rule| rule(a, b, config))
}

fn boosted(config: &EngineConfig, boost: f64, reason: ReasonTag) -> PairScore {
    PairScore::single(clamp01(config.thresholds.min_pair + boost), reason)
}

fn woman_jw(a: &NormalizedRecord, b: &NormalizedRecord, idx: usize) -> f64 {
    jaro_winkler(a.woman_token(idx), b.woman_token(idx))
}

fn husband_jw(a: &NormalizedRecord, b: &NormalizedRecord, idx: usize) -> f64 {
    jaro_winkler(a.husband_token(idx), b.husband_token(idx))
}

fn exact_id(a: &NormalizedRecord, b: &NormalizedRecord, _: &EngineConfig) -> Option<PairScore> {
    (!a.national_id.is_empty() && a.national_id == b.national_id)
        .then(|| PairScore::single(EXACT_ID_SCORE, ReasonTag::ExactId))
}

/// Same husband and same paternal lineage: a second wife of the same household.
fn polygamy_pattern(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    if !config.rules.enable_polygamy_rules {
        return None;
    }
    let matched = jaro_winkler(&a.husband_name, &b.husband_name) >= POLYGAMY_HUSBAND_MIN
        && woman_jw(a, b, 1) >= POLYGAMY_FATHER_MIN
        && woman_jw(a, b, 2) >= POLYGAMY_GRANDFATHER_MIN;
    matched.then(|| PairScore::single(POLYGAMY_SCORE, ReasonTag::PolygamyPattern))
}

fn token_reorder(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    (jaccard(&a.woman_tokens, &b.woman_tokens) >= TOKEN_REORDER_JACCARD_MIN)
        .then(|| boosted(config, TOKEN_REORDER_BOOST, ReasonTag::TokenReorder))
}

fn household_children(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    let husband_match = jaro_winkler(&a.husband_name, &b.husband_name) >= HOUSEHOLD_HUSBAND_MIN
        || order_free(&a.husband_tokens, &b.husband_tokens) >= HOUSEHOLD_HUSBAND_MIN;
    let matched = woman_jw(a, b, 0) >= HOUSEHOLD_FIRST_NAME_MIN
        && husband_match
        && jaccard(&a.children, &b.children) >= HOUSEHOLD_CHILDREN_MIN;
    matched.then(|| {
        boosted(
            config,
            HOUSEHOLD_CHILDREN_BOOST,
            ReasonTag::DuplicatedHusbandLineage,
        )
    })
}

/// Same woman's name and lineage with a different husband.
fn woman_lineage(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    let lineage = (0..3).all(|idx| woman_jw(a, b, idx) >= LINEAGE_TOKEN_MIN);
    if !lineage || husband_jw(a, b, 0) >= LINEAGE_HUSBAND_DISSIMILAR_MAX {
        return None;
    }

    let surname = jaro_winkler(a.woman_surname(), b.woman_surname());
    let counts = (a.woman_tokens.len(), b.woman_tokens.len());
    let boost = if surname >= LINEAGE_TOKEN_MIN {
        LINEAGE_SURNAME_MATCH_BOOST
    } else if matches!(counts, (4, 5) | (5, 4)) {
        LINEAGE_TOKEN_COUNT_BOOST
    } else if surname < LINEAGE_SURNAME_DISSIMILAR_MAX {
        LINEAGE_BASE_BOOST
    } else {
        return None;
    };
    Some(boosted(config, boost, ReasonTag::WomanLineageMatch))
}

/// Near-identical lineage on both names; the woman's own first name may differ.
fn dominant_lineage(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    let enough_tokens = a.woman_tokens.len().min(b.woman_tokens.len()) >= 3
        && a.husband_tokens.len().min(b.husband_tokens.len()) >= 3;
    if !enough_tokens {
        return None;
    }
    let woman = woman_jw(a, b, 1) >= DOMINANT_STRICT_MIN
        && woman_jw(a, b, 2) >= DOMINANT_LOOSE_MIN
        && jaro_winkler(a.woman_last_token(), b.woman_last_token()) >= DOMINANT_LOOSE_MIN;
    let husband = husband_jw(a, b, 0) >= DOMINANT_STRICT_MIN
        && husband_jw(a, b, 1) >= DOMINANT_STRICT_MIN
        && husband_jw(a, b, 2) >= DOMINANT_LOOSE_MIN
        && jaro_winkler(a.husband_last_token(), b.husband_last_token()) >= DOMINANT_LOOSE_MIN;
    let lenient_first = woman_jw(a, b, 0) >= DOMINANT_WOMAN_FIRST_LENIENT_MIN;

    (woman && husband && lenient_first).then(|| {
        boosted(
            config,
            DOMINANT_LINEAGE_BOOST,
            ReasonTag::DuplicatedHusbandLineage,
        )
    })
}

/// Co-wives: the same full husband name in the same village, different women.
fn polygamy_shared_household(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    if !config.rules.enable_polygamy_rules {
        return None;
    }
    let matched = a.husband_tokens.len() >= 3
        && b.husband_tokens.len() >= 3
        && order_free(&a.husband_tokens, &b.husband_tokens) >= SHARED_HOUSEHOLD_HUSBAND_MIN
        && !a.village.is_empty()
        && a.village == b.village
        && woman_jw(a, b, 0) < SHARED_HOUSEHOLD_WOMAN_FIRST_MAX;
    matched.then(|| {
        boosted(
            config,
            SHARED_HOUSEHOLD_BOOST,
            ReasonTag::PolygamySharedHousehold,
        )
    })
}

fn carries_keyword(record: &NormalizedRecord, keywords: &[String]) -> bool {
    let fields = [
        &record.woman_name,
        &record.husband_name,
        &record.village,
        &record.subdistrict,
    ];
    keywords
        .iter()
        .map(|k| normalize_text(k))
        .filter(|k| !k.is_empty())
        .any(|k| fields.iter().any(|f| f.contains(&k)))
}

fn investigation_flag(
    a: &NormalizedRecord,
    b: &NormalizedRecord,
    config: &EngineConfig,
) -> Option<PairScore> {
    if !config.rules.enable_investigation_rules {
        return None;
    }
    let keywords = &config.rules.investigation_keywords;
    let matched = (carries_keyword(a, keywords) || carries_keyword(b, keywords))
        && woman_jw(a, b, 0) >= INVESTIGATION_NAME_MIN
        && jaro_winkler(&a.husband_name, &b.husband_name) >= INVESTIGATION_NAME_MIN;
    matched.then(|| boosted(config, INVESTIGATION_BOOST, ReasonTag::InvestigationFlag))
}
