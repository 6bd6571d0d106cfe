// src/models/matching.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifies which rule or formula linked two records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonTag {
    ExactId,
    PolygamyPattern,
    TokenReorder,
    DuplicatedHusbandLineage,
    WomanLineageMatch,
    PolygamySharedHousehold,
    InvestigationFlag,
    WeightedComposite,
}

impl ReasonTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonTag::ExactId => "EXACT_ID",
            ReasonTag::PolygamyPattern => "POLYGAMY_PATTERN",
            ReasonTag::TokenReorder => "TOKEN_REORDER",
            ReasonTag::DuplicatedHusbandLineage => "DUPLICATED_HUSBAND_LINEAGE",
            ReasonTag::WomanLineageMatch => "WOMAN_LINEAGE_MATCH",
            ReasonTag::PolygamySharedHousehold => "POLYGAMY_SHARED_HOUSEHOLD",
            ReasonTag::InvestigationFlag => "INVESTIGATION_FLAG",
            ReasonTag::WeightedComposite => "WEIGHTED_COMPOSITE",
        }
    }
}

impl fmt::Display for ReasonTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ReasonSet = BTreeSet<ReasonTag>;

/// Final score of a pair plus the tags that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    pub score: f64,
    pub reasons: ReasonSet,
}

impl PairScore {
    pub fn single(score: f64, reason: ReasonTag) -> Self {
        Self {
            score,
            reasons: BTreeSet::from([reason]),
        }
    }
}

/// Component scores of the weighted composite formula, each in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub first_name: f64,
    pub family_name: f64,
    pub advanced_name: f64,
    pub token_reorder: f64,
    pub husband: f64,
    pub id: f64,
    pub phone: f64,
    pub children: f64,
    pub location: f64,
    pub compounding_bonus: f64,
    /// Weighted sum plus bonus, clamped to [0, 1].
    pub weighted_total: f64,
}

/// Score, reasons and components for one pair, as shown to reviewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairBreakdown {
    pub a: usize,
    pub b: usize,
    pub score: f64,
    pub reasons: ReasonSet,
    pub breakdown: ScoreBreakdown,
}

/// A retained candidate pair. `a < b` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub score: f64,
    pub reasons: ReasonSet,
}

impl Edge {
    pub fn new(x: usize, y: usize, pair: PairScore) -> Self {
        let (a, b) = if x <= y { (x, y) } else { (y, x) };
        Self {
            a,
            b,
            score: pair.score,
            reasons: pair.reasons,
        }
    }

    pub fn pair_key(&self) -> (usize, usize) {
        (self.a, self.b)
    }
}
