// src/utils/constants.rs

/// Largest household a cluster may represent.
pub const HOUSEHOLD_SIZE_CAP: usize = 4;

// Default thresholds
pub const DEFAULT_MIN_PAIR: f64 = 0.62;
pub const DEFAULT_MIN_INTERNAL: f64 = 0.52;
pub const DEFAULT_BLOCK_CHUNK_SIZE: usize = 1500;

// Fixed scores of the short-circuit rules
pub const EXACT_ID_SCORE: f64 = 0.99;
pub const POLYGAMY_SCORE: f64 = 0.97;

// Polygamy pattern
pub const POLYGAMY_HUSBAND_MIN: f64 = 0.95;
pub const POLYGAMY_FATHER_MIN: f64 = 0.93;
pub const POLYGAMY_GRANDFATHER_MIN: f64 = 0.90;

// Token reorder
pub const TOKEN_REORDER_JACCARD_MIN: f64 = 0.80;
pub const TOKEN_REORDER_BOOST: f64 = 0.22;
pub const TOKEN_REORDER_COMPONENT_TAG_MIN: f64 = 0.85;

// Household + children
pub const HOUSEHOLD_FIRST_NAME_MIN: f64 = 0.93;
pub const HOUSEHOLD_HUSBAND_MIN: f64 = 0.90;
pub const HOUSEHOLD_CHILDREN_MIN: f64 = 0.90;
pub const HOUSEHOLD_CHILDREN_BOOST: f64 = 0.30;

// Woman lineage
pub const LINEAGE_TOKEN_MIN: f64 = 0.93;
pub const LINEAGE_SURNAME_DISSIMILAR_MAX: f64 = 0.90;
pub const LINEAGE_HUSBAND_DISSIMILAR_MAX: f64 = 0.70;
pub const LINEAGE_SURNAME_MATCH_BOOST: f64 = 0.20;
pub const LINEAGE_TOKEN_COUNT_BOOST: f64 = 0.18;
pub const LINEAGE_BASE_BOOST: f64 = 0.16;

// Dominant lineage
pub const DOMINANT_STRICT_MIN: f64 = 0.93;
pub const DOMINANT_LOOSE_MIN: f64 = 0.90;
pub const DOMINANT_WOMAN_FIRST_LENIENT_MIN: f64 = 0.55;
pub const DOMINANT_LINEAGE_BOOST: f64 = 0.25;

// Shared household of co-wives
pub const SHARED_HOUSEHOLD_HUSBAND_MIN: f64 = 0.95;
pub const SHARED_HOUSEHOLD_WOMAN_FIRST_MAX: f64 = 0.85;
pub const SHARED_HOUSEHOLD_BOOST: f64 = 0.16;

// Investigation marker
pub const INVESTIGATION_NAME_MIN: f64 = 0.90;
pub const INVESTIGATION_BOOST: f64 = 0.17;

// Weighted composite
pub const COMPOUNDING_COMPONENT_MIN: f64 = 0.85;
pub const COMPOUNDING_BONUS: f64 = 0.04;
pub const ADVANCED_NAME_CAP: f64 = 0.5;
pub const NAME_STEM_LEN: usize = 3;
pub const ID_SUFFIX_LEN: usize = 5;
pub const ID_SUFFIX_SCORE: f64 = 0.75;
pub const PHONE_LONG_SUFFIX_LEN: usize = 6;
pub const PHONE_LONG_SUFFIX_SCORE: f64 = 0.85;
pub const PHONE_SHORT_SUFFIX_LEN: usize = 4;
pub const PHONE_SHORT_SUFFIX_SCORE: f64 = 0.6;
pub const VILLAGE_MATCH_SCORE: f64 = 0.4;
pub const SUBDISTRICT_MATCH_SCORE: f64 = 0.25;
pub const LOCATION_CAP: f64 = 0.5;

// Order-free score
pub const ORDER_FREE_JACCARD_WEIGHT: f64 = 0.7;
pub const ORDER_FREE_SORTED_WEIGHT: f64 = 0.3;

// Jaro-Winkler
pub const WINKLER_PREFIX_SCALE: f64 = 0.1;
pub const WINKLER_MAX_PREFIX: usize = 4;

// Splitting oversized groups
pub const SPLIT_THRESHOLD_FLOOR: f64 = 0.45;
pub const SPLIT_SCORE_CACHE_CAPACITY: usize = 65_536;

// Blocking
pub const FIRST_NAME_PREFIX_LEN: usize = 3;
pub const LOCATION_PREFIX_LEN: usize = 4;
pub const PHONE_BLOCK_SUFFIX_LEN: usize = 6;
pub const CATCH_ALL_BLOCK: &str = "*";

// Session controller
pub const INGEST_CHUNK_SIZE: usize = 2_000;
pub const EDGE_BATCH_SIZE: usize = 5_000;
pub const CHECKPOINT_EVERY_BATCHES: usize = 4;
