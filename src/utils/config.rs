// src/utils/config.rs - Engine configuration with field-level validation

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::Path;
use thiserror::Error;

use crate::utils::constants::{
    DEFAULT_BLOCK_CHUNK_SIZE, DEFAULT_MIN_INTERNAL, DEFAULT_MIN_PAIR,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("configuration is not valid JSON: {0}")]
    Parse(String),
    #[error("configuration field `{field}` must be {expected}")]
    InvalidType { field: String, expected: &'static str },
    #[error("configuration field `{field}` must be a finite number")]
    NonFinite { field: String },
    #[error("configuration field `{field}` has an invalid value `{value}`")]
    InvalidValue { field: String, value: String },
    #[error("field mapping `{field}` must name a source column")]
    MissingMapping { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    /// Minimum score for an edge to be retained.
    pub min_pair: f64,
    /// Minimum score used when splitting oversized groups.
    pub min_internal: f64,
    /// Blocks larger than this are enumerated in sub-chunks.
    pub block_chunk_size: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_pair: DEFAULT_MIN_PAIR,
            min_internal: DEFAULT_MIN_INTERNAL,
            block_chunk_size: DEFAULT_BLOCK_CHUNK_SIZE,
        }
    }
}

/// Weights of the composite formula. They are not required to sum to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreWeights {
    pub first_name: f64,
    pub family_name: f64,
    pub advanced_name: f64,
    pub token_reorder: f64,
    pub husband: f64,
    pub id: f64,
    pub phone: f64,
    pub children: f64,
    pub location: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            first_name: 0.15,
            family_name: 0.25,
            advanced_name: 0.12,
            token_reorder: 0.10,
            husband: 0.12,
            id: 0.08,
            phone: 0.05,
            children: 0.05,
            location: 0.04,
        }
    }
}

impl ScoreWeights {
    fn entries(&self) -> [(&'static str, f64); 9] {
        [
            ("firstName", self.first_name),
            ("familyName", self.family_name),
            ("advancedName", self.advanced_name),
            ("tokenReorder", self.token_reorder),
            ("husband", self.husband),
            ("id", self.id),
            ("phone", self.phone),
            ("children", self.children),
            ("location", self.location),
        ]
    }

    pub fn total(&self) -> f64 {
        self.entries().iter().map(|(_, w)| w).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuleToggles {
    pub enable_polygamy_rules: bool,
    pub enable_investigation_rules: bool,
    pub investigation_keywords: Vec<String>,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            enable_polygamy_rules: true,
            enable_investigation_rules: false,
            investigation_keywords: vec!["تحقيق".to_string(), "investigation".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub final_score_weights: ScoreWeights,
    pub rules: RuleToggles,
}

#[derive(Clone, Copy)]
enum FieldKind {
    Number,
    Integer,
    Bool,
    StringList,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_u64(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::StringList => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_string)),
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            FieldKind::Number => "a number",
            FieldKind::Integer => "a non-negative integer",
            FieldKind::Bool => "a boolean",
            FieldKind::StringList => "a list of strings",
        }
    }
}

const FIELD_KINDS: [(&str, &str, FieldKind); 15] = [
    ("thresholds", "minPair", FieldKind::Number),
    ("thresholds", "minInternal", FieldKind::Number),
    ("thresholds", "blockChunkSize", FieldKind::Integer),
    ("finalScoreWeights", "firstName", FieldKind::Number),
    ("finalScoreWeights", "familyName", FieldKind::Number),
    ("finalScoreWeights", "advancedName", FieldKind::Number),
    ("finalScoreWeights", "tokenReorder", FieldKind::Number),
    ("finalScoreWeights", "husband", FieldKind::Number),
    ("finalScoreWeights", "id", FieldKind::Number),
    ("finalScoreWeights", "phone", FieldKind::Number),
    ("finalScoreWeights", "children", FieldKind::Number),
    ("finalScoreWeights", "location", FieldKind::Number),
    ("rules", "enablePolygamyRules", FieldKind::Bool),
    ("rules", "enableInvestigationRules", FieldKind::Bool),
    ("rules", "investigationKeywords", FieldKind::StringList),
];

impl EngineConfig {
    /// Parses a JSON configuration. Missing fields take their defaults; a field
    /// of the wrong type is reported by its dotted path.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let root: Value =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if !root.is_object() {
            return Err(ConfigError::Parse("top level must be an object".to_string()));
        }
        for section in ["thresholds", "finalScoreWeights", "rules"] {
            if let Some(value) = root.get(section) {
                if !value.is_object() {
                    return Err(ConfigError::InvalidType {
                        field: section.to_string(),
                        expected: "an object",
                    });
                }
            }
        }
        for (section, key, kind) in FIELD_KINDS {
            if let Some(value) = root.get(section).and_then(|s| s.get(key)) {
                if !kind.accepts(value) {
                    return Err(ConfigError::InvalidType {
                        field: format!("{}.{}", section, key),
                        expected: kind.expected(),
                    });
                }
            }
        }
        let config: EngineConfig =
            serde_json::from_value(root).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Rejects values that cannot be computed with. Ranges are the caller's
    /// responsibility; only the final score is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("thresholds.minPair", self.thresholds.min_pair),
            ("thresholds.minInternal", self.thresholds.min_internal),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite {
                    field: field.to_string(),
                });
            }
        }
        if self.thresholds.block_chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "thresholds.blockChunkSize".to_string(),
                value: "0".to_string(),
            });
        }
        for (name, weight) in self.final_score_weights.entries() {
            if !weight.is_finite() {
                return Err(ConfigError::NonFinite {
                    field: format!("finalScoreWeights.{}", name),
                });
            }
        }
        Ok(())
    }

    /// Applies `DEDUPE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("DEDUPE_MIN_PAIR") {
            self.thresholds.min_pair = parse_override("DEDUPE_MIN_PAIR", &raw)?;
        }
        if let Some(raw) = lookup("DEDUPE_MIN_INTERNAL") {
            self.thresholds.min_internal = parse_override("DEDUPE_MIN_INTERNAL", &raw)?;
        }
        if let Some(raw) = lookup("DEDUPE_BLOCK_CHUNK_SIZE") {
            self.thresholds.block_chunk_size = parse_override("DEDUPE_BLOCK_CHUNK_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("DEDUPE_ENABLE_POLYGAMY_RULES") {
            self.rules.enable_polygamy_rules =
                parse_override("DEDUPE_ENABLE_POLYGAMY_RULES", &raw)?;
        }
        self.validate()
    }

    pub fn log_config(&self) {
        info!(
            "⚙️  Thresholds: minPair={:.2}, minInternal={:.2}, blockChunkSize={}",
            self.thresholds.min_pair, self.thresholds.min_internal, self.thresholds.block_chunk_size
        );
        info!(
            "⚖️  Composite weights total {:.2}",
            self.final_score_weights.total()
        );
        info!(
            "📜 Rules: polygamy={}, investigation={}",
            if self.rules.enable_polygamy_rules { "ENABLED" } else { "DISABLED" },
            if self.rules.enable_investigation_rules { "ENABLED" } else { "DISABLED" }
        );
    }
}

fn parse_override<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.thresholds.min_pair, 0.62);
        assert_eq!(config.thresholds.min_internal, 0.52);
        assert_eq!(config.thresholds.block_chunk_size, 1500);
        assert!(config.rules.enable_polygamy_rules);
        assert!(!config.rules.enable_investigation_rules);
        assert!((config.final_score_weights.total() - 0.96).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"thresholds": {"minPair": 0.7}, "rules": {"enablePolygamyRules": false}}"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.min_pair, 0.7);
        assert_eq!(config.thresholds.min_internal, 0.52);
        assert!(!config.rules.enable_polygamy_rules);
        assert_eq!(config.final_score_weights, ScoreWeights::default());
    }

    #[test]
    fn test_non_numeric_threshold_names_field() {
        let err = EngineConfig::from_json_str(r#"{"thresholds": {"minPair": "high"}}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidType {
                field: "thresholds.minPair".to_string(),
                expected: "a number",
            }
        );
    }

    #[test]
    fn test_bad_weight_and_chunk_size() {
        let err = EngineConfig::from_json_str(r#"{"finalScoreWeights": {"phone": true}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidType { ref field, .. } if field == "finalScoreWeights.phone"));

        let err = EngineConfig::from_json_str(r#"{"thresholds": {"blockChunkSize": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "thresholds.blockChunkSize"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("[1, 2]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_are_accepted() {
        let config = EngineConfig::from_json_str(
            r#"{"thresholds": {"minPair": 1.5}, "finalScoreWeights": {"firstName": -2.0}}"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.min_pair, 1.5);
        assert_eq!(config.final_score_weights.first_name, -2.0);
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DEDUPE_MIN_PAIR", "0.7"),
            ("DEDUPE_BLOCK_CHUNK_SIZE", "300"),
            ("DEDUPE_ENABLE_POLYGAMY_RULES", "false"),
        ]);
        let mut config = EngineConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.thresholds.min_pair, 0.7);
        assert_eq!(config.thresholds.block_chunk_size, 300);
        assert!(!config.rules.enable_polygamy_rules);
        assert_eq!(config.thresholds.min_internal, 0.52);
    }

    #[test]
    fn test_malformed_override_is_an_error() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides_from(|key| (key == "DEDUPE_MIN_INTERNAL").then(|| "abc".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                field: "DEDUPE_MIN_INTERNAL".to_string(),
                value: "abc".to_string(),
            }
        );

        let err = config
            .apply_overrides_from(|key| (key == "DEDUPE_MIN_PAIR").then(|| "NaN".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonFinite { .. }));
    }
}
