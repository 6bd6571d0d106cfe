// src/models/core.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::config::ConfigError;

/// One row of the source dataset. Column names are not known ahead of time.
pub type RawRecord = serde_json::Map<String, Value>;

/// Maps the canonical household fields onto source column names.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub woman_name: String,
    pub husband_name: String,
    pub national_id: String,
    pub phone: String,
    pub village: String,
    pub subdistrict: String,
    pub children: String,
    #[serde(default)]
    pub beneficiary_id: Option<String>,
}

impl FieldMapping {
    /// Every canonical field except `beneficiaryId` must name a source column.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("mapping.womanName", &self.woman_name),
            ("mapping.husbandName", &self.husband_name),
            ("mapping.nationalId", &self.national_id),
            ("mapping.phone", &self.phone),
            ("mapping.village", &self.village),
            ("mapping.subdistrict", &self.subdistrict),
            ("mapping.children", &self.children),
        ];
        for (field, column) in required {
            if column.trim().is_empty() {
                return Err(ConfigError::MissingMapping { field });
            }
        }
        Ok(())
    }
}

/// The mapped source values before normalization, kept for audit output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawFields {
    pub woman_name: String,
    pub husband_name: String,
    pub national_id: String,
    pub phone: String,
    pub village: String,
    pub subdistrict: String,
    pub children: String,
}

/// Immutable, normalized view of a [`RawRecord`].
///
/// `id` is the ingestion position and stays stable for the whole run; every
/// edge and cluster refers to records through it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub id: usize,
    pub beneficiary_id: Option<String>,
    pub raw: RawFields,
    pub woman_name: String,
    pub husband_name: String,
    /// Trimmed source value, compared verbatim for the exact-ID rule.
    pub national_id: String,
    pub national_id_digits: String,
    pub phone_digits: String,
    pub village: String,
    pub subdistrict: String,
    pub woman_tokens: Vec<String>,
    pub husband_tokens: Vec<String>,
    pub children: Vec<String>,
}

impl NormalizedRecord {
    pub fn woman_token(&self, idx: usize) -> &str {
        self.woman_tokens.get(idx).map(String::as_str).unwrap_or("")
    }

    pub fn husband_token(&self, idx: usize) -> &str {
        self.husband_tokens.get(idx).map(String::as_str).unwrap_or("")
    }

    /// Family name of the woman: the last token of a name with at least four parts.
    pub fn woman_surname(&self) -> &str {
        if self.woman_tokens.len() >= 4 {
            self.woman_tokens.last().map(String::as_str).unwrap_or("")
        } else {
            ""
        }
    }

    pub fn woman_last_token(&self) -> &str {
        self.woman_tokens.last().map(String::as_str).unwrap_or("")
    }

    pub fn husband_last_token(&self) -> &str {
        self.husband_tokens.last().map(String::as_str).unwrap_or("")
    }

    /// Human-readable label used in logs and audit output.
    pub fn label(&self) -> String {
        match &self.beneficiary_id {
            Some(bid) if !bid.is_empty() => bid.clone(),
            _ => format!("row-{}", self.id),
        }
    }
}
