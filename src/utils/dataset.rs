// src/utils/dataset.rs - Reading input rows and field mappings from disk
use anyhow::{bail, Context, Result};
use log::info;
use std::fs;
use std::path::Path;

use crate::models::core::{FieldMapping, RawRecord};

/// Reads a JSON array of row objects.
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input rows from {}", path.display()))?;
    let rows = parse_records(&text)
        .with_context(|| format!("Failed to parse input rows in {}", path.display()))?;
    info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn parse_records(text: &str) -> Result<Vec<RawRecord>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let Some(items) = value.as_array() else {
        bail!("expected a JSON array of row objects");
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object()
                .cloned()
                .with_context(|| format!("row {} is not a JSON object", i))
        })
        .collect()
}

pub fn load_mapping(path: &Path) -> Result<FieldMapping> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read field mapping from {}", path.display()))?;
    let mapping: FieldMapping = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse field mapping in {}", path.display()))?;
    mapping.validate()?;
    Ok(mapping)
}
