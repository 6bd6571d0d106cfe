// src/utils/pipeline_state.rs
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::core::NormalizedRecord;
use crate::models::matching::Edge;
use crate::utils::config::EngineConfig;

/// Resume point of the candidate scan: every pair ordered before `(i, j)` has
/// been scored, and `(i, j)` itself need not be a candidate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScanCursor {
    pub i: usize,
    pub j: usize,
}

/// Partial edge-building progress, enough to resume an interrupted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeCheckpoint {
    /// Hash of the normalized input and scoring config the edges were computed from.
    pub fingerprint: String,
    pub cursor: ScanCursor,
    pub pairs_completed: usize,
    pub edges: Vec<Edge>,
    pub saved_at: NaiveDateTime,
}

/// Persistence for edge checkpoints. Implementations are called from the
/// session task between batches and must be cheap relative to a batch.
pub trait CheckpointStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<EdgeCheckpoint>>;
    fn save(&self, key: &str, checkpoint: &EdgeCheckpoint) -> Result<()>;
    fn clear(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    entries: Mutex<HashMap<String, EdgeCheckpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self, key: &str) -> Result<Option<EdgeCheckpoint>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("checkpoint store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, checkpoint: &EdgeCheckpoint) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("checkpoint store lock poisoned"))?;
        entries.insert(key.to_string(), checkpoint.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("checkpoint store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

/// Stores one JSON document per key under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    dir: PathBuf,
}

impl JsonFileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create checkpoint dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.checkpoint.json", safe))
    }
}

impl CheckpointStore for JsonFileCheckpointStore {
    fn load(&self, key: &str) -> Result<Option<EdgeCheckpoint>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read checkpoint {}", path.display()))?;
        let checkpoint = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse checkpoint {}", path.display()))?;
        Ok(Some(checkpoint))
    }

    fn save(&self, key: &str, checkpoint: &EdgeCheckpoint) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec(checkpoint).context("Failed to serialize checkpoint")?;
        fs::write(&tmp, body)
            .with_context(|| format!("Failed to write checkpoint {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move checkpoint into {}", path.display()))?;
        debug!(
            "Saved checkpoint {} ({} edges, {} pairs done)",
            path.display(),
            checkpoint.edges.len(),
            checkpoint.pairs_completed
        );
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove checkpoint {}", path.display()))?;
        }
        Ok(())
    }
}

/// Hashes everything edge scores depend on: the normalized fields of every
/// record in order, and the scoring configuration.
pub fn compute_input_fingerprint(records: &[NormalizedRecord], config: &EngineConfig) -> String {
    let mut hasher = Sha256::new();
    for r in records {
        hasher.update(
            format!(
                "{}|{}|{}|{}|{}|{}|{}|{}|{}\n",
                r.id,
                r.woman_name,
                r.husband_name,
                r.national_id,
                r.national_id_digits,
                r.phone_digits,
                r.village,
                r.subdistrict,
                r.children.join(",")
            )
            .as_bytes(),
        );
    }
    hasher.update(format!("{:?}", config).as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns the checkpoint only if it was produced from the same input.
pub fn accept_checkpoint(
    checkpoint: Option<EdgeCheckpoint>,
    fingerprint: &str,
) -> Option<EdgeCheckpoint> {
    match checkpoint {
        Some(cp) if cp.fingerprint == fingerprint => Some(cp),
        Some(cp) => {
            warn!(
                "Ignoring checkpoint saved at {} for a different input (fingerprint {}...)",
                cp.saved_at,
                cp.fingerprint.chars().take(12).collect::<String>()
            );
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::{PairScore, ReasonTag};

    fn sample_checkpoint(fingerprint: &str) -> EdgeCheckpoint {
        EdgeCheckpoint {
            fingerprint: fingerprint.to_string(),
            cursor: ScanCursor { i: 3, j: 7 },
            pairs_completed: 42,
            edges: vec![Edge::new(2, 1, PairScore::single(0.9, ReasonTag::ExactId))],
            saved_at: chrono::Utc::now().naive_utc(),
        }
    }

    fn record(id: usize, woman: &str) -> NormalizedRecord {
        NormalizedRecord {
            id,
            woman_name: woman.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_in_memory_store_lifecycle() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("k").unwrap().is_none());

        store.save("k", &sample_checkpoint("abc")).unwrap();
        let loaded = store.load("k").unwrap().unwrap();
        assert_eq!(loaded.cursor, ScanCursor { i: 3, j: 7 });
        assert_eq!(loaded.edges[0].pair_key(), (1, 2));

        store.clear("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_json_file_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCheckpointStore::new(dir.path()).unwrap();
        assert!(store.load("session/1").unwrap().is_none());

        let checkpoint = sample_checkpoint("abc");
        store.save("session/1", &checkpoint).unwrap();
        assert_eq!(store.load("session/1").unwrap(), Some(checkpoint));

        store.clear("session/1").unwrap();
        assert!(store.load("session/1").unwrap().is_none());
        store.clear("session/1").unwrap();
    }

    #[test]
    fn test_corrupt_checkpoint_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCheckpointStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("bad.checkpoint.json"), "{oops").unwrap();
        assert!(store.load("bad").is_err());
    }

    #[test]
    fn test_fingerprint_tracks_input_and_config() {
        let config = EngineConfig::default();
        let records = vec![record(0, "فاطمه"), record(1, "مريم")];
        let base = compute_input_fingerprint(&records, &config);
        assert_eq!(base, compute_input_fingerprint(&records, &config));

        let changed = vec![record(0, "فاطمه"), record(1, "زينب")];
        assert_ne!(base, compute_input_fingerprint(&changed, &config));

        let mut stricter = config.clone();
        stricter.thresholds.min_pair = 0.8;
        assert_ne!(base, compute_input_fingerprint(&records, &stricter));
    }

    #[test]
    fn test_accept_checkpoint() {
        assert!(accept_checkpoint(Some(sample_checkpoint("abc")), "abc").is_some());
        assert!(accept_checkpoint(Some(sample_checkpoint("abc")), "xyz").is_none());
        assert!(accept_checkpoint(None, "abc").is_none());
    }

    #[test]
    fn test_foreign_fingerprint_is_rejected_cleanly() {
        // byte 12 falls inside a two-byte character
        let foreign = format!("a{}", "é".repeat(8));
        assert!(!foreign.is_char_boundary(12));
        assert!(accept_checkpoint(Some(sample_checkpoint(&foreign)), "abc").is_none());
    }
}
