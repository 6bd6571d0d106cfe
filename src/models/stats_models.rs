// src/models/stats_models.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::core::NormalizedRecord;
use crate::models::matching::{ReasonSet, ScoreBreakdown};

/// A household group of 2 to 4 records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub cluster_id: String,
    pub records: Vec<NormalizedRecord>,
    pub reasons: ReasonSet,
    pub pair_scores: Vec<ClusterPairScore>,
    pub coherence: ClusterCoherence,
}

impl Cluster {
    pub fn member_ids(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.id).collect()
    }
}

/// Intra-cluster pair kept for review display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPairScore {
    pub a: usize,
    pub b: usize,
    pub final_score: f64,
    pub reasons: ReasonSet,
    pub component_scores_used: ScoreBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCoherence {
    /// Mean of the recorded intra-cluster pair scores.
    pub average_score: f64,
    pub min_score: f64,
    /// Recorded pairs divided by possible pairs (0.0 to 1.0).
    pub density: f64,
}

/// Stage boundaries reported by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    Receiving,
    Blocking,
    BuildingEdges,
    MergingEdges,
    Annotating,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Receiving => "receiving",
            PipelineStage::Blocking => "blocking",
            PipelineStage::BuildingEdges => "building-edges",
            PipelineStage::MergingEdges => "merging-edges",
            PipelineStage::Annotating => "annotating",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub status: PipelineStage,
    pub percent_complete: f64,
    pub items_completed: usize,
    pub items_total: usize,
    pub message: Option<String>,
}

impl ProgressUpdate {
    pub fn new(status: PipelineStage, items_completed: usize, items_total: usize) -> Self {
        let percent_complete = if items_total == 0 {
            100.0
        } else {
            (items_completed as f64 / items_total as f64 * 100.0).min(100.0)
        };
        Self {
            status,
            percent_complete,
            items_completed,
            items_total,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub records_ingested: usize,
    pub blocks_total: usize,
    pub candidate_blocks: usize,
    pub candidate_pairs: usize,
    pub edges_retained: usize,
    pub clusters_created: usize,
    pub records_clustered: usize,
    pub resumed_from_checkpoint: bool,
    pub ingestion_time: f64,
    pub blocking_time: f64,
    pub edge_building_time: f64,
    pub clustering_time: f64,
    pub annotation_time: f64,
    pub total_processing_time: f64,
}

impl PipelineStats {
    pub fn new(run_id: String, run_timestamp: NaiveDateTime) -> Self {
        Self {
            run_id,
            run_timestamp,
            records_ingested: 0,
            blocks_total: 0,
            candidate_blocks: 0,
            candidate_pairs: 0,
            edges_retained: 0,
            clusters_created: 0,
            records_clustered: 0,
            resumed_from_checkpoint: false,
            ingestion_time: 0.0,
            blocking_time: 0.0,
            edge_building_time: 0.0,
            clustering_time: 0.0,
            annotation_time: 0.0,
            total_processing_time: 0.0,
        }
    }
}
