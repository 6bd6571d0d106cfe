// src/utils/progress_bars/logging.rs - Logging helpers for the dedupe stages
use crate::models::stats_models::{PipelineStage, PipelineStats};
use log::{info, warn};
use std::time::Instant;

#[derive(Clone)]
pub struct MatchingLogger {
    stage_name: &'static str,
    stage_emoji: &'static str,
    start_time: Instant,
}

impl MatchingLogger {
    pub fn new(stage: PipelineStage) -> Self {
        let (stage_name, stage_emoji) = match stage {
            PipelineStage::Receiving => ("RECEIVE", "📥"),
            PipelineStage::Blocking => ("BLOCKING", "🧱"),
            PipelineStage::BuildingEdges => ("EDGES", "🔗"),
            PipelineStage::MergingEdges => ("CLUSTER", "🏠"),
            PipelineStage::Annotating => ("ANNOTATE", "📝"),
            PipelineStage::Done => ("DONE", "✅"),
        };

        Self {
            stage_name,
            stage_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, session_id: &str, items: usize) {
        info!(
            "[{}] {} 🚀 Starting {} stage for session {} ({} items)",
            self.stage_name,
            self.stage_emoji,
            self.stage_name.to_lowercase(),
            session_id,
            items
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        let msg = if let Some(details) = details {
            format!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, details, elapsed.as_secs_f32()
            )
        } else {
            format!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.stage_name, self.stage_emoji, phase, elapsed.as_secs_f32()
            )
        };
        info!("{}", msg);
    }

    pub fn log_blocks(&self, total_blocks: usize, candidate_blocks: usize, largest_block: usize) {
        info!(
            "[{}] {} 🧮 {} blocks built, {} with 2+ records (largest: {} records)",
            self.stage_name, self.stage_emoji, total_blocks, candidate_blocks, largest_block
        );
    }

    pub fn log_pair_generation(&self, total_pairs: usize, blocks_count: usize) {
        info!(
            "[{}] {} 📈 Candidate pairs to evaluate: {} (from {} blocks with multiple records)",
            self.stage_name, self.stage_emoji, total_pairs, blocks_count
        );
    }

    pub fn log_batch_processing_start(&self, total_pairs: usize, batch_size: usize, workers: usize) {
        let batch_count = (total_pairs + batch_size - 1) / batch_size.max(1);
        info!(
            "[{}] {} ⚙️  Scoring {} pairs in {} batches (batch size: {}, workers: {})",
            self.stage_name, self.stage_emoji, total_pairs, batch_count, batch_size, workers
        );
    }

    pub fn log_batch_progress(&self, batch_num: usize, total_batches: usize, edges_so_far: usize) {
        if batch_num % 5 == 0 || batch_num == 1 || batch_num == total_batches {
            info!(
                "[{}] {} 📦 Batch {}/{} done ({} edges retained so far)",
                self.stage_name, self.stage_emoji, batch_num, total_batches, edges_so_far
            );
        }
    }

    pub fn log_resume(&self, pairs_completed: usize, edges: usize) {
        info!(
            "[{}] {} ⏯️  Resuming from checkpoint: {} pairs already scored, {} edges restored",
            self.stage_name, self.stage_emoji, pairs_completed, edges
        );
    }

    pub fn log_completion(&self, summary: &str) {
        info!(
            "[{}] {} 🎉 COMPLETED in {:.2?}: {}",
            self.stage_name,
            self.stage_emoji,
            self.start_time.elapsed(),
            summary
        );
    }

    pub fn log_data_quality_issue(&self, issue_type: &str, count: usize) {
        if count > 0 {
            warn!(
                "[{}] {} ⚠️  Data quality: {} records with {}",
                self.stage_name, self.stage_emoji, count, issue_type
            );
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.stage_name, self.stage_emoji, message);
    }
}

// Pipeline-level logging functions
pub fn log_pipeline_start(run_id: &str, record_count: usize, workers: usize, has_checkpoints: bool) {
    info!("🚀 ===== HOUSEHOLD DEDUPE PIPELINE STARTING =====");
    info!("📅 Session ID: {}", run_id);
    info!("⚙️  Configuration:");
    info!("   • {} records received", record_count);
    info!("   • Scoring workers: {}", workers);
    info!(
        "   • Checkpointing: {}",
        if has_checkpoints { "enabled" } else { "disabled" }
    );
    info!("================================================");
}

pub fn log_pipeline_cancelled(run_id: &str, stage: PipelineStage) {
    warn!("🛑 Session {} cancelled during stage '{}'", run_id, stage);
}

pub fn log_pipeline_completion(stats: &PipelineStats) {
    info!("🎉 ===== HOUSEHOLD DEDUPE PIPELINE COMPLETED =====");
    info!("📅 Session ID: {}", stats.run_id);
    info!("⏱️  Total Duration: {:.2}s", stats.total_processing_time);
    info!("");
    info!("📈 Stage Breakdown:");
    info!("  📥 Ingestion: {} records in {:.2}s", stats.records_ingested, stats.ingestion_time);
    info!(
        "  🧱 Blocking: {} blocks ({} candidates) in {:.2}s",
        stats.blocks_total, stats.candidate_blocks, stats.blocking_time
    );
    info!(
        "  🔗 Edges: {} of {} candidate pairs retained in {:.2}s{}",
        stats.edges_retained,
        stats.candidate_pairs,
        stats.edge_building_time,
        if stats.resumed_from_checkpoint { " (resumed)" } else { "" }
    );
    info!(
        "  🏠 Clustering: {} households covering {} records in {:.2}s",
        stats.clusters_created, stats.records_clustered, stats.clustering_time
    );
    info!("  📝 Annotation: {:.2}s", stats.annotation_time);
    info!("===============================================");
}
