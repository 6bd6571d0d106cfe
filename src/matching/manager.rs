// src/matching/manager.rs - Session controller driving the dedupe pipeline
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::clustering::annotation::annotate_clusters;
use crate::clustering::household_clustering::cluster_households;
use crate::matching::blocking::{build_blocks, CandidatePairStream};
use crate::matching::edges::{score_pairs_parallel, sort_edges};
use crate::matching::normalize::normalize_record;
use crate::models::core::{FieldMapping, NormalizedRecord, RawRecord};
use crate::models::matching::Edge;
use crate::models::stats_models::{Cluster, PipelineStage, PipelineStats};
use crate::utils::config::EngineConfig;
use crate::utils::constants::{CHECKPOINT_EVERY_BATCHES, EDGE_BATCH_SIZE, INGEST_CHUNK_SIZE};
use crate::utils::get_memory_usage;
use crate::utils::pipeline_state::{
    accept_checkpoint, compute_input_fingerprint, CheckpointStore, EdgeCheckpoint, ScanCursor,
};
use crate::utils::progress_bars::logging::{
    log_pipeline_cancelled, log_pipeline_completion, log_pipeline_start, MatchingLogger,
};
use crate::utils::progress_bars::progress_callback::{
    CancellationFlag, ProgressCallback, ProgressTracker,
};

pub const DEFAULT_CHECKPOINT_KEY: &str = "dedupe-edges";
const DEFAULT_REPORT_EVERY_PAIRS: usize = 5_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("session {session_id} was cancelled during {stage}")]
    Cancelled {
        session_id: String,
        stage: PipelineStage,
    },
}

/// Everything one run needs. Nothing outlives the session.
pub struct DedupeSession {
    pub session_id: String,
    records: Vec<RawRecord>,
    mapping: FieldMapping,
    config: EngineConfig,
    progress: Option<ProgressCallback>,
    report_every_pairs: usize,
    cancellation: CancellationFlag,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    checkpoint_key: String,
    batch_size: usize,
    workers: usize,
}

impl DedupeSession {
    pub fn new(records: Vec<RawRecord>, mapping: FieldMapping, config: EngineConfig) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            records,
            mapping,
            config,
            progress: None,
            report_every_pairs: DEFAULT_REPORT_EVERY_PAIRS,
            cancellation: CancellationFlag::new(),
            checkpoint_store: None,
            checkpoint_key: DEFAULT_CHECKPOINT_KEY.to_string(),
            batch_size: EDGE_BATCH_SIZE,
            workers: num_cpus::get(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_report_every_pairs(mut self, pairs: usize) -> Self {
        self.report_every_pairs = pairs.max(1);
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn with_checkpoint_store(
        mut self,
        store: Arc<dyn CheckpointStore>,
        key: impl Into<String>,
    ) -> Self {
        self.checkpoint_store = Some(store);
        self.checkpoint_key = key.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn cancellation_handle(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    fn check_cancelled(&self, stage: PipelineStage) -> Result<()> {
        if self.cancellation.is_cancelled() {
            log_pipeline_cancelled(&self.session_id, stage);
            return Err(PipelineError::Cancelled {
                session_id: self.session_id.clone(),
                stage,
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DedupeOutcome {
    pub clusters: Vec<Cluster>,
    pub stats: PipelineStats,
}

fn save_checkpoint(
    session: &DedupeSession,
    fingerprint: &str,
    cursor: ScanCursor,
    position: usize,
    edges: &[Edge],
) {
    let Some(store) = &session.checkpoint_store else {
        return;
    };
    let checkpoint = EdgeCheckpoint {
        fingerprint: fingerprint.to_string(),
        cursor,
        pairs_completed: position,
        edges: edges.to_vec(),
        saved_at: Utc::now().naive_utc(),
    };
    // a failed save only costs the resume point
    if let Err(e) = store.save(&session.checkpoint_key, &checkpoint) {
        warn!("Failed to save edge checkpoint at pair {}: {:?}", position, e);
    }
}

async fn ingest(
    session: &DedupeSession,
    tracker: &ProgressTracker,
) -> Result<Vec<NormalizedRecord>> {
    let logger = MatchingLogger::new(PipelineStage::Receiving);
    let total = session.records.len();
    logger.log_start(&session.session_id, total);

    let mut normalized = Vec::with_capacity(total);
    for chunk in session.records.chunks(INGEST_CHUNK_SIZE) {
        session.check_cancelled(PipelineStage::Receiving)?;
        for raw in chunk {
            let id = normalized.len();
            normalized.push(normalize_record(id, raw, &session.mapping));
        }
        tracker.update_progress(normalized.len(), total);
        tokio::task::yield_now().await;
    }

    let nameless = normalized.iter().filter(|r| r.woman_tokens.is_empty()).count();
    logger.log_data_quality_issue("an empty woman name", nameless);
    logger.log_completion(&format!("{} records normalized", normalized.len()));
    Ok(normalized)
}

async fn build_session_edges(
    session: &DedupeSession,
    tracker: &ProgressTracker,
    records: &Arc<Vec<NormalizedRecord>>,
    mut pairs: CandidatePairStream,
    total: usize,
    stats: &mut PipelineStats,
) -> Result<Vec<Edge>> {
    let logger = MatchingLogger::new(PipelineStage::BuildingEdges);
    let config = Arc::new(session.config.clone());
    let min_pair = config.thresholds.min_pair;
    let fingerprint = compute_input_fingerprint(records, &config);

    let mut edges: Vec<Edge> = Vec::new();
    let mut position = 0usize;
    if let Some(store) = &session.checkpoint_store {
        let loaded = match store.load(&session.checkpoint_key) {
            Ok(cp) => cp,
            Err(e) => {
                logger.log_warning(&format!("Could not read checkpoint, starting fresh: {:?}", e));
                None
            }
        };
        if let Some(cp) = accept_checkpoint(loaded, &fingerprint) {
            pairs.seek(cp.cursor);
            position = cp.pairs_completed.min(total);
            logger.log_resume(position, cp.edges.len());
            edges = cp.edges;
            stats.resumed_from_checkpoint = true;
        }
    }

    logger.log_batch_processing_start(total - position, session.batch_size, session.workers);
    let total_batches = total.div_ceil(session.batch_size);
    let mut next_report = position + session.report_every_pairs;
    let mut batches = 0usize;

    while position < total {
        if session.cancellation.is_cancelled() {
            save_checkpoint(session, &fingerprint, pairs.cursor(), position, &edges);
        }
        session.check_cancelled(PipelineStage::BuildingEdges)?;

        let batch = pairs.next_batch(session.batch_size);
        if batch.is_empty() {
            break;
        }
        let end = position + batch.len();
        let batch_edges = score_pairs_parallel(
            Arc::clone(records),
            &batch,
            min_pair,
            Arc::clone(&config),
            session.workers,
        )
        .await
        .with_context(|| format!("Failed to score pairs {}..{}", position, end))?;
        edges.extend(batch_edges);
        position = end;
        batches += 1;

        if position >= next_report || position >= total {
            tracker.update_progress_with_info(
                position,
                total,
                &format!("{} edges retained", edges.len()),
            );
            next_report = position + session.report_every_pairs;
        }
        logger.log_batch_progress(position.div_ceil(session.batch_size), total_batches, edges.len());
        if batches % CHECKPOINT_EVERY_BATCHES == 0 && position < total {
            save_checkpoint(session, &fingerprint, pairs.cursor(), position, &edges);
        }
        tokio::task::yield_now().await;
    }

    sort_edges(&mut edges);
    if let Some(store) = &session.checkpoint_store {
        if let Err(e) = store.clear(&session.checkpoint_key) {
            logger.log_warning(&format!("Failed to clear checkpoint: {:?}", e));
        }
    }
    debug!(
        "At most {} candidate partners buffered at once",
        pairs.peak_held()
    );
    logger.log_completion(&format!("{} edges from {} candidate pairs", edges.len(), total));
    Ok(edges)
}

/// Runs normalization, blocking, edge building, clustering and annotation
/// for one session.
///
/// Cancellation is cooperative and checked between chunks; a cancelled run
/// fails with [`PipelineError::Cancelled`].
pub async fn run_dedupe_pipeline(session: DedupeSession) -> Result<DedupeOutcome> {
    let run_start = Instant::now();
    session
        .mapping
        .validate()
        .context("Invalid field mapping")?;
    session.config.validate().context("Invalid engine configuration")?;

    let mut stats = PipelineStats::new(session.session_id.clone(), Utc::now().naive_utc());
    let mut tracker = ProgressTracker::new(session.progress.clone());
    log_pipeline_start(
        &session.session_id,
        session.records.len(),
        session.workers,
        session.checkpoint_store.is_some(),
    );

    // Receiving
    let stage_start = Instant::now();
    tracker.set_stage(PipelineStage::Receiving, session.records.len());
    let records = Arc::new(ingest(&session, &tracker).await?);
    stats.records_ingested = records.len();
    stats.ingestion_time = stage_start.elapsed().as_secs_f64();

    // Blocking
    session.check_cancelled(PipelineStage::Blocking)?;
    let stage_start = Instant::now();
    tracker.set_stage(PipelineStage::Blocking, records.len());
    let logger = MatchingLogger::new(PipelineStage::Blocking);
    let chunk_size = session.config.thresholds.block_chunk_size;
    logger.log_phase(
        "Building block index",
        Some(&format!("chunk size {}", chunk_size)),
    );
    let blocking_records = Arc::clone(&records);
    let (block_count, candidate_block_count, largest, pairs, total_pairs) =
        tokio::task::spawn_blocking(move || {
            let index = build_blocks(&blocking_records);
            let mut pairs = CandidatePairStream::new(&index, chunk_size);
            let total_pairs = pairs.total_pairs();
            (
                index.len(),
                index.candidate_blocks().count(),
                index.largest_block(),
                pairs,
                total_pairs,
            )
        })
        .await
        .context("Blocking task panicked")?;
    logger.log_blocks(block_count, candidate_block_count, largest);
    logger.log_pair_generation(total_pairs, candidate_block_count);
    stats.blocks_total = block_count;
    stats.candidate_blocks = candidate_block_count;
    stats.candidate_pairs = total_pairs;
    tracker.update_progress(records.len(), records.len());
    stats.blocking_time = stage_start.elapsed().as_secs_f64();

    // Building edges
    session.check_cancelled(PipelineStage::BuildingEdges)?;
    let stage_start = Instant::now();
    tracker.set_stage(PipelineStage::BuildingEdges, total_pairs);
    let edges =
        build_session_edges(&session, &tracker, &records, pairs, total_pairs, &mut stats).await?;
    stats.edges_retained = edges.len();
    stats.edge_building_time = stage_start.elapsed().as_secs_f64();

    // Merging edges into households
    session.check_cancelled(PipelineStage::MergingEdges)?;
    let stage_start = Instant::now();
    tracker.set_stage(PipelineStage::MergingEdges, edges.len());
    let edge_count = edges.len();
    let clustering_records = Arc::clone(&records);
    let clustering_config = session.config.clone();
    let groups = tokio::task::spawn_blocking(move || {
        cluster_households(&clustering_records, &edges, &clustering_config)
    })
    .await
    .context("Clustering task panicked")?;
    tracker.update_progress(edge_count, edge_count);
    stats.clustering_time = stage_start.elapsed().as_secs_f64();

    // Annotating
    session.check_cancelled(PipelineStage::Annotating)?;
    let stage_start = Instant::now();
    tracker.set_stage(PipelineStage::Annotating, groups.len());
    let clusters = annotate_clusters(&records, &groups, &session.config);
    tracker.update_progress(clusters.len(), clusters.len());
    stats.clusters_created = clusters.len();
    stats.records_clustered = clusters.iter().map(|c| c.records.len()).sum();
    stats.annotation_time = stage_start.elapsed().as_secs_f64();

    stats.total_processing_time = run_start.elapsed().as_secs_f64();
    tracker.finish(
        clusters.len(),
        &format!("{} households from {} records", clusters.len(), records.len()),
    );
    log_pipeline_completion(&stats);
    debug!("💾 Memory usage after run: {} MB", get_memory_usage().await);
    info!("Session {} finished", session.session_id);

    Ok(DedupeOutcome { clusters, stats })
}
