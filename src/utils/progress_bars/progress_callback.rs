// src/utils/progress_bars/progress_callback.rs - Progress callback and cancellation plumbing

use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::models::stats_models::{PipelineStage, ProgressUpdate};

/// Type alias for progress callback functions.
/// Invoked synchronously from the session task; implementations must not block.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Cooperative cancellation signal shared between a caller and a running session.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Helper function to create a progress callback that only logs
pub fn create_logging_callback(session_name: &str) -> ProgressCallback {
    let session_name = session_name.to_string();
    Arc::new(move |update: ProgressUpdate| {
        let detail_str = update
            .message
            .as_deref()
            .map(|d| format!(" - {}", d))
            .unwrap_or_default();
        debug!(
            "[{}] Progress: {} {:.1}% ({}/{}){}",
            session_name,
            update.status,
            update.percent_complete,
            update.items_completed,
            update.items_total,
            detail_str
        );
    })
}

/// Progress tracking helper for the pipeline stages
pub struct ProgressTracker {
    callback: Option<ProgressCallback>,
    current_stage: PipelineStage,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            current_stage: PipelineStage::Receiving,
            start_time: Instant::now(),
        }
    }

    pub fn current_stage(&self) -> PipelineStage {
        self.current_stage
    }

    /// Enters a stage and reports it with zero items completed.
    pub fn set_stage(&mut self, stage: PipelineStage, total: usize) {
        self.current_stage = stage;
        self.emit(ProgressUpdate::new(stage, 0, total));
    }

    pub fn update_progress(&self, current: usize, total: usize) {
        self.emit(ProgressUpdate::new(self.current_stage, current, total));
    }

    pub fn update_progress_with_info(&self, current: usize, total: usize, info: &str) {
        self.emit(ProgressUpdate::new(self.current_stage, current, total).with_message(info));
    }

    pub fn finish(&mut self, total: usize, summary: &str) {
        self.current_stage = PipelineStage::Done;
        let details = format!(
            "{} in {:.2}s",
            summary,
            self.start_time.elapsed().as_secs_f64()
        );
        self.emit(ProgressUpdate::new(PipelineStage::Done, total, total).with_message(details));
    }

    fn emit(&self, update: ProgressUpdate) {
        if let Some(ref cb) = self.callback {
            cb(update);
        }
    }
}
