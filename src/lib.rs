pub mod clustering;
pub mod matching;
pub mod models;
pub mod utils;

pub use clustering::household_clustering::{cluster_households, split_cluster};
pub use matching::breakdown::full_pairwise_breakdown;
pub use matching::manager::{run_dedupe_pipeline, DedupeOutcome, DedupeSession, PipelineError};
pub use models::core::{FieldMapping, NormalizedRecord, RawRecord};
pub use models::stats_models::Cluster;
pub use utils::config::{ConfigError, EngineConfig};
