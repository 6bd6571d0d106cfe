use anyhow::{Context, Result};
use clap::Parser;
use dedupe_lib::matching::manager::{run_dedupe_pipeline, DedupeSession, DEFAULT_CHECKPOINT_KEY};
use dedupe_lib::models::stats_models::ProgressUpdate;
use dedupe_lib::utils::config::EngineConfig;
use dedupe_lib::utils::dataset::{load_mapping, load_records};
use dedupe_lib::utils::env::load_env;
use dedupe_lib::utils::get_memory_usage;
use dedupe_lib::utils::pipeline_state::JsonFileCheckpointStore;
use dedupe_lib::utils::progress_bars::progress_callback::{
    create_logging_callback, ProgressCallback,
};
use dedupe_lib::utils::progress_bars::progress_config::ProgressConfig;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Groups beneficiary rows into households of at most four", long_about = None)]
struct DedupeArgs {
    /// JSON array of source rows
    #[arg(long)]
    input: PathBuf,

    /// JSON object mapping household fields to source columns
    #[arg(long)]
    mapping: PathBuf,

    /// Engine configuration; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the clusters; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory for edge-building checkpoints
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CHECKPOINT_KEY)]
    checkpoint_key: String,

    #[arg(long)]
    workers: Option<usize>,
}

fn progress_bar_callback(pb: ProgressBar, detailed: bool) -> ProgressCallback {
    Arc::new(move |update: ProgressUpdate| {
        pb.set_length(update.items_total as u64);
        pb.set_position(update.items_completed as u64);
        match &update.message {
            Some(msg) if detailed => pb.set_message(format!("{}: {}", update.status, msg)),
            _ => pb.set_message(update.status.to_string()),
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting household deduplication");
    load_env();
    let args = DedupeArgs::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid configuration override in environment")?;
    config.log_config();

    let mapping = load_mapping(&args.mapping)?;
    let records = load_records(&args.input)?;

    let progress_config = ProgressConfig::from_env();
    let multi_progress = progress_config.create_multi_progress();
    let main_pb = match &multi_progress {
        Some(mp) => {
            let pb = mp.add(ProgressBar::new(records.len() as u64));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                    )?
                    .progress_chars("█▉▊▋▌▍▎▏  "),
            );
            pb.set_message("Initializing...");
            pb.enable_steady_tick(Duration::from_millis(progress_config.refresh_rate_ms.max(1)));
            Some(pb)
        }
        None => None,
    };

    let mut session = DedupeSession::new(records, mapping, config)
        .with_report_every_pairs(progress_config.report_every_pairs);
    session = match &main_pb {
        Some(pb) => session.with_progress(progress_bar_callback(
            pb.clone(),
            progress_config.should_show_detailed(),
        )),
        None => session.with_progress(create_logging_callback("dedupe")),
    };
    if let Some(dir) = &args.checkpoint_dir {
        let store = JsonFileCheckpointStore::new(dir)?;
        session = session.with_checkpoint_store(Arc::new(store), args.checkpoint_key.clone());
    }
    if let Some(workers) = args.workers {
        session = session.with_workers(workers);
    }

    let cancel = session.cancellation_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            cancel.cancel();
        }
    });

    let outcome = run_dedupe_pipeline(session).await;
    if let Some(pb) = &main_pb {
        match &outcome {
            Ok(o) => pb.finish_with_message(format!("{} households", o.clusters.len())),
            Err(_) => pb.abandon_with_message("Stopped"),
        }
    }
    let outcome = outcome?;

    let body = serde_json::to_string_pretty(&serde_json::json!({
        "stats": outcome.stats,
        "clusters": outcome.clusters,
    }))?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("Failed to write clusters to {}", path.display()))?;
            info!("Wrote {} clusters to {}", outcome.clusters.len(), path.display());
        }
        None => println!("{}", body),
    }

    if progress_config.should_show_memory() {
        info!("Memory usage at exit: {} MB", get_memory_usage().await);
    }
    Ok(())
}
