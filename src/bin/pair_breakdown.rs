use anyhow::Result;
use clap::Parser;
use dedupe_lib::matching::breakdown::full_pairwise_breakdown;
use dedupe_lib::matching::normalize::normalize_record;
use dedupe_lib::models::core::NormalizedRecord;
use dedupe_lib::utils::config::EngineConfig;
use dedupe_lib::utils::dataset::{load_mapping, load_records};
use dedupe_lib::utils::env::load_env;
use log::{debug, info};
use std::path::PathBuf;

/// Prints every pairwise score, with components, for a handful of rows.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct BreakdownArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    mapping: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Row positions to compare, e.g. --ids 3,17,42; all rows when omitted
    #[arg(long, value_delimiter = ',')]
    ids: Vec<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let args = BreakdownArgs::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides()?;
    let mapping = load_mapping(&args.mapping)?;
    let rows = load_records(&args.input)?;

    let records: Vec<NormalizedRecord> = rows
        .iter()
        .enumerate()
        .filter(|(id, _)| args.ids.is_empty() || args.ids.contains(id))
        .map(|(id, raw)| normalize_record(id, raw, &mapping))
        .collect();
    for r in &records {
        debug!("{} -> {} / {}", r.label(), r.woman_name, r.husband_name);
    }
    if records.len() > 200 {
        info!(
            "Scoring all {} pairs of {} records; pass --ids to narrow this down",
            records.len() * (records.len() - 1) / 2,
            records.len()
        );
    }

    let breakdown = full_pairwise_breakdown(&records, &config);
    println!("{}", serde_json::to_string_pretty(&breakdown)?);
    Ok(())
}
