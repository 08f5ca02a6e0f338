use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use meshstore::Store;
use meshstore_ingest::IngestMode;

#[derive(Parser)]
#[command(name = "meshstore-ingest", about = "Ingest CSV shards into a mesh population store")]
struct Cli {
    /// Store file path. Falls back to MESHSTORE_FILE_PATH (and `.env`).
    #[arg(long)]
    output: Option<PathBuf>,
    /// Directory containing CSV shards.
    #[arg(long)]
    directory: PathBuf,
    /// Filename glob (`*` only) selecting shards within `--directory`.
    #[arg(long, default_value = "*.csv")]
    pattern: String,
    /// Number of CSV-reader producer threads (clamped to [1, 32]).
    #[arg(long, default_value_t = 4)]
    producers: usize,
    /// Use bulk-year mode instead of streaming-cell mode.
    #[arg(long)]
    bulk_write: bool,
    /// Calendar year for `--bulk-write` (all records must belong to it).
    #[arg(long)]
    vds_year: Option<i32>,
    /// Hour-index of `{vds-year}-01-01 00:00:00` for `--bulk-write`.
    #[arg(long, default_value_t = 0)]
    vds_start: u64,
}

fn main() -> Result<()> {
    meshstore_cli::init();
    let cli = Cli::parse();
    let store_path = meshstore_cli::resolve_store_path(cli.output)?;
    let files = meshstore_cli::collect_shard_files(&cli.directory, &cli.pattern)?;
    if files.is_empty() {
        anyhow::bail!(
            "no files matching `{}` in {}",
            cli.pattern,
            cli.directory.display()
        );
    }

    let mode = if cli.bulk_write {
        let year = cli
            .vds_year
            .context("--bulk-write requires --vds-year")?;
        IngestMode::BulkYear {
            year,
            start_time_idx: cli.vds_start,
        }
    } else {
        IngestMode::Streaming
    };

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner} ingesting {len} shards... {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    progress.set_length(files.len() as u64);
    progress.enable_steady_tick(std::time::Duration::from_millis(120));

    let mut store = Store::open_readwrite(&store_path)?;
    let report = store.ingest(&files, mode, cli.producers)?;
    progress.finish_with_message("done");

    log::info!(
        "rows_processed={} unique_timestamps={} errors={}",
        report.rows_processed,
        report.unique_timestamps,
        report.errors
    );
    Ok(())
}
