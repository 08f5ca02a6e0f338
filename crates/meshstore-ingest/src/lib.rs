//! Parallel CSV-to-matrix ingestion pipeline (C7), built on the bounded work
//! queue (C4). Two modes: streaming-cell (default) and bulk-year.

mod bulk;
mod error;
mod queue;
mod report;
mod streaming;

pub use bulk::{hours_in_year, run_bulk_year};
pub use error::{IngestError, IngestResult};
pub use queue::{bounded_queue, dequeue_with_timeout, WorkItem, DEFAULT_CAPACITY};
pub use report::IngestReport;
pub use streaming::{run_streaming, MAX_PRODUCERS};

use std::path::PathBuf;

use meshstore_core::MatrixEngine;
use meshstore_mesh::MeshResolver;
use meshstore_time::Epoch;

/// Mode selection is the caller's choice; see spec §4.6 "Mode selection".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    Streaming,
    /// `year` and `start_time_idx` are supplied by the caller (derived from
    /// the shard's own file naming or metadata).
    BulkYear { year: i32, start_time_idx: u64 },
}

/// Runs one ingestion job in the requested mode. Bulk mode transparently
/// falls back to streaming if the dense buffer can't be allocated.
pub fn run(
    files: &[PathBuf],
    resolver: &MeshResolver,
    epoch: &Epoch,
    engine: &mut MatrixEngine,
    mode: IngestMode,
    producers: usize,
) -> IngestResult<IngestReport> {
    match mode {
        IngestMode::Streaming => {
            run_streaming(files, resolver, epoch, engine, producers, DEFAULT_CAPACITY)
        }
        IngestMode::BulkYear {
            year,
            start_time_idx,
        } => match run_bulk_year(files, resolver, engine, year, start_time_idx, producers) {
            Err(IngestError::AllocationFailed) => {
                log::warn!("bulk-year buffer allocation failed, falling back to streaming mode");
                run_streaming(files, resolver, epoch, engine, producers, DEFAULT_CAPACITY)
            }
            other => other,
        },
    }
}
