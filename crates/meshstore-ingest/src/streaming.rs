//! Streaming-cell ingestion mode (default): producers resolve and
//! timestamp every record themselves and enqueue one work item per cell;
//! the consumer grows the time axis on demand and writes cells one at a
//! time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use meshstore_core::MatrixEngine;
use meshstore_csv::{CsvReader, NextItem};
use meshstore_mesh::MeshResolver;
use meshstore_time::Epoch;

use crate::error::{IngestError, IngestResult};
use crate::queue::{bounded_queue, WorkItem};
use crate::report::IngestReport;

/// Maximum number of CSV-reader producer threads (spec convention).
pub const MAX_PRODUCERS: usize = 32;

pub(crate) fn partition_files(files: &[PathBuf], producers: usize) -> Vec<Vec<PathBuf>> {
    let mut buckets = vec![Vec::new(); producers];
    for (i, f) in files.iter().enumerate() {
        buckets[i % producers].push(f.clone());
    }
    buckets
}

/// Returns `max(ceil(t_current * 3/2), t + 100)`, the growth rule the
/// consumer applies whenever an incoming cell's timestamp reaches the
/// current extent.
fn grown_extent(t_current: u64, t: u64) -> u64 {
    let amortized = ((t_current as f64 * 1.5).ceil()) as u64;
    amortized.max(t + 100)
}

pub fn run_streaming(
    files: &[PathBuf],
    resolver: &MeshResolver,
    epoch: &Epoch,
    engine: &mut MatrixEngine,
    producers: usize,
    capacity: usize,
) -> IngestResult<IngestReport> {
    if files.is_empty() {
        return Err(IngestError::NoInputFiles);
    }
    let producers = producers.clamp(1, MAX_PRODUCERS);
    let (tx, rx) = bounded_queue(capacity);
    let errors = Arc::new(Mutex::new(0u64));
    let timestamps: Arc<Mutex<HashSet<u64>>> = Arc::new(Mutex::new(HashSet::new()));
    let buckets = partition_files(files, producers);

    let rows_processed = std::thread::scope(|scope| -> IngestResult<u64> {
        let mut producer_handles = Vec::with_capacity(producers);
        for bucket in buckets {
            let tx = tx.clone();
            let errors = Arc::clone(&errors);
            let timestamps = Arc::clone(&timestamps);
            producer_handles.push(scope.spawn(move || {
                run_producer(&bucket, resolver, epoch, &tx, &errors, &timestamps);
            }));
        }

        let consumer_handle = scope.spawn(move || -> IngestResult<u64> {
            let mut rows_processed = 0u64;
            loop {
                match rx.recv() {
                    Ok(WorkItem::Shutdown) | Err(_) => break,
                    Ok(WorkItem::Cell { t, mesh, value }) => {
                        let (t_current, _) = engine.get_dimensions();
                        if t >= t_current {
                            engine.extend_time(grown_extent(t_current, t))?;
                        }
                        engine.write_cell(t, mesh, value)?;
                        rows_processed += 1;
                    }
                }
            }
            engine.flush()?;
            Ok(rows_processed)
        });

        for handle in producer_handles {
            handle.join().expect("csv producer thread panicked");
        }
        // All producers have joined: signal the consumer to stop.
        let _ = tx.send(WorkItem::Shutdown);

        consumer_handle.join().expect("consumer thread panicked")
    })?;

    Ok(IngestReport {
        rows_processed,
        unique_timestamps: timestamps.lock().len() as u64,
        errors: *errors.lock(),
    })
}

fn run_producer(
    files: &[PathBuf],
    resolver: &MeshResolver,
    epoch: &Epoch,
    tx: &crossbeam::channel::Sender<WorkItem>,
    errors: &Mutex<u64>,
    timestamps: &Mutex<HashSet<u64>>,
) {
    for path in files {
        run_one_file(path, resolver, epoch, tx, errors, timestamps);
    }
}

fn run_one_file(
    path: &Path,
    resolver: &MeshResolver,
    epoch: &Epoch,
    tx: &crossbeam::channel::Sender<WorkItem>,
    errors: &Mutex<u64>,
    timestamps: &Mutex<HashSet<u64>>,
) {
    let mut reader = match CsvReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            log::warn!("skipping {}: {e}", path.display());
            return;
        }
    };
    loop {
        match reader.next() {
            Ok(NextItem::End) => break,
            Err(_) => {
                *errors.lock() += 1;
            }
            Ok(NextItem::Record(record)) => {
                let Some(mesh) = resolver.resolve(record.area) else {
                    *errors.lock() += 1;
                    continue;
                };
                let hour = match epoch.to_index_ymdhm(record.date, record.time) {
                    Ok(h) if h >= 0 => h as u64,
                    _ => {
                        *errors.lock() += 1;
                        continue;
                    }
                };
                timestamps.lock().insert(hour);
                if tx
                    .send(WorkItem::Cell {
                        t: hour,
                        mesh,
                        value: record.population,
                    })
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstore_core::ChunkGeometry;
    use meshstore_mesh::MeshResolver;
    use std::io::Write;

    fn write_csv(path: &Path, rows: &[(u32, u16, u32, i32)]) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "{}", meshstore_csv::EXPECTED_HEADER).unwrap();
        for (date, time, area, value) in rows {
            writeln!(file, "{date},{time:04},{area},-1,-1,-1,{value}").unwrap();
        }
    }

    #[test]
    fn ingests_records_across_two_producers() {
        let dir = tempfile::tempdir().unwrap();
        let universe = vec![100_000_001u32, 100_000_002, 100_000_003];
        let (resolver, cmph_blob) = MeshResolver::build(universe).unwrap();

        let file_a = dir.path().join("a.csv");
        let file_b = dir.path().join("b.csv");
        write_csv(&file_a, &[(20160101, 0, 100_000_001, 10), (20160101, 1, 100_000_002, 20)]);
        write_csv(&file_b, &[(20160101, 2, 100_000_003, 30)]);

        let epoch = meshstore_time::Epoch::parse("2016-01-01 00:00:00", 0).unwrap();
        let store_path = dir.path().join("store.bin");
        let mut engine = MatrixEngine::create(
            &store_path,
            3,
            ChunkGeometry {
                chunk_t: 8,
                chunk_m: 4,
            },
            epoch.epoch_string(),
            0,
            resolver.universe().to_vec(),
            cmph_blob,
        )
        .unwrap();

        let report = run_streaming(
            &[file_a, file_b],
            &resolver,
            &epoch,
            &mut engine,
            2,
            16,
        )
        .unwrap();

        assert_eq!(report.rows_processed, 3);
        assert_eq!(report.errors, 0);
        assert_eq!(report.unique_timestamps, 3);
        let mesh_a = resolver.resolve(100_000_001).unwrap();
        let mesh_b = resolver.resolve(100_000_002).unwrap();
        let mesh_c = resolver.resolve(100_000_003).unwrap();
        assert_eq!(engine.read_cell(0, mesh_a).unwrap(), 10);
        assert_eq!(engine.read_cell(1, mesh_b).unwrap(), 20);
        assert_eq!(engine.read_cell(2, mesh_c).unwrap(), 30);
    }
}
