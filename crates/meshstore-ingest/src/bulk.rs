//! Bulk-year ingestion mode: producers bypass the work queue entirely and
//! write directly into a single pre-allocated dense buffer for one calendar
//! year. The consumer is idle until every producer has joined, then issues
//! one bulk write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use parking_lot::Mutex;

use meshstore_core::MatrixEngine;
use meshstore_csv::{CsvReader, NextItem};
use meshstore_mesh::MeshResolver;

use crate::error::{IngestError, IngestResult};
use crate::report::IngestReport;
use crate::streaming::{partition_files, MAX_PRODUCERS};

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Rows in a calendar year's buffer: 8784 for a leap year, 8760 otherwise.
pub fn hours_in_year(year: i32) -> u64 {
    if is_leap_year(year) {
        8784
    } else {
        8760
    }
}

fn day_of_year0(year: i32, date_yyyymmdd: u32) -> Option<u32> {
    let month = date_yyyymmdd / 100 % 100;
    let day = date_yyyymmdd % 100;
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.ordinal0())
}

/// A raw pointer into the shared bulk buffer, handed to every producer
/// thread. Two producers writing the same `(row, mesh)` cell is a race in
/// the ingestion job, not in the buffer itself -- the same caveat the
/// streaming mode's `I2` carries, and the reason this mode has no per-cell
/// locking.
struct SharedBuffer {
    ptr: *mut i32,
    len: usize,
}

unsafe impl Send for SharedBuffer {}
unsafe impl Sync for SharedBuffer {}

impl SharedBuffer {
    /// Safety: `index` must be `< self.len`, and no other write to the same
    /// index may race this one without the caller accepting the resulting
    /// undefined order (see the struct's documentation).
    unsafe fn write(&self, index: usize, value: i32) {
        debug_assert!(index < self.len);
        *self.ptr.add(index) = value;
    }
}

/// Tries to reserve the dense `hours * n` buffer without aborting the
/// process on failure, so the caller can fall back to streaming mode.
fn try_allocate_buffer(cells: usize) -> IngestResult<Vec<i32>> {
    let mut buffer: Vec<i32> = Vec::new();
    buffer
        .try_reserve_exact(cells)
        .map_err(|_| IngestError::AllocationFailed)?;
    buffer.resize(cells, 0);
    Ok(buffer)
}

/// Runs one bulk-year ingestion pass. `start_time_idx` is the hour-index of
/// `{year}-01-01 00:00:00` under the store's epoch; every record is expected
/// to fall within `year`, and one that doesn't is counted as an error and
/// dropped rather than failing the run.
pub fn run_bulk_year(
    files: &[PathBuf],
    resolver: &MeshResolver,
    engine: &mut MatrixEngine,
    year: i32,
    start_time_idx: u64,
    producers: usize,
) -> IngestResult<IngestReport> {
    if files.is_empty() {
        return Err(IngestError::NoInputFiles);
    }
    let producers = producers.clamp(1, MAX_PRODUCERS);
    let (_, n) = engine.get_dimensions();
    let rows = hours_in_year(year);
    let cells = rows as usize * n as usize;

    let mut buffer = try_allocate_buffer(cells)?;
    let shared = SharedBuffer {
        ptr: buffer.as_mut_ptr(),
        len: buffer.len(),
    };

    let errors = Arc::new(Mutex::new(0u64));
    let processed = Arc::new(Mutex::new(0u64));
    let written_rows: Arc<Mutex<std::collections::HashSet<u64>>> =
        Arc::new(Mutex::new(std::collections::HashSet::new()));
    let buckets = partition_files(files, producers);

    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(producers);
        for bucket in buckets {
            let errors = Arc::clone(&errors);
            let processed = Arc::clone(&processed);
            let written_rows = Arc::clone(&written_rows);
            let shared = &shared;
            handles.push(scope.spawn(move || {
                for path in &bucket {
                    run_one_file(path, resolver, n, year, shared, &errors, &processed, &written_rows);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("csv producer thread panicked");
        }
    });

    engine.extend_time(start_time_idx + rows)?;
    engine.write_bulk(start_time_idx, rows, &buffer)?;
    engine.flush()?;

    Ok(IngestReport {
        rows_processed: *processed.lock(),
        unique_timestamps: written_rows.lock().len() as u64,
        errors: *errors.lock(),
    })
}

fn run_one_file(
    path: &Path,
    resolver: &MeshResolver,
    n: u32,
    year: i32,
    shared: &SharedBuffer,
    errors: &Mutex<u64>,
    processed: &Mutex<u64>,
    written_rows: &Mutex<std::collections::HashSet<u64>>,
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
                let record_year = (record.date / 10_000) as i32;
                if record_year != year {
                    *errors.lock() += 1;
                    continue;
                }
                let Some(mesh) = resolver.resolve(record.area) else {
                    *errors.lock() += 1;
                    continue;
                };
                let Some(day) = day_of_year0(year, record.date) else {
                    *errors.lock() += 1;
                    continue;
                };
                let hour = (record.time / 100) as u32;
                let row = day * 24 + hour;
                let index = row as usize * n as usize + mesh as usize;
                if index >= shared.len {
                    *errors.lock() += 1;
                    continue;
                }
                // Safety: bounds were just checked above.
                unsafe { shared.write(index, record.population) };
                written_rows.lock().insert(row as u64);
                *processed.lock() += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstore_core::ChunkGeometry;
    use std::io::Write;

    fn write_csv(path: &Path, rows: &[(u32, u16, u32, i32)]) {
        let mut file = std::fs::File::create(path).unwrap();
        writeln!(file, "{}", meshstore_csv::EXPECTED_HEADER).unwrap();
        for (date, time, area, value) in rows {
            writeln!(file, "{date},{time:04},{area},-1,-1,-1,{value}").unwrap();
        }
    }

    #[test]
    fn leap_and_non_leap_row_counts() {
        assert_eq!(hours_in_year(2016), 8784);
        assert_eq!(hours_in_year(2017), 8760);
    }

    #[test]
    fn bulk_run_populates_expected_cells() {
        let dir = tempfile::tempdir().unwrap();
        let universe = vec![100_000_001u32, 100_000_002];
        let (resolver, cmph_blob) = MeshResolver::build(universe).unwrap();

        let file = dir.path().join("2016.csv");
        write_csv(
            &file,
            &[(20160101, 0, 100_000_001, 111), (20160102, 300, 100_000_002, 222)],
        );

        let store_path = dir.path().join("store.bin");
        let mut engine = MatrixEngine::create(
            &store_path,
            2,
            ChunkGeometry {
                chunk_t: 24,
                chunk_m: 2,
            },
            "2016-01-01 00:00:00".to_string(),
            0,
            resolver.universe().to_vec(),
            cmph_blob,
        )
        .unwrap();

        let report = run_bulk_year(&[file], &resolver, &mut engine, 2016, 0, 2).unwrap();
        assert_eq!(report.errors, 0);
        let mesh_a = resolver.resolve(100_000_001).unwrap();
        let mesh_b = resolver.resolve(100_000_002).unwrap();
        assert_eq!(engine.read_cell(0, mesh_a).unwrap(), 111);
        // 2016-01-02 03:00 is day-of-year 1 (0-indexed) * 24 + hour 3 = 27.
        assert_eq!(engine.read_cell(27, mesh_b).unwrap(), 222);
    }

    #[test]
    fn mismatched_year_is_dropped_as_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let universe = vec![100_000_001u32];
        let (resolver, cmph_blob) = MeshResolver::build(universe).unwrap();
        let file = dir.path().join("mixed.csv");
        write_csv(&file, &[(20170101, 0, 100_000_001, 1)]);

        let store_path = dir.path().join("store.bin");
        let mut engine = MatrixEngine::create(
            &store_path,
            1,
            ChunkGeometry {
                chunk_t: 24,
                chunk_m: 1,
            },
            "2016-01-01 00:00:00".to_string(),
            0,
            resolver.universe().to_vec(),
            cmph_blob,
        )
        .unwrap();

        let report = run_bulk_year(&[file], &resolver, &mut engine, 2016, 0, 1).unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(report.rows_processed, 0);
    }
}
