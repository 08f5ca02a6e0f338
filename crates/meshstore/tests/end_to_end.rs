use std::io::Write;

use meshstore::{Store, StoreConfig};
use meshstore_ingest::IngestMode;

fn sample_universe(n: usize) -> Vec<u32> {
    (0..n as u32).map(|i| 100_000_001 + i).collect()
}

fn write_csv(path: &std::path::Path, rows: &[(u32, u16, u32, i32)]) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "{}", meshstore_csv::EXPECTED_HEADER).unwrap();
    for (date, time, area, value) in rows {
        writeln!(file, "{date},{time:04},{area},-1,-1,-1,{value}").unwrap();
    }
}

/// S1: single-file round-trip through streaming ingestion and façade reads.
#[test]
fn single_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.bin");
    let universe = sample_universe(4);

    let mut store = Store::create(
        &store_path,
        universe.clone(),
        "2016-01-01 00:00:00",
        0,
        StoreConfig::DEFAULT,
    )
    .unwrap();

    let csv_path = dir.path().join("shard.csv");
    write_csv(
        &csv_path,
        &[
            (20160101, 0, universe[0], 10),
            (20160101, 1, universe[1], 20),
            (20160101, 2, universe[2], 30),
        ],
    );

    let report = store
        .ingest(&[csv_path], IngestMode::Streaming, 2)
        .unwrap();
    assert_eq!(report.errors, 0);
    assert_eq!(report.rows_processed, 3);

    assert_eq!(store.read_point(0, universe[0]).unwrap(), 10);
    assert_eq!(store.read_point(1, universe[1]).unwrap(), 20);
    assert_eq!(store.read_point(2, universe[2]).unwrap(), 30);
    assert_eq!(
        store.read_point_at("2016-01-01 02:00:00", universe[2]).unwrap(),
        30
    );
}

/// S2: multiple shard files fan out across producers; ordering across
/// producers is unspecified but every record still lands exactly once.
#[test]
fn multi_producer_ingestion_lands_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.bin");
    let universe = sample_universe(6);

    let mut store = Store::create(
        &store_path,
        universe.clone(),
        "2016-01-01 00:00:00",
        0,
        StoreConfig::DEFAULT,
    )
    .unwrap();

    let mut files = Vec::new();
    for (i, &key) in universe.iter().enumerate() {
        let path = dir.path().join(format!("shard_{i}.csv"));
        write_csv(&path, &[(20160101, i as u16, key, (i * 10) as i32)]);
        files.push(path);
    }

    let report = store.ingest(&files, IngestMode::Streaming, 4).unwrap();
    assert_eq!(report.errors, 0);
    assert_eq!(report.rows_processed, universe.len() as u64);

    for (i, &key) in universe.iter().enumerate() {
        assert_eq!(store.read_point(i as u64, key).unwrap(), (i * 10) as i32);
    }
}

/// S3: a time-series range read matches the individually-written points.
#[test]
fn time_series_range_matches_points() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.bin");
    let universe = sample_universe(2);
    let mut store = Store::create(
        &store_path,
        universe.clone(),
        "2016-01-01 00:00:00",
        0,
        StoreConfig::DEFAULT,
    )
    .unwrap();
    store.extend_time(10).unwrap();
    for t in 0..10u64 {
        store.write_point(t, universe[0], t as i32 * 2).unwrap();
    }
    let series = store.read_range(universe[0], 0, 10).unwrap();
    assert_eq!(series, (0..10).map(|t| t * 2).collect::<Vec<i32>>());
}

/// S6: a bulk-year ingestion run populates every row of the target year.
#[test]
fn bulk_year_run_populates_full_year() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("store.bin");
    let universe = sample_universe(2);
    let mut store = Store::create(
        &store_path,
        universe.clone(),
        "2016-01-01 00:00:00",
        0,
        StoreConfig::DEFAULT,
    )
    .unwrap();

    let csv_path = dir.path().join("2016.csv");
    write_csv(
        &csv_path,
        &[
            (20160101, 0, universe[0], 1),
            (20161231, 2300, universe[1], 2),
        ],
    );

    let report = store
        .ingest(
            &[csv_path],
            IngestMode::BulkYear {
                year: 2016,
                start_time_idx: 0,
            },
            1,
        )
        .unwrap();
    assert_eq!(report.errors, 0);
    assert_eq!(report.rows_processed, 2);

    let (t, _) = store.get_dimensions();
    assert_eq!(t, 8784); // 2016 is a leap year
    assert_eq!(store.read_point(0, universe[0]).unwrap(), 1);
    assert_eq!(store.read_point(8783, universe[1]).unwrap(), 2);
}
