//! Store façade (C9): the single entry point applications use to open,
//! create, query, and ingest into a mesh population store.

mod config;
mod error;

pub use config::StoreConfig;
pub use error::{FacadeError, FacadeResult};

use std::path::{Path, PathBuf};

use meshstore_core::MatrixEngine;
use meshstore_ingest::{IngestMode, IngestReport};
use meshstore_mesh::MeshResolver;
use meshstore_time::Epoch;

pub struct Store {
    engine: MatrixEngine,
    resolver: MeshResolver,
    epoch: Epoch,
}

impl Store {
    /// Creates a brand new store over the given mesh universe.
    pub fn create(
        path: impl AsRef<Path>,
        universe: Vec<u32>,
        epoch_str: &str,
        utc_offset_minutes: i32,
        config: StoreConfig,
    ) -> FacadeResult<Self> {
        let n = universe.len() as u32;
        let (resolver, cmph_blob) = MeshResolver::build(universe)?;
        let epoch = Epoch::parse(epoch_str, utc_offset_minutes)?;
        let mut engine = MatrixEngine::create(
            path,
            n,
            config.geometry,
            epoch.epoch_string(),
            utc_offset_minutes,
            resolver.universe().to_vec(),
            cmph_blob,
        )?;
        engine.set_cache_budget(config.cache_budget_bytes);
        Ok(Self {
            engine,
            resolver,
            epoch,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> FacadeResult<Self> {
        Self::open_impl(path, true)
    }

    pub fn open_readwrite(path: impl AsRef<Path>) -> FacadeResult<Self> {
        Self::open_impl(path, false)
    }

    fn open_impl(path: impl AsRef<Path>, read_only: bool) -> FacadeResult<Self> {
        let engine = if read_only {
            MatrixEngine::open_readonly(path)?
        } else {
            MatrixEngine::open_readwrite(path)?
        };
        let resolver = MeshResolver::open(engine.meshid_list().to_vec(), engine.cmph_blob())?;
        let epoch = Epoch::parse(engine.epoch(), engine.utc_offset_minutes())?;
        Ok(Self {
            engine,
            resolver,
            epoch,
        })
    }

    /// Flushes and drops the handle. Equivalent to letting `Store` go out of
    /// scope, spelled out for callers that want the error surfaced.
    pub fn close(mut self) -> FacadeResult<()> {
        self.engine.flush()?;
        Ok(())
    }

    pub fn flush(&mut self) -> FacadeResult<()> {
        Ok(self.engine.flush()?)
    }

    pub fn set_cache_budget(&mut self, budget_bytes: u64) {
        self.engine.set_cache_budget(budget_bytes);
    }

    pub fn get_dimensions(&self) -> (u64, u32) {
        self.engine.get_dimensions()
    }

    fn resolve(&self, mesh_key: u32) -> FacadeResult<u32> {
        let index = self
            .resolver
            .resolve(mesh_key)
            .ok_or(FacadeError::MeshNotFound { key: mesh_key })?;
        let (_, n) = self.engine.get_dimensions();
        if index >= n {
            return Err(FacadeError::IndexOutOfBounds { index, n });
        }
        Ok(index)
    }

    fn resolve_all(&self, mesh_keys: &[u32]) -> FacadeResult<Vec<u32>> {
        mesh_keys.iter().map(|&k| self.resolve(k)).collect()
    }

    // -- point reads/writes --------------------------------------------

    pub fn read_point(&mut self, t: u64, mesh_key: u32) -> FacadeResult<i32> {
        let index = self.resolve(mesh_key)?;
        Ok(self.engine.read_cell(t, index)?)
    }

    pub fn read_point_at(&mut self, datetime: &str, mesh_key: u32) -> FacadeResult<i32> {
        let t = self.epoch.to_index(datetime)? as u64;
        self.read_point(t, mesh_key)
    }

    pub fn write_point(&mut self, t: u64, mesh_key: u32, value: i32) -> FacadeResult<()> {
        let index = self.resolve(mesh_key)?;
        Ok(self.engine.write_cell(t, index, value)?)
    }

    pub fn write_point_at(&mut self, datetime: &str, mesh_key: u32, value: i32) -> FacadeResult<()> {
        let t = self.epoch.to_index(datetime)? as u64;
        self.write_point(t, mesh_key, value)
    }

    // -- multi (vector) reads/writes -------------------------------------

    pub fn read_multi(&mut self, t: u64, mesh_keys: &[u32]) -> FacadeResult<Vec<i32>> {
        let indices = self.resolve_all(mesh_keys)?;
        Ok(self.engine.read_row_selection(t, &indices)?)
    }

    pub fn read_multi_at(&mut self, datetime: &str, mesh_keys: &[u32]) -> FacadeResult<Vec<i32>> {
        let t = self.epoch.to_index(datetime)? as u64;
        self.read_multi(t, mesh_keys)
    }

    pub fn write_multi(&mut self, t: u64, mesh_keys: &[u32], values: &[i32]) -> FacadeResult<()> {
        let indices = self.resolve_all(mesh_keys)?;
        Ok(self.engine.write_row_selection(t, &indices, values)?)
    }

    pub fn write_multi_at(
        &mut self,
        datetime: &str,
        mesh_keys: &[u32],
        values: &[i32],
    ) -> FacadeResult<()> {
        let t = self.epoch.to_index(datetime)? as u64;
        self.write_multi(t, mesh_keys, values)
    }

    // -- range (series) reads --------------------------------------------

    pub fn read_range(&mut self, mesh_key: u32, t_start: u64, t_end: u64) -> FacadeResult<Vec<i32>> {
        let index = self.resolve(mesh_key)?;
        Ok(self.engine.read_column_range(index, t_start, t_end)?)
    }

    pub fn read_range_at(
        &mut self,
        mesh_key: u32,
        datetime_start: &str,
        datetime_end: &str,
    ) -> FacadeResult<Vec<i32>> {
        let t_start = self.epoch.to_index(datetime_start)? as u64;
        let t_end = self.epoch.to_index(datetime_end)? as u64;
        self.read_range(mesh_key, t_start, t_end)
    }

    // -- lifecycle --------------------------------------------------------

    pub fn extend_time(&mut self, new_t: u64) -> FacadeResult<()> {
        Ok(self.engine.extend_time(new_t)?)
    }

    /// Ingests `files` in the requested mode. `producers` is clamped to the
    /// pipeline's own `[1, 32]` range.
    pub fn ingest(
        &mut self,
        files: &[PathBuf],
        mode: IngestMode,
        producers: usize,
    ) -> FacadeResult<IngestReport> {
        Ok(meshstore_ingest::run(
            files,
            &self.resolver,
            &self.epoch,
            &mut self.engine,
            mode,
            producers,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_universe(n: usize) -> Vec<u32> {
        (0..n as u32).map(|i| 100_000_001 + i).collect()
    }

    #[test]
    fn create_open_round_trips_point_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let universe = sample_universe(8);

        {
            let mut store = Store::create(
                &path,
                universe.clone(),
                "2016-01-01 00:00:00",
                0,
                StoreConfig::DEFAULT,
            )
            .unwrap();
            store.extend_time(4).unwrap();
            store.write_point(2, universe[3], 999).unwrap();
            store.flush().unwrap();
        }

        let mut reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.read_point(2, universe[3]).unwrap(), 999);
        assert_eq!(reopened.get_dimensions(), (4, 8));
    }

    #[test]
    fn unknown_mesh_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let universe = sample_universe(4);
        let mut store = Store::create(
            &path,
            universe,
            "2016-01-01 00:00:00",
            0,
            StoreConfig::DEFAULT,
        )
        .unwrap();
        store.extend_time(1).unwrap();
        assert!(matches!(
            store.read_point(0, 999_999_999),
            Err(FacadeError::MeshNotFound { .. })
        ));
    }

    #[test]
    fn datetime_flavor_matches_index_flavor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.bin");
        let universe = sample_universe(4);
        let mut store = Store::create(
            &path,
            universe.clone(),
            "2016-01-01 00:00:00",
            0,
            StoreConfig::DEFAULT,
        )
        .unwrap();
        store.extend_time(5).unwrap();
        store.write_point_at("2016-01-01 02:00:00", universe[0], 42).unwrap();
        assert_eq!(store.read_point(2, universe[0]).unwrap(), 42);
        assert_eq!(
            store.read_point_at("2016-01-01 02:00:00", universe[0]).unwrap(),
            42
        );
    }
}
