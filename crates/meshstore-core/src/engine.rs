//! The chunked-matrix engine (C5): owns one store file, the chunk cache, and
//! dispatches reads/writes through the selection planner (C6).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{chunk_key, DirtyMap, ReadCache};
use crate::error::{StoreError, StoreResult};
use crate::file_format::{self, Header};
use crate::geometry::ChunkGeometry;
use crate::planner::{plan_selection, SelectionPlan};

/// Default cache budget: enough for a handful of chunks, not a real tuning
/// target -- callers resize via [`MatrixEngine::set_cache_budget`].
const DEFAULT_CACHE_BUDGET_BYTES: u64 = 64 * 1024 * 1024;

pub struct MatrixEngine {
    path: PathBuf,
    file: File,
    header: Header,
    geometry: ChunkGeometry,
    meshid_list: Vec<u32>,
    cmph_blob: Vec<u8>,
    data_start: u64,
    read_only: bool,
    read_cache: ReadCache,
    dirty: DirtyMap,
    /// Whole-file read-only mmap, used instead of seek+read for point
    /// queries against stores opened read-only. `None` for writable stores,
    /// where the dirty map and in-place writes make a stale mapping risky.
    mmap: Option<memmap2::Mmap>,
}

impl MatrixEngine {
    /// Creates a brand new, empty (T=0) store file at `path`.
    pub fn create(
        path: impl AsRef<Path>,
        n: u32,
        geometry: ChunkGeometry,
        epoch: String,
        utc_offset_minutes: i32,
        meshid_list: Vec<u32>,
        cmph_blob: Vec<u8>,
    ) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let header = Header {
            n,
            chunk_t: geometry.chunk_t,
            chunk_m: geometry.chunk_m,
            t: 0,
            utc_offset_minutes,
            epoch,
        };
        let data_start = file_format::write_new(&mut file, &header, &meshid_list, &cmph_blob)?;

        Ok(Self {
            path,
            file,
            header,
            geometry,
            meshid_list,
            cmph_blob,
            data_start,
            read_only: false,
            read_cache: ReadCache::new(DEFAULT_CACHE_BUDGET_BYTES, geometry.chunk_bytes()),
            dirty: DirtyMap::new(),
            mmap: None,
        })
    }

    pub fn open_readonly(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(path, true)
    }

    pub fn open_readwrite(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open(path, false)
    }

    fn open(path: impl AsRef<Path>, read_only: bool) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::options().read(true).write(!read_only).open(&path)?;
        let (header, meshid_list, cmph_blob, data_start) = file_format::read(&mut file)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => StoreError::MalformedFile,
                _ => StoreError::Io(e),
            })?;
        let geometry = ChunkGeometry {
            chunk_t: header.chunk_t,
            chunk_m: header.chunk_m,
        };
        // Safety: the mmap is only ever read, and only for stores opened
        // read-only, so there is no writer that could invalidate it for the
        // lifetime of this handle.
        let mmap = if read_only {
            unsafe { memmap2::Mmap::map(&file).ok() }
        } else {
            None
        };
        Ok(Self {
            path,
            file,
            header,
            geometry,
            meshid_list,
            cmph_blob,
            data_start,
            read_only,
            read_cache: ReadCache::new(DEFAULT_CACHE_BUDGET_BYTES, geometry.chunk_bytes()),
            dirty: DirtyMap::new(),
            mmap,
        })
    }

    pub fn set_cache_budget(&mut self, budget_bytes: u64) {
        self.read_cache = ReadCache::new(budget_bytes, self.geometry.chunk_bytes());
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_dimensions(&self) -> (u64, u32) {
        (self.header.t, self.header.n)
    }

    pub fn geometry(&self) -> ChunkGeometry {
        self.geometry
    }

    pub fn epoch(&self) -> &str {
        &self.header.epoch
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.header.utc_offset_minutes
    }

    pub fn meshid_list(&self) -> &[u32] {
        &self.meshid_list
    }

    pub fn cmph_blob(&self) -> &[u8] {
        &self.cmph_blob
    }

    fn chunk_offset(&self, tc: u64, mc: u32) -> u64 {
        self.data_start
            + tc * self.geometry.chunk_row_bytes(self.header.n)
            + mc as u64 * self.geometry.chunk_bytes()
    }

    fn check_bounds(&self, t: u64, mesh: u32) -> StoreResult<()> {
        if t >= self.header.t {
            return Err(StoreError::RowOutOfBounds {
                index: t,
                t: self.header.t,
            });
        }
        if mesh >= self.header.n {
            return Err(StoreError::MeshOutOfBounds {
                index: mesh,
                n: self.header.n,
            });
        }
        Ok(())
    }

    fn read_chunk(&mut self, tc: u64, mc: u32) -> StoreResult<Arc<[u8]>> {
        let key = chunk_key(tc, mc);
        if let Some(bytes) = self.dirty.get(key) {
            return Ok(Arc::from(bytes.clone().into_boxed_slice()));
        }
        if let Some(bytes) = self.read_cache.get(key) {
            return Ok(bytes);
        }
        let offset = self.chunk_offset(tc, mc) as usize;
        let len = self.geometry.chunk_bytes() as usize;
        let buf = if let Some(mmap) = &self.mmap {
            mmap[offset..offset + len].to_vec()
        } else {
            let mut buf = vec![0u8; len];
            self.file.seek(SeekFrom::Start(offset as u64))?;
            self.file.read_exact(&mut buf)?;
            buf
        };
        let bytes: Arc<[u8]> = Arc::from(buf.into_boxed_slice());
        self.read_cache.put(key, bytes.clone());
        Ok(bytes)
    }

    fn dirty_chunk_mut(&mut self, tc: u64, mc: u32) -> StoreResult<&mut Vec<u8>> {
        let key = chunk_key(tc, mc);
        if self.dirty.get(key).is_none() {
            let bytes = if let Some(cached) = self.read_cache.get(key) {
                cached.to_vec()
            } else {
                let mut buf = vec![0u8; self.geometry.chunk_bytes() as usize];
                self.file.seek(SeekFrom::Start(self.chunk_offset(tc, mc)))?;
                self.file.read_exact(&mut buf)?;
                buf
            };
            self.dirty.get_mut_or_insert_with(key, || bytes);
        }
        Ok(self.dirty.get_mut_or_insert_with(key, Vec::new))
    }

    fn cell_offset_in_chunk(&self, t_local: u64, m_local: u32) -> usize {
        (t_local * self.geometry.chunk_m as u64 * 4 + m_local as u64 * 4) as usize
    }

    pub fn read_cell(&mut self, t: u64, mesh: u32) -> StoreResult<i32> {
        self.check_bounds(t, mesh)?;
        let tc = self.geometry.time_chunk(t);
        let mc = self.geometry.mesh_chunk(mesh);
        let t_local = t % self.geometry.chunk_t as u64;
        let m_local = mesh % self.geometry.chunk_m;
        let chunk = self.read_chunk(tc, mc)?;
        let off = self.cell_offset_in_chunk(t_local, m_local);
        let bytes: [u8; 4] = chunk[off..off + 4].try_into().unwrap();
        Ok(i32::from_le_bytes(bytes))
    }

    fn read_row_span(&mut self, t: u64, mesh_start: u32, ncols: u32) -> StoreResult<Vec<i32>> {
        let mut out = Vec::with_capacity(ncols as usize);
        let mut mesh = mesh_start;
        let remaining = ncols;
        let mut taken = 0u32;
        while taken < remaining {
            let mc = self.geometry.mesh_chunk(mesh);
            let m_local = mesh % self.geometry.chunk_m;
            let in_chunk = (self.geometry.chunk_m - m_local).min(remaining - taken);
            let tc = self.geometry.time_chunk(t);
            let t_local = t % self.geometry.chunk_t as u64;
            let chunk = self.read_chunk(tc, mc)?;
            let start = self.cell_offset_in_chunk(t_local, m_local);
            for i in 0..in_chunk {
                let off = start + i as usize * 4;
                let bytes: [u8; 4] = chunk[off..off + 4].try_into().unwrap();
                out.push(i32::from_le_bytes(bytes));
            }
            mesh += in_chunk;
            taken += in_chunk;
        }
        Ok(out)
    }

    fn write_row_span(&mut self, t: u64, mesh_start: u32, values: &[i32]) -> StoreResult<()> {
        let mut mesh = mesh_start;
        let mut written = 0usize;
        while written < values.len() {
            let mc = self.geometry.mesh_chunk(mesh);
            let m_local = mesh % self.geometry.chunk_m;
            let in_chunk = ((self.geometry.chunk_m - m_local) as usize).min(values.len() - written);
            let tc = self.geometry.time_chunk(t);
            let t_local = t % self.geometry.chunk_t as u64;
            let start = self.cell_offset_in_chunk(t_local, m_local);
            let buf = self.dirty_chunk_mut(tc, mc)?;
            for i in 0..in_chunk {
                let off = start + i * 4;
                buf[off..off + 4].copy_from_slice(&values[written + i].to_le_bytes());
            }
            mesh += in_chunk as u32;
            written += in_chunk;
        }
        Ok(())
    }

    pub fn read_row_selection(&mut self, t: u64, meshes: &[u32]) -> StoreResult<Vec<i32>> {
        for &m in meshes {
            self.check_bounds(t, m)?;
        }
        match plan_selection(meshes) {
            SelectionPlan::Empty => Ok(Vec::new()),
            SelectionPlan::SingleCell { mesh } => Ok(vec![self.read_cell(t, mesh)?]),
            SelectionPlan::ContiguousHyperslab { mesh_start, len } => {
                self.read_row_span(t, mesh_start, len)
            }
            SelectionPlan::ElementList { meshes } => {
                meshes.iter().map(|&m| self.read_cell(t, m)).collect()
            }
            SelectionPlan::BlockUnion { blocks } => {
                let mut out = vec![0i32; meshes.len()];
                for b in blocks {
                    let vals = self.read_row_span(t, b.dcol0, b.ncols)?;
                    out[b.mcol0 as usize..b.mcol0 as usize + b.ncols as usize].copy_from_slice(&vals);
                }
                Ok(out)
            }
        }
    }

    pub fn read_column_range(&mut self, mesh: u32, t_start: u64, t_end: u64) -> StoreResult<Vec<i32>> {
        if mesh >= self.header.n {
            return Err(StoreError::MeshOutOfBounds {
                index: mesh,
                n: self.header.n,
            });
        }
        let mut out = Vec::with_capacity((t_end.saturating_sub(t_start)) as usize);
        for t in t_start..t_end {
            out.push(self.read_cell(t, mesh)?);
        }
        Ok(out)
    }

    pub fn write_cell(&mut self, t: u64, mesh: u32, value: i32) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.check_bounds(t, mesh)?;
        self.write_row_span(t, mesh, &[value])
    }

    pub fn write_row_selection(&mut self, t: u64, meshes: &[u32], values: &[i32]) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        if meshes.len() != values.len() {
            return Err(StoreError::LengthMismatch {
                got: values.len(),
                expected: meshes.len(),
            });
        }
        for &m in meshes {
            self.check_bounds(t, m)?;
        }
        match plan_selection(meshes) {
            SelectionPlan::Empty => Ok(()),
            SelectionPlan::SingleCell { mesh } => self.write_cell(t, mesh, values[0]),
            SelectionPlan::ContiguousHyperslab { mesh_start, .. } => {
                self.write_row_span(t, mesh_start, values)
            }
            SelectionPlan::ElementList { meshes } => {
                for (i, m) in meshes.iter().enumerate() {
                    self.write_row_span(t, *m, &values[i..i + 1])?;
                }
                Ok(())
            }
            SelectionPlan::BlockUnion { blocks } => {
                for b in blocks {
                    let slice = &values[b.mcol0 as usize..b.mcol0 as usize + b.ncols as usize];
                    self.write_row_span(t, b.dcol0, slice)?;
                }
                Ok(())
            }
        }
    }

    /// Writes `n_rows` consecutive full rows starting at `t_start`, densely
    /// laid out row-major in `values` (bulk-year ingestion mode).
    pub fn write_bulk(&mut self, t_start: u64, n_rows: u64, values: &[i32]) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let expected = n_rows as usize * self.header.n as usize;
        if values.len() != expected {
            return Err(StoreError::LengthMismatch {
                got: values.len(),
                expected,
            });
        }
        if t_start + n_rows > self.header.t {
            return Err(StoreError::RowOutOfBounds {
                index: t_start + n_rows,
                t: self.header.t,
            });
        }
        let n = self.header.n as usize;
        for row in 0..n_rows {
            let t = t_start + row;
            let row_values = &values[row as usize * n..(row as usize + 1) * n];
            self.write_row_span(t, 0, row_values)?;
        }
        Ok(())
    }

    /// Grows the time axis to `new_t` rows, zero-filling the new region.
    /// Never shrinks (I2).
    pub fn extend_time(&mut self, new_t: u64) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        if new_t < self.header.t {
            return Err(StoreError::ShrinkNotAllowed {
                requested: new_t,
                current: self.header.t,
            });
        }
        if new_t == self.header.t {
            return Ok(());
        }
        let new_len = self.data_start + self.geometry.time_chunks(new_t) * self.geometry.chunk_row_bytes(self.header.n);
        self.file.set_len(new_len)?;
        self.header.t = new_t;
        file_format::write_t(&mut self.file, new_t)?;
        Ok(())
    }

    /// Writes every dirty chunk back to disk and clears the dirty map. The
    /// only place writes become durable.
    pub fn flush(&mut self) -> StoreResult<()> {
        let dirty = self.dirty.drain();
        for (key, bytes) in dirty {
            let tc = key >> 32;
            let mc = key as u32;
            self.file.seek(SeekFrom::Start(self.chunk_offset(tc, mc)))?;
            self.file.write_all(&bytes)?;
            self.read_cache.put(key, Arc::from(bytes.into_boxed_slice()));
        }
        self.file.flush()?;
        Ok(())
    }
}

impl Drop for MatrixEngine {
    fn drop(&mut self) {
        if !self.read_only {
            if let Err(e) = self.flush() {
                log::error!("failed to flush {} on drop: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ChunkGeometry;

    fn small_geometry() -> ChunkGeometry {
        ChunkGeometry {
            chunk_t: 4,
            chunk_m: 4,
        }
    }

    fn make_store(dir: &tempfile::TempDir, n: u32) -> MatrixEngine {
        let path = dir.path().join("store.bin");
        MatrixEngine::create(
            path,
            n,
            small_geometry(),
            "2016-01-01 00:00:00".to_string(),
            540,
            (0..n).map(|i| 100_000_001 + i).collect(),
            vec![0xAB, 0xCD],
        )
        .unwrap()
    }

    #[test]
    fn write_then_read_cell_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = make_store(&dir, 10);
        engine.extend_time(5).unwrap();
        engine.write_cell(2, 7, 12345).unwrap();
        engine.flush().unwrap();
        assert_eq!(engine.read_cell(2, 7).unwrap(), 12345);
        assert_eq!(engine.read_cell(2, 6).unwrap(), 0);
    }

    #[test]
    fn row_selection_matches_individual_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = make_store(&dir, 20);
        engine.extend_time(2).unwrap();
        let meshes: Vec<u32> = vec![1, 2, 3, 10, 11, 15];
        let values: Vec<i32> = vec![10, 20, 30, 40, 50, 60];
        engine.write_row_selection(1, &meshes, &values).unwrap();
        let got = engine.read_row_selection(1, &meshes).unwrap();
        assert_eq!(got, values);
        for (i, &m) in meshes.iter().enumerate() {
            assert_eq!(engine.read_cell(1, m).unwrap(), values[i]);
        }
    }

    #[test]
    fn extend_time_rejects_shrink() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = make_store(&dir, 10);
        engine.extend_time(10).unwrap();
        assert!(matches!(
            engine.extend_time(5),
            Err(StoreError::ShrinkNotAllowed { .. })
        ));
    }

    #[test]
    fn write_bulk_populates_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = make_store(&dir, 8);
        engine.extend_time(3).unwrap();
        let values: Vec<i32> = (0..24).collect();
        engine.write_bulk(0, 3, &values).unwrap();
        for t in 0..3u64 {
            for m in 0..8u32 {
                assert_eq!(
                    engine.read_cell(t, m).unwrap(),
                    values[t as usize * 8 + m as usize]
                );
            }
        }
    }

    #[test]
    fn reopening_read_only_sees_flushed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path;
        {
            let mut engine = make_store(&dir, 8);
            path = engine.path().to_path_buf();
            engine.extend_time(2).unwrap();
            engine.write_cell(0, 3, 777).unwrap();
            engine.flush().unwrap();
        }
        let mut reopened = MatrixEngine::open_readonly(&path).unwrap();
        assert_eq!(reopened.read_cell(0, 3).unwrap(), 777);
        assert_eq!(reopened.get_dimensions(), (2, 8));
    }
}
