//! Virtual composition (C8): a thin manifest that stitches a frozen base
//! store and a writable new-slab store into one logical time axis, without
//! copying the base's data. "Append without copy" falls out naturally: the
//! new slab is just another store file, and the manifest only remembers
//! where the seam is.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::engine::MatrixEngine;
use crate::error::{StoreError, StoreResult};
use crate::geometry::ChunkGeometry;

const MANIFEST_MAGIC: &[u8; 8] = b"MSHVIRT1";
const MANIFEST_VERSION: u32 = 1;

struct Manifest {
    split_t: u64,
    base_path: PathBuf,
    slab_path: PathBuf,
}

fn write_manifest(path: &Path, manifest: &Manifest) -> io::Result<()> {
    let mut file = File::options()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut buf = Vec::new();
    buf.extend_from_slice(MANIFEST_MAGIC);
    buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
    buf.extend_from_slice(&manifest.split_t.to_le_bytes());
    for p in [&manifest.base_path, &manifest.slab_path] {
        let bytes = p.to_string_lossy();
        let bytes = bytes.as_bytes();
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
    }
    file.write_all(&buf)?;
    file.flush()
}

fn read_manifest(path: &Path) -> io::Result<Manifest> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic != MANIFEST_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad manifest magic"));
    }
    let mut u32buf = [0u8; 4];
    file.read_exact(&mut u32buf)?;
    let _version = u32::from_le_bytes(u32buf);
    let mut u64buf = [0u8; 8];
    file.read_exact(&mut u64buf)?;
    let split_t = u64::from_le_bytes(u64buf);

    let read_path = |file: &mut File| -> io::Result<PathBuf> {
        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut bytes = vec![0u8; len];
        file.read_exact(&mut bytes)?;
        Ok(PathBuf::from(
            String::from_utf8(bytes)
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad path utf-8"))?,
        ))
    };
    let base_path = read_path(&mut file)?;
    let slab_path = read_path(&mut file)?;
    Ok(Manifest {
        split_t,
        base_path,
        slab_path,
    })
}

/// A base store plus a new-slab store, presented as a single logical time
/// axis split at `split_t`.
pub struct VirtualMatrix {
    manifest_path: PathBuf,
    split_t: u64,
    base: MatrixEngine,
    slab: MatrixEngine,
}

enum Target {
    Base(u64),
    Slab(u64),
}

impl VirtualMatrix {
    /// Creates a new slab store alongside `base_path` (copying its mesh
    /// universe and geometry, not its data) and a manifest that joins them
    /// at `split_t`.
    pub fn create(
        manifest_path: impl AsRef<Path>,
        base_path: impl AsRef<Path>,
        slab_path: impl AsRef<Path>,
        split_t: u64,
    ) -> StoreResult<Self> {
        let base = MatrixEngine::open_readonly(base_path.as_ref())?;
        let (base_t, n) = base.get_dimensions();
        if split_t > base_t {
            return Err(StoreError::RowOutOfBounds {
                index: split_t,
                t: base_t,
            });
        }
        let slab = MatrixEngine::create(
            slab_path.as_ref(),
            n,
            base.geometry(),
            base.epoch().to_string(),
            base.utc_offset_minutes(),
            base.meshid_list().to_vec(),
            base.cmph_blob().to_vec(),
        )?;

        write_manifest(
            manifest_path.as_ref(),
            &Manifest {
                split_t,
                base_path: base_path.as_ref().to_path_buf(),
                slab_path: slab_path.as_ref().to_path_buf(),
            },
        )?;

        Ok(Self {
            manifest_path: manifest_path.as_ref().to_path_buf(),
            split_t,
            base,
            slab,
        })
    }

    pub fn open(manifest_path: impl AsRef<Path>, read_only: bool) -> StoreResult<Self> {
        let manifest = read_manifest(manifest_path.as_ref())?;
        let base = MatrixEngine::open_readonly(&manifest.base_path)?;
        let slab = if read_only {
            MatrixEngine::open_readonly(&manifest.slab_path)?
        } else {
            MatrixEngine::open_readwrite(&manifest.slab_path)?
        };
        Ok(Self {
            manifest_path: manifest_path.as_ref().to_path_buf(),
            split_t: manifest.split_t,
            base,
            slab,
        })
    }

    pub fn path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn get_dimensions(&self) -> (u64, u32) {
        let (slab_t, n) = self.slab.get_dimensions();
        (self.split_t + slab_t, n)
    }

    fn locate(&self, t: u64) -> Target {
        if t < self.split_t {
            Target::Base(t)
        } else {
            Target::Slab(t - self.split_t)
        }
    }

    pub fn read_cell(&mut self, t: u64, mesh: u32) -> StoreResult<i32> {
        match self.locate(t) {
            Target::Base(local) => self.base.read_cell(local, mesh),
            Target::Slab(local) => self.slab.read_cell(local, mesh),
        }
    }

    pub fn read_row_selection(&mut self, t: u64, meshes: &[u32]) -> StoreResult<Vec<i32>> {
        match self.locate(t) {
            Target::Base(local) => self.base.read_row_selection(local, meshes),
            Target::Slab(local) => self.slab.read_row_selection(local, meshes),
        }
    }

    pub fn read_column_range(&mut self, mesh: u32, t_start: u64, t_end: u64) -> StoreResult<Vec<i32>> {
        let mut out = Vec::with_capacity((t_end.saturating_sub(t_start)) as usize);
        let split = self.split_t;
        let base_end = t_end.min(split);
        if t_start < base_end {
            out.extend(self.base.read_column_range(mesh, t_start, base_end)?);
        }
        if t_end > split {
            let slab_start = t_start.max(split) - split;
            let slab_end = t_end - split;
            out.extend(self.slab.read_column_range(mesh, slab_start, slab_end)?);
        }
        Ok(out)
    }

    /// Writes are only ever accepted into the slab: the base stays frozen.
    pub fn write_cell(&mut self, t: u64, mesh: u32, value: i32) -> StoreResult<()> {
        match self.locate(t) {
            Target::Base(_) => Err(StoreError::ReadOnly),
            Target::Slab(local) => self.slab.write_cell(local, mesh, value),
        }
    }

    pub fn extend_time(&mut self, new_t: u64) -> StoreResult<()> {
        if new_t < self.split_t {
            return Err(StoreError::ShrinkNotAllowed {
                requested: new_t,
                current: self.split_t,
            });
        }
        self.slab.extend_time(new_t - self.split_t)
    }

    pub fn flush(&mut self) -> StoreResult<()> {
        self.slab.flush()
    }
}
