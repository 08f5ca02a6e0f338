//! Chunk geometry: an invariant of the file layout, fixed for the life of a
//! store (I1).

/// One leap-year in hours -- the spec's standard `CHUNK_T`.
pub const DEFAULT_CHUNK_T: u32 = 8784;
pub const DEFAULT_CHUNK_M: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    pub chunk_t: u32,
    pub chunk_m: u32,
}

impl ChunkGeometry {
    pub const DEFAULT: Self = Self {
        chunk_t: DEFAULT_CHUNK_T,
        chunk_m: DEFAULT_CHUNK_M,
    };

    #[inline]
    pub fn mesh_chunks(&self, n: u32) -> u32 {
        (n + self.chunk_m - 1) / self.chunk_m
    }

    #[inline]
    pub fn time_chunk(&self, t: u64) -> u64 {
        t / self.chunk_t as u64
    }

    #[inline]
    pub fn mesh_chunk(&self, m: u32) -> u32 {
        m / self.chunk_m
    }

    #[inline]
    pub fn time_chunks(&self, t: u64) -> u64 {
        (t + self.chunk_t as u64 - 1) / self.chunk_t as u64
    }

    /// Bytes per chunk (`CHUNK_T * CHUNK_M` `i32` cells).
    #[inline]
    pub fn chunk_bytes(&self) -> u64 {
        self.chunk_t as u64 * self.chunk_m as u64 * 4
    }

    /// Bytes in one full row of chunks (all mesh-chunks, for one time-chunk).
    #[inline]
    pub fn chunk_row_bytes(&self, n: u32) -> u64 {
        self.mesh_chunks(n) as u64 * self.chunk_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_chunk_count_rounds_up() {
        let geom = ChunkGeometry::DEFAULT;
        assert_eq!(geom.mesh_chunks(1), 1);
        assert_eq!(geom.mesh_chunks(16), 1);
        assert_eq!(geom.mesh_chunks(17), 2);
    }
}
