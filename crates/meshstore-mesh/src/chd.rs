//! "Hash, displace, and compress" minimal-perfect-hash construction.
//!
//! The store never ships a CMPH-style C library, so the MPH parameter blob
//! referred to by the store format (`cmph_data`) is our own construction:
//! keys are bucketed by a first-level hash, buckets are resolved
//! largest-first, and each bucket gets a displacement value that sends all
//! of its keys to distinct, still-free slots in `[0, n)`. Resolution is then
//! `slot = hash2(key, displacement[hash1(key) % num_buckets]) % n`, an O(1)
//! two-hash computation with no allocation.

use ahash::RandomState;
use std::hash::{BuildHasher, Hasher};

const MAX_DISPLACEMENT: u32 = 1 << 20;

fn hash_with(seed: u64, salt: u64, key: u32) -> u64 {
    let state = RandomState::with_seeds(seed, salt, 0x9E3779B9, 0x85EBCA6B);
    let mut hasher = state.build_hasher();
    hasher.write_u32(key);
    hasher.finish()
}

/// The embedded minimal-perfect-hash parameter blob.
#[derive(Debug, Clone)]
pub struct Chd {
    n: u32,
    num_buckets: u32,
    seed1: u64,
    seed2: u64,
    displacements: Vec<u32>,
}

impl Chd {
    /// `slot = hash2(key, displacement[bucket(key)]) % n`. Does not
    /// allocate; does not consult the universe (callers must verify the
    /// candidate against the universe themselves -- see [`crate::MeshResolver::resolve`]).
    #[inline]
    pub fn candidate_index(&self, key: u32) -> u32 {
        let bucket = (hash_with(self.seed1, 0, key) % self.num_buckets as u64) as u32;
        let d = self.displacements[bucket as usize];
        (hash_with(self.seed2, d as u64, key) % self.n as u64) as u32
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    /// Serializes the blob to the flat byte layout stored as `cmph_data`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(24 + self.displacements.len() * 4);
        buf.extend_from_slice(&self.n.to_le_bytes());
        buf.extend_from_slice(&self.num_buckets.to_le_bytes());
        buf.extend_from_slice(&self.seed1.to_le_bytes());
        buf.extend_from_slice(&self.seed2.to_le_bytes());
        for d in &self.displacements {
            buf.extend_from_slice(&d.to_le_bytes());
        }
        buf
    }

    /// Parses a blob previously produced by [`Chd::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 24 {
            return None;
        }
        let n = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let num_buckets = u32::from_le_bytes(bytes[4..8].try_into().ok()?);
        let seed1 = u64::from_le_bytes(bytes[8..16].try_into().ok()?);
        let seed2 = u64::from_le_bytes(bytes[16..24].try_into().ok()?);
        let rest = &bytes[24..];
        if rest.len() != num_buckets as usize * 4 {
            return None;
        }
        let displacements = rest
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Some(Self {
            n,
            num_buckets,
            seed1,
            seed2,
            displacements,
        })
    }
}

/// Builds a minimal perfect hash over `keys` (which must be pairwise
/// distinct). Offline, quadratic-ish in the worst case, meant to run once at
/// store-creation time, not on any hot path.
pub fn build(keys: &[u32], seed1: u64, seed2: u64) -> Chd {
    let n = keys.len() as u32;
    let num_buckets = (n / 4).max(1);

    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); num_buckets as usize];
    for &key in keys {
        let b = (hash_with(seed1, 0, key) % num_buckets as u64) as usize;
        buckets[b].push(key);
    }

    let mut order: Vec<usize> = (0..num_buckets as usize).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(buckets[i].len()));

    let mut displacements = vec![0u32; num_buckets as usize];
    let mut occupied = vec![false; n as usize];

    for bucket_idx in order {
        let bucket = &buckets[bucket_idx];
        if bucket.is_empty() {
            continue;
        }

        let mut d = 0u32;
        loop {
            if d > MAX_DISPLACEMENT {
                panic!("CHD construction failed to find a displacement for bucket {bucket_idx}; key set may need a different seed");
            }

            let slots: Vec<u32> = bucket
                .iter()
                .map(|&key| (hash_with(seed2, d as u64, key) % n as u64) as u32)
                .collect();

            let internally_unique = {
                let mut seen = std::collections::HashSet::with_capacity(slots.len());
                slots.iter().all(|&s| seen.insert(s))
            };
            let all_free = internally_unique && slots.iter().all(|&s| !occupied[s as usize]);

            if all_free {
                for &s in &slots {
                    occupied[s as usize] = true;
                }
                displacements[bucket_idx] = d;
                break;
            }

            d += 1;
        }
    }

    Chd {
        n,
        num_buckets,
        seed1,
        seed2,
        displacements,
    }
}
