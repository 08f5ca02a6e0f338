use crate::chd::{self, Chd};
use crate::error::{ResolverError, ResolverResult};

/// Legal mesh keys are 9-digit decimals...
pub const KEY_MIN: u32 = 100_000_000;
/// ...up to (but excluding) the 10-digit boundary.
pub const KEY_MAX_EXCLUSIVE: u32 = 1_000_000_000;

/// The one documented 10-digit exception: maps to the dedicated trailing
/// index `N - 1` rather than being rejected by the digit-range filter.
pub const EXCEPTIONAL_KEY: u32 = 1_000_000_000;

const SEED1: u64 = 0x5bd1_e995_2b79_a7c1;
const SEED2: u64 = 0xc6a4_a793_5bd1_e995;

/// Places every key of `keys` at the dense slot `cmph` actually assigned it,
/// in a freshly allocated array of length `len` (`len >= keys.len()`; any
/// slack is left for a caller-reserved index, e.g. the 10-digit exception).
fn reindex_by_slot(cmph: &Chd, keys: &[u32], len: usize) -> Vec<u32> {
    let mut reindexed = vec![0u32; len];
    for &key in keys {
        reindexed[cmph.candidate_index(key) as usize] = key;
    }
    reindexed
}

/// O(1) key -> dense-index resolver over the store's fixed mesh universe.
///
/// One instance lives per open store handle (never loaded from a linked-in
/// symbol, always from the store's own `meshid_list`/`cmph_data` sections).
pub struct MeshResolver {
    universe: Vec<u32>,
    cmph: Chd,
}

impl MeshResolver {
    /// Builds a fresh resolver (and its serializable MPH blob) for a new
    /// store. Offline-only: not meant to run on any read/write hot path.
    ///
    /// `chd::build` assigns each key to a free slot by displacement search,
    /// not in input order, so the universe is reordered to match the slots
    /// the hash actually produced (`U[resolve(k)] == k` is a bijection on
    /// the hash's terms, not the caller's). The one 10-digit exception is
    /// carved out first and pinned to the trailing index `N-1`; the CHD is
    /// built over the remaining `N-1` (or `N`, if absent) keys, so it never
    /// touches that reserved slot.
    pub fn build(universe: Vec<u32>) -> ResolverResult<(Self, Vec<u8>)> {
        if universe.is_empty() {
            return Err(ResolverError::EmptyUniverse);
        }
        let n = universe.len();
        let has_exceptional = universe.contains(&EXCEPTIONAL_KEY);
        let regular: Vec<u32> = universe
            .iter()
            .copied()
            .filter(|&k| k != EXCEPTIONAL_KEY)
            .collect();
        let cmph = chd::build(&regular, SEED1, SEED2);
        let mut reindexed = reindex_by_slot(&cmph, &regular, n);
        if has_exceptional {
            reindexed[n - 1] = EXCEPTIONAL_KEY;
        }
        let blob = cmph.to_bytes();
        let this = Self {
            universe: reindexed,
            cmph,
        };
        this.verify_integrity()?;
        Ok((this, blob))
    }

    /// Loads a resolver from a store's persisted `meshid_list` and
    /// `cmph_data` sections, verifying I3 (`U[resolve(k)] == k` for every key
    /// in the universe) before trusting the hash.
    pub fn open(universe: Vec<u32>, cmph_bytes: &[u8]) -> ResolverResult<Self> {
        if universe.is_empty() {
            return Err(ResolverError::EmptyUniverse);
        }
        let cmph = Chd::from_bytes(cmph_bytes).ok_or(ResolverError::MalformedBlob)?;
        let this = Self { universe, cmph };
        this.verify_integrity()?;
        Ok(this)
    }

    fn verify_integrity(&self) -> ResolverResult<()> {
        for (index, &key) in self.universe.iter().enumerate() {
            if key == EXCEPTIONAL_KEY {
                continue; // exceptional key is checked separately in `resolve`
            }
            let candidate = self.cmph.candidate_index(key);
            if candidate as usize != index {
                return Err(ResolverError::IntegrityViolation { key, index: index as u32 });
            }
        }
        Ok(())
    }

    /// `resolve(key) -> index | NOT_FOUND`. `None` is the `NOT_FOUND`
    /// sentinel in idiomatic Rust dress.
    #[inline]
    pub fn resolve(&self, key: u32) -> Option<u32> {
        if key == EXCEPTIONAL_KEY {
            let index = self.universe.len() as u32 - 1;
            return if self.universe.get(index as usize) == Some(&key) {
                Some(index)
            } else {
                None
            };
        }
        if !(KEY_MIN..KEY_MAX_EXCLUSIVE).contains(&key) {
            return None;
        }
        let candidate = self.cmph.candidate_index(key);
        if self.universe.get(candidate as usize) == Some(&key) {
            Some(candidate)
        } else {
            None
        }
    }

    /// `reverse(index) -> key`, a dense array lookup.
    #[inline]
    pub fn reverse(&self, index: u32) -> Option<u32> {
        self.universe.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.universe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universe.is_empty()
    }

    pub fn universe(&self) -> &[u32] {
        &self.universe
    }
}

/// An ad-hoc, in-memory MPH over an arbitrary integer subset (e.g. the
/// ~25,600 ids inside one coarse mesh cell). Same `resolve`/`reverse`
/// contract as [`MeshResolver`], but addresses the subset's own dense index
/// space rather than the store's universe.
pub struct LocalResolver {
    members: Vec<u32>,
    cmph: Chd,
}

impl LocalResolver {
    pub fn build(members: Vec<u32>) -> ResolverResult<Self> {
        if members.is_empty() {
            return Err(ResolverError::EmptyUniverse);
        }
        let cmph = chd::build(&members, SEED1 ^ 0xA5A5_A5A5, SEED2 ^ 0x5A5A_5A5A);
        let len = members.len();
        let reindexed = reindex_by_slot(&cmph, &members, len);
        let this = Self {
            members: reindexed,
            cmph,
        };
        for (index, &key) in this.members.iter().enumerate() {
            if this.cmph.candidate_index(key) as usize != index {
                return Err(ResolverError::IntegrityViolation { key, index: index as u32 });
            }
        }
        Ok(this)
    }

    #[inline]
    pub fn resolve(&self, key: u32) -> Option<u32> {
        let candidate = self.cmph.candidate_index(key);
        if self.members.get(candidate as usize) == Some(&key) {
            Some(candidate)
        } else {
            None
        }
    }

    #[inline]
    pub fn reverse(&self, index: u32) -> Option<u32> {
        self.members.get(index as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_universe(n: usize) -> Vec<u32> {
        let mut v: Vec<u32> = (0..n as u32).map(|i| KEY_MIN + i * 3 + 1).collect();
        v.push(EXCEPTIONAL_KEY);
        v
    }

    #[test]
    fn every_key_resolves_and_reverses() {
        let universe = sample_universe(2_000);
        let (resolver, _blob) = MeshResolver::build(universe.clone()).unwrap();
        for &key in &universe {
            let index = resolver.resolve(key).unwrap_or_else(|| panic!("{key} did not resolve"));
            assert_eq!(resolver.reverse(index), Some(key));
        }
    }

    #[test]
    fn boundary_indices_round_trip() {
        let universe = sample_universe(2_000);
        let (resolver, _blob) = MeshResolver::build(universe.clone()).unwrap();
        let first = universe[0];
        let last = EXCEPTIONAL_KEY;
        assert_eq!(resolver.reverse(resolver.resolve(first).unwrap()).unwrap(), first);
        assert_eq!(
            resolver.resolve(last).unwrap(),
            resolver.len() as u32 - 1
        );
        assert_eq!(resolver.reverse(resolver.len() as u32 - 1).unwrap(), last);
    }

    #[test]
    fn open_round_trips_through_blob() {
        let universe = sample_universe(3_000);
        let (resolver, blob) = MeshResolver::build(universe).unwrap();
        let reopened = MeshResolver::open(resolver.universe().to_vec(), &blob).unwrap();
        for key in reopened.universe().to_vec() {
            assert_eq!(resolver.resolve(key), reopened.resolve(key));
        }
    }

    #[test]
    fn unknown_key_is_not_found() {
        let universe = sample_universe(100);
        let (resolver, _blob) = MeshResolver::build(universe).unwrap();
        assert_eq!(resolver.resolve(999_999_999), None);
        assert_eq!(resolver.resolve(1), None); // out of digit range
    }

    #[test]
    fn local_resolver_subset() {
        let members: Vec<u32> = (0..25_600u32).map(|i| i * 13 + 1).collect();
        let local = LocalResolver::build(members.clone()).unwrap();
        let mut seen = std::collections::HashSet::new();
        for &m in &members {
            let idx = local.resolve(m).unwrap();
            assert!(idx < local.len() as u32);
            assert!(seen.insert(idx));
            assert_eq!(local.reverse(idx), Some(m));
        }
    }
}
