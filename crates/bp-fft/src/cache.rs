//! LRU cache for forward real-FFT results
//!
//! Keyed by a 64-bit hash of the raw input bytes; a full input comparison
//! on lookup guards against hash collisions.

use bp_core::{Complex32, Sample};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Fast hash over a float slice: 8-byte chunks with prime mixing and a
/// final avalanche (xxHash-style constants).
pub fn hash_samples(data: &[Sample]) -> u64 {
    const PRIME1: u64 = 11400714785074694791;
    const PRIME2: u64 = 14029467366897019727;
    const PRIME3: u64 = 1609587929392839161;
    const PRIME5: u64 = 2870177450012600261;

    let mut hash = PRIME5;
    let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();

    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let v = u64::from_le_bytes(chunk.try_into().unwrap());
        hash ^= v.wrapping_mul(PRIME2);
        hash = hash.rotate_left(31).wrapping_mul(PRIME1);
    }
    for &b in chunks.remainder() {
        hash ^= (b as u64).wrapping_mul(PRIME5);
        hash = hash.rotate_left(11).wrapping_mul(PRIME1);
    }

    hash ^= hash >> 33;
    hash = hash.wrapping_mul(PRIME2);
    hash ^= hash >> 29;
    hash = hash.wrapping_mul(PRIME3);
    hash ^= hash >> 32;
    hash
}

/// Cache instrumentation snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

struct CacheEntry {
    input: Vec<Sample>,
    result: Vec<Complex32>,
    is_real: bool,
}

/// LRU cache mapping input signals to their forward spectra.
pub struct FftCache {
    max_entries: usize,
    max_input_size: usize,
    hits: u64,
    misses: u64,
    entries: HashMap<u64, CacheEntry>,
    // Front = most recently used
    lru: VecDeque<u64>,
}

impl FftCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 128;
    pub const DEFAULT_MAX_INPUT_SIZE: usize = 65536;

    pub fn new(max_entries: usize, max_input_size: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            max_input_size,
            hits: 0,
            misses: 0,
            entries: HashMap::new(),
            lru: VecDeque::new(),
        }
    }

    /// Look up a cached spectrum; on hit copies it into `output` and
    /// refreshes recency.
    pub fn lookup(&mut self, input: &[Sample], is_real: bool, output: &mut Vec<Complex32>) -> bool {
        if input.len() > self.max_input_size {
            self.misses += 1;
            return false;
        }

        let hash = hash_samples(input);
        let Some(entry) = self.entries.get(&hash) else {
            self.misses += 1;
            return false;
        };

        // Collision check: hash equality is not input equality
        if entry.is_real != is_real
            || entry.input.len() != input.len()
            || entry.input != input
        {
            self.misses += 1;
            return false;
        }

        output.clear();
        output.extend_from_slice(&entry.result);
        self.touch(hash);
        self.hits += 1;
        true
    }

    pub fn store(&mut self, input: &[Sample], is_real: bool, result: &[Complex32]) {
        if input.len() > self.max_input_size {
            return;
        }

        let hash = hash_samples(input);
        if self.entries.contains_key(&hash) {
            self.touch(hash);
            return;
        }

        if self.entries.len() >= self.max_entries {
            if let Some(oldest) = self.lru.pop_back() {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            hash,
            CacheEntry {
                input: input.to_vec(),
                result: result.to_vec(),
                is_real,
            },
        );
        self.lru.push_front(hash);
    }

    fn touch(&mut self, hash: u64) {
        if let Some(pos) = self.lru.iter().position(|&h| h == hash) {
            self.lru.remove(pos);
        }
        self.lru.push_front(hash);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate: if total > 0 {
                self.hits as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for FftCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ENTRIES, Self::DEFAULT_MAX_INPUT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum(n: usize) -> Vec<Complex32> {
        (0..n).map(|i| Complex32::new(i as f32, -(i as f32))).collect()
    }

    #[test]
    fn test_store_lookup_hit() {
        let mut cache = FftCache::default();
        let input = vec![1.0f32, 2.0, 3.0, 4.0];
        let result = spectrum(3);
        cache.store(&input, true, &result);

        let mut out = Vec::new();
        assert!(cache.lookup(&input, true, &mut out));
        assert_eq!(out, result);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_miss_on_different_input() {
        let mut cache = FftCache::default();
        cache.store(&[1.0, 2.0], true, &spectrum(2));
        let mut out = Vec::new();
        assert!(!cache.lookup(&[1.0, 2.5], true, &mut out));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_miss_on_real_flag_mismatch() {
        let mut cache = FftCache::default();
        let input = vec![1.0f32, 2.0];
        cache.store(&input, true, &spectrum(2));
        let mut out = Vec::new();
        assert!(!cache.lookup(&input, false, &mut out));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = FftCache::new(2, 65536);
        cache.store(&[1.0], true, &spectrum(1));
        cache.store(&[2.0], true, &spectrum(1));

        // Refresh [1.0] so [2.0] becomes the eviction candidate
        let mut out = Vec::new();
        assert!(cache.lookup(&[1.0], true, &mut out));

        cache.store(&[3.0], true, &spectrum(1));
        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&[1.0], true, &mut out));
        assert!(!cache.lookup(&[2.0], true, &mut out));
        assert!(cache.lookup(&[3.0], true, &mut out));
    }

    #[test]
    fn test_oversized_input_not_cached() {
        let mut cache = FftCache::new(8, 4);
        let big = vec![0.5f32; 16];
        cache.store(&big, true, &spectrum(9));
        assert!(cache.is_empty());
        let mut out = Vec::new();
        assert!(!cache.lookup(&big, true, &mut out));
    }

    #[test]
    fn test_hash_determinism_and_spread() {
        let a = hash_samples(&[1.0, 2.0, 3.0]);
        let b = hash_samples(&[1.0, 2.0, 3.0]);
        let c = hash_samples(&[1.0, 2.0, 3.000001]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hit_rate() {
        let mut cache = FftCache::default();
        let input = vec![1.0f32; 8];
        cache.store(&input, true, &spectrum(5));
        let mut out = Vec::new();
        cache.lookup(&input, true, &mut out);
        cache.lookup(&[9.0f32; 8], true, &mut out);
        let stats = cache.stats();
        assert!((stats.hit_rate - 0.5).abs() < 1e-12);
    }
}
