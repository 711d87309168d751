//! Owner-stable deterministic Gaussian projections.
//!
//! Grounded on `euclid_lsh.cpp::calc_projection`/`get_projection`: a
//! feature name hashes to a `u32` seed, a Gaussian vector is derived from
//! that seed, and it is cached only when `retain_projection` is set
//! (otherwise recomputed on demand, trading memory for determinism-by-seed
//! rather than determinism-by-cache).

use parking_lot::Mutex;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rustc_hash::FxHashMap;

/// Hashes a feature name to the seed used to derive its projection vector.
/// Any stable hash works here: the only requirement is that the same seed
/// yields the same vector across processes, not that the hash function is
/// any particular one.
pub fn seed_for_feature(name: &str) -> u32 {
    use std::hash::{Hash, Hasher};
    let mut hasher = rustc_hash::FxHasher::default();
    name.hash(&mut hasher);
    hasher.finish() as u32
}

fn compute(seed: u32, dim: usize) -> Vec<f32> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed as u64);
    (0..dim).map(|_| StandardNormal.sample(&mut rng) as f32).collect()
}

/// Caches projection vectors by seed when `retain_projection` is enabled;
/// otherwise recomputes on every call. Read-mostly, so the internal lock is
/// only ever taken when caching is on.
pub struct ProjectionCache {
    retain: bool,
    cache: Mutex<FxHashMap<u32, Vec<f32>>>,
}

impl ProjectionCache {
    pub fn new(retain: bool) -> Self {
        ProjectionCache {
            retain,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn get(&self, seed: u32, dim: usize) -> Vec<f32> {
        if !self.retain {
            return compute(seed, dim);
        }
        let mut cache = self.cache.lock();
        cache.entry(seed).or_insert_with(|| compute(seed, dim)).clone()
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}
