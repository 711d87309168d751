//! Fan-in/fan-out driver over a fixed set of linear-mixable shards.
//!
//! Grounded on `common/portable_mixer.hpp`: a vector of storage pointers, a
//! `get_random`/`get_hash` accessor pair for routing a single request to one
//! shard, and a `mix()` that folds every shard's diff into the first and
//! broadcasts the result back out. The original is a template over one
//! `Storage`/`Diff` pair; here that becomes a struct generic over one
//! [`LinearMixable`] implementation, since Rust has no single base class all
//! mixable shard types could share.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::Result;
use crate::mixable::LinearMixable;
use crate::metrics::MIX_METRICS;

pub struct PortableMixer<M: LinearMixable> {
    shards: Vec<Arc<M>>,
    rand: Mutex<StdRng>,
    model_type: &'static str,
}

impl<M: LinearMixable> PortableMixer<M>
where
    M::Diff: Clone,
{
    pub fn new(model_type: &'static str) -> Self {
        PortableMixer {
            shards: Vec::new(),
            rand: Mutex::new(StdRng::from_entropy()),
            model_type,
        }
    }

    pub fn with_seed(model_type: &'static str, seed: u64) -> Self {
        PortableMixer {
            shards: Vec::new(),
            rand: Mutex::new(StdRng::seed_from_u64(seed)),
            model_type,
        }
    }

    pub fn clear(&mut self) {
        self.shards.clear();
    }

    pub fn add(&mut self, storage: Arc<M>) {
        self.shards.push(storage);
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// A uniformly-chosen shard, e.g. for distributing a fresh write across
    /// shards with no natural key.
    pub fn get_random(&self) -> Option<&Arc<M>> {
        if self.shards.is_empty() {
            return None;
        }
        let idx = self.rand.lock().gen_range(0..self.shards.len());
        self.shards.get(idx)
    }

    /// The shard `id` is consistently routed to, so repeated lookups and
    /// updates for the same id always land on the same shard.
    pub fn get_hash(&self, id: &str) -> Option<&Arc<M>> {
        if self.shards.is_empty() {
            return None;
        }
        let mut hasher = rustc_hash::FxHasher::default();
        id.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % self.shards.len();
        self.shards.get(idx)
    }

    /// One MIX round: collects every shard's diff, folds them all into the
    /// first shard's diff via [`LinearMixable::mix`], then installs the
    /// merged result back into every shard. A shard whose `put_diff` errors
    /// is counted and skipped; the round still completes for the rest.
    #[tracing::instrument(skip_all, fields(shards = self.shards.len()))]
    pub fn mix(&self) -> Result<()> {
        if self.shards.is_empty() {
            return Ok(());
        }

        let mut mixed = self.shards[0].get_diff();
        for shard in &self.shards[1..] {
            let diff = shard.get_diff();
            self.shards[0].mix(&diff, &mut mixed);
        }

        let mut errors = 0u64;
        for shard in &self.shards {
            match shard.put_diff(mixed.clone()) {
                Ok(_) => {}
                Err(e) => {
                    errors += 1;
                    tracing::warn!(model_type = self.model_type, error = %e, "put_diff failed for shard during mix");
                }
            }
        }

        MIX_METRICS.rounds_total.with_label_values(&[self.model_type]).inc();
        if errors > 0 {
            MIX_METRICS
                .peer_errors_total
                .with_label_values(&[self.model_type])
                .inc_by(errors);
        }
        Ok(())
    }
}
