//! Euclidean-LSH nearest-neighbor index: a row store keyed by id, each row
//! projected into a multi-table hash code, plus per-table inverted bucket
//! indices that answer approximate nearest-neighbor queries without a full
//! scan.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use itertools::Itertools;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::LshConfig;
use crate::error::{Error, Result};
use crate::metrics::MIX_METRICS;
use crate::mixable::PushMixable;
use crate::version::{LocalClock, Owner, Stamp, Version, VersionClock};

use super::code::{calc_norm, LshCode};
use super::projection::ProjectionCache;

type BucketSignature = Vec<i32>;

/// A row's payload: a live hash code plus the sparse feature vector it was
/// computed from (kept so `neighbor_row` can answer by id without the
/// caller re-supplying the vector), or a tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LshRowState {
    Live {
        code: LshCode,
        norm: f32,
        orig: Vec<(String, f64)>,
    },
    Tombstone,
}

#[derive(Debug, Clone)]
struct StoredLshRow {
    stamp: Stamp,
    state: LshRowState,
}

/// One entry of an exchanged diff: a row id, its stamp, and its state.
pub type LshDiff = Vec<(String, Stamp, LshRowState)>;

pub struct LshIndex {
    config: LshConfig,
    projection: ProjectionCache,
    local: LocalClock,
    inner: RwLock<Inner>,
    vc: parking_lot::Mutex<VersionClock>,
    diff_pool: parking_lot::Mutex<IndexMap<Owner, Vec<(String, Stamp, LshRowState)>>>,
}

struct Inner {
    rows: HashMap<String, StoredLshRow>,
    buckets: Vec<HashMap<BucketSignature, HashSet<String>>>,
}

impl LshIndex {
    pub fn new(config: LshConfig, owner: Owner) -> Result<Self> {
        config.validate()?;
        let table_num = config.table_num as usize;
        Ok(LshIndex {
            projection: ProjectionCache::new(config.retain_projection),
            local: LocalClock::new(owner),
            inner: RwLock::new(Inner {
                rows: HashMap::new(),
                buckets: (0..table_num).map(|_| HashMap::new()).collect(),
            }),
            vc: parking_lot::Mutex::new(VersionClock::new()),
            diff_pool: parking_lot::Mutex::new(IndexMap::new()),
            config,
        })
    }

    fn code_len(&self) -> usize {
        self.config.code_len()
    }

    fn hash_num(&self) -> usize {
        self.config.hash_num as usize
    }

    fn table_num(&self) -> usize {
        self.config.table_num as usize
    }

    fn fold_into_buckets(inner: &mut Inner, id: &str, code: &LshCode, hash_num: usize, table_num: usize) {
        for t in 0..table_num {
            let sig = code.bucket_signature(t, hash_num);
            inner.buckets[t].entry(sig).or_default().insert(id.to_string());
        }
    }

    fn unfold_from_buckets(inner: &mut Inner, id: &str, code: &LshCode, hash_num: usize, table_num: usize) {
        for t in 0..table_num {
            let sig = code.bucket_signature(t, hash_num);
            if let Some(bucket) = inner.buckets[t].get_mut(&sig) {
                bucket.remove(id);
                if bucket.is_empty() {
                    inner.buckets[t].remove(&sig);
                }
            }
        }
    }

    /// Projects `sfv`, stores it under `id` with a freshly-issued local
    /// stamp, and folds it into the per-table bucket indices immediately —
    /// a query issued right after this call sees the row.
    #[tracing::instrument(skip_all)]
    pub fn set_row(&self, id: &str, sfv: &[(String, f64)]) -> Result<Stamp> {
        if sfv.iter().any(|(_, v)| v.is_nan()) {
            return Err(Error::ArgumentUnmatch("feature value is NaN".into()));
        }
        let code = LshCode::compute(sfv, self.code_len(), self.config.bin_width, &self.projection);
        let norm = calc_norm(sfv);
        let stamp = self.local.next_stamp();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.rows.get(id) {
            if let LshRowState::Live { code: old_code, .. } = &existing.state {
                let old_code = old_code.clone();
                Self::unfold_from_buckets(&mut inner, id, &old_code, self.hash_num(), self.table_num());
            }
        }
        Self::fold_into_buckets(&mut inner, id, &code, self.hash_num(), self.table_num());
        let state = LshRowState::Live {
            code,
            norm,
            orig: sfv.to_vec(),
        };
        inner.rows.insert(
            id.to_string(),
            StoredLshRow {
                stamp: stamp.clone(),
                state: state.clone(),
            },
        );
        drop(inner);
        self.append_to_diff_pool(id, stamp.clone(), state);
        Ok(stamp)
    }

    #[tracing::instrument(skip_all)]
    pub fn clear_row(&self, id: &str) -> Stamp {
        let stamp = self.local.next_stamp();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.rows.get(id) {
            if let LshRowState::Live { code, .. } = existing.state.clone() {
                Self::unfold_from_buckets(&mut inner, id, &code, self.hash_num(), self.table_num());
            }
        }
        inner.rows.insert(
            id.to_string(),
            StoredLshRow {
                stamp: stamp.clone(),
                state: LshRowState::Tombstone,
            },
        );
        drop(inner);
        self.append_to_diff_pool(id, stamp.clone(), LshRowState::Tombstone);
        stamp
    }

    /// Appends a locally-originated row write to the local owner's diff-pool
    /// entry (spec.md §4.3 step 4), the propagation ledger a remote `pull`
    /// streams from. Separate from `inner`'s lock, so a `pull` never blocks
    /// on a concurrent `set_row`/`clear_row` or vice versa.
    fn append_to_diff_pool(&self, id: &str, stamp: Stamp, state: LshRowState) {
        let mut pool = self.diff_pool.lock();
        pool.entry(self.local.owner().clone()).or_default().push((id.to_string(), stamp, state));
        self.report_diff_pool_size(self.local.owner(), &pool);
    }

    pub fn get_all_row_ids(&self) -> Vec<String> {
        self.inner.read().rows.keys().cloned().collect()
    }

    /// A full snapshot of every stored row, for persistence.
    pub fn snapshot_rows(&self) -> LshDiff {
        let inner = self.inner.read();
        inner
            .rows
            .iter()
            .map(|(id, r)| (id.clone(), r.stamp.clone(), r.state.clone()))
            .collect()
    }

    /// Replaces the entire row store and rebuilds the bucket indices from
    /// scratch, for restoring a persisted snapshot. Unlike `push`, every row
    /// is installed unconditionally.
    pub fn restore_rows(&self, rows: LshDiff) {
        let mut inner = self.inner.write();
        inner.rows.clear();
        for bucket in inner.buckets.iter_mut() {
            bucket.clear();
        }
        for (id, stamp, state) in rows {
            if let LshRowState::Live { code, .. } = &state {
                Self::fold_into_buckets(&mut inner, &id, code, self.hash_num(), self.table_num());
            }
            inner.rows.insert(id, StoredLshRow { stamp, state });
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.rows.clear();
        for bucket in inner.buckets.iter_mut() {
            bucket.clear();
        }
        self.diff_pool.lock().clear();
    }

    /// Candidate ids from multi-probing every table: the exact bucket plus,
    /// budget permitting, neighboring buckets reached by flipping the
    /// dimension(s) closest to a bin boundary — the standard multi-probe
    /// LSH widening. `probe_num == 0` probes only the exact bucket in every
    /// table.
    fn candidates(&self, inner: &Inner, code: &LshCode) -> HashSet<String> {
        let hash_num = self.hash_num();
        let table_num = self.table_num();
        let per_table_budget = if self.config.probe_num == 0 {
            1
        } else {
            ((self.config.probe_num as usize) / table_num).max(1)
        };

        let mut out = HashSet::new();
        for t in 0..table_num {
            let base = code.bucket_signature(t, hash_num);
            if let Some(bucket) = inner.buckets[t].get(&base) {
                out.extend(bucket.iter().cloned());
            }
            if per_table_budget <= 1 {
                continue;
            }
            let offsets = code.boundary_offsets(t, hash_num);
            let mut ranked: Vec<(usize, f32)> =
                offsets.iter().enumerate().map(|(dim, off)| (dim, off.abs())).collect();
            ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

            for (dim, _) in ranked.into_iter().take(per_table_budget - 1) {
                let mut perturbed = base.clone();
                let direction = if offsets[dim] > 0.0 { 1 } else { -1 };
                perturbed[dim] += direction;
                if let Some(bucket) = inner.buckets[t].get(&perturbed) {
                    out.extend(bucket.iter().cloned());
                }
            }
        }
        out
    }

    /// `‖q‖² + ‖r‖² − 2⟨q,r⟩`, where the inner product is reconstructed from
    /// the stored hash codes: `(Σ code_q[j]*code_r[j]) * bin_width² / n`.
    fn squared_distance(&self, q_norm: f32, q_code: &LshCode, r_norm: f32, r_code: &LshCode) -> f32 {
        let n = self.code_len() as f32;
        let dot: f32 = q_code.0.iter().zip(r_code.0.iter()).map(|(a, b)| a * b).sum();
        let inner = dot * self.config.bin_width * self.config.bin_width / n;
        (q_norm * q_norm + r_norm * r_norm - 2.0 * inner).max(0.0)
    }

    /// Nearest neighbors of an ad hoc feature vector not necessarily stored
    /// in the index, nearest first.
    #[tracing::instrument(skip_all)]
    pub fn similar_row(&self, sfv: &[(String, f64)], ret_num: usize) -> Vec<(String, f32)> {
        let code = LshCode::compute(sfv, self.code_len(), self.config.bin_width, &self.projection);
        let norm = calc_norm(sfv);
        self.rank_candidates(&code, norm, None, ret_num, 1.0)
    }

    /// Nearest neighbors of an already-stored row by id, excluding itself.
    /// Same distance sign as [`LshIndex::similar_row`]; an empty row store
    /// for a row whose id is unknown yields no candidates.
    #[tracing::instrument(skip_all)]
    pub fn similar_row_by_id(&self, id: &str, ret_num: usize) -> Vec<(String, f32)> {
        let inner = self.inner.read();
        let Some(stored) = inner.rows.get(id) else {
            return Vec::new();
        };
        let LshRowState::Live { code, norm, .. } = stored.state.clone() else {
            return Vec::new();
        };
        drop(inner);
        self.rank_candidates(&code, norm, Some(id), ret_num, 1.0)
    }

    /// Nearest neighbors of an ad hoc feature vector, reported as a
    /// similarity (sign-flipped distance) rather than a raw distance — the
    /// *sign* is the only difference from [`LshIndex::similar_row`].
    #[tracing::instrument(skip_all)]
    pub fn neighbor_row(&self, sfv: &[(String, f64)], ret_num: usize) -> Vec<(String, f32)> {
        let code = LshCode::compute(sfv, self.code_len(), self.config.bin_width, &self.projection);
        let norm = calc_norm(sfv);
        self.rank_candidates(&code, norm, None, ret_num, -1.0)
    }

    /// Nearest neighbors of an already-stored row by id, excluding itself,
    /// reported as a similarity — sign-flipped relative to
    /// [`LshIndex::similar_row_by_id`].
    #[tracing::instrument(skip_all)]
    pub fn neighbor_row_by_id(&self, id: &str, ret_num: usize) -> Vec<(String, f32)> {
        let inner = self.inner.read();
        let Some(stored) = inner.rows.get(id) else {
            return Vec::new();
        };
        let LshRowState::Live { code, norm, .. } = stored.state.clone() else {
            return Vec::new();
        };
        drop(inner);
        self.rank_candidates(&code, norm, Some(id), ret_num, -1.0)
    }

    fn rank_candidates(
        &self,
        code: &LshCode,
        norm: f32,
        exclude: Option<&str>,
        ret_num: usize,
        sign: f32,
    ) -> Vec<(String, f32)> {
        let inner = self.inner.read();
        let candidates = self.candidates(&inner, code);
        candidates
            .into_iter()
            .filter(|cand_id| Some(cand_id.as_str()) != exclude)
            .filter_map(|cand_id| match inner.rows.get(&cand_id).map(|r| &r.state) {
                Some(LshRowState::Live { code: c, norm: n, .. }) => {
                    Some((cand_id, sign * self.squared_distance(norm, code, *n, c)))
                }
                _ => None,
            })
            .sorted_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .take(ret_num)
            .collect()
    }

    fn report_diff_pool_size(&self, owner: &Owner, pool: &IndexMap<Owner, Vec<(String, Stamp, LshRowState)>>) {
        let size = pool.get(owner).map(|v| v.len()).unwrap_or(0);
        MIX_METRICS
            .lsh_diff_pool_size
            .with_label_values(&[&owner.to_string()])
            .set(size as i64);
    }

    /// Drops diff-pool entries already reflected in `keep_after`, i.e. rows
    /// every peer tracked by that clock has already observed. Does not touch
    /// the row store or bucket indices — only trims the propagation ledger
    /// that `pull` streams from.
    pub fn compact(&self, keep_after: &VersionClock) {
        let mut pool = self.diff_pool.lock();
        let mut dropped = 0usize;
        for (owner, entries) in pool.iter_mut() {
            let before = entries.len();
            entries.retain(|(_, stamp, _)| keep_after.is_new(owner, stamp.version));
            dropped += before - entries.len();
        }
        log::debug!("diff pool compaction dropped {dropped} entries already covered by the floor clock");
        let owners: Vec<Owner> = pool.keys().cloned().collect();
        for owner in owners {
            self.report_diff_pool_size(&owner, &pool);
        }
    }
}

impl PushMixable for LshIndex {
    type Diff = LshDiff;

    #[tracing::instrument(skip_all)]
    fn get_argument(&self) -> VersionClock {
        self.vc.lock().clone()
    }

    #[tracing::instrument(skip_all)]
    fn pull(&self, arg: &VersionClock) -> Self::Diff {
        let pool = self.diff_pool.lock();
        let mut out: Self::Diff = pool
            .iter()
            .flat_map(|(owner, entries)| {
                entries
                    .iter()
                    .filter(|(_, stamp, _)| arg.is_new(owner, stamp.version))
                    .cloned()
            })
            .collect();
        out.sort_by(|a, b| (a.1.owner.as_bytes(), a.1.version).cmp(&(b.1.owner.as_bytes(), b.1.version)));
        out
    }

    /// Validates every entry's code length before applying any of them —
    /// malformed diffs are rejected wholesale rather than partially
    /// applied — then accepts each row iff its stamp strictly dominates the
    /// currently-installed one, folding accepted rows into the bucket
    /// indices immediately.
    #[tracing::instrument(skip_all)]
    fn push(&self, diff: Self::Diff) -> Result<()> {
        for (id, stamp, state) in &diff {
            if let LshRowState::Live { code, .. } = state {
                if code.len() != self.code_len() {
                    log::warn!(
                        "dropping malformed diff for row `{id}` from owner `{}`: expected code length {}, found {}",
                        stamp.owner,
                        self.code_len(),
                        code.len()
                    );
                    return Err(Error::LengthUnmatch {
                        expected: self.code_len(),
                        found: code.len(),
                    });
                }
                if code.has_nan() {
                    log::warn!("dropping malformed diff for row `{id}` from owner `{}`: hash code contains NaN", stamp.owner);
                    return Err(Error::ArgumentUnmatch("hash code contains NaN".into()));
                }
            }
            if stamp.owner.as_bytes().is_empty() {
                log::warn!("dropping malformed diff for row `{id}`: stamp has zero-length owner");
                return Err(Error::ArgumentUnmatch("row stamp with empty owner".into()));
            }
        }

        let mut inner = self.inner.write();
        let mut applied: Vec<(String, Stamp, LshRowState)> = Vec::new();
        for (id, stamp, state) in diff {
            let accept = match inner.rows.get(&id) {
                Some(existing) => stamp.strictly_newer_than(&existing.stamp),
                None => true,
            };
            if !accept {
                continue;
            }
            if let Some(existing) = inner.rows.get(&id) {
                if let LshRowState::Live { code: old_code, .. } = existing.state.clone() {
                    Self::unfold_from_buckets(&mut inner, &id, &old_code, self.hash_num(), self.table_num());
                }
            }
            if let LshRowState::Live { code, .. } = &state {
                Self::fold_into_buckets(&mut inner, &id, code, self.hash_num(), self.table_num());
            }
            applied.push((id.clone(), stamp.clone(), state.clone()));
            inner.rows.insert(id, StoredLshRow { stamp, state });
        }
        drop(inner);

        let mut vc = self.vc.lock();
        let mut pool = self.diff_pool.lock();
        for (id, stamp, state) in applied {
            vc.observe(&stamp.owner, stamp.version);
            let owner = stamp.owner.clone();
            pool.entry(owner.clone()).or_default().push((id, stamp, state));
            self.report_diff_pool_size(&owner, &pool);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(tag: &str) -> Owner {
        Owner::from(tag)
    }

    fn fv(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(t, v)| (t.to_string(), *v)).collect()
    }

    fn small_config() -> LshConfig {
        LshConfig {
            hash_num: 4,
            table_num: 2,
            bin_width: 1.0,
            probe_num: 8,
            seed: 7,
            retain_projection: true,
        }
    }

    #[test]
    fn set_row_is_immediately_queryable() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0), ("y", 2.0)])).unwrap();
        let hits = index.similar_row(&fv(&[("x", 1.0), ("y", 2.0)]), 5);
        assert!(hits.iter().any(|(id, _)| id == "a"));
    }

    #[test]
    fn exact_query_ranks_itself_closest_among_distinct_points() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("near", &fv(&[("x", 1.0), ("y", 1.0)])).unwrap();
        index.set_row("far", &fv(&[("x", 50.0), ("y", 50.0)])).unwrap();
        let hits = index.similar_row(&fv(&[("x", 1.0), ("y", 1.0)]), 2);
        assert_eq!(hits[0].0, "near");
    }

    #[test]
    fn neighbor_row_by_id_excludes_self() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0)])).unwrap();
        index.set_row("b", &fv(&[("x", 1.1)])).unwrap();
        let hits = index.neighbor_row_by_id("a", 5);
        assert!(hits.iter().all(|(id, _)| id != "a"));
    }

    #[test]
    fn neighbor_row_by_id_of_unknown_id_is_empty() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        assert!(index.neighbor_row_by_id("missing", 5).is_empty());
    }

    #[test]
    fn neighbor_row_is_sign_flipped_similar_row() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0), ("y", 1.0)])).unwrap();
        index.set_row("b", &fv(&[("x", 50.0), ("y", 50.0)])).unwrap();
        let query = fv(&[("x", 1.0), ("y", 1.0)]);
        let distances = index.similar_row(&query, 2);
        let similarities = index.neighbor_row(&query, 2);
        for ((id_d, d), (id_s, s)) in distances.iter().zip(similarities.iter()) {
            assert_eq!(id_d, id_s);
            assert_eq!(*s, -*d);
        }
    }

    #[test]
    fn similar_row_by_id_matches_similar_row_of_its_own_vector() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0), ("y", 1.0)])).unwrap();
        index.set_row("b", &fv(&[("x", 1.1), ("y", 0.9)])).unwrap();
        let by_vector = index.similar_row(&fv(&[("x", 1.0), ("y", 1.0)]), 2);
        let by_id = index.similar_row_by_id("a", 2);
        // by_vector includes "a" itself (distance 0); by_id excludes it.
        assert!(by_vector.iter().any(|(id, _)| id == "a"));
        assert!(by_id.iter().all(|(id, _)| id != "a"));
    }

    #[test]
    fn clear_row_removes_from_bucket_index() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0)])).unwrap();
        index.clear_row("a");
        let hits = index.similar_row(&fv(&[("x", 1.0)]), 5);
        assert!(hits.is_empty());
    }

    #[test]
    fn probe_num_zero_restricts_to_exact_bucket() {
        let mut config = small_config();
        config.probe_num = 0;
        let index = LshIndex::new(config, owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0)])).unwrap();
        let hits = index.similar_row(&fv(&[("x", 1.0)]), 5);
        assert!(hits.iter().any(|(id, _)| id == "a"));
    }

    #[test]
    fn push_mixable_exchange_advances_receiver_clock() {
        let sender = LshIndex::new(small_config(), owner("peerB")).unwrap();
        sender.set_row("r1", &fv(&[("x", 1.0), ("y", 2.0)])).unwrap();

        let receiver = LshIndex::new(small_config(), owner("peerA")).unwrap();
        let arg = receiver.get_argument();
        let diff = sender.pull(&arg);
        assert_eq!(diff.len(), 1);
        receiver.push(diff).unwrap();

        assert_eq!(receiver.get_argument().get(&owner("peerB")), Version(0));
        let hits = receiver.similar_row(&fv(&[("x", 1.0), ("y", 2.0)]), 5);
        assert!(hits.iter().any(|(id, _)| id == "r1"));
    }

    #[test]
    fn set_row_is_pullable_from_an_empty_clock() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0)])).unwrap();
        let diff = index.pull(&VersionClock::new());
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].0, "a");
    }

    #[test]
    fn pull_excludes_rows_already_covered_by_the_argument_clock() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0)])).unwrap();
        let mut arg = VersionClock::new();
        arg.observe(&owner("w1"), Version(0));
        assert!(index.pull(&arg).is_empty());
    }

    #[test]
    fn pull_does_not_read_the_row_map_lock() {
        let index = LshIndex::new(small_config(), owner("w1")).unwrap();
        index.set_row("a", &fv(&[("x", 1.0)])).unwrap();
        let _inner_guard = index.inner.write();
        // pull only locks diff_pool, so it must not deadlock while a writer
        // holds `inner`.
        assert_eq!(index.pull(&VersionClock::new()).len(), 1);
    }

    #[test]
    fn push_rejects_code_with_mismatched_length() {
        let receiver = LshIndex::new(small_config(), owner("peerA")).unwrap();
        let bad = vec![(
            "r1".to_string(),
            Stamp::new(owner("peerB"), Version(0)),
            LshRowState::Live {
                code: LshCode(vec![0.0; 1]),
                norm: 1.0,
                orig: fv(&[("x", 1.0)]),
            },
        )];
        let err = receiver.push(bad).unwrap_err();
        assert!(matches!(err, Error::LengthUnmatch { .. }));
    }

    #[test]
    fn compact_trims_diff_pool_below_floor() {
        let receiver = LshIndex::new(small_config(), owner("peerA")).unwrap();
        let diff = vec![(
            "r1".to_string(),
            Stamp::new(owner("peerB"), Version(3)),
            LshRowState::Live {
                code: LshCode::compute(&fv(&[("x", 1.0)]), 8, 1.0, &ProjectionCache::new(false)),
                norm: 1.0,
                orig: fv(&[("x", 1.0)]),
            },
        )];
        receiver.push(diff).unwrap();
        assert_eq!(receiver.diff_pool.lock().get(&owner("peerB")).map(|v| v.len()), Some(1));
        let mut floor = VersionClock::new();
        floor.observe(&owner("peerB"), Version(3));
        receiver.compact(&floor);
        assert_eq!(receiver.diff_pool.lock().get(&owner("peerB")).map(|v| v.len()), Some(0));
    }
}
