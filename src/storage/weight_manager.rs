//! Linear-mixable IDF-style keyword weights, backing `fv_converter`'s
//! feature-vector weighting.
//!
//! The merge tie-break follows a fixed rule: sibling diffs (equal version)
//! sum; lopsided versions take the higher side outright. The weighting
//! formula is the smoothed IDF `ln((n+1)/(df+1)) + 1`, chosen so that a
//! term present in every document (df == document_count) still gets a
//! multiplier of exactly 1 rather than 0.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mixable::LinearMixable;
use crate::version::Version;

/// A document-count scalar plus a map term→document-frequency count. Pure
/// additive CRDT: `merge_sum` is commutative and associative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordWeights {
    document_count: u64,
    document_frequency: HashMap<String, u64>,
}

impl KeywordWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one document's feature vector: each distinct term present
    /// bumps its document frequency by one, and the document count by one.
    /// Values in `fv` are ignored for this purpose — only presence counts.
    pub fn observe_document(&mut self, fv: &[(String, f64)]) {
        self.document_count += 1;
        let mut seen = std::collections::HashSet::new();
        for (term, _) in fv {
            if seen.insert(term.as_str()) {
                *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn get_document_count(&self) -> u64 {
        self.document_count
    }

    pub fn get_document_frequency(&self, term: &str) -> u64 {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    /// Pointwise-additive merge: sums document counts and, per term,
    /// document frequencies.
    pub fn merge_sum(&mut self, other: &KeywordWeights) {
        self.document_count += other.document_count;
        for (term, count) in &other.document_frequency {
            *self.document_frequency.entry(term.clone()).or_insert(0) += count;
        }
    }

    pub fn clear(&mut self) {
        self.document_count = 0;
        self.document_frequency.clear();
    }

    /// Smoothed IDF: `ln((n+1)/(df+1)) + 1`, the scikit-learn-style
    /// smoothing that avoids both a division by zero and a zero weight for
    /// terms present in every document.
    fn idf(&self, term: &str) -> f64 {
        let n = self.document_count as f64;
        let df = self.get_document_frequency(term) as f64;
        ((n + 1.0) / (df + 1.0)).ln() + 1.0
    }
}

/// A (version, keyword_weights) pair. Total order on version is used for
/// last-writer-wins when merging two non-sibling diffs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionedWeightDiff {
    pub version: Version,
    pub weights: KeywordWeights,
}

impl VersionedWeightDiff {
    pub fn new(version: Version, weights: KeywordWeights) -> Self {
        VersionedWeightDiff { version, weights }
    }

    /// Folds `other` into `self`: sibling diffs (equal version) sum;
    /// otherwise the higher version wins outright and the loser is
    /// discarded.
    pub fn merge(&mut self, other: &VersionedWeightDiff) {
        if self.version == other.version {
            self.weights.merge_sum(&other.weights);
        } else if other.version > self.version {
            *self = other.clone();
        }
    }
}

/// The linear-mixable accumulator: a dirty local accumulator plus the
/// currently-installed weights and version. `update_weight` only ever
/// touches the accumulator; `put_diff` is what replaces the installed
/// weights and resets the accumulator, holding the accumulator lock
/// across both steps so a concurrent `get_diff` never observes the new
/// version paired with the stale pre-reset accumulator.
pub struct WeightManager {
    accumulator: Mutex<KeywordWeights>,
    installed: Mutex<(Version, KeywordWeights)>,
}

impl Default for WeightManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightManager {
    pub fn new() -> Self {
        WeightManager {
            accumulator: Mutex::new(KeywordWeights::new()),
            installed: Mutex::new((Version::ZERO, KeywordWeights::new())),
        }
    }

    pub fn update_weight(&self, fv: &[(String, f64)]) {
        self.accumulator.lock().observe_document(fv);
    }

    pub fn version(&self) -> Version {
        self.installed.lock().0
    }

    /// Scales each feature's value by its installed IDF weight, in place.
    pub fn get_weight(&self, fv: &mut [(String, f64)]) {
        let installed = self.installed.lock();
        for (term, value) in fv.iter_mut() {
            *value *= installed.1.idf(term);
        }
    }

    pub fn clear(&self) {
        self.accumulator.lock().clear();
        let mut installed = self.installed.lock();
        installed.0 = Version::ZERO;
        installed.1.clear();
    }

    /// The currently-installed (version, weights) pair, independent of the
    /// pending accumulator — for persistence, where the accumulator has no
    /// durable counterpart (in-flight training since the last MIX round is
    /// allowed to be lost on restart).
    pub fn snapshot(&self) -> VersionedWeightDiff {
        let installed = self.installed.lock();
        VersionedWeightDiff::new(installed.0, installed.1.clone())
    }

    /// Restores a previously-snapshotted (version, weights) pair verbatim,
    /// without the version bump `put_diff` applies for a MIX round, and
    /// drops any pending accumulator.
    pub fn restore(&self, snapshot: VersionedWeightDiff) {
        *self.installed.lock() = (snapshot.version, snapshot.weights);
        self.accumulator.lock().clear();
    }
}

impl LinearMixable for WeightManager {
    type Diff = VersionedWeightDiff;

    /// Snapshots the locally-accumulated diff since the last `put_diff`,
    /// stamped with the current installed version. Does not itself reset
    /// the accumulator — only `put_diff` does, so a round that calls
    /// `get_diff` several times before the merged result comes back keeps
    /// accumulating rather than losing updates.
    #[tracing::instrument(skip_all)]
    fn get_diff(&self) -> VersionedWeightDiff {
        let version = self.installed.lock().0;
        VersionedWeightDiff::new(version, self.accumulator.lock().clone())
    }

    fn mix(&self, a: &VersionedWeightDiff, b: &mut VersionedWeightDiff) {
        b.merge(a);
    }

    /// Always accepted: replaces the installed weights with `d.weights`
    /// and bumps the version to `max(local, d.version) + 1`, then resets
    /// the accumulator. Unlike the generic contract, this model never
    /// rejects a diff — staleness is handled entirely by the version bump,
    /// not by refusal. The accumulator lock is held across the whole
    /// install, not just the reset: `get_diff` only ever takes that same
    /// lock, so holding it here prevents a concurrent `get_diff` from
    /// observing the bumped version paired with a not-yet-cleared
    /// accumulator.
    #[tracing::instrument(skip_all)]
    fn put_diff(&self, diff: VersionedWeightDiff) -> Result<bool> {
        let mut accumulator = self.accumulator.lock();
        let mut installed = self.installed.lock();
        installed.0 = Version(installed.0.get().max(diff.version.get()) + 1);
        installed.1 = diff.weights;
        drop(installed);
        accumulator.clear();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(t, v)| (t.to_string(), *v)).collect()
    }

    fn fixture_kw1() -> KeywordWeights {
        let mut kw = KeywordWeights::new();
        kw.observe_document(&fv(&[("a", 1.0)]));
        kw.observe_document(&fv(&[("b", 1.0)]));
        kw.observe_document(&fv(&[("b", 1.0)]));
        kw
    }

    fn fixture_kw2() -> KeywordWeights {
        let mut kw = KeywordWeights::new();
        for _ in 0..4 {
            kw.observe_document(&fv(&[("b", 1.0)]));
        }
        for _ in 0..8 {
            kw.observe_document(&fv(&[("c", 1.0)]));
        }
        kw
    }

    #[test]
    fn fixtures_match_expected_counts() {
        let kw1 = fixture_kw1();
        assert_eq!(kw1.get_document_count(), 3);
        assert_eq!(kw1.get_document_frequency("a"), 1);
        assert_eq!(kw1.get_document_frequency("b"), 2);

        let kw2 = fixture_kw2();
        assert_eq!(kw2.get_document_count(), 12);
        assert_eq!(kw2.get_document_frequency("b"), 4);
        assert_eq!(kw2.get_document_frequency("c"), 8);
    }

    /// Sibling diffs (equal version after both increment) sum.
    #[test]
    fn sibling_diffs_sum() {
        let mut vw1 = VersionedWeightDiff::new(Version::ZERO, fixture_kw1());
        let mut vw2 = VersionedWeightDiff::new(Version::ZERO, fixture_kw2());
        vw1.version.increment();
        vw2.version.increment();
        vw1.merge(&vw2);
        assert_eq!(vw1.weights.get_document_count(), 15);
        assert_eq!(vw1.weights.get_document_frequency("a"), 1);
        assert_eq!(vw1.weights.get_document_frequency("b"), 6);
        assert_eq!(vw1.weights.get_document_frequency("c"), 8);
    }

    /// Lopsided versions: the higher version wins outright.
    #[test]
    fn higher_version_wins_left() {
        let mut vw1 = VersionedWeightDiff::new(Version::ZERO, fixture_kw1());
        let vw2 = VersionedWeightDiff::new(Version::ZERO, fixture_kw2());
        vw1.version.increment();
        vw1.merge(&vw2);
        assert_eq!(vw1.weights.get_document_count(), 3);
        assert_eq!(vw1.weights.get_document_frequency("a"), 1);
        assert_eq!(vw1.weights.get_document_frequency("b"), 2);
        assert_eq!(vw1.weights.get_document_frequency("c"), 0);
    }

    #[test]
    fn higher_version_wins_right() {
        let mut vw1 = VersionedWeightDiff::new(Version::ZERO, fixture_kw1());
        let mut vw2 = VersionedWeightDiff::new(Version::ZERO, fixture_kw2());
        vw2.version.increment();
        vw1.merge(&vw2);
        assert_eq!(vw1.weights.get_document_count(), 12);
        assert_eq!(vw1.weights.get_document_frequency("a"), 0);
        assert_eq!(vw1.weights.get_document_frequency("b"), 4);
        assert_eq!(vw1.weights.get_document_frequency("c"), 8);
    }

    /// A get_diff/put_diff round trip bumps the version and drains the
    /// accumulator, leaving the installed weights equal to what was pushed.
    #[test]
    fn put_diff_bumps_version_and_resets_accumulator() {
        let manager = WeightManager::new();
        manager.update_weight(&fv(&[("a", 1.0), ("b", 1.0)]));

        let got = manager.get_diff();
        assert_eq!(got.version, Version::ZERO);
        assert_eq!(got.weights.get_document_count(), 1);
        assert_eq!(got.weights.get_document_frequency("a"), 1);
        assert_eq!(got.weights.get_document_frequency("b"), 1);

        manager.put_diff(got).unwrap();

        let after = manager.get_diff();
        assert_eq!(after.version, Version(1));
        assert_eq!(after.weights.get_document_count(), 0);
        assert_eq!(after.weights.get_document_frequency("a"), 0);

        let mut result = fv(&[("a", 2.0), ("b", 3.0)]);
        manager.get_weight(&mut result);
        assert_eq!(result[0], ("a".to_string(), 2.0));
        assert_eq!(result[1], ("b".to_string(), 3.0));
    }

    #[test]
    fn clear_resets_to_identity_diff() {
        let manager = WeightManager::new();
        manager.update_weight(&fv(&[("a", 1.0)]));
        manager.clear();
        let diff = manager.get_diff();
        assert_eq!(diff.version, Version::ZERO);
        assert_eq!(diff.weights.get_document_count(), 0);
    }
}
