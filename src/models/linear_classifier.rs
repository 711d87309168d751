//! Storage for the linear-classifier family (passive-aggressive, perceptron,
//! CW, AROW, NHERD): a feature → weight table, mixed as a pointwise-additive
//! delta. The update rules themselves (how a training example turns into a
//! delta) are a learning-algorithm concern and live outside this crate; this
//! type owns only the table and its linear-mixable wiring.

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mixable::LinearMixable;

use super::ModelAdapter;

/// A pointwise-additive delta over the weight table. `mix` sums two deltas,
/// which is trivially commutative and associative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightDelta(pub HashMap<String, f64>);

impl WeightDelta {
    fn add(&mut self, other: &WeightDelta) {
        for (feature, delta) in &other.0 {
            *self.0.entry(feature.clone()).or_insert(0.0) += delta;
        }
    }
}

pub struct ClassifierStorage {
    weights: RwLock<HashMap<String, f64>>,
    accumulator: Mutex<WeightDelta>,
}

impl Default for ClassifierStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierStorage {
    pub fn new() -> Self {
        ClassifierStorage {
            weights: RwLock::new(HashMap::new()),
            accumulator: Mutex::new(WeightDelta::default()),
        }
    }

    pub fn weight(&self, feature: &str) -> f64 {
        self.weights.read().get(feature).copied().unwrap_or(0.0)
    }

    /// Records a weight update since the last `put_diff`, to be folded into
    /// the installed table on the next MIX round.
    pub fn update_weight(&self, deltas: &[(String, f64)]) {
        let mut accumulator = self.accumulator.lock();
        for (feature, delta) in deltas {
            *accumulator.0.entry(feature.clone()).or_insert(0.0) += delta;
        }
    }
}

impl LinearMixable for ClassifierStorage {
    type Diff = WeightDelta;

    #[tracing::instrument(skip_all)]
    fn get_diff(&self) -> WeightDelta {
        self.accumulator.lock().clone()
    }

    fn mix(&self, a: &WeightDelta, b: &mut WeightDelta) {
        b.add(a);
    }

    /// Folds the merged delta into the installed table and resets the
    /// accumulator. Additive state never rejects a diff. The accumulator
    /// lock is held across the whole install: `get_diff` only ever takes
    /// that same lock, so holding it here prevents a concurrent `get_diff`
    /// from observing the installed weights already updated against a
    /// not-yet-cleared accumulator.
    #[tracing::instrument(skip_all)]
    fn put_diff(&self, diff: WeightDelta) -> Result<bool> {
        let mut accumulator = self.accumulator.lock();
        let mut weights = self.weights.write();
        for (feature, delta) in &diff.0 {
            *weights.entry(feature.clone()).or_insert(0.0) += delta;
        }
        drop(weights);
        *accumulator = WeightDelta::default();
        Ok(true)
    }
}

impl ModelAdapter for ClassifierStorage {
    fn type_name(&self) -> &'static str {
        "linear_classifier"
    }

    fn clear(&self) {
        self.weights.write().clear();
        *self.accumulator.lock() = WeightDelta::default();
    }

    fn pack(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&*self.weights.read())?)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<()> {
        let restored: HashMap<String, f64> = bincode::deserialize(bytes)?;
        *self.weights.write() = restored;
        *self.accumulator.lock() = WeightDelta::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(pairs: &[(&str, f64)]) -> Vec<(String, f64)> {
        pairs.iter().map(|(f, v)| (f.to_string(), *v)).collect()
    }

    #[test]
    fn put_diff_accumulates_into_installed_weights() {
        let storage = ClassifierStorage::new();
        storage.update_weight(&delta(&[("a", 1.0), ("b", -0.5)]));
        let diff = storage.get_diff();
        storage.put_diff(diff).unwrap();
        assert_eq!(storage.weight("a"), 1.0);
        assert_eq!(storage.weight("b"), -0.5);

        let after = storage.get_diff();
        assert!(after.0.is_empty());
    }

    #[test]
    fn mix_sums_two_shards_deltas() {
        let storage = ClassifierStorage::new();
        let mut a = WeightDelta(HashMap::from([("x".to_string(), 1.0)]));
        let b = WeightDelta(HashMap::from([("x".to_string(), 2.0), ("y".to_string(), 3.0)]));
        storage.mix(&b, &mut a);
        assert_eq!(a.0.get("x"), Some(&3.0));
        assert_eq!(a.0.get("y"), Some(&3.0));
    }

    #[test]
    fn pack_unpack_roundtrips_weights() {
        let storage = ClassifierStorage::new();
        storage.update_weight(&delta(&[("a", 2.0)]));
        storage.put_diff(storage.get_diff()).unwrap();

        let bytes = storage.pack().unwrap();
        let restored = ClassifierStorage::new();
        restored.unpack(&bytes).unwrap();
        assert_eq!(restored.weight("a"), 2.0);
    }

    #[test]
    fn clear_empties_weights_and_accumulator() {
        let storage = ClassifierStorage::new();
        storage.update_weight(&delta(&[("a", 1.0)]));
        storage.put_diff(storage.get_diff()).unwrap();
        storage.clear();
        assert_eq!(storage.weight("a"), 0.0);
        assert!(storage.get_diff().0.is_empty());
    }
}
