//! Adapts the feature-vector converter's keyword [`WeightManager`] to the
//! uniform model-adapter surface. The converter itself (turning raw
//! features into a weighted sparse vector) is outside this crate's scope;
//! this wraps just the weight storage it reads from.

use crate::error::Result;
use crate::storage::weight_manager::{KeywordWeights, WeightManager, VersionedWeightDiff};

use super::ModelAdapter;

pub struct FvWeightAdapter {
    manager: WeightManager,
}

impl Default for FvWeightAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FvWeightAdapter {
    pub fn new() -> Self {
        FvWeightAdapter {
            manager: WeightManager::new(),
        }
    }

    pub fn manager(&self) -> &WeightManager {
        &self.manager
    }
}

impl ModelAdapter for FvWeightAdapter {
    fn type_name(&self) -> &'static str {
        "fv_converter::weight_manager"
    }

    fn clear(&self) {
        self.manager.clear();
    }

    fn pack(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.manager.snapshot())?)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<()> {
        let snapshot: VersionedWeightDiff = bincode::deserialize(bytes)?;
        self.manager.restore(snapshot);
        Ok(())
    }
}
