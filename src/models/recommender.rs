//! Euclid-LSH recommender adapter: push-mixable over the [`LshIndex`], plus
//! the raw-feature-vector row it keeps alongside each hash code (the
//! "auxiliary row store for raw vectors" this family of models needs —
//! here folded directly into `LshIndex`'s row rather than a second
//! parallel map, since every `LshRowState::Live` already carries `orig`).
//!
//! Ranking/ranking-adjacent algorithms (e.g. how a recommendation request
//! turns into a ranked list beyond the raw `similar_row`/`neighbor_row`
//! primitives) are a model-layer concern outside this crate's storage
//! scope; this adapter exposes the primitives and the persistence format.

use serde::{Deserialize, Serialize};

use crate::config::LshConfig;
use crate::error::{Error, Result};
use crate::mixable::PushMixable;
use crate::storage::lsh::index::{LshDiff, LshIndex};
use crate::version::{Owner, VersionClock};

use super::ModelAdapter;

#[derive(Serialize, Deserialize)]
struct PackedRecommender {
    /// Raw feature vectors, duplicated out of the hash index rows for
    /// parity with the two-element pack shape: `[raw_row_store, hash_index]`.
    raw_row_store: Vec<(String, Vec<(String, f64)>)>,
    hash_index: LshDiff,
}

pub struct EuclidLshRecommender {
    index: LshIndex,
}

impl EuclidLshRecommender {
    pub fn new(config: LshConfig, owner: Owner) -> Result<Self> {
        Ok(EuclidLshRecommender {
            index: LshIndex::new(config, owner)?,
        })
    }

    pub fn index(&self) -> &LshIndex {
        &self.index
    }

    pub fn update_row(&self, id: &str, sfv: &[(String, f64)]) -> Result<()> {
        self.index.set_row(id, sfv)?;
        Ok(())
    }

    pub fn clear_row(&self, id: &str) {
        self.index.clear_row(id);
    }

    pub fn similar_row(&self, sfv: &[(String, f64)], ret_num: usize) -> Vec<(String, f32)> {
        self.index.similar_row(sfv, ret_num)
    }

    pub fn similar_row_by_id(&self, id: &str, ret_num: usize) -> Vec<(String, f32)> {
        self.index.similar_row_by_id(id, ret_num)
    }

    pub fn neighbor_row(&self, sfv: &[(String, f64)], ret_num: usize) -> Vec<(String, f32)> {
        self.index.neighbor_row(sfv, ret_num)
    }

    pub fn neighbor_row_by_id(&self, id: &str, ret_num: usize) -> Vec<(String, f32)> {
        self.index.neighbor_row_by_id(id, ret_num)
    }
}

impl PushMixable for EuclidLshRecommender {
    type Diff = LshDiff;

    fn get_argument(&self) -> VersionClock {
        self.index.get_argument()
    }

    fn pull(&self, arg: &VersionClock) -> Self::Diff {
        self.index.pull(arg)
    }

    fn push(&self, diff: Self::Diff) -> Result<()> {
        self.index.push(diff)
    }
}

impl ModelAdapter for EuclidLshRecommender {
    fn type_name(&self) -> &'static str {
        "recommender::euclid_lsh"
    }

    fn clear(&self) {
        self.index.clear();
    }

    fn pack(&self) -> Result<Vec<u8>> {
        let hash_index = self.index.snapshot_rows();
        let raw_row_store = hash_index
            .iter()
            .filter_map(|(id, _, state)| match state {
                crate::storage::lsh::index::LshRowState::Live { orig, .. } => {
                    Some((id.clone(), orig.clone()))
                }
                crate::storage::lsh::index::LshRowState::Tombstone => None,
            })
            .collect();
        Ok(bincode::serialize(&PackedRecommender {
            raw_row_store,
            hash_index,
        })?)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<()> {
        let packed: PackedRecommender = bincode::deserialize(bytes)?;
        if packed.hash_index.len() < packed.raw_row_store.len() {
            return Err(Error::Serialization(
                "hash index has fewer rows than raw row store".into(),
            ));
        }
        self.index.restore_rows(packed.hash_index);
        Ok(())
    }
}
