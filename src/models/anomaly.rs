//! Anomaly/nearest-neighbor storage: push-mixable over a [`ColumnTable`],
//! the same row store the recommender's auxiliary data would use if it
//! didn't need LSH buckets. The anomaly score function itself (LOF,
//! density ratio, etc.) is a learning-algorithm concern outside this
//! crate's scope; this wraps the row store and its mixable wiring.

use crate::error::Result;
use crate::mixable::PushMixable;
use crate::storage::column_table::{ColumnTable, MixableColumnTable, Row, RowState};
use crate::version::{Owner, Stamp, VersionClock};

use super::ModelAdapter;

pub struct AnomalyStorage {
    table: MixableColumnTable,
}

impl AnomalyStorage {
    pub fn new(owner: Owner) -> Self {
        AnomalyStorage {
            table: MixableColumnTable::new(ColumnTable::new("anomaly", owner)),
        }
    }

    pub fn insert(&self, id: &str, row: Row) -> Stamp {
        self.table.write().insert(id, row)
    }

    pub fn remove(&self, id: &str) -> Stamp {
        self.table.write().remove(id)
    }

    pub fn get_row(&self, id: &str) -> Option<(Stamp, RowState)> {
        self.table.read().get_row(id)
    }
}

impl PushMixable for AnomalyStorage {
    type Diff = Vec<(String, Stamp, RowState)>;

    fn get_argument(&self) -> VersionClock {
        self.table.get_argument()
    }

    fn pull(&self, arg: &VersionClock) -> Self::Diff {
        self.table.pull(arg)
    }

    fn push(&self, diff: Self::Diff) -> Result<()> {
        self.table.push(diff)
    }
}

impl ModelAdapter for AnomalyStorage {
    fn type_name(&self) -> &'static str {
        "anomaly::nearest_neighbor"
    }

    fn clear(&self) {
        self.table.write().clear();
    }

    fn pack(&self) -> Result<Vec<u8>> {
        let rows: Vec<(String, Stamp, RowState)> =
            self.table.read().scan().map(|(id, stamp, state)| (id.to_string(), stamp.clone(), state.clone())).collect();
        Ok(bincode::serialize(&rows)?)
    }

    fn unpack(&self, bytes: &[u8]) -> Result<()> {
        let rows: Vec<(String, Stamp, RowState)> = bincode::deserialize(bytes)?;
        let mut table = self.table.write();
        table.clear();
        table.put_diff(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::column_table::Column;
    use smallvec::smallvec;

    #[test]
    fn pack_unpack_roundtrips_rows() {
        let storage = AnomalyStorage::new(Owner::from("w1"));
        storage.insert("r1", smallvec![Column::Float(1.5)]);
        storage.insert("r2", smallvec![Column::Float(2.5)]);

        let bytes = storage.pack().unwrap();
        let restored = AnomalyStorage::new(Owner::from("w2"));
        restored.unpack(&bytes).unwrap();

        let (_, state) = restored.get_row("r1").unwrap();
        assert_eq!(state.as_row().unwrap()[0], Column::Float(1.5));
    }

    #[test]
    fn clear_empties_the_table() {
        let storage = AnomalyStorage::new(Owner::from("w1"));
        storage.insert("r1", smallvec![Column::Float(1.0)]);
        storage.clear();
        assert!(storage.get_row("r1").is_none());
    }
}
