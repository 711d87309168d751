//! Row storage backing push-mixable models: an id-indexed row map behind a
//! single reader/writer lock, in the shape of a locking transactional
//! datastore's state struct plus a secondary structure for lookups.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::error::{Error, Result};
use crate::metrics::MIX_METRICS;
use crate::mixable::PushMixable;
use crate::version::{LocalClock, Owner, Stamp, Version, VersionClock};

/// One typed column value: int, float, string, or binary, fixed per table
/// schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// A row is a tuple of columns, fixed in count per table schema: almost
/// always small, so the first few columns live inline instead of behind a
/// heap allocation.
pub type Row = SmallVec<[Column; 4]>;

/// A row's payload: live data, or a tombstone recording that the row was
/// deleted (so the deletion itself propagates through MIX).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowState {
    Live(Row),
    Tombstone,
}

impl RowState {
    pub fn as_row(&self) -> Option<&Row> {
        match self {
            RowState::Live(row) => Some(row),
            RowState::Tombstone => None,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    stamp: Stamp,
    state: RowState,
}

/// An ordered collection of rows, each identified by a string id and
/// carrying a [`Stamp`]. Ids are unique; deletions are tombstones so they
/// propagate through MIX like any other write.
#[derive(Debug)]
pub struct ColumnTable {
    name: String,
    local: LocalClock,
    rows: HashMap<String, StoredRow>,
}

impl ColumnTable {
    pub fn new(name: impl Into<String>, owner: Owner) -> Self {
        ColumnTable {
            name: name.into(),
            local: LocalClock::new(owner),
            rows: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn report_row_count(&self) {
        let live = self.rows.values().filter(|r| matches!(r.state, RowState::Live(_))).count();
        MIX_METRICS
            .column_table_rows
            .with_label_values(&[&self.name])
            .set(live as i64);
    }

    /// Inserts or replaces `id` with a locally-stamped write. Always
    /// accepted since the local owner's clock is strictly increasing, so a
    /// local write always dominates whatever was there before.
    pub fn insert(&mut self, id: impl Into<String>, row: Row) -> Stamp {
        let stamp = self.local.next_stamp();
        let id = id.into();
        self.add(&id, stamp.clone(), RowState::Live(row));
        self.report_row_count();
        stamp
    }

    /// Tombstones `id` with the local owner's next version.
    pub fn remove(&mut self, id: &str) -> Stamp {
        let stamp = self.local.next_stamp();
        self.add(id, stamp.clone(), RowState::Tombstone);
        self.report_row_count();
        stamp
    }

    pub fn get_row(&self, id: &str) -> Option<(Stamp, RowState)> {
        self.rows.get(id).map(|r| (r.stamp.clone(), r.state.clone()))
    }

    pub fn scan(&self) -> impl Iterator<Item = (&str, &Stamp, &RowState)> {
        self.rows.iter().map(|(id, r)| (id.as_str(), &r.stamp, &r.state))
    }

    /// Inserts or replaces `id` with an explicit stamp (spec.md §4.2's
    /// `add`): accepted if there is no existing row for `id`, or if `stamp`
    /// dominates-or-equals the existing row's stamp under
    /// `Stamp::dominates_or_equal`. Used by both local writes (via
    /// `insert`/`remove`, which always dominate) and by any caller
    /// replaying an explicit stamp, e.g. restoring a snapshot. Rejected
    /// silently with no error and no state change — a stale write losing a
    /// race is the expected common case, not a fault. This is a looser
    /// accept rule than the push-mixable `put_diff` below, which requires a
    /// strictly newer stamp rather than merely a dominating one.
    pub fn add(&mut self, id: &str, stamp: Stamp, state: RowState) -> bool {
        if let Some(existing) = self.rows.get(id) {
            if !stamp.dominates_or_equal(&existing.stamp) {
                return false;
            }
        }
        self.rows.insert(id.to_string(), StoredRow { stamp, state });
        true
    }

    /// Rows whose stamp version exceeds `clock[stamp.owner]`, ordered by
    /// `(owner, version)` so diffs are deterministic for tests.
    pub fn get_diff(&self, clock: &VersionClock) -> Vec<(String, Stamp, RowState)> {
        let mut out: Vec<(String, Stamp, RowState)> = self
            .rows
            .iter()
            .filter(|(_, r)| clock.is_new(&r.stamp.owner, r.stamp.version))
            .map(|(id, r)| (id.clone(), r.stamp.clone(), r.state.clone()))
            .collect();
        out.sort_by(|a, b| (a.1.owner.as_bytes(), a.1.version).cmp(&(b.1.owner.as_bytes(), b.1.version)));
        out
    }

    /// Applies each row under the push-mixable accept rule: accept iff the
    /// incoming stamp strictly dominates the currently-installed stamp for
    /// the same id. Returns the set of owners whose max version actually
    /// advanced.
    pub fn put_diff(&mut self, rows: Vec<(String, Stamp, RowState)>) -> HashSet<Owner> {
        let mut advanced = HashSet::new();
        for (id, stamp, state) in rows {
            let accept = match self.rows.get(&id) {
                Some(existing) => stamp.strictly_newer_than(&existing.stamp),
                None => true,
            };
            if accept {
                advanced.insert(stamp.owner.clone());
                self.rows.insert(id, StoredRow { stamp, state });
            }
        }
        self.report_row_count();
        advanced
    }

    pub fn get_all_row_ids(&self) -> Vec<String> {
        self.rows.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.report_row_count();
    }
}

/// Wraps a [`ColumnTable`] behind a single reader/writer lock and tracks
/// the version clock of what this peer has pulled so far, so
/// `get_argument` can hand it to a remote `pull`. This is the push-mixable
/// facade; `ColumnTable` itself is the plain row store underneath it.
pub struct MixableColumnTable {
    table: parking_lot::RwLock<ColumnTable>,
    vc: parking_lot::Mutex<VersionClock>,
}

impl MixableColumnTable {
    pub fn new(table: ColumnTable) -> Self {
        MixableColumnTable {
            table: parking_lot::RwLock::new(table),
            vc: parking_lot::Mutex::new(VersionClock::new()),
        }
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, ColumnTable> {
        self.table.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, ColumnTable> {
        self.table.write()
    }
}

impl PushMixable for MixableColumnTable {
    type Diff = Vec<(String, Stamp, RowState)>;

    #[tracing::instrument(skip_all)]
    fn get_argument(&self) -> VersionClock {
        self.vc.lock().clone()
    }

    #[tracing::instrument(skip_all)]
    fn pull(&self, arg: &VersionClock) -> Self::Diff {
        self.table.read().get_diff(arg)
    }

    #[tracing::instrument(skip_all)]
    fn push(&self, diff: Self::Diff) -> Result<()> {
        if diff.iter().any(|(_, stamp, _)| stamp.owner.as_bytes().is_empty()) {
            log::warn!(
                "dropping malformed diff for table `{}`: a row stamp has a zero-length owner",
                self.table.read().name()
            );
            return Err(Error::ArgumentUnmatch("row stamp with empty owner".into()));
        }
        let advanced = self.table.write().put_diff(diff.clone());
        let mut vc = self.vc.lock();
        for (_, stamp, _) in &diff {
            if advanced.contains(&stamp.owner) {
                vc.observe(&stamp.owner, stamp.version);
            }
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

    #[test]
    fn insert_then_get_row_roundtrips() {
        let mut table = ColumnTable::new("t", owner("w1"));
        table.insert("r1", smallvec![Column::Int(1), Column::Str("a".into())]);
        let (stamp, state) = table.get_row("r1").unwrap();
        assert_eq!(stamp.version, Version(0));
        assert_eq!(state.as_row().unwrap()[0], Column::Int(1));
    }

    #[test]
    fn stamp_monotonicity_after_add() {
        let mut table = ColumnTable::new("t", owner("w1"));
        let s0 = table.insert("r1", smallvec![Column::Int(1)]);
        let (observed, _) = table.get_row("r1").unwrap();
        assert!(observed >= s0);
    }

    #[test]
    fn add_with_stale_stamp_is_rejected_silently() {
        let mut table = ColumnTable::new("t", owner("w1"));
        table.insert("r1", smallvec![Column::Int(1)]);
        let (current, _) = table.get_row("r1").unwrap();
        let stale = Stamp::new(owner("w1"), Version::ZERO);
        let accepted = table.add("r1", stale, RowState::Live(smallvec![Column::Int(99)]));
        assert!(!accepted);
        let (stamp_after, state_after) = table.get_row("r1").unwrap();
        assert_eq!(stamp_after, current);
        assert_eq!(state_after.as_row().unwrap()[0], Column::Int(1));
    }

    #[test]
    fn get_diff_is_ordered_by_owner_then_version() {
        let mut table = ColumnTable::new("t", owner("w1"));
        table.insert("a", smallvec![Column::Int(1)]);
        table.insert("b", smallvec![Column::Int(2)]);
        let diff = table.get_diff(&VersionClock::new());
        assert_eq!(diff.len(), 2);
        assert!(diff[0].1 <= diff[1].1);
    }

    #[test]
    fn push_mixable_clock_dominates_sender_after_exchange() {
        let sender = MixableColumnTable::new(ColumnTable::new("t", owner("peerB")));
        sender.write().insert("r1", smallvec![Column::Int(1)]);
        sender.write().insert("r2", smallvec![Column::Int(2)]);

        let receiver = MixableColumnTable::new(ColumnTable::new("t", owner("peerA")));
        let arg = receiver.get_argument();
        let diff = sender.pull(&arg);
        assert_eq!(diff.len(), 2);
        receiver.push(diff).unwrap();

        let receiver_clock = receiver.get_argument();
        assert_eq!(receiver_clock.get(&owner("peerB")), Version(1));

        // A second pull with the now-updated clock returns nothing new.
        let arg2 = receiver.get_argument();
        let diff2 = sender.pull(&arg2);
        assert!(diff2.is_empty());
    }

    #[test]
    fn tombstone_removal_propagates_through_diff() {
        let mut table = ColumnTable::new("t", owner("w1"));
        table.insert("r1", smallvec![Column::Int(1)]);
        table.remove("r1");
        let diff = table.get_diff(&VersionClock::new());
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].2, RowState::Tombstone);
    }

    #[test]
    fn idempotent_push_of_same_diff() {
        let receiver = MixableColumnTable::new(ColumnTable::new("t", owner("peerA")));
        let row = vec![(
            "r1".to_string(),
            Stamp::new(owner("peerB"), Version(1)),
            RowState::Live(smallvec![Column::Int(5)]),
        )];
        receiver.push(row.clone()).unwrap();
        receiver.push(row).unwrap();
        let (stamp, state) = receiver.read().get_row("r1").unwrap();
        assert_eq!(stamp.version, Version(1));
        assert_eq!(state.as_row().unwrap()[0], Column::Int(5));
    }
}
