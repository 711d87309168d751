//! Identity and monotonicity primitives: [`Owner`], [`Version`], [`VersionClock`]
//! and the [`Stamp`] that ties them to a row.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stable byte string identifying the process that originated a mutation
/// (typically `host:port:pid`). Equality and ordering are bytewise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Owner(Vec<u8>);

impl Owner {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Owner(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Owner {
    fn from(s: &str) -> Self {
        Owner(s.as_bytes().to_vec())
    }
}

impl From<String> for Owner {
    fn from(s: String) -> Self {
        Owner(s.into_bytes())
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// A monotonically non-decreasing 64-bit counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    pub const ZERO: Version = Version(0);

    /// Returns the next version after this one; does not mutate `self`.
    #[must_use]
    pub fn next(self) -> Version {
        Version(self.0 + 1)
    }

    pub fn increment(&mut self) {
        self.0 += 1;
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// A mapping from [`Owner`] to [`Version`], interpreted as the set of
/// updates the holder has already observed. An absent owner reads as
/// [`Version::ZERO`]. Merge is pointwise maximum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionClock(BTreeMap<Owner, Version>);

impl VersionClock {
    pub fn new() -> Self {
        VersionClock(BTreeMap::new())
    }

    /// What this clock has seen for `owner`; `Version::ZERO` if never seen.
    pub fn get(&self, owner: &Owner) -> Version {
        self.0.get(owner).copied().unwrap_or(Version::ZERO)
    }

    pub fn observe(&mut self, owner: &Owner, version: Version) {
        let entry = self.0.entry(owner.clone()).or_insert(Version::ZERO);
        if version > *entry {
            *entry = version;
        }
    }

    /// Pointwise maximum merge of two clocks.
    pub fn merge(&mut self, other: &VersionClock) {
        for (owner, version) in &other.0 {
            self.observe(owner, *version);
        }
    }

    /// `true` if a row stamped with `version` from `owner` is not yet
    /// reflected in this clock: either `owner` has never been observed, or
    /// its observed version for `owner` is strictly less than `version`.
    ///
    /// Distinct from `get`, which collapses "never observed" into
    /// `Version::ZERO` — a row's very first version is also `Version::ZERO`,
    /// so a plain `version > get(owner)` comparison would silently exclude
    /// every owner's first-ever write from any diff, forever.
    pub fn is_new(&self, owner: &Owner, version: Version) -> bool {
        match self.0.get(owner) {
            Some(&seen) => version > seen,
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Owner, &Version)> {
        self.0.iter()
    }
}

/// A (owner, version) pair attached to every row, driving last-writer-wins
/// resolution. Ordering is the tuple order `(owner bytes, version)`: a
/// stamp from a lexicographically-greater owner always wins a compare, and
/// within the same owner the strictly higher version wins. This total
/// order is used uniformly by the column table's replace guard and by the
/// push-mixable accept rule, since the latter reduces to a plain version
/// compare when owners match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub owner: Owner,
    pub version: Version,
}

impl Stamp {
    pub fn new(owner: Owner, version: Version) -> Self {
        Stamp { owner, version }
    }

    /// `true` if `self` may replace `other` under the column table's
    /// replace guard: `self >= other` under `(owner, version)` tuple order.
    pub fn dominates_or_equal(&self, other: &Stamp) -> bool {
        self.cmp_key() >= other.cmp_key()
    }

    /// `true` if `self` is strictly newer than `other` under the same
    /// tuple order; used by the push-mixable accept rule.
    pub fn strictly_newer_than(&self, other: &Stamp) -> bool {
        self.cmp_key() > other.cmp_key()
    }

    fn cmp_key(&self) -> (&[u8], Version) {
        (self.owner.as_bytes(), self.version)
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_key().cmp(&other.cmp_key())
    }
}

/// Issues locally-originated stamps in strictly increasing version order
/// for one [`Owner`]. Every mixable storage embeds one of these to stamp
/// its own writes.
#[derive(Debug)]
pub struct LocalClock {
    owner: Owner,
    next: parking_lot::Mutex<Version>,
}

impl LocalClock {
    pub fn new(owner: Owner) -> Self {
        LocalClock {
            owner,
            next: parking_lot::Mutex::new(Version::ZERO),
        }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Allocates the next stamp for a local write.
    pub fn next_stamp(&self) -> Stamp {
        let mut next = self.next.lock();
        let version = *next;
        *next = version.next();
        Stamp::new(self.owner.clone(), version)
    }

    pub fn current(&self) -> Version {
        *self.next.lock()
    }
}
