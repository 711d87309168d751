//! The two mixing contracts every model binds to.
//!
//! A reference implementation organizes mixables as abstract base classes
//! (`linear_mixable`, `push_mixable`) with concrete subclasses dispatched
//! dynamically. Here that becomes two plain traits instead: a model value
//! declares which capability set it satisfies by implementing the
//! matching trait, with no dynamic-dispatch base class to extend.

use crate::error::Result;
use crate::version::VersionClock;

/// Symmetric merge, for state that is pointwise additive or idempotent.
///
/// Implementors must make `mix` commutative and associative so that, after
/// a round where every peer runs `get_diff` → all-mix → `put_diff`, every
/// peer's installed state agrees up to `mix`'s equivalence class (modulo
/// concurrent writers whose diffs land in a later round).
pub trait LinearMixable {
    type Diff;

    /// The diff accumulated locally since the last `put_diff`.
    fn get_diff(&self) -> Self::Diff;

    /// Combine two peer diffs in place: `a` is read-only, `b` is the
    /// accumulator that ends up holding the merged result.
    fn mix(&self, a: &Self::Diff, b: &mut Self::Diff);

    /// Installs the merged diff, resetting the local accumulator on
    /// success. Returns `false` (and leaves the model untouched) if the
    /// diff is rejected, e.g. because its version is not newer than what's
    /// installed.
    fn put_diff(&self, diff: Self::Diff) -> Result<bool>;
}

/// Asymmetric pull-push, for state where the full authoritative set lives
/// across peers and each peer caches only part of it.
///
/// After an exchange, the receiver's local version clock must dominate the
/// sender's at every owner whose rows were actually transmitted.
pub trait PushMixable {
    type Diff;

    /// What this peer already knows, to hand to a remote `pull`.
    fn get_argument(&self) -> VersionClock;

    /// Rows this peer has that are newer than what `arg` reports.
    fn pull(&self, arg: &VersionClock) -> Self::Diff;

    /// Installs `diff`, accepting each row iff its stamp is strictly newer
    /// than the currently-installed stamp for the same id, then advances
    /// the local version clock for the owners actually applied.
    fn push(&self, diff: Self::Diff) -> Result<()>;
}
