//! Mixable storage core for a distributed online-learning worker: version
//! primitives, the two mixing contracts every model binds to, the row and
//! LSH storages that back push-mixable models, the weight manager that
//! backs linear-mixable feature weighting, the in-process portable mixer,
//! and thin adapters binding each learning-model family to one contract.

pub mod config;
pub mod error;
pub mod metrics;
pub mod mixable;
pub mod mixer;
pub mod models;
pub mod storage;
pub mod version;

pub use error::{Error, Result};
pub use mixable::{LinearMixable, PushMixable};
pub use mixer::PortableMixer;
pub use version::{LocalClock, Owner, Stamp, Version, VersionClock};
