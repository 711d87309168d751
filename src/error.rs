//! Flat error enumeration for the mixable storage core: a sum type with one
//! variant per failure kind, each carrying its own message, instead of a
//! class hierarchy of exception types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Configuration validation failure; fatal at construction.
    #[error("invalid parameter `{option}`: {reason}")]
    InvalidParameter { option: String, reason: String },

    #[error("length unmatch: expected {expected}, found {found}")]
    LengthUnmatch { expected: usize, found: usize },

    #[error("type unmatch: expected {expected}, found {found}")]
    TypeUnmatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("argument unmatch: {0}")]
    ArgumentUnmatch(String),

    #[error("array range: index {index} out of bounds for length {len}")]
    ArrayRange { index: usize, len: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The proxy could not locate a live backend for a routing decision.
    /// Surfaced to the RPC caller as a transient error; not otherwise
    /// produced by this crate, which has no routing layer, but kept here
    /// because model adapters may be asked to report it upstream.
    #[error("no worker available")]
    NoWorker,

    #[error("storage error: {0}")]
    Storage(String),

    /// Catch-all for failures that don't fit one of the named kinds above,
    /// the way the teacher's `DBError::Other(#[from] anyhow::Error)`
    /// collects everything outside its own named variants.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
