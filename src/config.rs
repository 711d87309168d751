//! Named, validated configuration structs for the LSH and clustering
//! storages.
//!
//! Config structs validate themselves at construction, the way
//! `euclid_lsh`'s config constructor throws `invalid_parameter` before any
//! storage is built. Unrecognized fields are ignored (`serde`'s default
//! behavior when a struct doesn't `deny_unknown_fields`); missing fields
//! take the `Default` impl's values via `#[serde(default)]`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LshConfig {
    pub hash_num: u64,
    pub table_num: u64,
    pub bin_width: f32,
    pub probe_num: u32,
    pub seed: u32,
    pub retain_projection: bool,
}

impl Default for LshConfig {
    fn default() -> Self {
        LshConfig {
            hash_num: 64,
            table_num: 4,
            bin_width: 100.0,
            probe_num: 64,
            seed: 1091,
            retain_projection: false,
        }
    }
}

fn invalid(option: &str, reason: &str) -> Error {
    log::error!("rejecting configuration: `{option}` ({reason})");
    Error::InvalidParameter {
        option: option.to_string(),
        reason: reason.to_string(),
    }
}

impl LshConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hash_num < 1 {
            return Err(invalid("hash_num", "1 <= hash_num"));
        }
        if self.table_num < 1 {
            return Err(invalid("table_num", "1 <= table_num"));
        }
        if !(self.bin_width > 0.0) {
            return Err(invalid("bin_width", "0.0 < bin_width"));
        }
        // probe_num and seed are unsigned, so their lower-bound constraints
        // are automatically satisfied by the type.
        Ok(())
    }

    /// Total dimensionality of a hash code: one float per (hash, table) pair.
    pub fn code_len(&self) -> usize {
        (self.hash_num * self.table_num) as usize
    }
}

/// Representative clustering configuration; not consumed by any storage in
/// this crate, but validated the same way so the configuration layer
/// covers more than just the LSH table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub k: u32,
    pub compressor_method: String,
    pub forgetting_factor: f64,
    pub forgetting_threshold: f64,
    pub seed: u32,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig {
            k: 2,
            compressor_method: "simple".into(),
            forgetting_factor: 2.0,
            forgetting_threshold: 0.05,
            seed: 0,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k < 1 {
            return Err(invalid("k", "1 <= k"));
        }
        if !(self.forgetting_factor > 0.0) {
            return Err(invalid("forgetting_factor", "0.0 < forgetting_factor"));
        }
        if !(0.0..=1.0).contains(&self.forgetting_threshold) {
            return Err(invalid(
                "forgetting_threshold",
                "0.0 <= forgetting_threshold <= 1.0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = LshConfig::default();
        assert_eq!(cfg.hash_num, 64);
        assert_eq!(cfg.table_num, 4);
        assert_eq!(cfg.bin_width, 100.0);
        assert_eq!(cfg.probe_num, 64);
        assert_eq!(cfg.seed, 1091);
        assert!(!cfg.retain_projection);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_zero_bin_width() {
        let mut cfg = LshConfig::default();
        cfg.bin_width = 0.0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { option, .. } if option == "bin_width"));
    }

    #[test]
    fn rejects_zero_hash_num() {
        let mut cfg = LshConfig::default();
        cfg.hash_num = 0;
        assert!(cfg.validate().is_err());
    }
}
