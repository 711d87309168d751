//! The LSH code: a vector of hash values (length `hash_num * table_num`)
//! derived from a linear projection of a sparse feature vector, plus the
//! norm of the original vector (Euclidean LSH needs both to reconstruct an
//! approximate distance).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LshCode(pub Vec<f32>);

impl LshCode {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_nan(&self) -> bool {
        self.0.iter().any(|v| v.is_nan())
    }

    /// Sums `value * projection(hash(feature_name))` across nonzero
    /// features, then divides by `bin_width` — `euclid_lsh::calculate_lsh`.
    pub fn compute(
        sfv: &[(String, f64)],
        code_len: usize,
        bin_width: f32,
        projection: &super::projection::ProjectionCache,
    ) -> LshCode {
        let mut hash = vec![0f32; code_len];
        for (name, value) in sfv {
            let seed = super::projection::seed_for_feature(name);
            let proj = projection.get(seed, code_len);
            for (h, p) in hash.iter_mut().zip(proj.iter()) {
                *h += (*value as f32) * p;
            }
        }
        for h in hash.iter_mut() {
            *h /= bin_width;
        }
        LshCode(hash)
    }

    /// The bucket signature for table `t`: the integer part of each
    /// dimension in `hash[t*hash_num .. (t+1)*hash_num]`.
    pub fn bucket_signature(&self, table: usize, hash_num: usize) -> Vec<i32> {
        self.0[table * hash_num..(table + 1) * hash_num]
            .iter()
            .map(|v| v.floor() as i32)
            .collect()
    }

    /// Fractional distance of each dimension in table `t` to its nearer bin
    /// boundary, signed: negative means the nearer boundary is below
    /// (perturb -1), positive means above (perturb +1). Used to rank
    /// multi-probe candidates by proximity to a boundary.
    pub fn boundary_offsets(&self, table: usize, hash_num: usize) -> Vec<f32> {
        self.0[table * hash_num..(table + 1) * hash_num]
            .iter()
            .map(|v| v - v.floor() - 0.5)
            .collect()
    }
}

/// `‖sfv‖` (not squared): `euclid_lsh.cpp::calc_norm`.
pub fn calc_norm(sfv: &[(String, f64)]) -> f32 {
    let sq: f64 = sfv.iter().map(|(_, v)| v * v).sum();
    (sq as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::lsh::projection::ProjectionCache;

    #[test]
    fn bucket_signature_is_integer_parts() {
        let code = LshCode(vec![1.2, 1.8, -0.3, 2.0]);
        assert_eq!(code.bucket_signature(0, 2), vec![1, 1]);
        assert_eq!(code.bucket_signature(1, 2), vec![-1, 2]);
    }

    #[test]
    fn compute_is_deterministic() {
        let projection = ProjectionCache::new(false);
        let sfv = vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)];
        let c1 = LshCode::compute(&sfv, 8, 100.0, &projection);
        let c2 = LshCode::compute(&sfv, 8, 100.0, &projection);
        assert_eq!(c1, c2);
    }

    #[test]
    fn calc_norm_matches_euclidean_length() {
        let sfv = vec![("a".to_string(), 3.0), ("b".to_string(), 4.0)];
        assert_eq!(calc_norm(&sfv), 5.0);
    }
}
