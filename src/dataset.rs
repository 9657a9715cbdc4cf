//! Data model (§3): an immutable set of `d`-dimensional `f32` vectors with
//! stable ids in `[0, n)`. Mirrors the teacher's `SparseDataset`, minus the
//! sparse/compressed storage — c-k-AFN operates over dense vectors.

use crate::error::{AfnError, Result};
use crate::space_usage::SpaceUsage;

/// An immutable, dense in-memory dataset: `n` vectors of `d` `f32`s each,
/// stored row-major in one contiguous buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    n: usize,
    d: usize,
    data: Vec<f32>,
}

impl Dataset {
    /// Builds a dataset from a flat, row-major buffer of `n * d` values.
    pub fn from_flat(n: usize, d: usize, data: Vec<f32>) -> Result<Self> {
        if n == 0 || d == 0 {
            return Err(AfnError::InvalidArgument(format!(
                "dataset must have n > 0 and d > 0, got n={n} d={d}"
            )));
        }
        if data.len() != n * d {
            return Err(AfnError::InvalidArgument(format!(
                "expected {} values for n={n} d={d}, got {}",
                n * d,
                data.len()
            )));
        }
        Ok(Self { n, d, data })
    }

    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn d(&self) -> usize {
        self.d
    }

    #[must_use]
    pub fn vector(&self, id: usize) -> &[f32] {
        let start = id * self.d;
        &self.data[start..start + self.d]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.d)
    }

    #[must_use]
    pub fn centroid(&self) -> Vec<f32> {
        let mut c = vec![0.0f32; self.d];
        for v in self.iter() {
            for (ci, vi) in c.iter_mut().zip(v) {
                *ci += vi;
            }
        }
        for ci in &mut c {
            *ci /= self.n as f32;
        }
        c
    }
}

impl SpaceUsage for Dataset {
    fn space_usage_byte(&self) -> usize {
        std::mem::size_of::<Self>() + self.data.len() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_length() {
        assert!(Dataset::from_flat(2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn rejects_zero_n_or_d() {
        assert!(Dataset::from_flat(0, 3, vec![]).is_err());
        assert!(Dataset::from_flat(3, 0, vec![]).is_err());
    }

    #[test]
    fn vector_and_centroid() {
        let ds = Dataset::from_flat(2, 2, vec![0.0, 0.0, 2.0, 4.0]).unwrap();
        assert_eq!(ds.vector(0), &[0.0, 0.0]);
        assert_eq!(ds.vector(1), &[2.0, 4.0]);
        assert_eq!(ds.centroid(), vec![1.0, 2.0]);
    }
}
