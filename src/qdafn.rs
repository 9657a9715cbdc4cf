//! QDAFN (C6): `l` random projections, each keeping only the `m` objects
//! with the most extreme projected value. Queried by a k-way merge over
//! the `l` per-projection sequences, always advancing whichever
//! projection's current head looks most promising for the live query.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::context::QueryContext;
use crate::error::{AfnError, Result};
use crate::heap::FnResult;
use crate::math::{ip, l2};

/// `l = 2 * ceil(n^(1/c^2))` (§4.6), used when the caller passes `l = 0`.
#[must_use]
pub fn recommended_l(n: usize, ratio: f32) -> usize {
    let n = n.max(1) as f32;
    (2.0 * n.powf(1.0 / (ratio * ratio)).ceil()) as usize
}

/// `m = 1 + ceil(e^2 * l * (ln n)^(c^2/2 - 1/3))` (§4.6), used when the
/// caller passes `m = 0`.
#[must_use]
pub fn recommended_m(n: usize, l: usize, ratio: f32) -> usize {
    let n = n.max(2) as f32; // ln(1) == 0 would zero out the whole term
    let e2 = std::f32::consts::E.powi(2);
    let exponent = ratio * ratio / 2.0 - 1.0 / 3.0;
    1 + (e2 * l as f32 * n.ln().powf(exponent)).ceil() as usize
}

/// `l` tables of up to `m` entries each, sorted descending by `|key|`
/// (most extreme-from-center first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qdafn {
    pub d: usize,
    pub n: usize,
    pub l: usize,
    pub m: usize,
    proj: Vec<Vec<f32>>,
    tables: Vec<Vec<FnResult>>,
}

impl Qdafn {
    /// Builds over the whole dataset. `l = 0` or `m = 0` select the
    /// recommended defaults for `ratio`.
    pub fn build<R: Rng>(
        vectors: &[&[f32]],
        l: usize,
        m: usize,
        ratio: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let n = vectors.len();
        if n == 0 {
            return Err(AfnError::InvalidArgument(
                "cannot build QDAFN over zero points".to_string(),
            ));
        }
        let d = vectors[0].len();
        let l = if l == 0 { recommended_l(n, ratio) } else { l };
        let m = if m == 0 {
            recommended_m(n, l, ratio)
        } else {
            m
        };
        if l == 0 || m == 0 {
            return Err(AfnError::Config(format!(
                "derived non-positive QDAFN parameters (l={l}, m={m})"
            )));
        }

        let scale = 1.0 / (d as f32).sqrt();
        let proj: Vec<Vec<f32>> = (0..l)
            .map(|_| {
                (0..d)
                    .map(|_| crate::math::gaussian(0.0, 1.0, rng) * scale)
                    .collect()
            })
            .collect();

        // Table j only depends on proj[j]; parallel across tables is safe
        // since none of this touches the build RNG.
        let tables: Vec<Vec<FnResult>> = proj
            .par_iter()
            .map(|a| {
                let mut rows: Vec<FnResult> = vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| FnResult::new(ip(a, v), i as i32))
                    .collect();
                rows.sort_by(|x, y| y.key.abs().partial_cmp(&x.key.abs()).unwrap());
                rows.truncate(m);
                rows
            })
            .collect();

        Ok(Self {
            d,
            n,
            l,
            m,
            proj,
            tables,
        })
    }

    /// c-k-AFN search (§4.6 Query): pops up to `min(m + top_k, n)` heads
    /// from the merged per-projection sequences, inserting each first-seen
    /// id's true distance into `ctx.heap`.
    pub fn kfn(&self, vectors: &[&[f32]], query: &[f32], top_k: usize, ctx: &mut QueryContext) {
        let q_val: Vec<f32> = self.proj.iter().map(|a| ip(a, query)).collect();
        let mut next = vec![0usize; self.tables.len()];
        let mut seen = vec![false; self.n];
        let budget = (self.m + top_k).min(self.n);

        for _ in 0..budget {
            let mut best_j = None;
            let mut best_diff = f32::NEG_INFINITY;
            for (j, table) in self.tables.iter().enumerate() {
                if let Some(entry) = table.get(next[j]) {
                    let diff = (entry.key - q_val[j]).abs();
                    if diff > best_diff {
                        best_diff = diff;
                        best_j = Some(j);
                    }
                }
            }
            let Some(j) = best_j else { break };
            let entry = self.tables[j][next[j]];
            next[j] += 1;

            let id = entry.id as usize;
            if !seen[id] {
                seen[id] = true;
                let dist = l2(vectors[id], query);
                ctx.heap.insert(dist, entry.id);
                ctx.dist_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn clustered_dataset_with_outlier() -> (Vec<Vec<f32>>, usize) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut data: Vec<Vec<f32>> = (0..299)
            .map(|_| (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        data.push(vec![40.0, -40.0, 40.0, -40.0]);
        let outlier_id = data.len() - 1;
        (data, outlier_id)
    }

    #[test]
    fn recommended_defaults_are_positive() {
        assert!(recommended_l(10_000, 2.0) > 0);
        let l = recommended_l(10_000, 2.0);
        assert!(recommended_m(10_000, l, 2.0) > 0);
    }

    #[test]
    fn tables_never_exceed_m_entries() {
        let (data, _) = clustered_dataset_with_outlier();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut rng = StdRng::seed_from_u64(crate::consts::MAGIC_SEED);
        let q = Qdafn::build(&refs, 8, 20, 2.0, &mut rng).unwrap();
        assert!(q.tables.iter().all(|t| t.len() <= 20));
    }

    #[test]
    fn finds_the_planted_outlier() {
        let (data, outlier_id) = clustered_dataset_with_outlier();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut rng = StdRng::seed_from_u64(crate::consts::MAGIC_SEED);
        let q = Qdafn::build(&refs, 8, 20, 2.0, &mut rng).unwrap();

        let query = vec![0.0f32, 0.0, 0.0, 0.0];
        let mut ctx = QueryContext::new(1);
        q.kfn(&refs, &query, 1, &mut ctx);

        assert_eq!(ctx.heap.ith(0).unwrap().id as usize, outlier_id);
    }
}
