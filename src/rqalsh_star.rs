//! RQALSH\* (C8): Drusilla-Select picks a candidate pool, which is then
//! either indexed with RQALSH or, when too small to be worth indexing,
//! searched directly by linear scan (§4.8).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::N_THRESHOLD;
use crate::context::QueryContext;
use crate::drusilla;
use crate::error::Result;
use crate::linear_scan::linear_scan_subset;
use crate::rqalsh::Rqalsh;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Inner {
    Indexed(Rqalsh),
    LinearScan,
}

/// Candidate ids `C` (global) plus either a sub-RQALSH built over them or a
/// marker to fall back to linear scan, whichever `N = C.len()` against
/// `N_THRESHOLD` selects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RqalshStar {
    candidates: Vec<i32>,
    inner: Inner,
}

impl RqalshStar {
    pub fn build<R: Rng>(
        vectors: &[&[f32]],
        l: usize,
        m: usize,
        ratio: f32,
        rng: &mut R,
    ) -> Result<Self> {
        let candidates = drusilla::select(vectors, l, m)?;
        let inner = if candidates.len() > N_THRESHOLD {
            let refs: Vec<&[f32]> = candidates.iter().map(|&id| vectors[id as usize]).collect();
            Inner::Indexed(Rqalsh::build(&refs, candidates.clone(), ratio, rng)?)
        } else {
            Inner::LinearScan
        };
        Ok(Self { candidates, inner })
    }

    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        matches!(self.inner, Inner::Indexed(_))
    }

    pub fn kfn(&self, vectors: &[&[f32]], query: &[f32], top_k: usize, ctx: &mut QueryContext) {
        match &self.inner {
            Inner::Indexed(rq) => {
                let refs: Vec<&[f32]> =
                    self.candidates.iter().map(|&id| vectors[id as usize]).collect();
                rq.kfn(&refs, query, top_k, ctx);
            }
            Inner::LinearScan => linear_scan_subset(vectors, &self.candidates, query, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::Rng as _;
    use rand::SeedableRng;

    fn clustered_dataset_with_outlier(n_cluster: usize, seed: u64) -> (Vec<Vec<f32>>, usize) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data: Vec<Vec<f32>> = (0..n_cluster)
            .map(|_| (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        data.push(vec![60.0, 60.0, 60.0, 60.0]);
        let outlier_id = data.len() - 1;
        (data, outlier_id)
    }

    #[test]
    fn small_candidate_pool_falls_back_to_linear_scan() {
        let (data, outlier_id) = clustered_dataset_with_outlier(50, 21);
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut rng = StdRng::seed_from_u64(crate::consts::MAGIC_SEED);
        let star = RqalshStar::build(&refs, 2, 2, 2.0, &mut rng).unwrap();

        assert!(!star.is_indexed());
        assert!(star.candidate_count() <= 4);

        let query = vec![0.0f32, 0.0, 0.0, 0.0];
        let mut ctx = QueryContext::new(1);
        star.kfn(&refs, &query, 1, &mut ctx);
        assert_eq!(ctx.heap.ith(0).unwrap().id as usize, outlier_id);
    }

    #[test]
    fn large_candidate_pool_builds_a_sub_index_and_finds_the_outlier() {
        let (data, outlier_id) = clustered_dataset_with_outlier(2000, 22);
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut rng = StdRng::seed_from_u64(crate::consts::MAGIC_SEED);
        let star = RqalshStar::build(&refs, 30, 10, 2.0, &mut rng).unwrap();

        assert!(star.is_indexed());
        assert!(star.candidate_count() > N_THRESHOLD);

        let query = vec![0.0f32, 0.0, 0.0, 0.0];
        let mut ctx = QueryContext::new(1);
        star.kfn(&refs, &query, 1, &mut ctx);
        assert_eq!(ctx.heap.ith(0).unwrap().id as usize, outlier_id);
    }
}
