//! ML-RQALSH (C9): radius-stratified multi-level decomposition. Objects
//! are bucketed into blocks by distance from the dataset centroid; each
//! large-enough block gets its own RQALSH sub-index, and queries prune
//! whole blocks using the triangle inequality (§4.9).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::{LAMBDA, MAX_BLOCK_NUM, N_THRESHOLD};
use crate::context::QueryContext;
use crate::error::{AfnError, Result};
use crate::linear_scan::linear_scan_subset;
use crate::math::l2;
use crate::rqalsh::Rqalsh;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Block {
    ids: Vec<i32>,
    /// `d_{π[start]}`, the largest centroid-distance in this block — every
    /// member lies within this radius of the centroid.
    radius: f32,
    index: Option<Rqalsh>,
}

/// Blocks ordered largest-radius-first, plus the dataset centroid and the
/// approximation ratio queries prune with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlRqalsh {
    blocks: Vec<Block>,
    centroid: Vec<f32>,
    ratio: f32,
}

impl MlRqalsh {
    pub fn build<R: Rng>(vectors: &[&[f32]], ratio: f32, rng: &mut R) -> Result<Self> {
        let n = vectors.len();
        if n == 0 {
            return Err(AfnError::InvalidArgument(
                "cannot build ML-RQALSH over zero points".to_string(),
            ));
        }
        let d = vectors[0].len();

        let mut centroid = vec![0.0f32; d];
        for v in vectors {
            for (c, &x) in centroid.iter_mut().zip(*v) {
                *c += x;
            }
        }
        for c in &mut centroid {
            *c /= n as f32;
        }

        let dists: Vec<f32> = vectors.iter().map(|v| l2(v, &centroid)).collect();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| dists[b].partial_cmp(&dists[a]).unwrap());

        let mut blocks = Vec::new();
        let mut start = 0usize;
        while start < n {
            let r0 = dists[order[start]];
            let mut end = start + 1;
            while end < n && end - start < MAX_BLOCK_NUM && dists[order[end]] > LAMBDA * r0 {
                end += 1;
            }
            let ids: Vec<i32> = order[start..end].iter().map(|&i| i as i32).collect();
            let index = if ids.len() > N_THRESHOLD {
                let refs: Vec<&[f32]> = ids.iter().map(|&id| vectors[id as usize]).collect();
                Some(Rqalsh::build(&refs, ids.clone(), ratio, rng)?)
            } else {
                None
            };
            blocks.push(Block {
                ids,
                radius: r0,
                index,
            });
            start = end;
        }

        Ok(Self {
            blocks,
            centroid,
            ratio,
        })
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn block_radii(&self) -> Vec<f32> {
        self.blocks.iter().map(|b| b.radius).collect()
    }

    /// c-k-AFN search (§4.9 Query): walks blocks largest-radius-first,
    /// stopping as soon as the triangle-inequality bound rules out every
    /// remaining block.
    pub fn kfn(&self, vectors: &[&[f32]], query: &[f32], top_k: usize, ctx: &mut QueryContext) {
        let dq = l2(query, &self.centroid);

        for block in &self.blocks {
            let r = ctx.heap.min_key();
            if r > (block.radius + dq) / self.ratio {
                break;
            }

            match &block.index {
                Some(rq) => {
                    let r_min = if r.is_finite() { r } else { 0.0 };
                    for (id, _freq) in rq.kfn_ranged(query, top_k, r_min) {
                        let dist = l2(vectors[id as usize], query);
                        ctx.heap.insert(dist, id);
                        ctx.dist_count += 1;
                    }
                }
                None => linear_scan_subset(vectors, &block.ids, query, ctx),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::Rng as _;
    use rand::SeedableRng;

    /// Three well-separated radius shells plus one far outlier, so the
    /// block partition is forced to produce more than one block.
    fn shelled_dataset() -> (Vec<Vec<f32>>, usize) {
        let mut rng = StdRng::seed_from_u64(33);
        let mut data = Vec::new();
        for _ in 0..150 {
            data.push(vec![rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)]);
        }
        for _ in 0..150 {
            let t: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
            data.push(vec![10.0 * t.cos(), 10.0 * t.sin()]);
        }
        data.push(vec![200.0, 0.0]);
        let outlier_id = data.len() - 1;
        (data, outlier_id)
    }

    #[test]
    fn builds_more_than_one_block_on_shelled_data() {
        let (data, _) = shelled_dataset();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut rng = StdRng::seed_from_u64(crate::consts::MAGIC_SEED);
        let ml = MlRqalsh::build(&refs, 2.0, &mut rng).unwrap();

        assert!(ml.block_count() >= 2);
        let radii = ml.block_radii();
        assert!(radii.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn finds_the_true_furthest_neighbor() {
        let (data, outlier_id) = shelled_dataset();
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut rng = StdRng::seed_from_u64(crate::consts::MAGIC_SEED);
        let ml = MlRqalsh::build(&refs, 2.0, &mut rng).unwrap();

        let query = vec![0.0f32, 0.0];
        let mut ctx = QueryContext::new(1);
        ml.kfn(&refs, &query, 1, &mut ctx);

        assert_eq!(ctx.heap.ith(0).unwrap().id as usize, outlier_id);
    }
}
