//! Linear scan (C11): brute-force baseline and the fallback search used by
//! RQALSH\* and ML-RQALSH below their indexing threshold. Grounded in
//! `original_source/util.cc`'s `k_fn_search`.

use crate::context::QueryContext;
use crate::math::l2;

/// Scans every vector in `vectors`, inserting its true distance to `query`
/// into `ctx.heap`.
pub fn linear_scan(vectors: &[&[f32]], query: &[f32], ctx: &mut QueryContext) {
    for (id, v) in vectors.iter().enumerate() {
        let dist = l2(v, query);
        ctx.heap.insert(dist, id as i32);
        ctx.dist_count += 1;
    }
}

/// Scans only the given global `ids` (used by RQALSH\*/ML-RQALSH fallback
/// paths, where `vectors` indexes the whole dataset but only a subset of
/// ids is in scope).
pub fn linear_scan_subset(vectors: &[&[f32]], ids: &[i32], query: &[f32], ctx: &mut QueryContext) {
    for &id in ids {
        let dist = l2(vectors[id as usize], query);
        ctx.heap.insert(dist, id);
        ctx.dist_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_furthest_point() {
        let data = vec![
            vec![0.0f32, 0.0],
            vec![1.0, 0.0],
            vec![5.0, 0.0],
            vec![2.0, 2.0],
        ];
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut ctx = QueryContext::new(1);
        linear_scan(&refs, &[0.0, 0.0], &mut ctx);

        assert_eq!(ctx.heap.ith(0).unwrap().id, 2);
        assert_eq!(ctx.dist_count, 4);
    }

    #[test]
    fn subset_scan_only_touches_given_ids() {
        let data = vec![
            vec![0.0f32, 0.0],
            vec![1.0, 0.0],
            vec![5.0, 0.0],
            vec![2.0, 2.0],
        ];
        let refs: Vec<&[f32]> = data.iter().map(|v| v.as_slice()).collect();
        let mut ctx = QueryContext::new(1);
        linear_scan_subset(&refs, &[1, 3], &[0.0, 0.0], &mut ctx);

        assert_eq!(ctx.dist_count, 2);
        assert_eq!(ctx.heap.ith(0).unwrap().id, 3);
    }
}
