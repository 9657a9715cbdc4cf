//! RQALSH core (C5): reverse query-aware LSH. `m` random-projection hash
//! tables sorted by key, searched with dynamic collision counting and
//! two-sided bucket expansion under radius contraction. Grounded in
//! `original_source/rqalsh.{h,cc}`; this is the hardest and most
//! instructive subsystem in the crate (§1).

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{CANDIDATES, DELTA, SCAN_SIZE};
use crate::context::QueryContext;
use crate::error::{AfnError, Result};
use crate::heap::FnResult;
use crate::math::{gaussian, ip, l2, new_gaussian_prob};

/// Build-time-derived parameters (§4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RqalshParams {
    pub w: f32,
    pub p1: f32,
    pub p2: f32,
    pub m: usize,
    pub l: usize,
}

/// Derives `(w, p1, p2, m, l)` from the approximation ratio and the size of
/// the (sub-)dataset the index is built over. `n` is the candidate-pool
/// size RQALSH is built over, not necessarily the whole dataset (RQALSH\*
/// builds over its selected candidate set). Uses the default `β·n = CANDIDATES`,
/// `δ = DELTA`; see `derive_params_with` for the `-beta`/`-delta` override path.
pub fn derive_params(ratio: f32, n: usize) -> Result<RqalshParams> {
    derive_params_with(ratio, n, None, None)
}

/// As `derive_params`, but lets the caller override the `β·n` candidate
/// quota and the false-positive target `δ` (§6's `-beta`/`-delta` flags),
/// falling back to `CANDIDATES`/`DELTA` when `None`.
pub fn derive_params_with(
    ratio: f32,
    n: usize,
    beta_n: Option<usize>,
    delta: Option<f32>,
) -> Result<RqalshParams> {
    if ratio <= 1.0 {
        return Err(AfnError::InvalidArgument(format!(
            "approximation ratio must be > 1, got {ratio}"
        )));
    }
    if n == 0 {
        return Err(AfnError::InvalidArgument(
            "cannot build RQALSH over zero points".to_string(),
        ));
    }

    let w = (8.0 * ratio.ln() / (ratio * ratio - 1.0)).sqrt();
    let p1 = new_gaussian_prob(w / 2.0);
    let p2 = new_gaussian_prob(w / (2.0 * ratio));

    // beta = (beta_n or CANDIDATES)/n is meant to be a small false-positive
    // target; on datasets smaller than beta_n it can exceed 1, which would
    // send ln(2/beta) negative. Clamp it so tiny (e.g. toy/test) datasets
    // still derive real-valued, if looser, parameters instead of NaN.
    let beta_n = beta_n.unwrap_or(CANDIDATES) as f32;
    let beta = (beta_n / n as f32).min(2.0);
    let delta = delta.unwrap_or(DELTA);
    let a = (2.0f32 / beta).ln().sqrt();
    let b = (1.0f32 / delta).ln().sqrt();

    let denom = 2.0 * (p1 - p2) * (p1 - p2);
    if !(denom > 0.0) {
        return Err(AfnError::Config(
            "collision probabilities p1 <= p2: cannot derive a positive table count".to_string(),
        ));
    }

    let alpha = (a * p1 + b * p2) / (a + b);
    let m = (((a + b) * (a + b)) / denom).ceil() as usize;
    let l = (alpha * m as f32).ceil() as usize;

    if m == 0 || l == 0 {
        return Err(AfnError::Config(format!(
            "derived non-positive table parameters (m={m}, l={l})"
        )));
    }

    Ok(RqalshParams { w, p1, p2, m, l })
}

/// `m` random-projection hash tables over a set of `n` vectors addressed by
/// local id `[0, n)`. `index` maps a local id to the global dataset id
/// reported to callers (identity when built over the whole dataset;
/// non-identity when built over a candidate subset, as in RQALSH\*).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rqalsh {
    pub n: usize,
    pub d: usize,
    pub ratio: f32,
    pub params: RqalshParams,
    pub index: Vec<i32>,
    proj: Vec<Vec<f32>>,
    tables: Vec<Vec<FnResult>>,
}

impl Rqalsh {
    /// Builds an index over `vectors` (local id order), reporting
    /// `index[local_id]` as the object id on any match. `vectors.len()`
    /// must equal `index.len()`.
    pub fn build<R: Rng>(
        vectors: &[&[f32]],
        index: Vec<i32>,
        ratio: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Self::build_with_params(vectors, index, ratio, None, None, rng)
    }

    /// As `build`, but lets the caller override the `β·n`/`δ` parameter
    /// derivation (§6's `-beta`/`-delta` flags, RQALSH external mode).
    pub fn build_with_params<R: Rng>(
        vectors: &[&[f32]],
        index: Vec<i32>,
        ratio: f32,
        beta_n: Option<usize>,
        delta: Option<f32>,
        rng: &mut R,
    ) -> Result<Self> {
        let n = vectors.len();
        if n != index.len() {
            return Err(AfnError::Invariant(
                "RQALSH::build: vectors and index must have equal length".to_string(),
            ));
        }
        let d = vectors.first().map_or(0, |v| v.len());
        let params = derive_params_with(ratio, n, beta_n, delta)?;

        let proj: Vec<Vec<f32>> = (0..params.m)
            .map(|_| (0..d).map(|_| gaussian(0.0, 1.0, rng)).collect())
            .collect();

        // Table j only depends on proj[j], already drawn in deterministic RNG
        // order above, so building the m tables in parallel doesn't disturb
        // build reproducibility.
        let tables: Vec<Vec<FnResult>> = proj
            .par_iter()
            .map(|a| {
                let mut rows: Vec<FnResult> = vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| FnResult::new(ip(a, v), i as i32))
                    .collect();
                rows.sort_by(|x, y| x.key.partial_cmp(&y.key).unwrap());
                rows
            })
            .collect();

        Ok(Self {
            n,
            d,
            ratio,
            params,
            index,
            proj,
            tables,
        })
    }

    /// Invariant check (§8.1): every table is a sorted permutation of
    /// `[0, n)`.
    #[must_use]
    pub fn tables_well_formed(&self) -> bool {
        self.tables.iter().all(|t| {
            let sorted = t.windows(2).all(|w| w[0].key <= w[1].key);
            let mut ids: Vec<i32> = t.iter().map(|r| r.id).collect();
            ids.sort_unstable();
            sorted && ids == (0..self.n as i32).collect::<Vec<_>>()
        })
    }

    fn hash_query(&self, query: &[f32]) -> Vec<f32> {
        self.proj.iter().map(|a| ip(a, query)).collect()
    }

    fn initial_radius(&self, q_val: &[f32]) -> f32 {
        let mut diffs = Vec::with_capacity(2 * self.params.m);
        for (j, q) in q_val.iter().enumerate() {
            let table = &self.tables[j];
            if table.len() < 2 {
                continue;
            }
            let lpos = 0usize;
            let rpos = table.len() - 1;
            diffs.push((table[lpos].key - q).abs());
            diffs.push((table[rpos].key - q).abs());
        }
        if diffs.is_empty() {
            return 1.0;
        }
        diffs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = diffs.len() / 2;
        let median = if diffs.len() % 2 == 0 {
            (diffs[mid - 1] + diffs[mid]) / 2.0
        } else {
            diffs[mid]
        };
        let median = median.max(1e-6);
        let kappa = (2.0 * median / self.params.w).log(self.ratio).ceil();
        self.ratio.powf(kappa)
    }

    /// c-k-AFN search (§4.5.3): dynamic collision counting with radius
    /// contraction. Inserts candidates into `ctx.heap`, using `vectors` for
    /// true Euclidean-distance evaluation (same local-id order as build).
    pub fn kfn(&self, vectors: &[&[f32]], query: &[f32], top_k: usize, ctx: &mut QueryContext) {
        let m = self.params.m;
        let l = self.params.l as u32;
        let n = self.n;

        let q_val = self.hash_query(query);
        let mut lpos = vec![0usize; m];
        let mut rpos: Vec<usize> = (0..m).map(|_| n.saturating_sub(1)).collect();
        let mut freq = vec![0u32; n];
        let mut checked = vec![false; n];

        let mut radius = self.initial_radius(&q_val);
        let mut width = radius * self.params.w / 2.0;
        let quota = CANDIDATES + top_k.saturating_sub(1);

        loop {
            let mut bucket_flag = vec![true; m];
            let mut num_done = 0usize;

            while num_done < m && ctx.dist_count < quota {
                for j in 0..m {
                    if !bucket_flag[j] {
                        continue;
                    }
                    let table = &self.tables[j];
                    let qj = q_val[j];

                    let mut steps = 0usize;
                    while steps < SCAN_SIZE
                        && lpos[j] < rpos[j]
                        && (table[lpos[j]].key - qj).abs() >= width
                    {
                        let local = table[lpos[j]].id as usize;
                        freq[local] += 1;
                        if freq[local] == l && !checked[local] {
                            checked[local] = true;
                            let global = self.index[local];
                            let dist = l2(vectors[local], query);
                            ctx.heap.insert(dist, global);
                            ctx.dist_count += 1;
                            if ctx.dist_count >= quota {
                                break;
                            }
                        }
                        lpos[j] += 1;
                        steps += 1;
                    }

                    let mut steps = 0usize;
                    while steps < SCAN_SIZE
                        && lpos[j] < rpos[j]
                        && (table[rpos[j]].key - qj).abs() >= width
                    {
                        let local = table[rpos[j]].id as usize;
                        freq[local] += 1;
                        if freq[local] == l && !checked[local] {
                            checked[local] = true;
                            let global = self.index[local];
                            let dist = l2(vectors[local], query);
                            ctx.heap.insert(dist, global);
                            ctx.dist_count += 1;
                            if ctx.dist_count >= quota {
                                break;
                            }
                        }
                        if rpos[j] == 0 {
                            break;
                        }
                        rpos[j] -= 1;
                        steps += 1;
                    }

                    let (ldist, rdist) = if lpos[j] <= rpos[j] && !table.is_empty() {
                        (
                            (table[lpos[j]].key - qj).abs(),
                            (table[rpos[j]].key - qj).abs(),
                        )
                    } else {
                        (0.0, 0.0)
                    };
                    if lpos[j] >= rpos[j] || ldist.max(rdist) < width {
                        bucket_flag[j] = false;
                        num_done += 1;
                    }

                    if num_done >= m || ctx.dist_count >= quota {
                        break;
                    }
                }
            }

            let all_scanned_out = (0..m).all(|j| lpos[j] >= rpos[j]);

            if ctx.heap.min_key() > radius / self.ratio && ctx.dist_count >= top_k {
                break; // success
            }
            if ctx.dist_count >= quota {
                break; // quota
            }
            if all_scanned_out {
                break; // exhaustion
            }

            radius /= self.ratio;
            width = radius * self.params.w / 2.0;
        }
    }

    /// Ranged variant (§4.5.4), used by ML-RQALSH: runs the same dynamic
    /// collision counting but never computes a true distance itself. It
    /// terminates once every table's projected gap has fallen below
    /// `range_width = r_min * w / 2` (a fixed, non-contracting threshold —
    /// once a table crosses this, its cursor only keeps moving towards
    /// `query`'s own projection, so the flag never needs to reopen).
    /// Returns `(global_id, freq)` collision certificates; the caller
    /// computes the true distance.
    pub fn kfn_ranged(&self, query: &[f32], top_k: usize, r_min: f32) -> Vec<(i32, u32)> {
        let m = self.params.m;
        let l = self.params.l as u32;
        let n = self.n;

        let q_val = self.hash_query(query);
        let mut lpos = vec![0usize; m];
        let mut rpos: Vec<usize> = (0..m).map(|_| n.saturating_sub(1)).collect();
        let mut freq = vec![0u32; n];
        let mut checked = vec![false; n];
        let mut range_open = vec![true; m];
        let mut certificates = Vec::new();

        let range_width = r_min * self.params.w / 2.0;
        let mut radius = self.initial_radius(&q_val);
        let mut width = radius * self.params.w / 2.0;
        let quota = CANDIDATES + top_k.saturating_sub(1);

        loop {
            let mut bucket_flag = vec![true; m];
            let mut num_done = 0usize;

            while num_done < m && certificates.len() < quota {
                for j in 0..m {
                    if !bucket_flag[j] {
                        continue;
                    }
                    let table = &self.tables[j];
                    let qj = q_val[j];

                    let mut steps = 0usize;
                    while steps < SCAN_SIZE
                        && lpos[j] < rpos[j]
                        && (table[lpos[j]].key - qj).abs() >= width
                    {
                        let local = table[lpos[j]].id as usize;
                        freq[local] += 1;
                        if freq[local] == l && !checked[local] {
                            checked[local] = true;
                            certificates.push((self.index[local], freq[local]));
                        }
                        lpos[j] += 1;
                        steps += 1;
                    }

                    let mut steps = 0usize;
                    while steps < SCAN_SIZE
                        && lpos[j] < rpos[j]
                        && (table[rpos[j]].key - qj).abs() >= width
                    {
                        let local = table[rpos[j]].id as usize;
                        freq[local] += 1;
                        if freq[local] == l && !checked[local] {
                            checked[local] = true;
                            certificates.push((self.index[local], freq[local]));
                        }
                        if rpos[j] == 0 {
                            break;
                        }
                        rpos[j] -= 1;
                        steps += 1;
                    }

                    let (ldist, rdist) = if lpos[j] <= rpos[j] && !table.is_empty() {
                        (
                            (table[lpos[j]].key - qj).abs(),
                            (table[rpos[j]].key - qj).abs(),
                        )
                    } else {
                        (0.0, 0.0)
                    };
                    if ldist < range_width && rdist < range_width {
                        range_open[j] = false;
                    }
                    if lpos[j] >= rpos[j] || ldist.max(rdist) < width {
                        bucket_flag[j] = false;
                        num_done += 1;
                    }

                    if num_done >= m || certificates.len() >= quota {
                        break;
                    }
                }
            }

            let all_scanned_out = (0..m).all(|j| lpos[j] >= rpos[j]);
            if range_open.iter().all(|&open| !open) {
                break;
            }
            if certificates.len() >= quota || all_scanned_out {
                break;
            }

            radius /= self.ratio;
            width = radius * self.params.w / 2.0;
        }

        certificates
    }
}
