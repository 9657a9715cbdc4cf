//! Drusilla-Select (C7): greedy selection of `l * m` ids that cover
//! diverse outward directions from the dataset centroid. Grounded in
//! `original_source/drusilla_select.cc`.

use itertools::Itertools;

use crate::consts::{CLOSE_ANGLE, MINREAL};
use crate::error::{AfnError, Result};
use crate::math::ip;

fn argmax(norm: &[f32]) -> usize {
    let mut best = 0;
    let mut best_v = f32::NEG_INFINITY;
    for (i, &v) in norm.iter().enumerate() {
        if v > best_v {
            best_v = v;
            best = i;
        }
    }
    best
}

/// Selects up to `l * m` representative ids (§4.7). Returns fewer than
/// `l * m` if the dataset runs out of distinguishable directions before
/// `l` rounds complete.
pub fn select(vectors: &[&[f32]], l: usize, m: usize) -> Result<Vec<i32>> {
    let n = vectors.len();
    if n == 0 {
        return Err(AfnError::InvalidArgument(
            "cannot run drusilla-select over zero points".to_string(),
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

    let y: Vec<Vec<f32>> = vectors
        .iter()
        .map(|v| v.iter().zip(&centroid).map(|(x, c)| x - c).collect())
        .collect();
    let mut norm: Vec<f32> = y.iter().map(|yi| ip(yi, yi).sqrt()).collect();

    let mut seed = argmax(&norm);
    if norm[seed] <= 0.0 {
        return Err(AfnError::Invariant(
            "drusilla-select: every point coincides with the centroid".to_string(),
        ));
    }

    let mut output = Vec::with_capacity(l * m);

    for _ in 0..l {
        if norm[seed] <= 0.0 {
            break;
        }
        let p: Vec<f32> = y[seed].iter().map(|v| v / norm[seed]).collect();

        let mut scores = vec![0.0f32; n];
        let mut close_angle = vec![false; n];
        for i in 0..n {
            if norm[i] < 0.0 {
                scores[i] = MINREAL;
            } else if norm[i] == 0.0 {
                scores[i] = MINREAL + 1.0;
            } else {
                let offset = ip(&y[i], &p);
                let distortion_vec: Vec<f32> =
                    y[i].iter().zip(&p).map(|(yv, pv)| yv - offset * pv).collect();
                let distortion = ip(&distortion_vec, &distortion_vec).sqrt();
                scores[i] = offset.abs() - distortion;
                close_angle[i] = (distortion / offset.abs()).atan() < CLOSE_ANGLE;
            }
        }

        let order: Vec<usize> = (0..n)
            .sorted_unstable_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap())
            .collect();

        let mut picked_this_round = 0usize;
        for &i in &order {
            if picked_this_round >= m || norm[i] <= 0.0 {
                break;
            }
            output.push(i as i32);
            norm[i] = -1.0;
            picked_this_round += 1;
        }

        // Suppress near-collinear directions so the next seed search
        // doesn't just re-discover the same outward direction.
        for i in 0..n {
            if close_angle[i] && norm[i] != -1.0 {
                norm[i] = 0.0;
            }
        }

        seed = argmax(&norm);
    }

    Ok(output)
}
