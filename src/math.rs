//! Math kernel (C1): Euclidean distance, inner product, Gaussian sampling
//! and CDF inversion. Grounded in `original_source/random.cc`/`util.cc`.

use rand::Rng;

pub const PI: f32 = std::f32::consts::PI;

/// `√Σ(a_i - b_i)²`
#[must_use]
#[inline]
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    ip_diff_sq(a, b).sqrt()
}

#[inline]
fn ip_diff_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// `Σ a_i · b_i`
#[must_use]
#[inline]
pub fn ip(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Draw from `N(mu, sigma^2)` via Box-Muller. Both uniforms are sampled in
/// `(0, 1]`; `u1 == 0` is rejected so `log(u1)` stays finite.
pub fn gaussian<R: Rng + ?Sized>(mu: f32, sigma: f32, rng: &mut R) -> f32 {
    let mut u1;
    loop {
        u1 = rng.gen::<f32>();
        if u1 > 0.0 {
            break;
        }
    }
    let u2: f32 = rng.gen();
    mu + sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// pdf of `N(0, 1)`.
#[must_use]
#[inline]
pub fn gaussian_pdf(x: f32) -> f32 {
    (-x * x / 2.0).exp() / (2.0 * PI).sqrt()
}

/// cdf of `N(0, 1)` on `(-inf, x]`, via discrete integration with the given
/// step. Build-time only; three-decimal precision suffices.
#[must_use]
pub fn gaussian_cdf(x: f32, step: f32) -> f32 {
    let mut ret = 0.0f32;
    let mut i = -10.0f32;
    while i < x {
        ret += step * gaussian_pdf(i);
        i += step;
    }
    ret
}

/// cdf of `N(0, 1)` on `[-x, x]`.
#[must_use]
pub fn new_gaussian_cdf(x: f32, step: f32) -> f32 {
    let mut ret = 0.0f32;
    let mut i = -x;
    while i <= x {
        ret += step * gaussian_pdf(i);
        i += step;
    }
    ret
}

/// `P(|Z| <= x)` for `Z ~ N(0, 1)`, `x = w / (2r)`. The quantity RQALSH's
/// build-time parameter derivation (`p1`, `p2`) is computed from.
#[must_use]
pub fn new_gaussian_prob(x: f32) -> f32 {
    new_gaussian_cdf(x, 1e-3)
}

/// Query-oblivious collision probability, `x = w / r`. Not used by any
/// index at build time — kept alongside `new_gaussian_prob` because the
/// reference parameter derivation is chosen from this formula family, and
/// it documents that choice.
#[must_use]
pub fn orig_gaussian_prob(x: f32) -> f32 {
    let norm = gaussian_cdf(-x, 1e-3);
    let tmp = 2.0 * (1.0 - (-x * x / 2.0).exp()) / ((2.0 * PI).sqrt() * x);
    1.0 - 2.0 * norm - tmp
}
