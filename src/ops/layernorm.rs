//! Layer Normalization
//!
//! Normalizes each `(b, t)` vector of length `C` to zero mean and unit
//! variance, then applies a learnable scale and shift:
//!
//! ```text
//! m = mean(x)
//! v = population variance of x
//! s = 1 / √(v + ε),  ε = 1e-5
//! out = (x − m) · s · weight + bias
//! ```
//!
//! The forward pass caches `m` and `s` per position; the backward pass
//! needs them and nothing else from the statistics.
//!
//! ## The Tricky Part: Backward Pass
//!
//! Because the mean and variance depend on every element of the row, the
//! input gradient couples the whole row. With `norm = (x − m) · s` and
//! `dnorm = weight · dout`, two row reductions capture the coupling:
//!
//! ```text
//! dnorm_mean      = mean(dnorm)
//! dnorm_norm_mean = mean(dnorm · norm)
//! dx += s · (dnorm − dnorm_mean − norm · dnorm_norm_mean)
//! ```
//!
//! The first reduction accounts for the mean dependency, the second for
//! the variance dependency.

const EPS: f32 = 1e-5;

/// Forward pass with cached statistics
///
/// - `out`: (B, T, C)
/// - `mean`, `rstd`: (B, T) caches written per position
/// - `inp`: (B, T, C); `weight`, `bias`: (C)
#[allow(clippy::too_many_arguments)]
pub fn layernorm_forward(
    out: &mut [f32],
    mean: &mut [f32],
    rstd: &mut [f32],
    inp: &[f32],
    weight: &[f32],
    bias: &[f32],
    b: usize,
    t: usize,
    c: usize,
) {
    for bt in 0..b * t {
        let x = &inp[bt * c..(bt + 1) * c];

        let mut m = 0.0f32;
        for &xi in x {
            m += xi;
        }
        m /= c as f32;

        // population variance, no bias correction
        let mut v = 0.0f32;
        for &xi in x {
            let xshift = xi - m;
            v += xshift * xshift;
        }
        v /= c as f32;

        let s = 1.0 / (v + EPS).sqrt();

        let out_bt = &mut out[bt * c..(bt + 1) * c];
        for i in 0..c {
            let n = s * (x[i] - m);
            out_bt[i] = n * weight[i] + bias[i];
        }

        mean[bt] = m;
        rstd[bt] = s;
    }
}

/// Backward pass from cached statistics
///
/// Accumulates into `dinp`, `dweight`, `dbias`.
#[allow(clippy::too_many_arguments)]
pub fn layernorm_backward(
    dinp: &mut [f32],
    dweight: &mut [f32],
    dbias: &mut [f32],
    dout: &[f32],
    inp: &[f32],
    weight: &[f32],
    mean: &[f32],
    rstd: &[f32],
    b: usize,
    t: usize,
    c: usize,
) {
    for bt in 0..b * t {
        let dout_bt = &dout[bt * c..(bt + 1) * c];
        let inp_bt = &inp[bt * c..(bt + 1) * c];
        let dinp_bt = &mut dinp[bt * c..(bt + 1) * c];
        let mean_bt = mean[bt];
        let rstd_bt = rstd[bt];

        // two reductions over the row first
        let mut dnorm_mean = 0.0f32;
        let mut dnorm_norm_mean = 0.0f32;
        for i in 0..c {
            let norm = (inp_bt[i] - mean_bt) * rstd_bt;
            let dnorm = weight[i] * dout_bt[i];
            dnorm_mean += dnorm;
            dnorm_norm_mean += dnorm * norm;
        }
        dnorm_mean /= c as f32;
        dnorm_norm_mean /= c as f32;

        // then accumulate all three gradients
        for i in 0..c {
            let norm = (inp_bt[i] - mean_bt) * rstd_bt;
            let dnorm = weight[i] * dout_bt[i];
            dbias[i] += dout_bt[i];
            dweight[i] += norm * dout_bt[i];
            dinp_bt[i] += rstd_bt * (dnorm - dnorm_mean - norm * dnorm_norm_mean);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Rng;

    fn random_vec(rng: &mut Rng, n: usize, scale: f32) -> Vec<f32> {
        (0..n).map(|_| (rng.random_f32() - 0.5) * 2.0 * scale).collect()
    }

    #[test]
    fn test_forward_normalizes_rows() {
        let (b, t, c) = (2, 3, 8);
        let mut rng = Rng::new(42);
        let inp = random_vec(&mut rng, b * t * c, 2.0);
        let weight = vec![1.0; c];
        let bias = vec![0.0; c];
        let mut out = vec![0.0; b * t * c];
        let mut mean = vec![0.0; b * t];
        let mut rstd = vec![0.0; b * t];
        layernorm_forward(&mut out, &mut mean, &mut rstd, &inp, &weight, &bias, b, t, c);

        for bt in 0..b * t {
            let row = &out[bt * c..(bt + 1) * c];
            let m: f32 = row.iter().sum::<f32>() / c as f32;
            let v: f32 = row.iter().map(|x| (x - m) * (x - m)).sum::<f32>() / c as f32;
            assert!(m.abs() < 1e-5, "row {} mean {}", bt, m);
            assert!((v - 1.0).abs() < 1e-3, "row {} var {}", bt, v);
        }
    }

    #[test]
    fn test_cached_statistics_identity() {
        // rstd · √(var + ε) = 1 and Σ(x − mean)/C = 0, per row
        let (b, t, c) = (2, 2, 16);
        let mut rng = Rng::new(7);
        let inp = random_vec(&mut rng, b * t * c, 3.0);
        let weight = random_vec(&mut rng, c, 1.0);
        let bias = random_vec(&mut rng, c, 1.0);
        let mut out = vec![0.0; b * t * c];
        let mut mean = vec![0.0; b * t];
        let mut rstd = vec![0.0; b * t];
        layernorm_forward(&mut out, &mut mean, &mut rstd, &inp, &weight, &bias, b, t, c);

        for bt in 0..b * t {
            let x = &inp[bt * c..(bt + 1) * c];
            let centered_mean: f32 =
                x.iter().map(|xi| xi - mean[bt]).sum::<f32>() / c as f32;
            assert!(centered_mean.abs() < 1e-5);

            let var: f32 = x.iter().map(|xi| (xi - mean[bt]).powi(2)).sum::<f32>() / c as f32;
            assert!((rstd[bt] * (var + EPS).sqrt() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let (b, t, c) = (1, 2, 6);
        let mut rng = Rng::new(1234);
        let inp = random_vec(&mut rng, b * t * c, 1.0);
        let weight = random_vec(&mut rng, c, 1.0);
        let bias = random_vec(&mut rng, c, 0.5);
        // fixed downstream weights make a scalar objective
        let obj = random_vec(&mut rng, b * t * c, 1.0);

        let loss = |inp: &[f32], weight: &[f32], bias: &[f32]| -> f32 {
            let mut out = vec![0.0; b * t * c];
            let mut mean = vec![0.0; b * t];
            let mut rstd = vec![0.0; b * t];
            layernorm_forward(&mut out, &mut mean, &mut rstd, inp, weight, bias, b, t, c);
            out.iter().zip(obj.iter()).map(|(o, w)| o * w).sum()
        };

        let mut out = vec![0.0; b * t * c];
        let mut mean = vec![0.0; b * t];
        let mut rstd = vec![0.0; b * t];
        layernorm_forward(&mut out, &mut mean, &mut rstd, &inp, &weight, &bias, b, t, c);

        let mut dinp = vec![0.0; b * t * c];
        let mut dweight = vec![0.0; c];
        let mut dbias = vec![0.0; c];
        layernorm_backward(
            &mut dinp, &mut dweight, &mut dbias, &obj, &inp, &weight, &mean, &rstd, b, t, c,
        );

        let h = 1e-2f32;
        for i in (0..b * t * c).step_by(3) {
            let mut p = inp.clone();
            let mut m = inp.clone();
            p[i] += h;
            m[i] -= h;
            let numeric = (loss(&p, &weight, &bias) - loss(&m, &weight, &bias)) / (2.0 * h);
            assert!(
                (dinp[i] - numeric).abs() < 2e-2 * numeric.abs().max(1.0),
                "dinp[{}] analytic={} numeric={}",
                i,
                dinp[i],
                numeric
            );
        }
        for i in 0..c {
            let mut p = weight.clone();
            let mut m = weight.clone();
            p[i] += h;
            m[i] -= h;
            let numeric = (loss(&inp, &p, &bias) - loss(&inp, &m, &bias)) / (2.0 * h);
            assert!(
                (dweight[i] - numeric).abs() < 2e-2 * numeric.abs().max(1.0),
                "dweight[{}] analytic={} numeric={}",
                i,
                dweight[i],
                numeric
            );
        }
    }
}
