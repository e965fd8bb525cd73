//! Matrix Multiplication
//!
//! The hot loop of the whole engine: nearly all training time is spent in
//! these two functions. The convention matches the checkpoint layout:
//! `weight` is stored `(OC, C)` row-major, so row `o` holds the input
//! weights of output channel `o`, and the forward pass is
//!
//! ```text
//! out[b,t,o] = bias[o] + Σ_i inp[b,t,i] · weight[o,i]
//! ```
//!
//! i.e. `out = inp @ weight^T + bias`, with the bias optional (the tied
//! logits projection has none).
//!
//! ## Backward in two passes
//!
//! The backward pass is split into two separately parallelized regions:
//!
//! 1. `dinp[b,t,:] += Σ_o dout[b,t,o] · weight[o,:]`, parallel over the
//!    `(b, t)` rows;
//! 2. `dweight[o,:] += Σ_{b,t} dout[b,t,o] · inp[b,t,:]` and
//!    `dbias[o] += Σ_{b,t} dout[b,t,o]`, parallel over output channels.
//!
//! A single fused loop parallelized over `(b, t)` would race on `dweight`;
//! the split keeps every write disjoint without atomics, so the float
//! accumulation order stays deterministic.

use rayon::prelude::*;

/// Forward: `out(B,T,OC) = inp(B,T,C) @ weight(OC,C)^T + bias(OC)?`
///
/// Overwrites `out`. Parallel over the `B*T` output rows.
#[allow(clippy::too_many_arguments)]
pub fn matmul_forward(
    out: &mut [f32],
    inp: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    _b: usize,
    _t: usize,
    c: usize,
    oc: usize,
) {
    out.par_chunks_mut(oc)
        .zip(inp.par_chunks(c))
        .for_each(|(out_bt, inp_bt)| {
            for o in 0..oc {
                let wrow = &weight[o * c..(o + 1) * c];
                let mut val = match bias {
                    Some(bias) => bias[o],
                    None => 0.0,
                };
                for i in 0..c {
                    val += inp_bt[i] * wrow[i];
                }
                out_bt[o] = val;
            }
        });
}

/// Backward: accumulate `dinp`, `dweight`, and optionally `dbias`
///
/// Two parallel regions, never fused; see the module docs for why.
#[allow(clippy::too_many_arguments)]
pub fn matmul_backward(
    dinp: &mut [f32],
    dweight: &mut [f32],
    dbias: Option<&mut [f32]>,
    dout: &[f32],
    inp: &[f32],
    weight: &[f32],
    b: usize,
    t: usize,
    c: usize,
    oc: usize,
) {
    // pass 1: dinp, parallel over (b, t) rows
    dinp.par_chunks_mut(c)
        .zip(dout.par_chunks(oc))
        .for_each(|(dinp_bt, dout_bt)| {
            for o in 0..oc {
                let wrow = &weight[o * c..(o + 1) * c];
                let d = dout_bt[o];
                for i in 0..c {
                    dinp_bt[i] += wrow[i] * d;
                }
            }
        });

    // pass 2: dweight/dbias, parallel over output channels
    let bt = b * t;
    match dbias {
        Some(dbias) => {
            dweight
                .par_chunks_mut(c)
                .zip(dbias.par_iter_mut())
                .enumerate()
                .for_each(|(o, (dwrow, dbias_o))| {
                    for row in 0..bt {
                        let d = dout[row * oc + o];
                        let inp_bt = &inp[row * c..(row + 1) * c];
                        *dbias_o += d;
                        for i in 0..c {
                            dwrow[i] += inp_bt[i] * d;
                        }
                    }
                });
        }
        None => {
            dweight
                .par_chunks_mut(c)
                .enumerate()
                .for_each(|(o, dwrow)| {
                    for row in 0..bt {
                        let d = dout[row * oc + o];
                        let inp_bt = &inp[row * c..(row + 1) * c];
                        for i in 0..c {
                            dwrow[i] += inp_bt[i] * d;
                        }
                    }
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Rng;

    fn random_vec(rng: &mut Rng, n: usize) -> Vec<f32> {
        (0..n).map(|_| rng.random_f32() - 0.5).collect()
    }

    #[test]
    fn test_forward_against_naive() {
        let (b, t, c, oc) = (2, 3, 4, 5);
        let mut rng = Rng::new(99);
        let inp = random_vec(&mut rng, b * t * c);
        let weight = random_vec(&mut rng, oc * c);
        let bias = random_vec(&mut rng, oc);
        let mut out = vec![0.0; b * t * oc];
        matmul_forward(&mut out, &inp, &weight, Some(&bias), b, t, c, oc);

        for row in 0..b * t {
            for o in 0..oc {
                let mut expect = bias[o];
                for i in 0..c {
                    expect += inp[row * c + i] * weight[o * c + i];
                }
                assert!((out[row * oc + o] - expect).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_forward_without_bias() {
        let (b, t, c, oc) = (1, 2, 3, 2);
        let inp = vec![1.0; b * t * c];
        let weight = vec![0.5; oc * c];
        let mut out = vec![7.0; b * t * oc];
        matmul_forward(&mut out, &inp, &weight, None, b, t, c, oc);
        // 3 inputs * 0.5 each, previous contents overwritten
        assert!(out.iter().all(|&v| (v - 1.5).abs() < 1e-6));
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let (b, t, c, oc) = (2, 2, 3, 4);
        let mut rng = Rng::new(321);
        let inp = random_vec(&mut rng, b * t * c);
        let weight = random_vec(&mut rng, oc * c);
        let bias = random_vec(&mut rng, oc);
        let obj = random_vec(&mut rng, b * t * oc);

        let loss = |inp: &[f32], weight: &[f32], bias: &[f32]| -> f32 {
            let mut out = vec![0.0; b * t * oc];
            matmul_forward(&mut out, inp, weight, Some(bias), b, t, c, oc);
            out.iter().zip(obj.iter()).map(|(o, w)| o * w).sum()
        };

        let mut dinp = vec![0.0; b * t * c];
        let mut dweight = vec![0.0; oc * c];
        let mut dbias = vec![0.0; oc];
        matmul_backward(
            &mut dinp,
            &mut dweight,
            Some(&mut dbias),
            &obj,
            &inp,
            &weight,
            b,
            t,
            c,
            oc,
        );

        let h = 1e-2f32;
        let check = |analytic: f32, numeric: f32, what: &str| {
            assert!(
                (analytic - numeric).abs() < 2e-2 * numeric.abs().max(1.0),
                "{}: analytic={} numeric={}",
                what,
                analytic,
                numeric
            );
        };

        for i in 0..b * t * c {
            let mut p = inp.clone();
            let mut m = inp.clone();
            p[i] += h;
            m[i] -= h;
            check(
                dinp[i],
                (loss(&p, &weight, &bias) - loss(&m, &weight, &bias)) / (2.0 * h),
                "dinp",
            );
        }
        for i in 0..oc * c {
            let mut p = weight.clone();
            let mut m = weight.clone();
            p[i] += h;
            m[i] -= h;
            check(
                dweight[i],
                (loss(&inp, &p, &bias) - loss(&inp, &m, &bias)) / (2.0 * h),
                "dweight",
            );
        }
        for o in 0..oc {
            let mut p = bias.clone();
            let mut m = bias.clone();
            p[o] += h;
            m[o] -= h;
            check(
                dbias[o],
                (loss(&inp, &weight, &p) - loss(&inp, &weight, &m)) / (2.0 * h),
                "dbias",
            );
        }
    }

    #[test]
    fn test_backward_without_bias_leaves_dinp_accumulating() {
        let (b, t, c, oc) = (1, 1, 2, 2);
        let inp = vec![1.0, 2.0];
        let weight = vec![1.0, 0.0, 0.0, 1.0];
        let dout = vec![1.0, 1.0];
        let mut dinp = vec![5.0, 5.0];
        let mut dweight = vec![0.0; 4];
        matmul_backward(
            &mut dinp, &mut dweight, None, &dout, &inp, &weight, b, t, c, oc,
        );
        // identity weight: dinp += dout
        assert_eq!(dinp, [6.0, 6.0]);
        assert_eq!(dweight, [1.0, 2.0, 1.0, 2.0]);
    }
}
