//! Causal Multi-Head Attention
//!
//! Operates directly on the fused QKV projection: `inp` is `(B, T, 3C)`
//! with Q, K, V concatenated along the channel axis, and head `h` of each
//! occupying channels `[h·hs, (h+1)·hs)` where `hs = C / NH`.
//!
//! For each `(b, t, h)` the forward pass:
//!
//! 1. scores keys at positions `t2 ≤ t`: `preatt = (q · k) / √hs`,
//!    tracking the running max;
//! 2. exponentiates with the max shifted out and sums;
//! 3. normalizes into `att`, explicitly zeroing positions `t2 > t`
//!    (the causal mask);
//! 4. mixes values: `out[b,t,h,:] = Σ_{t2≤t} att[t2] · v[t2]`.
//!
//! The `1/√hs` scale is applied exactly once, inside the dot product.
//!
//! ## Numerical notes
//!
//! The running max starts at the sentinel `-1e4` rather than `-∞`; with
//! logits beyond ~1e4 the shift stops engaging, which is fine at trained
//! GPT-2 scales. When a row's exponent sum is zero the inverse is forced
//! to 0, so a fully masked row yields zeros instead of NaNs.
//!
//! ## Parallelism
//!
//! The forward pass runs two parallel phases: the score/softmax phase over
//! `(b, h)` attention matrices, then the value mix over `(b, t, h)` output
//! slots. The backward pass accumulates into shared `dk`/`dv` rows across
//! `t` and therefore stays serial.

use rayon::prelude::*;

/// Forward pass over fused QKV
///
/// - `out`: (B, T, C)
/// - `preatt`, `att`: (B, NH, T, T)
/// - `inp`: (B, T, 3C)
#[allow(clippy::too_many_arguments)]
pub fn attention_forward(
    out: &mut [f32],
    preatt: &mut [f32],
    att: &mut [f32],
    inp: &[f32],
    b: usize,
    t: usize,
    c: usize,
    nh: usize,
) {
    let c3 = c * 3;
    let hs = c / nh;
    let scale = 1.0 / (hs as f32).sqrt();

    // phase 1: scores and row softmax, parallel over (b, h)
    preatt
        .par_chunks_mut(t * t)
        .zip(att.par_chunks_mut(t * t))
        .enumerate()
        .for_each(|(bh, (preatt_bh, att_bh))| {
            let bi = bh / nh;
            let h = bh % nh;
            for tq in 0..t {
                let query = &inp[(bi * t + tq) * c3 + h * hs..][..hs];
                let preatt_row = &mut preatt_bh[tq * t..(tq + 1) * t];
                let att_row = &mut att_bh[tq * t..(tq + 1) * t];

                let mut maxval = -1.0e4f32;
                for t2 in 0..=tq {
                    let key = &inp[(bi * t + t2) * c3 + h * hs + c..][..hs];
                    let mut val = 0.0f32;
                    for i in 0..hs {
                        val += query[i] * key[i];
                    }
                    val *= scale;
                    if val > maxval {
                        maxval = val;
                    }
                    preatt_row[t2] = val;
                }

                let mut expsum = 0.0f32;
                for t2 in 0..=tq {
                    let expv = (preatt_row[t2] - maxval).exp();
                    expsum += expv;
                    att_row[t2] = expv;
                }
                let expsum_inv = if expsum == 0.0 { 0.0 } else { 1.0 / expsum };

                for t2 in 0..t {
                    if t2 <= tq {
                        att_row[t2] *= expsum_inv;
                    } else {
                        // future positions carry exact zeros
                        att_row[t2] = 0.0;
                    }
                }
            }
        });

    // phase 2: weighted value mix, parallel over (b, t, h) output slots
    let att_ref: &[f32] = att;
    out.par_chunks_mut(hs).enumerate().for_each(|(slot, out_bth)| {
        let h = slot % nh;
        let tq = (slot / nh) % t;
        let bi = slot / (nh * t);
        let att_row = &att_ref[((bi * nh + h) * t + tq) * t..][..t];

        out_bth.fill(0.0);
        for t2 in 0..=tq {
            let value = &inp[(bi * t + t2) * c3 + h * hs + 2 * c..][..hs];
            let a = att_row[t2];
            for i in 0..hs {
                out_bth[i] += a * value[i];
            }
        }
    });
}

/// Backward pass, mirroring the forward in reverse
///
/// Accumulates into `dinp` (the fused dQKV), `dpreatt`, and `datt`.
/// The softmax path contracts the full quadratic Jacobian restricted to
/// the causal triangle:
///
/// ```text
/// dpreatt[t3] += Σ_{t2≤t} att[t2] · (1[t2=t3] − att[t3]) · datt[t2]
/// ```
#[allow(clippy::too_many_arguments)]
pub fn attention_backward(
    dinp: &mut [f32],
    dpreatt: &mut [f32],
    datt: &mut [f32],
    dout: &[f32],
    inp: &[f32],
    att: &[f32],
    b: usize,
    t: usize,
    c: usize,
    nh: usize,
) {
    let c3 = c * 3;
    let hs = c / nh;
    let scale = 1.0 / (hs as f32).sqrt();

    for bi in 0..b {
        for tq in 0..t {
            for h in 0..nh {
                let att_row = &att[((bi * nh + h) * t + tq) * t..][..t];
                let datt_base = ((bi * nh + h) * t + tq) * t;
                let q_base = (bi * t + tq) * c3 + h * hs;
                let dout_bth = &dout[(bi * t + tq) * c + h * hs..][..hs];

                // value path: datt[t2] += v[t2]·dout, dv[t2] += att[t2]·dout
                for t2 in 0..=tq {
                    let v_base = (bi * t + t2) * c3 + h * hs + 2 * c;
                    for i in 0..hs {
                        datt[datt_base + t2] += inp[v_base + i] * dout_bth[i];
                        dinp[v_base + i] += att_row[t2] * dout_bth[i];
                    }
                }

                // softmax path: full Jacobian over the causal triangle
                for t2 in 0..=tq {
                    for t3 in 0..=tq {
                        let indicator = if t2 == t3 { 1.0 } else { 0.0 };
                        let local = att_row[t2] * (indicator - att_row[t3]);
                        dpreatt[datt_base + t3] += local * datt[datt_base + t2];
                    }
                }

                // query @ key path, scale applied once like the forward
                for t2 in 0..=tq {
                    let k_base = (bi * t + t2) * c3 + h * hs + c;
                    let dp = dpreatt[datt_base + t2] * scale;
                    for i in 0..hs {
                        dinp[q_base + i] += inp[k_base + i] * dp;
                        dinp[k_base + i] += inp[q_base + i] * dp;
                    }
                }
            }
        }
    }
}
