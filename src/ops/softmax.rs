//! Final Softmax and Cross-Entropy
//!
//! The last stage of the forward pass turns logits into probabilities and,
//! when targets are present, per-position negative log-likelihoods:
//!
//! ```text
//! probs[b,t,:] = softmax(logits[b,t,:])           (row length V)
//! loss[b,t]    = -ln(probs[b,t, targets[b,t]])
//! ```
//!
//! The softmax subtracts the per-row max before exponentiating, seeding the
//! max-reduction with the same `-1e4` sentinel the attention softmax uses.
//!
//! ## Only the fused backward exists
//!
//! There is deliberately no standalone `softmax_backward` in this crate.
//! Backpropagation through the output distribution always goes through
//! [`crossentropy_softmax_backward`], which collapses the softmax Jacobian
//! against the cross-entropy gradient into the closed form
//! `dlogits += (p − 1[i == target]) · dloss`. The general Jacobian is a
//! `V×V` contraction per position; the fused form is a single subtraction.

use rayon::prelude::*;

/// Forward: numerically stable row softmax over the vocabulary
///
/// - `probs`, `logits`: (B, T, V)
///
/// Parallel over `(b, t)` rows.
pub fn softmax_forward(probs: &mut [f32], logits: &[f32], _b: usize, _t: usize, v: usize) {
    probs
        .par_chunks_mut(v)
        .zip(logits.par_chunks(v))
        .for_each(|(probs_bt, logits_bt)| {
            let mut maxval = -1.0e4f32;
            for &l in logits_bt {
                if l > maxval {
                    maxval = l;
                }
            }
            let mut sum = 0.0f32;
            for i in 0..v {
                probs_bt[i] = (logits_bt[i] - maxval).exp();
                sum += probs_bt[i];
            }
            for p in probs_bt.iter_mut() {
                *p /= sum;
            }
        });
}

/// Forward: `losses[b,t] = -ln(probs[b,t, targets[b,t]])`
pub fn crossentropy_forward(
    losses: &mut [f32],
    probs: &[f32],
    targets: &[i32],
    b: usize,
    t: usize,
    v: usize,
) {
    for bt in 0..b * t {
        let probs_bt = &probs[bt * v..(bt + 1) * v];
        let ix = targets[bt] as usize;
        losses[bt] = -probs_bt[ix].ln();
    }
}

/// Fused backward through both cross-entropy and softmax
///
/// `dlogits[b,t,i] += (probs[b,t,i] − 1[i == target]) · dlosses[b,t]`
///
/// `dlosses` is a full input rather than a hard-coded `1/(B*T)` so that
/// per-position loss weighting stays possible; the training driver fills
/// it uniformly.
pub fn crossentropy_softmax_backward(
    dlogits: &mut [f32],
    dlosses: &[f32],
    probs: &[f32],
    targets: &[i32],
    b: usize,
    t: usize,
    v: usize,
) {
    for bt in 0..b * t {
        let dlogits_bt = &mut dlogits[bt * v..(bt + 1) * v];
        let probs_bt = &probs[bt * v..(bt + 1) * v];
        let dloss = dlosses[bt];
        let ix = targets[bt] as usize;
        for i in 0..v {
            let indicator = if i == ix { 1.0 } else { 0.0 };
            dlogits_bt[i] += (probs_bt[i] - indicator) * dloss;
        }
    }
}
