//! AdamW Optimizer
//!
//! Adam with decoupled weight decay, the standard optimizer for GPT-2
//! style training. Because every parameter lives in one flat buffer, the
//! optimizer state is just two vectors of the same length and the update
//! is a single element-wise sweep.
//!
//! ## Algorithm
//!
//! For each parameter θ with gradient g at step `t ≥ 1`:
//!
//! ```text
//! m = β₁·m + (1−β₁)·g              # first moment (momentum)
//! v = β₂·v + (1−β₂)·g²             # second moment (variance)
//! m̂ = m / (1 − β₁ᵗ)                # bias correction
//! v̂ = v / (1 − β₂ᵗ)
//! θ = θ − α · (m̂ / (√v̂ + ε) + λ·θ)
//! ```
//!
//! Weight decay is *decoupled*: λ·θ enters the update directly and never
//! touches the moment estimates, following Loshchilov & Hutter (2019),
//! "Decoupled Weight Decay Regularization", <https://arxiv.org/abs/1711.05101>.
//!
//! ## Bias Correction
//!
//! The `(1 − βᵗ)` terms matter: m and v start at zero, so without the
//! correction the first steps would be scaled far too small.

use rayon::prelude::*;

/// AdamW state: first and second moment vectors, same length as the
/// parameter buffer
///
/// Moments start at zero; the owning model constructs this lazily on the
/// first `update` call.
pub struct AdamW {
    m: Vec<f32>,
    v: Vec<f32>,
}

impl AdamW {
    /// Zero-initialized state for `num_parameters` parameters
    pub fn new(num_parameters: usize) -> Self {
        Self {
            m: vec![0.0; num_parameters],
            v: vec![0.0; num_parameters],
        }
    }

    /// One AdamW step over the flat parameter and gradient buffers
    ///
    /// `step` is 1-based; it feeds the bias-correction exponents.
    /// Parallel element-wise over the parameter vector.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        params: &mut [f32],
        grads: &[f32],
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        eps: f32,
        weight_decay: f32,
        step: usize,
    ) {
        assert_eq!(params.len(), self.m.len());
        assert_eq!(params.len(), grads.len());

        let bias_correction1 = 1.0 - beta1.powi(step as i32);
        let bias_correction2 = 1.0 - beta2.powi(step as i32);

        params
            .par_iter_mut()
            .zip(grads.par_iter())
            .zip(self.m.par_iter_mut().zip(self.v.par_iter_mut()))
            .for_each(|((param, &grad), (m, v))| {
                *m = beta1 * *m + (1.0 - beta1) * grad;
                *v = beta2 * *v + (1.0 - beta2) * grad * grad;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *param -= learning_rate * (m_hat / (v_hat.sqrt() + eps) + weight_decay * *param);
            });
    }
}
