//! GELU Activation
//!
//! GPT-2 uses the tanh approximation of the Gaussian Error Linear Unit:
//!
//! ```text
//! GELU(x) ≈ 0.5 · x · (1 + tanh(√(2/π) · (x + 0.044715 · x³)))
//! ```
//!
//! The backward pass differentiates this closed form exactly rather than
//! approximating the true GELU derivative; training must descend the
//! function the forward pass actually computes.

use rayon::prelude::*;

/// Forward: element-wise tanh-approximated GELU
pub fn gelu_forward(out: &mut [f32], inp: &[f32]) {
    let s = (2.0f32 / std::f32::consts::PI).sqrt();
    out.par_iter_mut().zip(inp.par_iter()).for_each(|(o, &x)| {
        let cube = 0.044715 * x * x * x;
        *o = 0.5 * x * (1.0 + (s * (x + cube)).tanh());
    });
}

/// Backward: `dinp += GELU'(inp) · dout`
///
/// The derivative of the tanh form, by product and chain rule:
///
/// ```text
/// GELU'(x) = 0.5·(1 + tanh(u)) + 0.5·x·sech²(u)·√(2/π)·(1 + 3·0.044715·x²)
/// where u = √(2/π)·(x + 0.044715·x³)
/// ```
pub fn gelu_backward(dinp: &mut [f32], inp: &[f32], dout: &[f32]) {
    let s = (2.0f32 / std::f32::consts::PI).sqrt();
    dinp.par_iter_mut()
        .zip(inp.par_iter().zip(dout.par_iter()))
        .for_each(|(di, (&x, &d))| {
            let cube = 0.044715 * x * x * x;
            let tanh_arg = s * (x + cube);
            let tanh_out = tanh_arg.tanh();
            let sech_sq = 1.0 - tanh_out * tanh_out;
            let local_grad =
                0.5 * (1.0 + tanh_out) + 0.5 * x * sech_sq * s * (1.0 + 3.0 * 0.044715 * x * x);
            *di += local_grad * d;
        });
}
