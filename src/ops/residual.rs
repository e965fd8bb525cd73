//! Residual Connection
//!
//! `out = inp1 + inp2`. In the backward pass the incoming gradient flows
//! unchanged into both branches; each branch accumulates, since the skip
//! target usually already carries gradient from another path.

/// Forward: element-wise `out = inp1 + inp2`
pub fn residual_forward(out: &mut [f32], inp1: &[f32], inp2: &[f32]) {
    for ((o, &a), &b) in out.iter_mut().zip(inp1.iter()).zip(inp2.iter()) {
        *o = a + b;
    }
}

/// Backward: `dinp1 += dout; dinp2 += dout`
pub fn residual_backward(dinp1: &mut [f32], dinp2: &mut [f32], dout: &[f32]) {
    for ((d1, d2), &d) in dinp1.iter_mut().zip(dinp2.iter_mut()).zip(dout.iter()) {
        *d1 += d;
        *d2 += d;
    }
}
