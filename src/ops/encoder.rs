//! Token + Position Encoder
//!
//! The first layer of the network: each position `(b, t)` becomes the sum
//! of its token embedding row and its position embedding row,
//! `out[b,t,:] = wte[inp[b,t], :] + wpe[t, :]`.
//!
//! The backward pass scatters the incoming gradient back into both
//! embedding tables. Several positions in a batch usually hold the same
//! token, so multiple `(b, t)` pairs accumulate into the same `wte` row;
//! the loop stays serial to keep that accumulation exact.

/// Forward: `out[b,t,:] = wte[inp[b,t], :] + wpe[t, :]`
///
/// - `out`: (B, T, C)
/// - `inp`: (B, T) token ids
/// - `wte`: (V, C), `wpe`: (maxT, C)
pub fn encoder_forward(
    out: &mut [f32],
    inp: &[i32],
    wte: &[f32],
    wpe: &[f32],
    b: usize,
    t: usize,
    c: usize,
) {
    for bi in 0..b {
        for ti in 0..t {
            let out_bt = &mut out[(bi * t + ti) * c..(bi * t + ti + 1) * c];
            let ix = inp[bi * t + ti] as usize;
            let wte_ix = &wte[ix * c..(ix + 1) * c];
            let wpe_t = &wpe[ti * c..(ti + 1) * c];
            for i in 0..c {
                out_bt[i] = wte_ix[i] + wpe_t[i];
            }
        }
    }
}

/// Backward: scatter `dout[b,t,:]` into `dwte[inp[b,t], :]` and `dwpe[t, :]`
///
/// Accumulates. Serial on purpose: repeated tokens write the same `dwte`
/// row.
pub fn encoder_backward(
    dwte: &mut [f32],
    dwpe: &mut [f32],
    dout: &[f32],
    inp: &[i32],
    b: usize,
    t: usize,
    c: usize,
) {
    for bi in 0..b {
        for ti in 0..t {
            let dout_bt = &dout[(bi * t + ti) * c..(bi * t + ti + 1) * c];
            let ix = inp[bi * t + ti] as usize;
            for i in 0..c {
                let d = dout_bt[i];
                dwte[ix * c + i] += d;
                dwpe[ti * c + i] += d;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_adds_token_and_position_rows() {
        let (b, t, c) = (1, 2, 3);
        let wte = vec![
            0.0, 0.0, 0.0, // token 0
            1.0, 2.0, 3.0, // token 1
            4.0, 5.0, 6.0, // token 2
        ];
        let wpe = vec![
            0.1, 0.1, 0.1, // pos 0
            0.2, 0.2, 0.2, // pos 1
        ];
        let inp = vec![2, 1];
        let mut out = vec![0.0; b * t * c];
        encoder_forward(&mut out, &inp, &wte, &wpe, b, t, c);
        assert_eq!(out[..3], [4.1, 5.1, 6.1]);
        assert_eq!(out[3..], [1.2, 2.2, 3.2]);
    }

    #[test]
    fn test_backward_accumulates_repeated_tokens() {
        let (b, t, c) = (2, 2, 2);
        // token 1 appears three times across the batch
        let inp = vec![1, 0, 1, 1];
        let dout = vec![1.0; b * t * c];
        let mut dwte = vec![0.0; 3 * c];
        let mut dwpe = vec![0.0; t * c];
        encoder_backward(&mut dwte, &mut dwpe, &dout, &inp, b, t, c);

        // row 1 gathered three unit gradients per channel, row 0 one
        assert_eq!(dwte[2..4], [3.0, 3.0]);
        assert_eq!(dwte[..2], [1.0, 1.0]);
        // each position appears once per batch row
        assert_eq!(dwpe, [2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_backward_accumulates_into_existing_gradient() {
        let (b, t, c) = (1, 1, 2);
        let inp = vec![0];
        let dout = vec![0.5, 0.5];
        let mut dwte = vec![1.0; 2];
        let mut dwpe = vec![2.0; 2];
        encoder_backward(&mut dwte, &mut dwpe, &dout, &inp, b, t, c);
        assert_eq!(dwte, [1.5, 1.5]);
        assert_eq!(dwpe, [2.5, 2.5]);
    }
}
