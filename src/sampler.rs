//! Sampling Utilities
//!
//! A minimal xorshift* PRNG with explicit mutable state, plus multinomial
//! sampling over a probability vector. Generation in the training driver is
//! deliberately simple: re-run the forward pass per token and draw from the
//! final-position distribution. Anything smarter (KV caching, top-k) belongs
//! in a dedicated inference path.
//!
//! The RNG is seeded explicitly so generated token sequences are
//! reproducible run to run for a fixed checkpoint.

/// Minimal xorshift* PRNG
///
/// 64 bits of state; `next_u64` applies the 12/25/27 shift triple and a
/// finalizing multiply. Not cryptographic, just fast and deterministic.
pub struct Rng {
    pub state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Random u32 from the high bits of the xorshift* output
    pub fn random_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Random f32 in [0, 1), 24 bits of precision
    pub fn random_f32(&mut self) -> f32 {
        (self.random_u32() >> 8) as f32 / 16777216.0
    }

    /// Gaussian draw via Box-Muller
    pub fn gauss(&mut self, mean: f32, std: f32) -> f32 {
        let mut u1 = self.random_f32() as f64;
        let u2 = self.random_f32() as f64;
        if u1 < 1e-30 {
            u1 = 1e-30;
        }
        let mag = ((-2.0 * u1.ln()).sqrt()) as f32;
        mean + std * mag * ((2.0 * std::f64::consts::PI * u2).cos() as f32)
    }
}

/// Sample an index from a probability vector
///
/// Walks the CDF and returns the first index whose cumulative sum exceeds
/// `coin` (a uniform draw in [0, 1)). The probabilities must sum to 1; on
/// rounding underflow the last index is returned.
pub fn sample_multinomial(probs: &[f32], coin: f32) -> usize {
    let mut cdf = 0.0f32;
    for (i, &p) in probs.iter().enumerate() {
        cdf += p;
        if coin < cdf {
            return i;
        }
    }
    probs.len() - 1
}
