//! Layer Forward/Backward Pairs
//!
//! Every layer of the network is a pair of free functions over flat `f32`
//! slices with explicit shape arguments. Nothing in this module allocates;
//! the caller slices inputs and outputs out of the two flat buffers
//! described in [`crate::plan`].
//!
//! ## Ops
//!
//! - **encoder**: token + position embedding lookup
//! - **layernorm**: layer normalization with cached statistics
//! - **matmul**: the hot loop, `out = inp @ weight^T + bias`
//! - **attention**: causal multi-head attention over fused Q/K/V
//! - **gelu**: GELU activation (tanh approximation)
//! - **residual**: skip-connection add
//! - **softmax**: final softmax, cross-entropy, and their fused backward
//!
//! ## Accumulation contract
//!
//! Backward functions *accumulate* (`+=`) into their gradient outputs.
//! The caller owns zeroing; the only overwrite in the whole backward pass
//! is the uniform seed of the loss gradient. Each function documents any
//! exception.
//!
//! ## Parallelism
//!
//! Rayon is used only where iterations write disjoint memory: matmul
//! forward, the two split passes of matmul backward, attention forward,
//! GELU, and the final softmax. `encoder_backward` and
//! `attention_backward` scatter into shared rows and stay serial, keeping
//! float accumulation deterministic.

pub mod attention;
pub mod encoder;
pub mod gelu;
pub mod layernorm;
pub mod matmul;
pub mod residual;
pub mod softmax;

pub use attention::{attention_backward, attention_forward};
pub use encoder::{encoder_backward, encoder_forward};
pub use gelu::{gelu_backward, gelu_forward};
pub use layernorm::{layernorm_backward, layernorm_forward};
pub use matmul::{matmul_backward, matmul_forward};
pub use residual::{residual_backward, residual_forward};
pub use softmax::{crossentropy_forward, crossentropy_softmax_backward, softmax_forward};
