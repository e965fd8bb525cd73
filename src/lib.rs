//! Touchstone: a CPU Training Engine for GPT-2
//!
//! A self-contained training engine for decoder-only transformers of the
//! GPT-2 family. Given a checkpoint of hyperparameters and weights and a
//! stream of token sequences, it computes the autoregressive cross-entropy
//! loss, backpropagates exact analytic gradients through every layer, and
//! applies a decoupled-weight-decay Adam step in place. It also samples
//! from the current model token by token.
//!
//! Every gradient is computed explicitly; there is no autograd. All
//! parameters live in one flat buffer and all activations in another, with
//! each named tensor carved out as an offset/length view; see
//! [`plan`] for the memory layout and [`ops`] for the layer math.
//!
//! # Modules
//!
//! - [`ops`] - layer forward/backward pairs over flat buffers
//! - [`plan`] - flat-buffer tensor size/offset tables
//! - [`model`] - the `Gpt2` driver: forward, backward, update, generate
//! - [`optimizer`] - AdamW over the flat parameter vector
//! - [`checkpoint`] - binary checkpoint read/write
//! - [`train`] - token-stream data loading
//! - [`sampler`] - xorshift RNG and multinomial sampling
//! - [`logger`] - console/CSV training metrics
//! - [`error`] - tagged error values
//!
//! # Example: One Training Step
//!
//! ```rust,no_run
//! use touchstone::{Gpt2, TokenDataLoader, TouchstoneError};
//!
//! # fn main() -> Result<(), TouchstoneError> {
//! let mut model = Gpt2::from_checkpoint("gpt2_124M.bin")?;
//! let mut loader = TokenDataLoader::new("data/tiny_shakespeare_train.bin", 4, 64)?;
//!
//! loader.next_batch()?;
//! model.forward(loader.inputs(), Some(loader.targets()), 4, 64)?;
//! model.zero_grad();
//! model.backward()?;
//! model.update(1e-4, 0.9, 0.999, 1e-8, 0.0, 1)?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod error;
pub mod logger;
pub mod model;
pub mod ops;
pub mod optimizer;
pub mod plan;
pub mod sampler;
pub mod train;

// Re-export main types for convenience
pub use error::{Result, TouchstoneError};
pub use logger::TrainingLogger;
pub use model::{Config, Gpt2};
pub use optimizer::AdamW;
pub use sampler::{sample_multinomial, Rng};
pub use train::{TokenDataLoader, TrainConfig};
