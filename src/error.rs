//! Error types for Touchstone
//!
//! Every failure the engine can hit is a tagged variant here. The reference
//! training flow treats all of them as fatal: the binary reports to stderr
//! and exits nonzero. Library callers get them as ordinary `Result` values
//! at the boundary instead; the engine never reallocates or truncates
//! silently to recover.

use thiserror::Error;

/// Result type alias for Touchstone operations
pub type Result<T> = std::result::Result<T, TouchstoneError>;

/// Error type for all Touchstone operations
#[derive(Error, Debug)]
pub enum TouchstoneError {
    /// Checkpoint file is missing, truncated, or carries a bad magic/version
    #[error("invalid checkpoint: {reason}")]
    CheckpointInvalid {
        /// What made the file unacceptable
        reason: String,
    },

    /// A forward pass asked for a larger batch shape than the first forward
    /// allocated for
    #[error("batch shape (B={b}, T={t}) exceeds allocated (B={max_b}, T={max_t})")]
    ShapeOverflow {
        /// Allocated batch size
        max_b: usize,
        /// Allocated sequence length
        max_t: usize,
        /// Requested batch size
        b: usize,
        /// Requested sequence length
        t: usize,
    },

    /// A sequence longer than the model's context window was requested
    /// before any activation allocation existed; the batch size has no
    /// bound at that point, only `T` is capped
    #[error("sequence length {t} exceeds the model context window ({max_seq_len})")]
    ContextOverflow {
        /// The model's `max_seq_len`
        max_seq_len: usize,
        /// Requested sequence length
        t: usize,
    },

    /// An operation was called in a state that cannot serve it, e.g.
    /// `backward` without a prior targeted forward
    #[error("state violation: {reason}")]
    StateViolation {
        /// Which precondition was broken
        reason: &'static str,
    },

    /// Token file cannot serve a single batch of the requested shape
    #[error("token file too small: {actual} bytes, need at least {needed}")]
    TokenFileTooSmall {
        /// Minimum byte size for one batch, `(B*T + 1) * 4`
        needed: u64,
        /// Actual file size
        actual: u64,
    },

    /// Underlying IO failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
