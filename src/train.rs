//! Training Data Loading
//!
//! A linear scan over a binary token file: a flat sequence of 32-bit
//! little-endian signed integers. The loader reads `B*T + 1` tokens per
//! batch and exposes two overlapping windows into them:
//!
//! ```text
//! tokens:  [t0, t1, t2, ..., t_{BT}]
//! inputs:  [t0 .. t_{BT-1}]
//! targets: [t1 .. t_{BT}]
//! ```
//!
//! The target at position `i` is the input token at `i + 1`: teacher
//! forcing by a one-step shift. The cursor advances `B*T` tokens per batch
//! and wraps to the start of the file when the next read would overrun EOF,
//! so epochs roll over silently.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TouchstoneError};

/// Streaming batch loader over a binary i32 token file
#[derive(Debug)]
pub struct TokenDataLoader {
    batch_size: usize,
    seq_len: usize,
    file: File,
    file_size: u64,
    current_position: u64,
    /// `B*T + 1` tokens; inputs and targets are shifted windows into this
    batch: Vec<i32>,
    raw: Vec<u8>,
    /// Distinct batch starts in one pass over the file
    pub num_batches: usize,
}

impl TokenDataLoader {
    /// Open a token file for `(B, T)` batches
    ///
    /// Fails with [`TouchstoneError::TokenFileTooSmall`] when the file
    /// cannot serve even one batch.
    pub fn new(path: impl AsRef<Path>, batch_size: usize, seq_len: usize) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let file_size = file.metadata()?.len();
        let span = batch_size * seq_len + 1;
        let needed = (span * 4) as u64;
        if file_size < needed {
            return Err(TouchstoneError::TokenFileTooSmall {
                needed,
                actual: file_size,
            });
        }
        let num_batches = (file_size / (batch_size * seq_len * 4) as u64) as usize;
        Ok(Self {
            batch_size,
            seq_len,
            file,
            file_size,
            current_position: 0,
            batch: vec![0; span],
            raw: vec![0; span * 4],
            num_batches,
        })
    }

    /// Rewind to the start of the file
    pub fn reset(&mut self) {
        self.current_position = 0;
    }

    /// Read the next `B*T + 1` tokens, wrapping at EOF
    pub fn next_batch(&mut self) -> Result<()> {
        let bt = self.batch_size * self.seq_len;
        let span_bytes = ((bt + 1) * 4) as u64;
        if self.current_position + span_bytes > self.file_size {
            self.current_position = 0;
        }
        self.file.seek(SeekFrom::Start(self.current_position))?;
        self.file.read_exact(&mut self.raw)?;
        for (token, bytes) in self.batch.iter_mut().zip(self.raw.chunks_exact(4)) {
            *token = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        self.current_position += (bt * 4) as u64;
        Ok(())
    }

    /// Input window of the current batch, `B*T` tokens
    pub fn inputs(&self) -> &[i32] {
        &self.batch[..self.batch_size * self.seq_len]
    }

    /// Target window of the current batch, the inputs shifted by one
    pub fn targets(&self) -> &[i32] {
        &self.batch[1..]
    }
}

/// Hyperparameters of the training loop
///
/// Defaults reproduce the reference run: 40 steps of `B=4, T=64` AdamW at
/// `1e-4` with no weight decay, validation every 10 steps over 10 batches,
/// and a 64-token sample every 20 steps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size: usize,
    pub seq_len: usize,
    pub num_steps: usize,
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    pub weight_decay: f32,
    pub val_every: usize,
    pub val_batches: usize,
    pub sample_every: usize,
    pub sample_len: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 4,
            seq_len: 64,
            num_steps: 40,
            learning_rate: 1e-4,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            weight_decay: 0.0,
            val_every: 10,
            val_batches: 10,
            sample_every: 20,
            sample_len: 64,
        }
    }
}
