//! Checkpoint Read / Write
//!
//! File format (binary, little-endian):
//!
//! ```text
//! [0..1024)   header: 256 × i32
//!               hdr[0] = 20240326   magic
//!               hdr[1] = 1          version
//!               hdr[2] = maxT, hdr[3] = V, hdr[4] = L, hdr[5] = NH, hdr[6] = C
//!               remaining entries reserved (written as zero, ignored on read)
//! [1024..)    payload: num_parameters × f32, the flat parameter buffer in
//!             declaration order (wte, wpe, ln1w, ln1b, qkvw, qkvb,
//!             attprojw, attprojb, ln2w, ln2b, fcw, fcb, fcprojw, fcprojb,
//!             lnfw, lnfb), each tensor row-major
//! ```
//!
//! The payload is byte-identical to the in-memory parameter buffer, so a
//! load/save round trip reproduces the file exactly. Writes go to a
//! temporary sibling and rename into place so a crash never leaves a
//! half-written checkpoint at the target path.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, TouchstoneError};
use crate::model::Config;
use crate::plan::ParamPlan;

/// Header magic, `hdr[0]`
pub const MAGIC: i32 = 20240326;
/// Supported format version, `hdr[1]`
pub const VERSION: i32 = 1;
/// Fixed header length in i32 slots
pub const HEADER_INTS: usize = 256;

/// A parsed checkpoint: hyperparameters plus the flat parameter buffer
#[derive(Debug)]
pub struct CheckpointFile {
    pub config: Config,
    pub params: Vec<f32>,
}

fn invalid(reason: impl Into<String>) -> TouchstoneError {
    TouchstoneError::CheckpointInvalid {
        reason: reason.into(),
    }
}

fn read_f32_slice(reader: &mut impl Read, n: usize) -> std::io::Result<Vec<f32>> {
    let mut raw = vec![0u8; n * 4];
    reader.read_exact(&mut raw)?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Read and validate a checkpoint
///
/// A missing file, short read, bad magic, unsupported version, or
/// nonsensical hyperparameters all surface as
/// [`TouchstoneError::CheckpointInvalid`].
pub fn read_checkpoint(path: impl AsRef<Path>) -> Result<CheckpointFile> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| invalid(format!("cannot open {}: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);

    let mut raw = vec![0u8; HEADER_INTS * 4];
    reader
        .read_exact(&mut raw)
        .map_err(|e| invalid(format!("short header in {}: {}", path.display(), e)))?;
    let header: Vec<i32> = raw
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if header[0] != MAGIC {
        return Err(invalid(format!(
            "bad magic {:#x}, expected {:#x}",
            header[0], MAGIC
        )));
    }
    if header[1] != VERSION {
        return Err(invalid(format!(
            "unsupported version {}, expected {}",
            header[1], VERSION
        )));
    }

    let dims = &header[2..7];
    if dims.iter().any(|&d| d <= 0) {
        return Err(invalid(format!("non-positive hyperparameter in {:?}", dims)));
    }
    let config = Config {
        max_seq_len: header[2] as usize,
        vocab_size: header[3] as usize,
        num_layers: header[4] as usize,
        num_heads: header[5] as usize,
        channels: header[6] as usize,
    };
    if config.channels % config.num_heads != 0 {
        return Err(invalid(format!(
            "channels {} not divisible by heads {}",
            config.channels, config.num_heads
        )));
    }

    let num_parameters = ParamPlan::new(&config).total_len();
    let params = read_f32_slice(&mut reader, num_parameters)
        .map_err(|e| invalid(format!("truncated payload in {}: {}", path.display(), e)))?;

    Ok(CheckpointFile { config, params })
}

/// Write a checkpoint with the given hyperparameters and parameter buffer
///
/// Writes to `<path>.tmp` and renames into place.
pub fn write_checkpoint(path: impl AsRef<Path>, config: &Config, params: &[f32]) -> Result<()> {
    let path = path.as_ref();
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);

        let mut header = [0i32; HEADER_INTS];
        header[0] = MAGIC;
        header[1] = VERSION;
        header[2] = config.max_seq_len as i32;
        header[3] = config.vocab_size as i32;
        header[4] = config.num_layers as i32;
        header[5] = config.num_heads as i32;
        header[6] = config.channels as i32;
        for h in header {
            writer.write_all(&h.to_le_bytes())?;
        }

        for &p in params {
            writer.write_all(&p.to_le_bytes())?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tiny_config() -> Config {
        Config {
            max_seq_len: 8,
            vocab_size: 13,
            num_layers: 2,
            num_heads: 2,
            channels: 4,
        }
    }

    #[test]
    fn test_round_trip_is_byte_exact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        let config = tiny_config();
        let n = ParamPlan::new(&config).total_len();
        let params: Vec<f32> = (0..n).map(|i| (i as f32) * 0.25 - 3.0).collect();

        write_checkpoint(&path, &config, &params).unwrap();
        let first = std::fs::read(&path).unwrap();

        let loaded = read_checkpoint(&path).unwrap();
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.params, params);

        let path2 = dir.path().join("model2.bin");
        write_checkpoint(&path2, &loaded.config, &loaded.params).unwrap();
        let second = std::fs::read(&path2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_file_is_checkpoint_invalid() {
        let err = read_checkpoint("/nonexistent/model.bin").unwrap_err();
        assert!(matches!(err, TouchstoneError::CheckpointInvalid { .. }));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.bin");
        let config = tiny_config();
        let n = ParamPlan::new(&config).total_len();
        write_checkpoint(&path, &config, &vec![0.0; n]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&path, &bytes).unwrap();

        let err = read_checkpoint(&path).unwrap_err();
        match err {
            TouchstoneError::CheckpointInvalid { reason } => {
                assert!(reason.contains("magic"), "{}", reason)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_bad_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.bin");
        let config = tiny_config();
        let n = ParamPlan::new(&config).total_len();
        write_checkpoint(&path, &config, &vec![0.0; n]).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4] = 9; // version slot
        std::fs::write(&path, &bytes).unwrap();

        let err = read_checkpoint(&path).unwrap_err();
        match err {
            TouchstoneError::CheckpointInvalid { reason } => {
                assert!(reason.contains("version"), "{}", reason)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.bin");
        let config = tiny_config();
        let n = ParamPlan::new(&config).total_len();
        write_checkpoint(&path, &config, &vec![0.0; n]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 8]).unwrap();

        let err = read_checkpoint(&path).unwrap_err();
        match err {
            TouchstoneError::CheckpointInvalid { reason } => {
                assert!(reason.contains("payload"), "{}", reason)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
