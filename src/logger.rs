//! Training Metrics Logging
//!
//! Console lines for every step plus an optional CSV file for later
//! analysis. The CSV is flushed after every row so a crash mid-run loses
//! nothing.
//!
//! ## CSV Format
//!
//! ```text
//! step,elapsed_seconds,step_ms,learning_rate,train_loss,val_loss,train_perplexity,val_perplexity,sample
//! ```
//!
//! `val_loss` and `val_perplexity` are empty on steps where validation did
//! not run; `sample` holds the generated token ids of sampling steps and
//! is empty otherwise.
//!
//! ## Perplexity
//!
//! Perplexity is `exp(loss)`, a more interpretable companion to the raw
//! cross-entropy: a model guessing uniformly over `V` tokens sits at
//! perplexity `V`, a perfect model at 1.

use std::fs::File;
use std::io::Write;
use std::time::Instant;

/// Console + optional CSV logger for the training loop
pub struct TrainingLogger {
    log_file: Option<File>,
    start_time: Instant,
    last_log_time: Instant,
}

impl TrainingLogger {
    /// Create a logger; with `Some(path)` a CSV file is created and headed
    pub fn new(log_path: Option<&str>) -> std::io::Result<Self> {
        let log_file = match log_path {
            Some(path) => {
                let mut file = File::create(path)?;
                writeln!(
                    file,
                    "step,elapsed_seconds,step_ms,learning_rate,train_loss,val_loss,train_perplexity,val_perplexity,sample"
                )?;
                Some(file)
            }
            None => None,
        };
        let now = Instant::now();
        Ok(Self {
            log_file,
            start_time: now,
            last_log_time: now,
        })
    }

    /// Record one training step
    ///
    /// `sample` is the rendered output of a sampling step, recorded in the
    /// CSV only (the driver already prints it).
    pub fn log(
        &mut self,
        step: usize,
        learning_rate: f32,
        train_loss: f32,
        val_loss: Option<f32>,
        sample: Option<&str>,
    ) -> std::io::Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let step_ms = self.last_log_time.elapsed().as_secs_f32() * 1000.0;

        if let Some(file) = self.log_file.as_mut() {
            let val = val_loss.map(|v| format!("{:.4}", v)).unwrap_or_default();
            let val_ppl = val_loss
                .map(|v| format!("{:.2}", v.exp()))
                .unwrap_or_default();
            // escape quotes so the sample stays one CSV field
            let sample_escaped = sample.map(|s| s.replace('"', "\"\"")).unwrap_or_default();
            writeln!(
                file,
                "{},{:.2},{:.1},{:.6},{:.4},{},{:.2},{},\"{}\"",
                step,
                elapsed,
                step_ms,
                learning_rate,
                train_loss,
                val,
                train_loss.exp(),
                val_ppl,
                sample_escaped
            )?;
            file.flush()?;
        }

        if let Some(val) = val_loss {
            println!("val loss {:.6}", val);
        }
        println!(
            "step {}: train loss {:.6} (took {:.2} ms)",
            step, train_loss, step_ms
        );

        self.last_log_time = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_csv_rows_and_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let path_str = path.to_str().unwrap();

        let mut logger = TrainingLogger::new(Some(path_str)).unwrap();
        logger.log(0, 1e-4, 4.5, Some(4.8), None).unwrap();
        logger.log(1, 1e-4, 4.3, None, None).unwrap();
        logger.log(2, 1e-4, 4.1, None, Some("50256 11 42")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("step,elapsed_seconds"));
        assert!(lines[0].ends_with("train_perplexity,val_perplexity,sample"));

        // exp(4.5) = 90.02, exp(4.8) = 121.51
        assert!(lines[1].starts_with("0,"));
        assert!(lines[1].contains(",4.5000,4.8000,"));
        assert!(lines[1].ends_with(",90.02,121.51,\"\""));

        // no validation: both val columns empty, exp(4.3) = 73.70
        assert!(lines[2].contains(",4.3000,,73.70,,"));

        // sample column carries the rendered token ids
        assert!(lines[3].ends_with("\"50256 11 42\""));
    }

    #[test]
    fn test_sample_quotes_are_escaped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.csv");
        let mut logger = TrainingLogger::new(path.to_str()).unwrap();
        logger.log(0, 1e-4, 2.0, None, Some("a \"b\" c")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"a \"\"b\"\" c\""));
    }

    #[test]
    fn test_console_only_mode() {
        let mut logger = TrainingLogger::new(None).unwrap();
        logger.log(0, 1e-4, 2.0, None, None).unwrap();
    }
}
