//! Training Driver
//!
//! Loads a GPT-2 checkpoint, picks a token dataset by existence check
//! (tiny-shakespeare preferred over TinyStories), and runs a fixed number
//! of AdamW steps with periodic validation and sampling.
//!
//! ## Usage
//!
//! ```bash
//! # defaults reproduce the reference run: 40 steps of B=4, T=64
//! cargo run --release
//!
//! # override the schedule
//! cargo run --release -- --steps 200 --lr 3e-4 --log-csv run.csv
//! ```
//!
//! Exit code is 0 on normal completion and 1 on any fatal error
//! (bad checkpoint, missing token files, oversize batch).

use std::path::{Path, PathBuf};

use clap::Parser;

use touchstone::{Gpt2, Result, Rng, TokenDataLoader, TrainConfig, TrainingLogger};

/// The GPT-2 end-of-text token, used to prompt generation
const GPT2_EOT: i32 = 50256;

#[derive(Parser)]
#[command(name = "touchstone-train", about = "Train a GPT-2 checkpoint on a token stream")]
struct Args {
    /// Model checkpoint to load
    #[arg(long, default_value = "gpt2_124M.bin")]
    checkpoint: String,

    /// Directory holding the token files
    #[arg(long, default_value = "data")]
    data_dir: String,

    /// Number of training steps
    #[arg(long, default_value_t = 40)]
    steps: usize,

    /// Sequences per batch
    #[arg(long, default_value_t = 4)]
    batch_size: usize,

    /// Tokens per sequence
    #[arg(long, default_value_t = 64)]
    seq_len: usize,

    /// Learning rate
    #[arg(long, default_value_t = 1e-4)]
    lr: f32,

    /// Weight decay
    #[arg(long, default_value_t = 0.0)]
    weight_decay: f32,

    /// Write per-step metrics to this CSV file
    #[arg(long)]
    log_csv: Option<String>,

    /// RNG seed for sampling
    #[arg(long, default_value_t = 1337)]
    seed: u64,
}

impl Args {
    fn train_config(&self) -> TrainConfig {
        TrainConfig {
            batch_size: self.batch_size,
            seq_len: self.seq_len,
            num_steps: self.steps,
            learning_rate: self.lr,
            weight_decay: self.weight_decay,
            ..TrainConfig::default()
        }
    }
}

/// Prefer tiny-shakespeare when present, fall back to TinyStories
fn pick_token_files(data_dir: &str) -> (PathBuf, PathBuf) {
    let dir = Path::new(data_dir);
    let shakespeare_train = dir.join("tiny_shakespeare_train.bin");
    let shakespeare_val = dir.join("tiny_shakespeare_val.bin");
    if shakespeare_train.exists() {
        (shakespeare_train, shakespeare_val)
    } else {
        (
            dir.join("TinyStories_train.bin"),
            dir.join("TinyStories_val.bin"),
        )
    }
}

fn run(args: &Args) -> Result<()> {
    let cfg = args.train_config();

    let mut model = Gpt2::from_checkpoint(&args.checkpoint)?;
    println!("[GPT-2]");
    println!("max_seq_len: {}", model.config().max_seq_len);
    println!("vocab_size: {}", model.config().vocab_size);
    println!("num_layers: {}", model.config().num_layers);
    println!("num_heads: {}", model.config().num_heads);
    println!("channels: {}", model.config().channels);
    println!("num_parameters: {}", model.num_parameters());

    let (train_path, val_path) = pick_token_files(&args.data_dir);
    let mut train_loader = TokenDataLoader::new(&train_path, cfg.batch_size, cfg.seq_len)?;
    let mut val_loader = TokenDataLoader::new(&val_path, cfg.batch_size, cfg.seq_len)?;
    println!("train dataset num_batches: {}", train_loader.num_batches);
    println!("val dataset num_batches: {}", val_loader.num_batches);
    let rendered_cfg = serde_json::to_string_pretty(&cfg).map_err(std::io::Error::from)?;
    println!("run config: {}", rendered_cfg);

    let mut logger = TrainingLogger::new(args.log_csv.as_deref())?;
    let mut rng = Rng::new(args.seed);

    for step in 0..=cfg.num_steps {
        // once in a while estimate the validation loss
        let mut val_loss = None;
        if step % cfg.val_every == 0 {
            let mut total = 0.0f32;
            val_loader.reset();
            for _ in 0..cfg.val_batches {
                val_loader.next_batch()?;
                model.forward(
                    val_loader.inputs(),
                    Some(val_loader.targets()),
                    cfg.batch_size,
                    cfg.seq_len,
                )?;
                if let Some(loss) = model.mean_loss() {
                    total += loss;
                }
            }
            val_loss = Some(total / cfg.val_batches as f32);
        }

        // once in a while sample from the model
        let mut sample = None;
        if step > 0 && step % cfg.sample_every == 0 {
            let tokens = model.generate(&[GPT2_EOT], cfg.sample_len, &mut rng)?;
            let rendered: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
            let rendered = rendered.join(" ");
            println!("generated: {}", rendered);
            sample = Some(rendered);
        }

        // one training step
        train_loader.next_batch()?;
        model.forward(
            train_loader.inputs(),
            Some(train_loader.targets()),
            cfg.batch_size,
            cfg.seq_len,
        )?;
        model.zero_grad();
        model.backward()?;
        model.update(
            cfg.learning_rate,
            cfg.beta1,
            cfg.beta2,
            cfg.eps,
            cfg.weight_decay,
            step + 1,
        )?;
        if let Some(loss) = model.mean_loss() {
            logger.log(step, cfg.learning_rate, loss, val_loss, sample.as_deref())?;
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
