use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use facegan::{TrainConfig, Trainer};

mod common;

/// Train the face GAN on a folder of images.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML or JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Continue from a checkpoint written by a previous run.
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Override `image_dir` from the configuration.
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Override `results_dir` from the configuration.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Override the number of epochs.
    #[arg(long)]
    epochs: Option<usize>,
}

fn load_config(args: &Args) -> Result<TrainConfig> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrainConfig::default(),
    };
    if let Some(dir) = &args.image_dir {
        config.image_dir = dir.clone();
    }
    if let Some(dir) = &args.results_dir {
        config.results_dir = dir.clone();
    }
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    common::init_logging();
    let args = Args::parse();
    let config = load_config(&args)?;
    log::info!(
        "image_dir {} results_dir {} epochs {} batch {}",
        config.image_dir.display(),
        config.results_dir.display(),
        config.epochs,
        config.batch_size
    );

    let mut trainer = Trainer::from_config(config).context("setting up trainer")?;
    if let Some(path) = &args.resume {
        trainer
            .resume(path)
            .with_context(|| format!("resuming from {}", path.display()))?;
    }
    trainer.run().context("training failed")?;
    log::info!("done");
    Ok(())
}
