use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use facegan::models::{Generator, MlpGenerator, Network};
use facegan::render;
use facegan::rng::{normal_noise, stream_rng};
use facegan::train::{PREVIEW_PADDING, PREVIEW_ROW, PREVIEW_SAMPLES};
use facegan::{Checkpoint, TrainConfig};

mod common;

/// Render a grid of generated faces from a training checkpoint.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Checkpoint written by `train_gan`.
    checkpoint: PathBuf,

    /// Configuration used for training; network sizes must match.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output PNG.
    #[arg(long, default_value = "samples.png")]
    out: PathBuf,

    /// Noise seed.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    common::init_logging();
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => TrainConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrainConfig::default(),
    };
    let ckpt = Checkpoint::load(&args.checkpoint)
        .with_context(|| format!("loading checkpoint {}", args.checkpoint.display()))?;

    let mut rng = stream_rng(args.seed, 0);
    let mut generator = MlpGenerator::new(
        config.noise_dim,
        config.generator_hidden,
        config.image_size,
        &mut rng,
    );
    generator
        .load_state_dict(&ckpt.generator)
        .context("checkpoint does not match the configured generator")?;
    generator.set_training(false);

    let z = normal_noise(&mut rng, PREVIEW_SAMPLES, generator.noise_dim());
    let images = generator.generate(&z)?;
    let [_, h, w] = generator.image_shape();
    let tiles: Vec<&[f32]> = (0..images.rows).map(|r| images.row(r)).collect();
    render::save_grid(&tiles, h, w, PREVIEW_ROW, PREVIEW_PADDING, &args.out)?;
    log::info!(
        "wrote {} samples from epoch {} to {}",
        tiles.len(),
        ckpt.epoch,
        args.out.display()
    );
    Ok(())
}
