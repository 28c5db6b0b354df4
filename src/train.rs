use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;

use crate::checkpoint::Checkpoint;
use crate::config::TrainConfig;
use crate::data::{DataLoader, Dataset, ImageFolder, LoaderOptions};
use crate::device::{Cpu, Device};
use crate::error::{GanError, Result};
use crate::eval::Evaluator;
use crate::fid::{FidCalculator, FrechetDistance};
use crate::layers::sigmoid::mean_probability;
use crate::logging::{EpochRecord, MetricsLogger};
use crate::math::{self, Matrix};
use crate::models::{ConvDiscriminator, Discriminator, Generator, MlpGenerator};
use crate::optim::{self, BceWithLogits, Loss, Optimizer};
use crate::render;
use crate::rng::{normal_noise, stream_rng, streams};
use crate::util::logging::{
    format_batch_progress, format_checkpoint_saved, format_epoch_summary, log_total_ops,
};

/// Number of images in the per-epoch preview grid.
pub const PREVIEW_SAMPLES: usize = 16;
/// Preview images per grid row.
pub const PREVIEW_ROW: usize = 4;
/// Pixels between (and around) preview tiles.
pub const PREVIEW_PADDING: usize = 2;

/// Per-epoch average losses over the lifetime of a run, index 0 is epoch 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossHistory {
    pub generator: Vec<f32>,
    pub discriminator: Vec<f32>,
}

impl LossHistory {
    pub fn len(&self) -> usize {
        self.generator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generator.is_empty()
    }

    pub fn push(&mut self, g: f32, d: f32) {
        self.generator.push(g);
        self.discriminator.push(d);
    }
}

/// Losses and discriminator outputs of one optimisation step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStats {
    pub d_loss_real: f32,
    pub d_loss_fake: f32,
    pub g_loss: f32,
    pub d_real: f32,
    pub d_fake: f32,
}

/// Result of [`Trainer::discriminator_step`].
#[derive(Debug, Clone)]
pub struct DiscriminatorStep {
    /// Generated batch the discriminator was trained on.
    pub fake: Matrix,
    pub loss_real: f32,
    pub loss_fake: f32,
    pub d_real: f32,
    pub d_fake: f32,
}

/// Averages over the batches of one epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochStats {
    pub d_loss: f32,
    pub g_loss: f32,
    pub d_real: f32,
    pub d_fake: f32,
}

/// Adversarial training loop with periodic previews, checkpoints and FID.
pub struct Trainer {
    config: TrainConfig,
    generator: Box<dyn Generator>,
    discriminator: Box<dyn Discriminator>,
    g_optimizer: Box<dyn Optimizer>,
    d_optimizer: Box<dyn Optimizer>,
    loss: BceWithLogits,
    loader: DataLoader,
    evaluator: Evaluator,
    device: Arc<dyn Device>,
    noise_rng: StdRng,
    history: LossHistory,
    start_epoch: usize,
}

impl Trainer {
    /// Wire a trainer from its collaborators.
    ///
    /// Fails with [`GanError::EmptyLoader`] when the training loader would
    /// produce no batches.
    pub fn new(
        config: TrainConfig,
        generator: Box<dyn Generator>,
        discriminator: Box<dyn Discriminator>,
        dataset: Arc<dyn Dataset>,
        calculator: Box<dyn FidCalculator>,
        device: Arc<dyn Device>,
    ) -> Result<Self> {
        config.validate()?;
        if dataset.is_empty() {
            return Err(GanError::EmptyDataset);
        }
        let options = LoaderOptions::training(config.batch_size, config.max_images)
            .with_workers(config.num_workers, config.pin_memory);
        let loader = DataLoader::new(
            Arc::clone(&dataset),
            options,
            stream_rng(config.seed, streams::SHUFFLE),
        )?;
        if loader.num_batches() == 0 {
            return Err(GanError::EmptyLoader {
                samples: loader.len(),
                batch_size: config.batch_size,
            });
        }
        let evaluator = Evaluator::new(&config, dataset, generator.noise_dim(), calculator);
        let g_optimizer = optim::from_config(&config);
        let d_optimizer = optim::from_config(&config);
        let noise_rng = stream_rng(config.seed, streams::TRAIN_NOISE);
        Ok(Self {
            config,
            generator,
            discriminator,
            g_optimizer,
            d_optimizer,
            loss: BceWithLogits,
            loader,
            evaluator,
            device,
            noise_rng,
            history: LossHistory::default(),
            start_epoch: 1,
        })
    }

    /// Trainer over an [`ImageFolder`] with the default networks, the
    /// Fréchet-distance evaluator and the CPU device.
    pub fn from_config(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        let dataset = ImageFolder::open(&config.image_dir, config.image_size, &config.extensions)?;
        log::info!("{} images in {}", dataset.len(), config.image_dir.display());
        let mut g_rng = stream_rng(config.seed, streams::INIT_GENERATOR);
        let mut d_rng = stream_rng(config.seed, streams::INIT_DISCRIMINATOR);
        let mut generator = MlpGenerator::new(
            config.noise_dim,
            config.generator_hidden,
            config.image_size,
            &mut g_rng,
        );
        let mut discriminator =
            ConvDiscriminator::new(config.image_size, config.discriminator_channels, &mut d_rng);
        log::info!(
            "generator {} parameters, discriminator {} parameters",
            generator.parameter_count(),
            discriminator.parameter_count()
        );
        let calculator = FrechetDistance::new(config.seed);
        Self::new(
            config,
            Box::new(generator),
            Box::new(discriminator),
            Arc::new(dataset),
            Box::new(calculator),
            Arc::new(Cpu),
        )
    }

    /// Restore models, optimisers and loss history from `path`. Training
    /// continues with the epoch after the checkpointed one.
    ///
    /// The noise and shuffle generators are not checkpointed; they restart
    /// from the configured seed, so a resumed run draws different batches
    /// and noise than an uninterrupted one would.
    pub fn resume(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let ckpt = Checkpoint::load(path.as_ref())?;
        self.generator.load_state_dict(&ckpt.generator)?;
        self.discriminator.load_state_dict(&ckpt.discriminator)?;
        self.g_optimizer.load_state(&ckpt.g_optimizer)?;
        self.d_optimizer.load_state(&ckpt.d_optimizer)?;
        self.history = LossHistory {
            generator: ckpt.g_losses,
            discriminator: ckpt.d_losses,
        };
        self.start_epoch = ckpt.epoch + 1;
        log::info!(
            "resumed from {} at epoch {}",
            path.as_ref().display(),
            self.start_epoch
        );
        Ok(())
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    pub fn num_batches(&self) -> usize {
        self.loader.num_batches()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn generator(&self) -> &dyn Generator {
        self.generator.as_ref()
    }

    pub fn discriminator(&self) -> &dyn Discriminator {
        self.discriminator.as_ref()
    }

    /// Train from the start epoch through `config.epochs`, then plot the
    /// loss curves. Any error aborts the run.
    pub fn run(&mut self) -> Result<()> {
        let epochs = self.config.epochs;
        let mut metrics = MetricsLogger::new(&self.config.results_dir, self.start_epoch > 1)?;
        math::reset_matrix_ops();
        log::info!(
            "training epochs {}..={epochs}, {} batches of {} on {}",
            self.start_epoch,
            self.loader.num_batches(),
            self.config.batch_size,
            self.device.name()
        );
        for epoch in self.start_epoch..=epochs {
            let started = Instant::now();
            let stats = self.train_epoch(epoch)?;
            self.history.push(stats.g_loss, stats.d_loss);
            log::info!("{}", format_epoch_summary(epoch, epochs, stats.d_loss, stats.g_loss));

            self.device.release_cache();
            self.save_preview(epoch)?;
            self.save_checkpoint(epoch)?;

            let fid = if epoch % self.config.fid_every == 0 {
                Some(self.evaluate()?)
            } else {
                None
            };
            metrics.log(&EpochRecord {
                epoch,
                d_loss: stats.d_loss,
                g_loss: stats.g_loss,
                d_real: stats.d_real,
                d_fake: stats.d_fake,
                fid,
                seconds: started.elapsed().as_secs_f64(),
            })?;
            self.start_epoch = epoch + 1;
        }
        render::save_loss_plot(
            &self.history.generator,
            &self.history.discriminator,
            &self.config.loss_plot_path(),
        )?;
        log_total_ops(math::matrix_ops_count());
        Ok(())
    }

    /// One pass over the training loader.
    pub fn train_epoch(&mut self, epoch: usize) -> Result<EpochStats> {
        self.loader.reset();
        let batches = self.loader.num_batches();
        let pb = ProgressBar::new(batches as u64);
        if let Ok(style) = ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}") {
            pb.set_style(style);
        }
        pb.set_prefix(format!("epoch {epoch}"));

        let mut sums = EpochStats::default();
        let mut seen = 0usize;
        while let Some(batch) = self.loader.next() {
            let batch = batch?;
            let step = self.train_step(&batch.images)?;
            sums.d_loss += step.d_loss_real + step.d_loss_fake;
            sums.g_loss += step.g_loss;
            sums.d_real += step.d_real;
            sums.d_fake += step.d_fake;
            seen += 1;
            pb.set_message(format_batch_progress(
                step.d_loss_real + step.d_loss_fake,
                step.g_loss,
                step.d_real,
                step.d_fake,
            ));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let n = seen.max(1) as f32;
        Ok(EpochStats {
            d_loss: sums.d_loss / n,
            g_loss: sums.g_loss / n,
            d_real: sums.d_real / n,
            d_fake: sums.d_fake / n,
        })
    }

    /// Discriminator update on real and detached fake images, then a
    /// generator update through the updated discriminator on the same fakes.
    pub fn train_step(&mut self, real: &Matrix) -> Result<StepStats> {
        let d_step = self.discriminator_step(real)?;
        let g_loss = self.generator_step(&d_step.fake)?;
        Ok(StepStats {
            d_loss_real: d_step.loss_real,
            d_loss_fake: d_step.loss_fake,
            g_loss,
            d_real: d_step.d_real,
            d_fake: d_step.d_fake,
        })
    }

    /// Update the discriminator on `real` and on one freshly generated batch.
    ///
    /// The generator keeps the activations of that batch, which is returned
    /// for [`Trainer::generator_step`]. Generator parameters are not touched.
    pub fn discriminator_step(&mut self, real: &Matrix) -> Result<DiscriminatorStep> {
        let batch = real.rows;
        self.discriminator.zero_grad();
        let real_logits = self.discriminator.forward_train(real)?;
        let (loss_real, grad) = self.loss.loss_and_grad(&real_logits, self.config.real_label);
        self.discriminator.backward(&grad);

        let z = normal_noise(&mut self.noise_rng, batch, self.generator.noise_dim());
        let fake = self.generator.forward_train(&z)?;
        let fake_logits = self.discriminator.forward_train(&fake)?;
        let (loss_fake, grad) = self.loss.loss_and_grad(&fake_logits, self.config.fake_label);
        // Input gradient dropped: the generator is not updated by this loss.
        let _ = self.discriminator.backward(&grad);
        self.d_optimizer.step(&mut self.discriminator.parameters_mut())?;

        Ok(DiscriminatorStep {
            fake,
            loss_real,
            loss_fake,
            d_real: mean_probability(&real_logits),
            d_fake: mean_probability(&fake_logits),
        })
    }

    /// Update the generator so the discriminator labels `fake` as real.
    ///
    /// `fake` must be the batch from the preceding
    /// [`Trainer::discriminator_step`]; no new noise is drawn. Discriminator
    /// parameters are not touched.
    pub fn generator_step(&mut self, fake: &Matrix) -> Result<f32> {
        self.generator.zero_grad();
        let logits = self.discriminator.forward_train(fake)?;
        let (g_loss, grad) = self.loss.loss_and_grad(&logits, self.config.real_label);
        let grad_fake = self.discriminator.backward(&grad);
        self.generator.backward(&grad_fake);
        self.g_optimizer.step(&mut self.generator.parameters_mut())?;
        Ok(g_loss)
    }

    /// Render [`PREVIEW_SAMPLES`] fresh samples as a grid for `epoch`.
    pub fn save_preview(&mut self, epoch: usize) -> Result<PathBuf> {
        let z = normal_noise(&mut self.noise_rng, PREVIEW_SAMPLES, self.generator.noise_dim());
        let images = self.generator.generate(&z)?;
        let [_, h, w] = self.generator.image_shape();
        let tiles: Vec<&[f32]> = (0..images.rows).map(|r| images.row(r)).collect();
        let path = self.config.preview_path(epoch);
        render::save_grid(&tiles, h, w, PREVIEW_ROW, PREVIEW_PADDING, &path)?;
        log::debug!("saved preview grid to {}", path.display());
        Ok(path)
    }

    pub fn checkpoint(&self, epoch: usize) -> Checkpoint {
        Checkpoint {
            epoch,
            generator: self.generator.state_dict(),
            discriminator: self.discriminator.state_dict(),
            g_optimizer: self.g_optimizer.state(),
            d_optimizer: self.d_optimizer.state(),
            g_losses: self.history.generator.clone(),
            d_losses: self.history.discriminator.clone(),
        }
    }

    pub fn save_checkpoint(&self, epoch: usize) -> Result<PathBuf> {
        let path = self.config.checkpoint_path(epoch);
        self.checkpoint(epoch).save(&path)?;
        log::info!("{}", format_checkpoint_saved(epoch, &path));
        Ok(path)
    }

    /// Run the evaluator on the current models.
    pub fn evaluate(&mut self) -> Result<f64> {
        self.evaluator.evaluate(
            self.generator.as_mut(),
            self.discriminator.as_mut(),
            self.device.as_ref(),
        )
    }
}
