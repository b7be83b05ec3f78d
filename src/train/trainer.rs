//! Trainer: epoch/iteration orchestration

use super::profile::{Phase, PhaseTimer};
use super::{
    top1_accuracy, BatchHistory, BestMetrics, Criterion, DataLoader, EpochMetrics, EpochReport,
    MetricsTracker, MixStrategy, Model, ModelEma, TrainConfig,
};
use crate::io::{Checkpoint, Checkpointer};
use crate::monitor::ScalarWriter;
use crate::optim::{GradScaler, LRScheduler, Optimizer};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which model a validation pass evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// The model being optimized
    Live,
    /// The EMA shadow model
    Ema,
}

impl ModelKind {
    fn label(self) -> &'static str {
        match self {
            ModelKind::Live => "Validation",
            ModelKind::Ema => "Validation (EMA)",
        }
    }
}

/// Collaborators owned by a [`Trainer`]
pub struct TrainerParts {
    pub model: Box<dyn Model>,
    pub ema: ModelEma,
    pub train_loader: Box<dyn DataLoader>,
    pub valid_loader: Box<dyn DataLoader>,
    pub mix: Box<dyn MixStrategy>,
    pub criterion: Box<dyn Criterion>,
    pub optimizer: Box<dyn Optimizer>,
    pub scheduler: Box<dyn LRScheduler>,
    pub scaler: GradScaler,
    pub checkpointer: Box<dyn Checkpointer>,
    pub writer: Box<dyn ScalarWriter>,
}

/// Result of a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainSummary {
    /// Number of epochs executed by this call
    pub epochs_run: usize,
    pub best_metric: f32,
    pub best_ema_metric: f32,
    /// Report of the final epoch
    pub last: Option<EpochReport>,
    /// Total training time in seconds
    pub elapsed_secs: f64,
}

/// Supervised classification trainer
///
/// Each epoch runs, in order: scheduler step, one training pass, validation
/// of the live model, validation of the EMA model, buffer release, best-metric
/// tracking, checkpointing and epoch logging.
///
/// # Example
///
/// ```no_run
/// use afinar::io::InMemoryCheckpointer;
/// use afinar::monitor::InMemoryWriter;
/// use afinar::optim::{ConstantLR, GradScaler, SGD};
/// use afinar::train::{
///     CrossEntropyLoss, Dataset, InMemoryLoader, LinearClassifier, ModelEma, NoMix,
///     TrainConfig, Trainer, TrainerParts,
/// };
///
/// let data = Dataset::synthetic_blobs(200, 4, 3, 0.5, 0).unwrap();
/// let (train, valid) = data.split(0.2, 0).unwrap();
/// let model = LinearClassifier::new(4, 3, 0).unwrap();
///
/// let parts = TrainerParts {
///     ema: ModelEma::new(&model, 0.99).unwrap(),
///     model: Box::new(model),
///     train_loader: Box::new(InMemoryLoader::new(train, 16).unwrap().with_shuffle(0)),
///     valid_loader: Box::new(InMemoryLoader::new(valid, 16).unwrap()),
///     mix: Box::new(NoMix),
///     criterion: Box::new(CrossEntropyLoss::new()),
///     optimizer: Box::new(SGD::new(0.1, 0.9)),
///     scheduler: Box::new(ConstantLR::new(0.1)),
///     scaler: GradScaler::default(),
///     checkpointer: Box::new(InMemoryCheckpointer::new()),
///     writer: Box::new(InMemoryWriter::new()),
/// };
///
/// let config = TrainConfig::new().with_epochs(0, 5).with_log_freq(10);
/// let mut trainer = Trainer::new(config, parts).unwrap();
/// let summary = trainer.run().unwrap();
/// println!("best accuracy {:.3}", summary.best_metric);
/// ```
pub struct Trainer {
    config: TrainConfig,
    model: Box<dyn Model>,
    ema: ModelEma,
    train_loader: Box<dyn DataLoader>,
    valid_loader: Box<dyn DataLoader>,
    mix: Box<dyn MixStrategy>,
    criterion: Box<dyn Criterion>,
    optimizer: Box<dyn Optimizer>,
    scheduler: Box<dyn LRScheduler>,
    scaler: GradScaler,
    checkpointer: Box<dyn Checkpointer>,
    writer: Box<dyn ScalarWriter>,

    /// Best validation accuracies so far
    best: BestMetrics,

    /// Global training iteration, across epochs
    log_iter: u64,

    /// Phase breakdown of the first trained epoch, when profiling is on
    profile: Option<(usize, PhaseTimer)>,

    /// Epoch reports of this trainer
    pub metrics: MetricsTracker,
}

impl Trainer {
    /// Create a trainer, placing both models on the configured device
    pub fn new(config: TrainConfig, parts: TrainerParts) -> Result<Self> {
        if config.log_freq == 0 {
            return Err(Error::ConfigError("log_freq must be > 0".into()));
        }
        let TrainerParts {
            mut model,
            mut ema,
            train_loader,
            valid_loader,
            mix,
            criterion,
            optimizer,
            scheduler,
            mut scaler,
            checkpointer,
            writer,
        } = parts;

        model.to_device(&config.device)?;
        ema.model_mut().to_device(&config.device)?;
        scaler.set_enabled(config.mixed_precision);

        let best = BestMetrics::new(
            config.best_metric.unwrap_or(0.0),
            config.best_ema_metric.unwrap_or(0.0),
        );
        debug!(
            model = model.name(),
            parameters = model.num_parameters(),
            device = %config.device,
            "Trainer ready"
        );

        Ok(Self {
            config,
            model,
            ema,
            train_loader,
            valid_loader,
            mix,
            criterion,
            optimizer,
            scheduler,
            scaler,
            checkpointer,
            writer,
            best,
            log_iter: 0,
            profile: None,
            metrics: MetricsTracker::new(),
        })
    }

    /// Restore state from a checkpoint and continue after its epoch
    pub fn resume_from(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.model.load_state(&checkpoint.model)?;
        self.ema.model_mut().load_state(&checkpoint.ema)?;
        self.ema.set_updates(checkpoint.ema_updates);
        self.optimizer.load_state(&checkpoint.optimizer)?;
        self.scaler.load_state(&checkpoint.scaler);
        self.best = BestMetrics::new(checkpoint.best_metric, checkpoint.best_ema_metric);
        self.log_iter = checkpoint.log_iter;
        self.config.start_epoch = checkpoint.epoch + 1;
        info!(
            "Resumed from epoch {} (best {:.4}, best EMA {:.4})",
            checkpoint.epoch, checkpoint.best_metric, checkpoint.best_ema_metric
        );
        Ok(())
    }

    /// One training pass over the training loader
    pub fn train_one_epoch(&mut self, epoch: usize) -> Result<EpochMetrics> {
        info!("********************* Training *********************");
        let mut timer = PhaseTimer::new(self.config.profile_first && self.profile.is_none());

        let Self {
            config,
            model,
            ema,
            train_loader,
            mix,
            criterion,
            optimizer,
            scaler,
            writer,
            log_iter,
            ..
        } = self;

        model.train_mode();
        let num_batches = train_loader.len();
        let log_freq = config.log_freq as u64;
        let mut history = BatchHistory::new();
        let mut batches = train_loader.batches();

        for batch_idx in 0usize.. {
            let Some(batch) = timer.time(Phase::Data, || batches.next()) else {
                break;
            };
            let lr = optimizer.lr();
            let batch = model.place_batch(batch?, &config.device)?;

            let mixed = timer.time(Phase::Mix, || mix.forward(batch))?;
            let logits = timer.time(Phase::Forward, || model.forward(&mixed.inputs))?;
            let loss = timer.time(Phase::Loss, || {
                mix.mix_criterion(
                    mixed.mode,
                    &**criterion,
                    &logits,
                    &mixed.target_a,
                    &mixed.target_b,
                    mixed.lam,
                )
            })?;

            optimizer.zero_grad(model.parameters_mut());
            timer.time(Phase::Backward, || {
                model.backward(&scaler.scale_grad(loss.grad))
            })?;
            timer.time(Phase::Step, || -> Result<()> {
                scaler.step(&mut **optimizer, model.parameters_mut())?;
                scaler.update();
                Ok(())
            })?;
            timer.time(Phase::Ema, || ema.update(model.parameters()))?;

            // target_a holds the unmixed targets
            let accuracy = top1_accuracy(&logits, &mixed.target_a)?;
            history.push(loss.value, accuracy);

            if *log_iter % log_freq == 0 {
                writer.add_scalar("Train/Accuracy_iter", f64::from(accuracy), *log_iter)?;
                writer.add_scalar("Train/Loss_iter", f64::from(loss.value), *log_iter)?;
                writer.add_scalar("Train/LearningRate_iter", f64::from(lr), *log_iter)?;
                let running = history.mean();
                info!(
                    "Train Epoch: {} [{}/{} ({:.0}%)]\tLoss: {:.6}\tAcc: {:.3}\tLR: {:.5}",
                    epoch,
                    batch_idx,
                    num_batches,
                    100.0 * batch_idx as f64 / num_batches.max(1) as f64,
                    running.loss,
                    running.accuracy,
                    lr
                );
            }
            *log_iter += 1;
        }
        drop(batches);

        if timer.is_enabled() {
            timer.report(epoch);
            self.profile = Some((epoch, timer));
        }
        if history.is_empty() {
            warn!("Training loader yielded no batches in epoch {epoch}");
        }
        let metrics = history.mean();
        info!(
            "Finish, Accuracy: {:.4}, Loss: {:.4}",
            metrics.accuracy, metrics.loss
        );
        Ok(metrics)
    }

    /// One evaluation pass over the validation loader
    ///
    /// No mixing and no parameter updates; the selected model is left in
    /// eval mode.
    pub fn validate_one_epoch(&mut self, epoch: usize, kind: ModelKind) -> Result<EpochMetrics> {
        info!("********************* {} *********************", kind.label());
        let Self {
            config,
            model,
            ema,
            valid_loader,
            criterion,
            ..
        } = self;

        let model: &mut dyn Model = match kind {
            ModelKind::Live => &mut **model,
            ModelKind::Ema => ema.model_mut(),
        };
        model.eval_mode();

        let mut history = BatchHistory::new();
        for batch in valid_loader.batches() {
            let batch = model.place_batch(batch?, &config.device)?;
            let logits = model.forward(&batch.inputs)?;
            let loss = criterion.forward(&logits, &batch.targets)?;
            history.push(loss.value, top1_accuracy(&logits, &batch.targets)?);
        }

        if history.is_empty() {
            warn!("Validation loader yielded no batches in epoch {epoch}");
        }
        let metrics = history.mean();
        info!(
            "Finish, Accuracy: {:.4}, Loss: {:.4}",
            metrics.accuracy, metrics.loss
        );
        Ok(metrics)
    }

    /// Write the per-epoch scalars at step `epoch`
    pub fn write_log(
        &mut self,
        epoch: usize,
        lr: f32,
        train: &EpochMetrics,
        valid: &EpochMetrics,
        valid_ema: &EpochMetrics,
    ) -> Result<()> {
        let step = epoch as u64;
        let scalars = [
            ("LearningRate", lr),
            ("Train/Accuracy", train.accuracy),
            ("Train/Loss", train.loss),
            ("Valid/Accuracy", valid.accuracy),
            ("Valid/Loss", valid.loss),
            ("Valid/EMA_Accuracy", valid_ema.accuracy),
            ("Valid/EMA_Loss", valid_ema.loss),
        ];
        for (tag, value) in scalars {
            self.writer.add_scalar(tag, f64::from(value), step)?;
        }
        Ok(())
    }

    /// Snapshot of the current training state after `epoch`
    pub fn checkpoint(&self, epoch: usize) -> Checkpoint {
        Checkpoint {
            epoch,
            model: self.model.state(),
            ema: self.ema.model().state(),
            optimizer: self.optimizer.state(),
            scaler: self.scaler.state(),
            best_metric: self.best.best_metric,
            best_ema_metric: self.best.best_ema_metric,
            log_iter: self.log_iter,
            ema_updates: self.ema.updates(),
        }
    }

    /// Run epochs `start_epoch..max_epoch`
    pub fn run(&mut self) -> Result<TrainSummary> {
        let start = Instant::now();

        // Parameters carry no gradients here, so this step changes nothing
        self.optimizer.zero_grad(self.model.parameters_mut());
        self.optimizer.step(self.model.parameters_mut())?;

        let (first, last) = (self.config.start_epoch, self.config.max_epoch);
        if first >= last {
            info!("Nothing to train: start epoch {first} >= max epoch {last}");
        }

        let mut epochs_run = 0;
        let mut last_report = None;
        for epoch in first..last {
            self.scheduler.step(epoch + 1, self.optimizer.as_mut());

            info!("{}", "=".repeat(80));
            let train = self.train_one_epoch(epoch)?;
            let valid = self.validate_one_epoch(epoch, ModelKind::Live)?;
            let valid_ema = self.validate_one_epoch(epoch, ModelKind::Ema)?;
            self.model.release_buffers();
            self.ema.model_mut().release_buffers();

            let (is_best, is_ema_best) = self.best.observe(valid.accuracy, valid_ema.accuracy);
            let checkpoint = self.checkpoint(epoch);
            self.checkpointer.save(&checkpoint, is_best, is_ema_best)?;

            let lr = self.optimizer.lr();
            self.write_log(epoch, lr, &train, &valid, &valid_ema)?;
            self.writer.flush()?;

            let report = EpochReport {
                epoch,
                lr,
                train,
                valid,
                valid_ema,
                is_best,
                is_ema_best,
            };
            self.metrics.record(report);
            last_report = Some(report);
            epochs_run += 1;
            info!("{}", "=".repeat(80));
        }

        Ok(TrainSummary {
            epochs_run,
            best_metric: self.best.best_metric,
            best_ema_metric: self.best.best_ema_metric,
            last: last_report,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Get current learning rate
    pub fn lr(&self) -> f32 {
        self.optimizer.lr()
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn best(&self) -> BestMetrics {
        self.best
    }

    pub fn log_iter(&self) -> u64 {
        self.log_iter
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn ema(&self) -> &ModelEma {
        &self.ema
    }

    pub fn scaler(&self) -> &GradScaler {
        &self.scaler
    }

    /// Epoch and phase timings of the profiled epoch
    pub fn profile(&self) -> Option<(usize, &PhaseTimer)> {
        self.profile.as_ref().map(|(epoch, timer)| (*epoch, timer))
    }
}
