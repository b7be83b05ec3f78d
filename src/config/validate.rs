//! Configuration validation

use super::schema::{DataSource, TrainSpec};
use crate::train::Device;

/// Validation error type
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("Data file does not exist: {0}")]
    DataNotFound(String),

    #[error("Invalid learning rate: {0} (must be > 0.0)")]
    InvalidLearningRate(f32),

    #[error("Invalid batch size: {0} (must be > 0)")]
    InvalidBatchSize(usize),

    #[error("Invalid log frequency: {0} (must be > 0)")]
    InvalidLogFreq(usize),

    #[error("Invalid epoch range: start {start} > max {max}")]
    InvalidEpochRange { start: usize, max: usize },

    #[error("Invalid max epoch: {0} (must be > 0)")]
    InvalidMaxEpoch(usize),

    #[error("Invalid optimizer: {0} (must be one of: sgd, adamw)")]
    InvalidOptimizer(String),

    #[error("Invalid scheduler: {0} (must be one of: cosine, constant)")]
    InvalidScheduler(String),

    #[error("Invalid model architecture: {0} (must be: linear)")]
    InvalidArch(String),

    #[error("Invalid number of classes: {0} (must be >= 2)")]
    InvalidNumClasses(usize),

    #[error("Invalid EMA decay: {0} (must be in (0, 1))")]
    InvalidEmaDecay(f32),

    #[error("Invalid mix {name}: {value} (must be in [0, 1])")]
    InvalidMixProbability { name: &'static str, value: f32 },

    #[error("Invalid mix {name}: {value} (must be >= 0)")]
    InvalidMixAlpha { name: &'static str, value: f32 },

    #[error("Invalid label smoothing: {0} (must be in [0, 1))")]
    InvalidLabelSmoothing(f32),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Invalid valid fraction: {0} (must be in (0, 1))")]
    InvalidValidFraction(f32),

    #[error("Invalid synthetic data: {0}")]
    InvalidSynthetic(String),
}

/// Validate a training specification
///
/// Checks:
/// - Data files exist
/// - Numeric values are in valid ranges
/// - Names match allowed values
pub fn validate_config(spec: &TrainSpec) -> Result<(), ValidationError> {
    // Validate data paths (skip in tests where files may not exist)
    #[cfg(not(test))]
    {
        if let DataSource::Path(path) = &spec.data.source {
            if !path.exists() {
                return Err(ValidationError::DataNotFound(path.display().to_string()));
            }
        }
        if let Some(path) = &spec.data.valid {
            if !path.exists() {
                return Err(ValidationError::DataNotFound(path.display().to_string()));
            }
        }
    }

    if spec.common.log_freq == 0 {
        return Err(ValidationError::InvalidLogFreq(spec.common.log_freq));
    }

    // Validate epochs
    if spec.trainer.max_epoch == 0 {
        return Err(ValidationError::InvalidMaxEpoch(spec.trainer.max_epoch));
    }
    if spec.trainer.start_epoch > spec.trainer.max_epoch {
        return Err(ValidationError::InvalidEpochRange {
            start: spec.trainer.start_epoch,
            max: spec.trainer.max_epoch,
        });
    }

    if spec.trainer.device.parse::<Device>().is_err() {
        return Err(ValidationError::InvalidDevice(spec.trainer.device.clone()));
    }

    if spec.model.arch != "linear" {
        return Err(ValidationError::InvalidArch(spec.model.arch.clone()));
    }
    if spec.model.num_classes < 2 {
        return Err(ValidationError::InvalidNumClasses(spec.model.num_classes));
    }

    // Validate batch size
    if spec.data.batch_size == 0 {
        return Err(ValidationError::InvalidBatchSize(spec.data.batch_size));
    }
    let fraction = spec.data.valid_fraction;
    if spec.data.valid.is_none() && !(fraction > 0.0 && fraction < 1.0) {
        return Err(ValidationError::InvalidValidFraction(fraction));
    }
    if let DataSource::Synthetic(synthetic) = &spec.data.source {
        if synthetic.samples == 0 || synthetic.features == 0 {
            return Err(ValidationError::InvalidSynthetic(
                "samples and features must be > 0".to_string(),
            ));
        }
        if !(synthetic.spread >= 0.0 && synthetic.spread.is_finite()) {
            return Err(ValidationError::InvalidSynthetic(format!(
                "spread {} must be a finite value >= 0",
                synthetic.spread
            )));
        }
    }

    // Validate learning rate
    if spec.optimizer.lr <= 0.0 {
        return Err(ValidationError::InvalidLearningRate(spec.optimizer.lr));
    }

    // Validate optimizer name
    let valid_optimizers = ["sgd", "adamw"];
    if !valid_optimizers.contains(&spec.optimizer.name.as_str()) {
        return Err(ValidationError::InvalidOptimizer(
            spec.optimizer.name.clone(),
        ));
    }

    let valid_schedulers = ["cosine", "constant"];
    if !valid_schedulers.contains(&spec.scheduler.name.as_str()) {
        return Err(ValidationError::InvalidScheduler(
            spec.scheduler.name.clone(),
        ));
    }

    if !(spec.ema.decay > 0.0 && spec.ema.decay < 1.0) {
        return Err(ValidationError::InvalidEmaDecay(spec.ema.decay));
    }

    let mix = &spec.mix;
    for (name, value) in [("prob", mix.prob), ("switch_prob", mix.switch_prob)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::InvalidMixProbability { name, value });
        }
    }
    for (name, value) in [
        ("mixup_alpha", mix.mixup_alpha),
        ("cutmix_alpha", mix.cutmix_alpha),
    ] {
        if !(value >= 0.0) {
            return Err(ValidationError::InvalidMixAlpha { name, value });
        }
    }

    let smoothing = spec.loss.label_smoothing;
    if !(0.0..1.0).contains(&smoothing) {
        return Err(ValidationError::InvalidLabelSmoothing(smoothing));
    }

    Ok(())
}
