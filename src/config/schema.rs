//! YAML schema definitions for declarative training configuration

use crate::train::MixConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete training specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainSpec {
    /// Run-wide settings
    #[serde(default)]
    pub common: CommonSpec,

    /// Epoch range, device and resume metrics
    #[serde(default)]
    pub trainer: TrainerSpec,

    /// Model configuration
    pub model: ModelSpec,

    /// Data configuration
    pub data: DataConfig,

    /// Optimizer configuration
    pub optimizer: OptimSpec,

    /// Learning rate schedule
    #[serde(default)]
    pub scheduler: SchedulerSpec,

    /// Mixup / cutmix
    #[serde(default)]
    pub mix: MixConfig,

    /// EMA shadow model
    #[serde(default)]
    pub ema: EmaSpec,

    #[serde(default)]
    pub loss: LossSpec,
}

/// Run-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSpec {
    /// Per-iteration logging frequency
    pub log_freq: usize,

    /// Dynamic loss scaling
    pub mixed_precision: bool,

    /// Time each phase of the first epoch
    pub profile_first: bool,

    /// Seed for initialisation, shuffling and mixing
    pub seed: u64,

    /// Output directory for checkpoints and logs
    pub save_dir: PathBuf,
}

impl Default for CommonSpec {
    fn default() -> Self {
        Self {
            log_freq: 100,
            mixed_precision: true,
            profile_first: false,
            seed: 0,
            save_dir: PathBuf::from("./results"),
        }
    }
}

/// Epoch range and placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSpec {
    pub start_epoch: usize,
    pub max_epoch: usize,

    /// "cpu" | "cuda" | "cuda:N" | "mps"
    pub device: String,

    /// Best accuracies carried over from a previous run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_metric: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_ema_metric: Option<f32>,
}

impl Default for TrainerSpec {
    fn default() -> Self {
        Self {
            start_epoch: 0,
            max_epoch: 50,
            device: "cpu".to_string(),
            best_metric: None,
            best_ema_metric: None,
        }
    }
}

/// Model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Architecture name; only "linear" is built in
    #[serde(default = "default_arch")]
    pub arch: String,

    pub num_classes: usize,
}

/// Data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Batch size
    pub batch_size: usize,

    /// Reshuffle training samples every epoch
    #[serde(default = "default_true")]
    pub shuffle: bool,

    /// Drop the trailing partial training batch
    #[serde(default)]
    pub drop_last: bool,

    /// Training samples
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub source: DataSource,

    /// Optional validation data file; split from `source` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<PathBuf>,

    /// Fraction of `source` held out for validation when `valid` is absent
    #[serde(default = "default_valid_fraction")]
    pub valid_fraction: f32,
}

/// Where samples come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Gaussian blobs, one per class
    Synthetic(SyntheticSpec),
    /// JSON dataset file
    Path(PathBuf),
}

/// Synthetic dataset parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSpec {
    pub samples: usize,
    pub features: usize,
    /// Standard deviation around each class centre
    pub spread: f32,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            samples: 512,
            features: 16,
            spread: 1.0,
        }
    }
}

/// Optimizer specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimSpec {
    /// Optimizer name: "sgd" | "adamw"
    pub name: String,

    /// Learning rate
    pub lr: f32,

    /// SGD momentum
    #[serde(default = "default_momentum")]
    pub momentum: f32,

    #[serde(default)]
    pub weight_decay: f32,

    /// SGD Nesterov momentum
    #[serde(default)]
    pub nesterov: bool,

    /// AdamW (beta1, beta2)
    #[serde(default = "default_betas")]
    pub betas: (f32, f32),

    /// AdamW epsilon
    #[serde(default = "default_eps")]
    pub eps: f32,
}

/// Learning rate schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSpec {
    /// "cosine" | "constant"
    pub name: String,

    pub warmup_epochs: usize,

    /// Learning rate at the start of warmup
    pub warmup_lr: f32,

    /// Floor of the cosine schedule
    pub min_lr: f32,
}

impl Default for SchedulerSpec {
    fn default() -> Self {
        Self {
            name: "cosine".to_string(),
            warmup_epochs: 0,
            warmup_lr: 1e-6,
            min_lr: 1e-5,
        }
    }
}

/// EMA shadow model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaSpec {
    pub decay: f32,

    /// Ramp the decay up over the first updates
    pub warmup: bool,
}

impl Default for EmaSpec {
    fn default() -> Self {
        Self {
            decay: 0.9998,
            warmup: false,
        }
    }
}

/// Loss function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LossSpec {
    pub label_smoothing: f32,
}

fn default_true() -> bool {
    true
}

fn default_arch() -> String {
    "linear".to_string()
}

fn default_valid_fraction() -> f32 {
    0.2
}

fn default_momentum() -> f32 {
    0.9
}

fn default_betas() -> (f32, f32) {
    (0.9, 0.999)
}

fn default_eps() -> f32 {
    1e-8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let yaml = r#"
model:
  num_classes: 3

data:
  batch_size: 8
  source:
    synthetic: { samples: 64, features: 4 }

optimizer:
  name: sgd
  lr: 0.1
"#;

        let spec: TrainSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.model.arch, "linear");
        assert_eq!(spec.data.batch_size, 8);
        assert!(spec.data.shuffle);
        assert_eq!(spec.data.valid_fraction, 0.2);
        assert_eq!(
            spec.data.source,
            DataSource::Synthetic(SyntheticSpec {
                samples: 64,
                features: 4,
                spread: 1.0
            })
        );
        assert_eq!(spec.optimizer.momentum, 0.9);
        assert_eq!(spec.common.log_freq, 100);
        assert!(spec.common.mixed_precision);
        assert_eq!(spec.trainer.max_epoch, 50);
        assert_eq!(spec.trainer.device, "cpu");
        assert_eq!(spec.ema.decay, 0.9998);
        assert_eq!(spec.scheduler.name, "cosine");
        assert_eq!(spec.mix, MixConfig::default());
    }

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r#"
common:
  log_freq: 10
  mixed_precision: false
  profile_first: true
  seed: 7
  save_dir: ./outputs

trainer:
  start_epoch: 2
  max_epoch: 20
  device: cuda:1
  best_metric: 0.8
  best_ema_metric: 0.82

model:
  arch: linear
  num_classes: 10

data:
  batch_size: 32
  shuffle: false
  drop_last: true
  source:
    path: train.json
  valid: valid.json

optimizer:
  name: adamw
  lr: 0.001
  weight_decay: 0.05
  betas: [0.9, 0.99]

scheduler:
  name: cosine
  warmup_epochs: 3
  warmup_lr: 0.0001
  min_lr: 0.00001

mix:
  mixup_alpha: 0.8
  cutmix_alpha: 1.0
  prob: 0.5

ema:
  decay: 0.999
  warmup: true

loss:
  label_smoothing: 0.1
"#;

        let spec: TrainSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.common.seed, 7);
        assert!(spec.common.profile_first);
        assert_eq!(spec.trainer.best_ema_metric, Some(0.82));
        assert_eq!(spec.data.source, DataSource::Path(PathBuf::from("train.json")));
        assert_eq!(spec.data.valid, Some(PathBuf::from("valid.json")));
        assert_eq!(spec.optimizer.betas, (0.9, 0.99));
        assert_eq!(spec.scheduler.warmup_epochs, 3);
        assert_eq!(spec.mix.prob, 0.5);
        assert_eq!(spec.mix.switch_prob, 0.5);
        assert!(spec.ema.warmup);
        assert_eq!(spec.loss.label_smoothing, 0.1);
    }
}
