//! Build training components from configuration

use super::schema::{DataSource, OptimSpec, SchedulerSpec, TrainSpec};
use crate::error::{Error, Result};
use crate::io::FileCheckpointer;
use crate::monitor::{JsonlWriter, ScalarWriter};
use crate::optim::{AdamW, ConstantLR, CosineAnnealingLR, GradScaler, LRScheduler, Optimizer, SGD};
use crate::train::{
    CrossEntropyLoss, Dataset, Device, InMemoryLoader, LinearClassifier, Mix, MixStrategy,
    ModelEma, NoMix, TrainConfig, Trainer, TrainerParts,
};
use std::path::PathBuf;
use tracing::info;

/// Scalar log location under the save directory
pub const SCALARS_FILE: &str = "tb_logs/scalars.jsonl";

/// Build optimizer from configuration
pub fn build_optimizer(spec: &OptimSpec) -> Result<Box<dyn Optimizer>> {
    match spec.name.to_lowercase().as_str() {
        "sgd" => Ok(Box::new(
            SGD::new(spec.lr, spec.momentum)
                .with_weight_decay(spec.weight_decay)
                .with_nesterov(spec.nesterov),
        )),
        "adamw" => {
            let (beta1, beta2) = spec.betas;
            Ok(Box::new(AdamW::new(
                spec.lr,
                beta1,
                beta2,
                spec.eps,
                spec.weight_decay,
            )))
        }
        name => Err(Error::ConfigError(format!(
            "Unknown optimizer: {}. Supported: sgd, adamw",
            name
        ))),
    }
}

/// Build the learning rate schedule over `max_epoch` epochs
pub fn build_scheduler(
    spec: &SchedulerSpec,
    lr: f32,
    max_epoch: usize,
) -> Result<Box<dyn LRScheduler>> {
    match spec.name.to_lowercase().as_str() {
        "cosine" => Ok(Box::new(
            CosineAnnealingLR::new(lr, max_epoch, spec.min_lr)
                .with_warmup(spec.warmup_epochs, spec.warmup_lr),
        )),
        "constant" => Ok(Box::new(ConstantLR::new(lr))),
        name => Err(Error::ConfigError(format!(
            "Unknown scheduler: {}. Supported: cosine, constant",
            name
        ))),
    }
}

/// Build the batch mixing strategy; [`NoMix`] when both alphas are zero
pub fn build_mix(spec: &TrainSpec) -> Box<dyn MixStrategy> {
    if spec.mix.is_enabled() {
        Box::new(Mix::new(spec.mix, spec.common.seed))
    } else {
        Box::new(NoMix)
    }
}

/// Load or generate the training and validation datasets
pub fn build_datasets(spec: &TrainSpec) -> Result<(Dataset, Dataset)> {
    let seed = spec.common.seed;
    let source = match &spec.data.source {
        DataSource::Synthetic(synthetic) => Dataset::synthetic_blobs(
            synthetic.samples,
            synthetic.features,
            spec.model.num_classes,
            synthetic.spread,
            seed,
        )?,
        DataSource::Path(path) => Dataset::from_json_file(path)?,
    };

    let (train, valid) = match &spec.data.valid {
        Some(path) => (source, Dataset::from_json_file(path)?),
        None => source.split(spec.data.valid_fraction, seed)?,
    };

    if train.num_features() != valid.num_features() {
        return Err(Error::ShapeMismatch {
            expected: vec![train.num_features()],
            got: vec![valid.num_features()],
        });
    }
    for dataset in [&train, &valid] {
        if dataset.num_classes() > spec.model.num_classes {
            return Err(Error::Data(format!(
                "dataset has {} classes but model.num_classes is {}",
                dataset.num_classes(),
                spec.model.num_classes
            )));
        }
    }
    Ok((train, valid))
}

/// Build the model named by `model.arch`
pub fn build_model(spec: &TrainSpec, in_features: usize) -> Result<LinearClassifier> {
    match spec.model.arch.as_str() {
        "linear" => LinearClassifier::new(in_features, spec.model.num_classes, spec.common.seed),
        arch => Err(Error::ConfigError(format!(
            "Unknown model architecture: {}. Supported: linear",
            arch
        ))),
    }
}

/// Trainer options from the `common` and `trainer` sections
pub fn trainer_config(spec: &TrainSpec) -> Result<TrainConfig> {
    let device: Device = spec.trainer.device.parse()?;
    let mut config = TrainConfig::new()
        .with_epochs(spec.trainer.start_epoch, spec.trainer.max_epoch)
        .with_log_freq(spec.common.log_freq)
        .with_mixed_precision(spec.common.mixed_precision)
        .with_profile_first(spec.common.profile_first)
        .with_device(device);
    config.best_metric = spec.trainer.best_metric;
    config.best_ema_metric = spec.trainer.best_ema_metric;
    Ok(config)
}

/// Path of the scalar log for a spec
pub fn scalars_path(spec: &TrainSpec) -> PathBuf {
    spec.common.save_dir.join(SCALARS_FILE)
}

/// Assemble a trainer writing checkpoints and scalars under `common.save_dir`
pub fn build_trainer(spec: &TrainSpec) -> Result<Trainer> {
    let writer = JsonlWriter::open(scalars_path(spec))?;
    build_trainer_with_writer(spec, Box::new(writer))
}

/// Assemble a trainer around a caller-provided scalar writer
pub fn build_trainer_with_writer(
    spec: &TrainSpec,
    writer: Box<dyn ScalarWriter>,
) -> Result<Trainer> {
    let config = trainer_config(spec)?;
    let (train, valid) = build_datasets(spec)?;
    info!(
        train = train.len(),
        valid = valid.len(),
        features = train.num_features(),
        "Datasets ready"
    );

    let model = build_model(spec, train.num_features())?;
    let ema = ModelEma::new(&model, spec.ema.decay)?.with_warmup(spec.ema.warmup);

    let mut train_loader = InMemoryLoader::new(train, spec.data.batch_size)?
        .with_drop_last(spec.data.drop_last);
    if spec.data.shuffle {
        train_loader = train_loader.with_shuffle(spec.common.seed);
    }
    let valid_loader = InMemoryLoader::new(valid, spec.data.batch_size)?;

    let criterion = CrossEntropyLoss::new().with_label_smoothing(spec.loss.label_smoothing);
    let checkpointer =
        FileCheckpointer::new(&spec.common.save_dir)?.with_model_name(spec.model.arch.clone());

    let parts = TrainerParts {
        model: Box::new(model),
        ema,
        train_loader: Box::new(train_loader),
        valid_loader: Box::new(valid_loader),
        mix: build_mix(spec),
        criterion: Box::new(criterion),
        optimizer: build_optimizer(&spec.optimizer)?,
        scheduler: build_scheduler(&spec.scheduler, spec.optimizer.lr, spec.trainer.max_epoch)?,
        scaler: GradScaler::new(spec.common.mixed_precision),
        checkpointer: Box::new(checkpointer),
        writer,
    };
    Trainer::new(config, parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;
    use crate::monitor::InMemoryWriter;
    use crate::train::{MixConfig, Model};
    use tempfile::TempDir;

    fn spec(save_dir: PathBuf) -> TrainSpec {
        TrainSpec {
            common: CommonSpec {
                log_freq: 2,
                save_dir,
                ..CommonSpec::default()
            },
            trainer: TrainerSpec {
                max_epoch: 2,
                ..TrainerSpec::default()
            },
            model: ModelSpec {
                arch: "linear".to_string(),
                num_classes: 3,
            },
            data: DataConfig {
                batch_size: 8,
                shuffle: true,
                drop_last: false,
                source: DataSource::Synthetic(SyntheticSpec {
                    samples: 60,
                    features: 4,
                    spread: 0.5,
                }),
                valid: None,
                valid_fraction: 0.25,
            },
            optimizer: OptimSpec {
                name: "sgd".to_string(),
                lr: 0.1,
                momentum: 0.9,
                weight_decay: 0.0,
                nesterov: false,
                betas: (0.9, 0.999),
                eps: 1e-8,
            },
            scheduler: SchedulerSpec::default(),
            mix: MixConfig::default(),
            ema: EmaSpec {
                decay: 0.9,
                warmup: false,
            },
            loss: LossSpec::default(),
        }
    }

    #[test]
    fn test_build_optimizer_by_name() {
        let dir = TempDir::new().unwrap();
        let mut spec = spec(dir.path().to_path_buf());
        assert_eq!(build_optimizer(&spec.optimizer).unwrap().name(), "sgd");

        spec.optimizer.name = "AdamW".to_string();
        let optimizer = build_optimizer(&spec.optimizer).unwrap();
        assert_eq!(optimizer.name(), "adamw");
        assert_eq!(optimizer.lr(), 0.1);

        spec.optimizer.name = "lion".to_string();
        assert!(build_optimizer(&spec.optimizer).is_err());
    }

    #[test]
    fn test_build_scheduler() {
        let cosine = build_scheduler(&SchedulerSpec::default(), 0.1, 10).unwrap();
        assert!((cosine.lr_at(0) - 0.1).abs() < 1e-6);
        assert!((cosine.lr_at(10) - 1e-5).abs() < 1e-6);

        let constant = SchedulerSpec {
            name: "constant".to_string(),
            ..SchedulerSpec::default()
        };
        let constant = build_scheduler(&constant, 0.1, 10).unwrap();
        assert_eq!(constant.lr_at(7), 0.1);
    }

    #[test]
    fn test_build_datasets_split() {
        let dir = TempDir::new().unwrap();
        let spec = spec(dir.path().to_path_buf());
        let (train, valid) = build_datasets(&spec).unwrap();
        assert_eq!(train.len() + valid.len(), 60);
        assert_eq!(valid.len(), 15);
        assert_eq!(train.num_features(), 4);
    }

    #[test]
    fn test_build_datasets_rejects_extra_classes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(
            &path,
            r#"{"inputs": [[0.0, 1.0], [1.0, 0.0], [2.0, 2.0], [3.0, 3.0]], "targets": [0, 1, 2, 3]}"#,
        )
        .unwrap();
        let mut spec = spec(dir.path().to_path_buf());
        spec.data.source = DataSource::Path(path);
        assert!(matches!(build_datasets(&spec), Err(Error::Data(_))));
    }

    #[test]
    fn test_trainer_config_from_spec() {
        let dir = TempDir::new().unwrap();
        let mut spec = spec(dir.path().to_path_buf());
        spec.trainer.best_metric = Some(0.5);
        spec.trainer.device = "cuda:2".to_string();
        let config = trainer_config(&spec).unwrap();
        assert_eq!(config.log_freq, 2);
        assert_eq!(config.max_epoch, 2);
        assert_eq!(config.device, Device::Cuda(2));
        assert_eq!(config.best_metric, Some(0.5));
        assert_eq!(config.best_ema_metric, None);
    }

    #[test]
    fn test_build_trainer_with_writer_runs() {
        let dir = TempDir::new().unwrap();
        let spec = spec(dir.path().to_path_buf());
        let writer = InMemoryWriter::new();
        let mut trainer = build_trainer_with_writer(&spec, Box::new(writer.clone())).unwrap();
        assert_eq!(trainer.model().name(), "linear");

        let summary = trainer.run().unwrap();
        assert_eq!(summary.epochs_run, 2);
        assert_eq!(writer.query("Valid/EMA_Accuracy").len(), 2);
        assert!(dir.path().join(crate::io::LAST_CHECKPOINT).exists());
    }

    #[test]
    fn test_build_trainer_rejects_gpu_for_reference_model() {
        let dir = TempDir::new().unwrap();
        let mut spec = spec(dir.path().to_path_buf());
        spec.trainer.device = "cuda".to_string();
        let result = build_trainer_with_writer(&spec, Box::new(InMemoryWriter::new()));
        assert!(matches!(result, Err(Error::UnsupportedDevice(_))));
    }
}
