//! Declarative YAML configuration
//!
//! A training run is described by one YAML file and turned into a ready
//! [`crate::train::Trainer`] by [`build_trainer`].
//!
//! # Example
//!
//! ```yaml
//! common:
//!   log_freq: 50
//!   save_dir: ./results
//!
//! trainer:
//!   max_epoch: 30
//!
//! model:
//!   num_classes: 10
//!
//! data:
//!   batch_size: 64
//!   source:
//!     path: train.json
//!   valid: valid.json
//!
//! optimizer:
//!   name: adamw
//!   lr: 0.0005
//!
//! mix:
//!   mixup_alpha: 0.8
//!   cutmix_alpha: 1.0
//!
//! ema:
//!   decay: 0.9998
//! ```

mod builder;
mod cli;
mod schema;
mod train;
mod validate;



pub use builder::{
    build_datasets, build_mix, build_model, build_optimizer, build_scheduler, build_trainer,
    build_trainer_with_writer, scalars_path, trainer_config, SCALARS_FILE,
};
pub use cli::{
    apply_overrides, parse_args, Cli, Command, InfoArgs, OutputFormat, TrainArgs, ValidateArgs,
};
pub use schema::{
    CommonSpec, DataConfig, DataSource, EmaSpec, LossSpec, ModelSpec, OptimSpec, SchedulerSpec,
    SyntheticSpec, TrainSpec, TrainerSpec,
};
pub use train::{load_config, parse_config, run_training, train_from_yaml};
pub use validate::{validate_config, ValidationError};
