//! # Afinar: supervised training orchestration
//!
//! Afinar drives epoch-based classifier training: a training pass with
//! optional mixup/cutmix batch mixing and dynamic loss scaling, an EMA shadow
//! model updated after every optimizer step, validation of both models,
//! best-metric checkpointing and a scalar metrics log.
//!
//! ## Architecture
//!
//! - **train**: Trainer, model/criterion/mixing/data traits, EMA, reference backend
//! - **optim**: Optimizers (SGD, AdamW), LR schedules, gradient scaler
//! - **io**: Checkpoints (JSON) and weight export (SafeTensors)
//! - **monitor**: Scalar metrics writers
//! - **config**: Declarative YAML configuration and CLI

pub mod config;
pub mod io;
pub mod monitor;
pub mod optim;
pub mod train;

pub mod error;

// Re-export commonly used types
pub use error::{Error, Result};
