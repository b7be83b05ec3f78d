//! Training loop
//!
//! This module provides the epoch-driven trainer and the capabilities it
//! drives:
//! - [`Model`], [`Criterion`], [`MixStrategy`] and [`DataLoader`] traits
//! - EMA shadow weights ([`ModelEma`])
//! - a host-side reference backend ([`LinearClassifier`], [`CrossEntropyLoss`],
//!   [`Mix`], [`InMemoryLoader`])
//! - per-epoch metrics and best-metric tracking
//!
//! See [`Trainer`] for a complete example.

mod batch;
mod config;
mod data;
mod device;
mod ema;
mod linear;
mod loss;
mod metrics;
mod mix;
mod model;
pub mod profile;
mod trainer;

pub use batch::Batch;
pub use config::{EpochReport, MetricsTracker, TrainConfig};
pub use data::{DataLoader, Dataset, InMemoryLoader};
pub use device::Device;
pub use ema::ModelEma;
pub use linear::LinearClassifier;
pub use loss::{Criterion, CrossEntropyLoss, LossOutput};
pub use metrics::{top1_accuracy, BatchHistory, BestMetrics, EpochMetrics};
pub use mix::{Mix, MixConfig, MixMode, MixStrategy, MixedBatch, NoMix};
pub use model::{Model, Parameter};
pub use trainer::{ModelKind, TrainSummary, Trainer, TrainerParts};
