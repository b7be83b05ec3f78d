//! Optimizers, learning-rate schedules and loss scaling

mod adamw;
mod optimizer;
mod scaler;
mod scheduler;
mod sgd;

pub use adamw::AdamW;
pub use optimizer::{Optimizer, OptimizerState};
pub use scaler::{GradScaler, ScalerState};
pub use scheduler::{ConstantLR, CosineAnnealingLR, LRScheduler};
pub use sgd::SGD;
