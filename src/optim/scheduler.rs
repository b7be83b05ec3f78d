//! Learning rate schedulers

use super::Optimizer;
use std::f32::consts::PI;

/// Epoch-indexed learning rate scheduler
pub trait LRScheduler: Send {
    /// Learning rate for `epoch`
    fn lr_at(&self, epoch: usize) -> f32;

    /// Apply the learning rate for `epoch` to the optimizer
    fn step(&mut self, epoch: usize, optimizer: &mut dyn Optimizer) {
        optimizer.set_lr(self.lr_at(epoch));
    }
}

/// Cosine Annealing Learning Rate Scheduler with linear warmup
///
/// During the first `warmup_epochs` the learning rate ramps linearly from
/// `warmup_lr` to `lr_max`; afterwards it follows a cosine curve:
///
/// Formula: lr_t = lr_min + 0.5 * (lr_max - lr_min) * (1 + cos(π * t / T))
///
/// Where:
/// - t is the epoch minus the warmup epochs
/// - T is `t_max` minus the warmup epochs
/// - lr_max is the initial learning rate
/// - lr_min is the minimum learning rate (default 0)
#[derive(Clone, Debug)]
pub struct CosineAnnealingLR {
    lr_max: f32,
    lr_min: f32,
    t_max: usize,
    warmup_epochs: usize,
    warmup_lr: f32,
}

impl CosineAnnealingLR {
    /// Create a new cosine annealing scheduler
    ///
    /// # Arguments
    /// * `lr_max` - Initial (maximum) learning rate
    /// * `t_max` - Total number of epochs for the schedule
    /// * `lr_min` - Minimum learning rate
    pub fn new(lr_max: f32, t_max: usize, lr_min: f32) -> Self {
        Self {
            lr_max,
            lr_min,
            t_max,
            warmup_epochs: 0,
            warmup_lr: lr_min,
        }
    }

    /// Create scheduler with lr_min = 0
    pub fn default_min(lr_max: f32, t_max: usize) -> Self {
        Self::new(lr_max, t_max, 0.0)
    }

    /// Ramp linearly from `warmup_lr` over `epochs`
    pub fn with_warmup(mut self, epochs: usize, warmup_lr: f32) -> Self {
        self.warmup_epochs = epochs;
        self.warmup_lr = warmup_lr;
        self
    }
}

impl LRScheduler for CosineAnnealingLR {
    fn lr_at(&self, epoch: usize) -> f32 {
        if epoch < self.warmup_epochs {
            let frac = epoch as f32 / self.warmup_epochs as f32;
            return self.warmup_lr + (self.lr_max - self.warmup_lr) * frac;
        }
        let span = self.t_max.saturating_sub(self.warmup_epochs);
        let t = epoch - self.warmup_epochs;
        if t >= span {
            return self.lr_min;
        }

        let progress = t as f32 / span as f32;
        let cosine_decay = 0.5 * (1.0 + (PI * progress).cos());
        self.lr_min + (self.lr_max - self.lr_min) * cosine_decay
    }
}

/// Fixed learning rate
#[derive(Clone, Copy, Debug)]
pub struct ConstantLR {
    lr: f32,
}

impl ConstantLR {
    pub fn new(lr: f32) -> Self {
        Self { lr }
    }
}

impl LRScheduler for ConstantLR {
    fn lr_at(&self, _epoch: usize) -> f32 {
        self.lr
    }
}
