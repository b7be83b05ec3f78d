//! Dynamic loss scaling for mixed-precision training

use super::Optimizer;
use crate::train::Parameter;
use crate::Result;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Serializable scaler state
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub enabled: bool,
    pub scale: f32,
    pub growth_tracker: u32,
}

/// Gradient scaler
///
/// Multiplies the loss gradient by `scale` before backward, divides the
/// parameter gradients by it before the optimizer step and skips steps whose
/// gradients overflowed. The scale backs off on overflow and grows after
/// `growth_interval` consecutive clean steps. Disabled, it is a plain
/// optimizer step with scale 1.
#[derive(Clone, Debug)]
pub struct GradScaler {
    enabled: bool,
    scale: f32,
    growth_factor: f32,
    backoff_factor: f32,
    growth_interval: u32,
    growth_tracker: u32,
    found_inf: bool,
}

impl Default for GradScaler {
    fn default() -> Self {
        Self::new(true)
    }
}

impl GradScaler {
    pub const INIT_SCALE: f32 = 65536.0;

    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            scale: Self::INIT_SCALE,
            growth_factor: 2.0,
            backoff_factor: 0.5,
            growth_interval: 2000,
            growth_tracker: 0,
            found_inf: false,
        }
    }

    pub fn with_init_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_growth_interval(mut self, interval: u32) -> Self {
        self.growth_interval = interval.max(1);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current scale (1 when disabled)
    pub fn scale(&self) -> f32 {
        if self.enabled {
            self.scale
        } else {
            1.0
        }
    }

    /// Whether the last `step` was skipped because of overflow
    pub fn found_inf(&self) -> bool {
        self.found_inf
    }

    /// Scale the loss gradient ahead of backward
    pub fn scale_grad(&self, grad: Array2<f32>) -> Array2<f32> {
        if self.enabled {
            grad * self.scale
        } else {
            grad
        }
    }

    /// Unscale gradients and step the optimizer unless they overflowed
    ///
    /// Returns whether the optimizer stepped.
    pub fn step(
        &mut self,
        optimizer: &mut dyn Optimizer,
        params: &mut [Parameter],
    ) -> Result<bool> {
        self.found_inf = false;
        if !self.enabled {
            optimizer.step(params)?;
            return Ok(true);
        }

        let inv_scale = 1.0 / self.scale;
        for param in params.iter_mut() {
            if let Some(grad) = param.grad_mut() {
                grad.mapv_inplace(|g| g * inv_scale);
                if grad.iter().any(|g| !g.is_finite()) {
                    self.found_inf = true;
                }
            }
        }

        if self.found_inf {
            debug!(scale = self.scale, "non-finite gradients, skipping optimizer step");
            return Ok(false);
        }
        optimizer.step(params)?;
        Ok(true)
    }

    /// Adjust the scale after a step
    pub fn update(&mut self) {
        if !self.enabled {
            return;
        }
        if self.found_inf {
            self.scale *= self.backoff_factor;
            self.growth_tracker = 0;
        } else {
            self.growth_tracker += 1;
            if self.growth_tracker >= self.growth_interval {
                self.scale *= self.growth_factor;
                self.growth_tracker = 0;
            }
        }
    }

    pub fn state(&self) -> ScalerState {
        ScalerState {
            enabled: self.enabled,
            scale: self.scale,
            growth_tracker: self.growth_tracker,
        }
    }

    /// Restore scale and growth tracker; the enabled flag stays as configured
    pub fn load_state(&mut self, state: &ScalerState) {
        self.scale = state.scale;
        self.growth_tracker = state.growth_tracker;
    }
}
