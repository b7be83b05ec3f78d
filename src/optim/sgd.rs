//! Stochastic Gradient Descent optimizer

use super::optimizer::{check_kind, ensure_slots, records_to_slots, slots_to_records};
use super::{Optimizer, OptimizerState};
use crate::train::Parameter;
use crate::{Error, Result};
use ndarray::ArrayD;

/// SGD optimizer with optional momentum, weight decay and Nesterov momentum
///
/// ```text
/// g = grad + weight_decay * p
/// v = momentum * v + g            (v = g on the first step)
/// g = g + momentum * v            (nesterov) | v (classic)
/// p = p - lr * g
/// ```
pub struct SGD {
    lr: f32,
    momentum: f32,
    weight_decay: f32,
    nesterov: bool,
    step: u64,
    velocities: Vec<Option<ArrayD<f32>>>,
}

impl SGD {
    /// Create a new SGD optimizer
    pub fn new(lr: f32, momentum: f32) -> Self {
        Self {
            lr,
            momentum,
            weight_decay: 0.0,
            nesterov: false,
            step: 0,
            velocities: Vec::new(),
        }
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_nesterov(mut self, nesterov: bool) -> Self {
        self.nesterov = nesterov;
        self
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }
}

impl Optimizer for SGD {
    fn step(&mut self, params: &mut [Parameter]) -> Result<()> {
        ensure_slots(&mut self.velocities, params.len());
        let mut updated = false;

        for (param, velocity) in params.iter_mut().zip(self.velocities.iter_mut()) {
            let Some(grad) = param.grad() else {
                continue;
            };
            let mut g = grad.clone();
            if self.weight_decay != 0.0 {
                g.scaled_add(self.weight_decay, param.value());
            }

            if self.momentum > 0.0 {
                let v = match velocity.take() {
                    Some(mut v) if v.shape() == g.shape() => {
                        v *= self.momentum;
                        v += &g;
                        v
                    }
                    Some(v) => {
                        return Err(Error::ShapeMismatch {
                            expected: g.shape().to_vec(),
                            got: v.shape().to_vec(),
                        })
                    }
                    None => g.clone(),
                };
                if self.nesterov {
                    g.scaled_add(self.momentum, &v);
                } else {
                    g.assign(&v);
                }
                *velocity = Some(v);
            }

            param.value_mut().scaled_add(-self.lr, &g);
            updated = true;
        }

        if updated {
            self.step += 1;
        }
        Ok(())
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &str {
        "sgd"
    }

    fn state(&self) -> OptimizerState {
        let mut state = OptimizerState {
            kind: self.name().to_string(),
            lr: self.lr,
            step: self.step,
            ..OptimizerState::default()
        };
        state.slots.insert(
            "momentum_buffer".into(),
            slots_to_records(&self.velocities),
        );
        state
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
        check_kind(state, self.name())?;
        self.velocities = records_to_slots(state, "momentum_buffer")?;
        self.lr = state.lr;
        self.step = state.step;
        Ok(())
    }
}
