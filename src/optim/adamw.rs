//! AdamW optimizer (Adam with decoupled Weight decay)

use super::optimizer::{check_kind, ensure_slots, records_to_slots, slots_to_records};
use super::{Optimizer, OptimizerState};
use crate::train::Parameter;
use crate::{Error, Result};
use ndarray::{ArrayD, Zip};

/// AdamW optimizer
///
/// Weight decay is applied directly to the parameters instead of being added
/// to the gradient:
///
/// AdamW: θ_t = (1 - lr * λ) * θ_{t-1} - lr * m̂_t / (√v̂_t + ε)
pub struct AdamW {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    m: Vec<Option<ArrayD<f32>>>, // First moment
    v: Vec<Option<ArrayD<f32>>>, // Second moment
}

impl AdamW {
    /// Create a new AdamW optimizer
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Create AdamW with default parameters (weight_decay = 0.01)
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.01)
    }
}

fn moment(slot: Option<ArrayD<f32>>, like: &ArrayD<f32>) -> Result<ArrayD<f32>> {
    match slot {
        Some(m) if m.shape() == like.shape() => Ok(m),
        Some(m) => Err(Error::ShapeMismatch {
            expected: like.shape().to_vec(),
            got: m.shape().to_vec(),
        }),
        None => Ok(ArrayD::zeros(like.raw_dim())),
    }
}

impl Optimizer for AdamW {
    fn step(&mut self, params: &mut [Parameter]) -> Result<()> {
        if params.iter().all(|p| p.grad().is_none()) {
            return Ok(());
        }
        ensure_slots(&mut self.m, params.len());
        ensure_slots(&mut self.v, params.len());
        self.t += 1;

        // Bias correction factors
        let bc1 = 1.0 - self.beta1.powi(self.t as i32);
        let bc2 = 1.0 - self.beta2.powi(self.t as i32);
        let (b1, b2, eps, lr) = (self.beta1, self.beta2, self.epsilon, self.lr);
        let decay = 1.0 - lr * self.weight_decay;

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad().cloned() else {
                continue;
            };
            let mut m = moment(self.m[i].take(), &grad)?;
            let mut v = moment(self.v[i].take(), &grad)?;

            let value = param.value_mut();
            *value *= decay;
            Zip::from(value)
                .and(&mut m)
                .and(&mut v)
                .and(&grad)
                .for_each(|p, m, v, &g| {
                    // m_t = β1 * m_{t-1} + (1 - β1) * g
                    *m = b1 * *m + (1.0 - b1) * g;
                    // v_t = β2 * v_{t-1} + (1 - β2) * g²
                    *v = b2 * *v + (1.0 - b2) * g * g;
                    *p -= lr * (*m / bc1) / ((*v / bc2).sqrt() + eps);
                });

            self.m[i] = Some(m);
            self.v[i] = Some(v);
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
        "adamw"
    }

    fn state(&self) -> OptimizerState {
        let mut state = OptimizerState {
            kind: self.name().to_string(),
            lr: self.lr,
            step: self.t,
            ..OptimizerState::default()
        };
        state.slots.insert("exp_avg".into(), slots_to_records(&self.m));
        state.slots.insert("exp_avg_sq".into(), slots_to_records(&self.v));
        state
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<()> {
        check_kind(state, self.name())?;
        self.m = records_to_slots(state, "exp_avg")?;
        self.v = records_to_slots(state, "exp_avg_sq")?;
        self.lr = state.lr;
        self.t = state.step;
        Ok(())
    }
}
