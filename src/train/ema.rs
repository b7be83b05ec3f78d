//! Exponential moving average of model weights

use super::{Model, Parameter};
use crate::{Error, Result};

/// Shadow model tracking a decayed running average of the live parameters
///
/// After each optimizer step:
///
/// ```text
/// shadow = d * shadow + (1 - d) * live
/// ```
///
/// where `d` is the configured decay, or `min(decay, (1 + n) / (10 + n))`
/// with warmup enabled (`n` = updates performed so far).
pub struct ModelEma {
    shadow: Box<dyn Model>,
    decay: f32,
    warmup: bool,
    updates: u64,
}

impl ModelEma {
    /// Clone `model` into a shadow copy in eval mode
    pub fn new(model: &dyn Model, decay: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&decay) {
            return Err(Error::InvalidParameter(format!(
                "EMA decay must be in [0, 1), got {decay}"
            )));
        }
        let mut shadow = model.boxed_clone();
        shadow.eval_mode();
        for param in shadow.parameters_mut() {
            param.zero_grad();
        }
        Ok(Self {
            shadow,
            decay,
            warmup: false,
            updates: 0,
        })
    }

    /// Ramp the decay up from 0.1 over the first updates
    pub fn with_warmup(mut self, warmup: bool) -> Self {
        self.warmup = warmup;
        self
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    /// Decay applied by the next update
    pub fn decay_at(&self, updates: u64) -> f32 {
        if self.warmup {
            let n = updates as f32;
            self.decay.min((1.0 + n) / (10.0 + n))
        } else {
            self.decay
        }
    }

    /// Blend the live parameters into the shadow
    ///
    /// Every shape is checked before any shadow parameter is written.
    pub fn update(&mut self, live: &[Parameter]) -> Result<()> {
        let d = self.decay_at(self.updates);
        let shadow = self.shadow.parameters_mut();
        if shadow.len() != live.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![shadow.len()],
                got: vec![live.len()],
            });
        }
        if let Some((s, l)) = shadow
            .iter()
            .zip(live)
            .find(|(s, l)| s.shape() != l.shape())
        {
            return Err(Error::ShapeMismatch {
                expected: s.shape().to_vec(),
                got: l.shape().to_vec(),
            });
        }

        for (s, l) in shadow.iter_mut().zip(live) {
            s.value_mut()
                .zip_mut_with(l.value(), |sv, &lv| *sv = d * *sv + (1.0 - d) * lv);
        }
        self.updates += 1;
        Ok(())
    }

    /// Number of updates performed
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Restore the update counter (resume)
    pub fn set_updates(&mut self, updates: u64) {
        self.updates = updates;
    }

    pub fn model(&self) -> &dyn Model {
        self.shadow.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn Model {
        self.shadow.as_mut()
    }
}

impl std::fmt::Debug for ModelEma {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEma")
            .field("model", &self.shadow.name())
            .field("decay", &self.decay)
            .field("warmup", &self.warmup)
            .field("updates", &self.updates)
            .finish()
    }
}
