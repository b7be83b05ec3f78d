//! Mixed-sample augmentation (mixup / cutmix)
//!
//! A [`MixStrategy`] turns a batch into a [`MixedBatch`]: possibly blended
//! inputs, two target sets and the mixing coefficient `lam`. The loss is then
//! `lam * L(logits, target_a) + (1 - lam) * L(logits, target_b)`.

use super::{Batch, Criterion, LossOutput};
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayD, Axis, Slice};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};

/// Blending strategy applied to a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixMode {
    /// Batch left untouched
    None,
    /// Convex combination of whole samples
    Mixup,
    /// Rectangular patch pasted from another sample
    CutMix,
}

/// Output of a mixing strategy
#[derive(Debug, Clone)]
pub struct MixedBatch {
    pub mode: MixMode,
    pub inputs: ArrayD<f32>,
    pub target_a: Array1<usize>,
    pub target_b: Array1<usize>,
    /// Weight of `target_a` in the loss
    pub lam: f32,
}

impl MixedBatch {
    /// Pass a batch through unchanged
    pub fn unmixed(batch: Batch) -> Self {
        Self {
            mode: MixMode::None,
            inputs: batch.inputs,
            target_b: batch.targets.clone(),
            target_a: batch.targets,
            lam: 1.0,
        }
    }
}

/// Trait for mixed-sample augmentation strategies
pub trait MixStrategy: Send {
    /// Mix a training batch
    fn forward(&mut self, batch: Batch) -> Result<MixedBatch>;

    /// Mixing-aware loss
    fn mix_criterion(
        &self,
        mode: MixMode,
        criterion: &dyn Criterion,
        logits: &Array2<f32>,
        target_a: &Array1<usize>,
        target_b: &Array1<usize>,
        lam: f32,
    ) -> Result<LossOutput> {
        match mode {
            MixMode::None => criterion.forward(logits, target_a),
            MixMode::Mixup | MixMode::CutMix => LossOutput::blend(
                criterion.forward(logits, target_a)?,
                lam,
                criterion.forward(logits, target_b)?,
                1.0 - lam,
            ),
        }
    }
}

/// Strategy that never mixes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMix;

impl MixStrategy for NoMix {
    fn forward(&mut self, batch: Batch) -> Result<MixedBatch> {
        Ok(MixedBatch::unmixed(batch))
    }
}

/// Mixup / cutmix settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Beta(alpha, alpha) concentration for mixup; 0 disables mixup
    pub mixup_alpha: f32,
    /// Beta(alpha, alpha) concentration for cutmix; 0 disables cutmix
    pub cutmix_alpha: f32,
    /// Probability of mixing a given batch
    pub prob: f32,
    /// Probability of cutmix over mixup when both are enabled
    pub switch_prob: f32,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            mixup_alpha: 0.0,
            cutmix_alpha: 0.0,
            prob: 1.0,
            switch_prob: 0.5,
        }
    }
}

impl MixConfig {
    pub fn is_enabled(&self) -> bool {
        self.prob > 0.0 && (self.mixup_alpha > 0.0 || self.cutmix_alpha > 0.0)
    }
}

/// Seeded mixup / cutmix strategy
#[derive(Debug, Clone)]
pub struct Mix {
    config: MixConfig,
    rng: StdRng,
}

impl Mix {
    pub fn new(config: MixConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    fn choose_mode(&mut self) -> MixMode {
        let cfg = self.config;
        if !cfg.is_enabled() || self.rng.gen::<f32>() >= cfg.prob {
            return MixMode::None;
        }
        match (cfg.mixup_alpha > 0.0, cfg.cutmix_alpha > 0.0) {
            (true, true) if self.rng.gen::<f32>() < cfg.switch_prob => MixMode::CutMix,
            (true, _) => MixMode::Mixup,
            (false, true) => MixMode::CutMix,
            (false, false) => MixMode::None,
        }
    }

    fn sample_lam(&mut self, alpha: f32) -> Result<f32> {
        let beta = Beta::new(alpha, alpha)
            .map_err(|e| Error::InvalidParameter(format!("beta({alpha}, {alpha}): {e}")))?;
        Ok(beta.sample(&mut self.rng))
    }
}

impl MixStrategy for Mix {
    fn forward(&mut self, batch: Batch) -> Result<MixedBatch> {
        batch.validate()?;
        let mut mode = self.choose_mode();
        if mode == MixMode::None || batch.len() < 2 {
            return Ok(MixedBatch::unmixed(batch));
        }
        // Cutmix needs two spatial axes after the batch axis
        if mode == MixMode::CutMix && batch.inputs.ndim() < 3 {
            mode = if self.config.mixup_alpha > 0.0 {
                MixMode::Mixup
            } else {
                return Ok(MixedBatch::unmixed(batch));
            };
        }

        let mut perm: Vec<usize> = (0..batch.len()).collect();
        perm.shuffle(&mut self.rng);
        let shuffled = batch.inputs.select(Axis(0), &perm);
        let target_b = batch.targets.select(Axis(0), &perm);

        let (inputs, lam) = match mode {
            MixMode::Mixup => {
                let lam = self.sample_lam(self.config.mixup_alpha)?;
                (batch.inputs * lam + &(shuffled * (1.0 - lam)), lam)
            }
            _ => {
                let lam = self.sample_lam(self.config.cutmix_alpha)?;
                cutmix(batch.inputs, &shuffled, lam, &mut self.rng)
            }
        };

        Ok(MixedBatch {
            mode,
            inputs,
            target_a: batch.targets,
            target_b,
            lam,
        })
    }
}

/// Paste a box covering roughly `1 - lam` of the last two axes from
/// `shuffled` into `inputs`; returns the area-corrected `lam`.
fn cutmix(
    mut inputs: ArrayD<f32>,
    shuffled: &ArrayD<f32>,
    lam: f32,
    rng: &mut StdRng,
) -> (ArrayD<f32>, f32) {
    let ndim = inputs.ndim();
    let (h, w) = (inputs.shape()[ndim - 2], inputs.shape()[ndim - 1]);
    if h == 0 || w == 0 {
        return (inputs, 1.0);
    }

    let cut_ratio = (1.0 - lam).max(0.0).sqrt();
    let (cut_h, cut_w) = (
        (h as f32 * cut_ratio) as usize,
        (w as f32 * cut_ratio) as usize,
    );
    let (cy, cx) = (rng.gen_range(0..h), rng.gen_range(0..w));
    let (y0, y1) = (cy.saturating_sub(cut_h / 2), (cy + cut_h / 2).min(h));
    let (x0, x1) = (cx.saturating_sub(cut_w / 2), (cx + cut_w / 2).min(w));

    let window = |axis: usize| -> Slice {
        if axis == ndim - 2 {
            Slice::from(y0..y1)
        } else if axis == ndim - 1 {
            Slice::from(x0..x1)
        } else {
            Slice::from(..)
        }
    };

    let patch = shuffled.slice_each_axis(|d| window(d.axis.index()));
    inputs
        .slice_each_axis_mut(|d| window(d.axis.index()))
        .assign(&patch);

    let pasted = ((y1 - y0) * (x1 - x0)) as f32;
    (inputs, 1.0 - pasted / (h * w) as f32)
}
