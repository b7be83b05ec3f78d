//! Epoch metrics and best-metric bookkeeping

use crate::{Error, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Mean accuracy and loss of one pass over a data source
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Fraction of correct top-1 predictions, in [0, 1]
    pub accuracy: f32,
    pub loss: f32,
}

/// Fraction of rows whose argmax equals the target class
///
/// An empty batch scores 0.
pub fn top1_accuracy(logits: &Array2<f32>, targets: &Array1<usize>) -> Result<f32> {
    if logits.nrows() != targets.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![targets.len(), logits.ncols()],
            got: logits.shape().to_vec(),
        });
    }
    if targets.is_empty() {
        return Ok(0.0);
    }

    let correct = logits
        .outer_iter()
        .zip(targets.iter())
        .filter(|(row, &target)| argmax(row.iter().copied()) == Some(target))
        .count();

    Ok(correct as f32 / targets.len() as f32)
}

/// Index of the first maximum; NaN entries never win
fn argmax(values: impl Iterator<Item = f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Per-batch loss/accuracy history reduced to an unweighted epoch mean
#[derive(Debug, Clone, Default)]
pub struct BatchHistory {
    losses: Vec<f32>,
    accuracies: Vec<f32>,
}

impl BatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loss: f32, accuracy: f32) {
        self.losses.push(loss);
        self.accuracies.push(accuracy);
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    pub fn last(&self) -> Option<EpochMetrics> {
        Some(EpochMetrics {
            accuracy: *self.accuracies.last()?,
            loss: *self.losses.last()?,
        })
    }

    /// Mean over all recorded batches; zeros when nothing was recorded
    pub fn mean(&self) -> EpochMetrics {
        EpochMetrics {
            accuracy: mean(&self.accuracies),
            loss: mean(&self.losses),
        }
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// Best validation accuracies seen so far for the live and EMA models
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BestMetrics {
    pub best_metric: f32,
    pub best_ema_metric: f32,
}

impl BestMetrics {
    pub fn new(best_metric: f32, best_ema_metric: f32) -> Self {
        Self {
            best_metric,
            best_ema_metric,
        }
    }

    /// Record this epoch's validation accuracies
    ///
    /// Returns `(is_best, is_ema_best)`; each flag is set only when the new
    /// accuracy strictly exceeds the stored best, which is then replaced.
    pub fn observe(&mut self, valid_accuracy: f32, valid_ema_accuracy: f32) -> (bool, bool) {
        let is_best = valid_accuracy > self.best_metric;
        if is_best {
            self.best_metric = valid_accuracy;
        }
        let is_ema_best = valid_ema_accuracy > self.best_ema_metric;
        if is_ema_best {
            self.best_ema_metric = valid_ema_accuracy;
        }
        (is_best, is_ema_best)
    }
}
