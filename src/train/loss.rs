//! Classification criteria

use crate::{Error, Result};
use ndarray::{Array1, Array2};

/// Scalar loss value together with its gradient w.r.t. the logits
#[derive(Debug, Clone)]
pub struct LossOutput {
    pub value: f32,
    pub grad: Array2<f32>,
}

impl LossOutput {
    /// Weighted sum `wa * a + wb * b` of two losses over the same logits
    pub fn blend(a: LossOutput, wa: f32, b: LossOutput, wb: f32) -> Result<LossOutput> {
        if a.grad.dim() != b.grad.dim() {
            return Err(Error::ShapeMismatch {
                expected: a.grad.shape().to_vec(),
                got: b.grad.shape().to_vec(),
            });
        }
        Ok(LossOutput {
            value: wa * a.value + wb * b.value,
            grad: a.grad * wa + &(b.grad * wb),
        })
    }
}

/// Trait for loss functions
pub trait Criterion: Send {
    /// Compute mean loss over the batch and `d loss / d logits`
    fn forward(&self, logits: &Array2<f32>, targets: &Array1<usize>) -> Result<LossOutput>;

    /// Name of the loss function
    fn name(&self) -> &str;
}

/// Softmax cross entropy with optional label smoothing
///
/// L = -mean_i sum_c q_ic * log softmax(z_i)_c, where
/// q = (1 - eps) * onehot(target) + eps / C.
///
/// # Example
///
/// ```
/// use afinar::train::{Criterion, CrossEntropyLoss};
/// use ndarray::array;
///
/// let loss_fn = CrossEntropyLoss::new();
/// let logits = array![[2.0, 0.0], [0.0, 2.0]];
/// let out = loss_fn.forward(&logits, &array![0, 1]).unwrap();
/// assert!(out.value > 0.0 && out.value < 0.2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrossEntropyLoss {
    label_smoothing: f32,
}

impl CrossEntropyLoss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spread `smoothing` of the target mass uniformly over all classes
    pub fn with_label_smoothing(mut self, smoothing: f32) -> Self {
        self.label_smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    pub fn label_smoothing(&self) -> f32 {
        self.label_smoothing
    }
}

impl Criterion for CrossEntropyLoss {
    fn forward(&self, logits: &Array2<f32>, targets: &Array1<usize>) -> Result<LossOutput> {
        let (rows, classes) = logits.dim();
        if rows != targets.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![targets.len(), classes],
                got: vec![rows, classes],
            });
        }
        if rows == 0 {
            return Ok(LossOutput {
                value: 0.0,
                grad: Array2::zeros((0, classes)),
            });
        }

        let eps = self.label_smoothing;
        let off_target = eps / classes as f32;
        let on_target = 1.0 - eps + off_target;
        let mut grad = Array2::zeros((rows, classes));
        let mut total = 0.0f32;

        for (i, (row, &target)) in logits.outer_iter().zip(targets.iter()).enumerate() {
            if target >= classes {
                return Err(Error::Data(format!(
                    "target class {target} out of range for {classes} logits"
                )));
            }
            // Stable log-softmax
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let sum_exp: f32 = row.iter().map(|&v| (v - max).exp()).sum();
            let log_norm = max + sum_exp.ln();

            for (c, &z) in row.iter().enumerate() {
                let log_p = z - log_norm;
                let q = if c == target { on_target } else { off_target };
                total -= q * log_p;
                grad[[i, c]] = (log_p.exp() - q) / rows as f32;
            }
        }

        Ok(LossOutput {
            value: total / rows as f32,
            grad,
        })
    }

    fn name(&self) -> &str {
        "CrossEntropy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_uniform_logits() {
        let loss = CrossEntropyLoss::new()
            .forward(&array![[0.0, 0.0, 0.0, 0.0]], &array![2])
            .unwrap();
        assert_abs_diff_eq!(loss.value, 4.0f32.ln(), epsilon = 1e-6);
        // softmax - onehot
        assert_abs_diff_eq!(loss.grad[[0, 2]], 0.25 - 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(loss.grad[[0, 0]], 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_rows_sum_to_zero() {
        let loss = CrossEntropyLoss::new()
            .with_label_smoothing(0.1)
            .forward(&array![[1.0, -2.0, 0.5], [3.0, 0.0, -1.0]], &array![0, 2])
            .unwrap();
        for row in loss.grad.outer_iter() {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_large_logits_are_stable() {
        let loss = CrossEntropyLoss::new()
            .forward(&array![[1000.0, 0.0]], &array![0])
            .unwrap();
        assert!(loss.value.is_finite());
        assert_abs_diff_eq!(loss.value, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_label_smoothing_raises_confident_loss() {
        let logits = array![[10.0, 0.0]];
        let plain = CrossEntropyLoss::new().forward(&logits, &array![0]).unwrap();
        let smooth = CrossEntropyLoss::new()
            .with_label_smoothing(0.2)
            .forward(&logits, &array![0])
            .unwrap();
        assert!(smooth.value > plain.value);
    }

    #[test]
    fn test_target_out_of_range() {
        let err = CrossEntropyLoss::new()
            .forward(&array![[0.0, 0.0]], &array![5])
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }

    #[test]
    fn test_row_mismatch() {
        let err = CrossEntropyLoss::new()
            .forward(&array![[0.0, 0.0]], &array![0, 1])
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_blend() {
        let a = LossOutput {
            value: 1.0,
            grad: array![[1.0, 0.0]],
        };
        let b = LossOutput {
            value: 3.0,
            grad: array![[0.0, 1.0]],
        };
        let mixed = LossOutput::blend(a, 0.25, b, 0.75).unwrap();
        assert_abs_diff_eq!(mixed.value, 2.5, epsilon = 1e-6);
        assert_abs_diff_eq!(mixed.grad[[0, 0]], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(mixed.grad[[0, 1]], 0.75, epsilon = 1e-6);
    }
}
