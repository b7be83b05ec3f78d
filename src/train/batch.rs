//! Training batch

use crate::{Error, Result};
use ndarray::{Array1, ArrayD};

/// A batch of samples with class targets
///
/// `inputs` carries the batch on axis 0 (e.g. `N x C x H x W` images or
/// `N x D` feature rows); `targets` holds one class index per sample.
#[derive(Clone, Debug)]
pub struct Batch {
    pub inputs: ArrayD<f32>,
    pub targets: Array1<usize>,
}

impl Batch {
    /// Create a new batch
    pub fn new(inputs: ArrayD<f32>, targets: Array1<usize>) -> Self {
        Self { inputs, targets }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if the batch holds no samples
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Check that inputs and targets agree on the batch dimension
    pub fn validate(&self) -> Result<()> {
        let rows = self.inputs.shape().first().copied().unwrap_or(0);
        if rows != self.targets.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.targets.len()],
                got: vec![rows],
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    #[test]
    fn test_batch_validate() {
        let batch = Batch::new(ArrayD::zeros(IxDyn(&[3, 4])), array![0, 1, 2]);
        assert_eq!(batch.len(), 3);
        assert!(batch.validate().is_ok());

        let bad = Batch::new(ArrayD::zeros(IxDyn(&[2, 4])), array![0, 1, 2]);
        assert!(matches!(bad.validate(), Err(Error::ShapeMismatch { .. })));
    }
}
