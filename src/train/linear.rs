//! Linear softmax classifier
//!
//! Host-side reference model: flattens every sample to a feature row and
//! computes `logits = X W + b`. Useful for smoke runs, tests and benchmarks.

use super::{Batch, Device, Model, Parameter};
use crate::{Error, Result};
use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, Axis, Ix1, Ix2, IxDyn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

const WEIGHT: usize = 0;
const BIAS: usize = 1;

/// Single affine layer over flattened inputs
#[derive(Clone, Debug)]
pub struct LinearClassifier {
    params: Vec<Parameter>,
    in_features: usize,
    num_classes: usize,
    training: bool,
    cached_inputs: Option<Array2<f32>>,
}

impl LinearClassifier {
    /// Create a classifier with `N(0, 1/in_features)` weights and zero bias
    pub fn new(in_features: usize, num_classes: usize, seed: u64) -> Result<Self> {
        let std = (1.0 / in_features.max(1) as f32).sqrt();
        let normal = Normal::new(0.0, std)
            .map_err(|e| Error::InvalidParameter(format!("weight init: {e}")))?;
        let mut rng = StdRng::seed_from_u64(seed);
        let weight = ArrayD::from_shape_simple_fn(IxDyn(&[in_features, num_classes]), || {
            normal.sample(&mut rng)
        });
        Ok(Self::from_weights(weight, ArrayD::zeros(IxDyn(&[num_classes]))))
    }

    /// Create a classifier with all parameters set to zero
    pub fn zeros(in_features: usize, num_classes: usize) -> Self {
        Self::from_weights(
            ArrayD::zeros(IxDyn(&[in_features, num_classes])),
            ArrayD::zeros(IxDyn(&[num_classes])),
        )
    }

    fn from_weights(weight: ArrayD<f32>, bias: ArrayD<f32>) -> Self {
        let in_features = weight.shape()[0];
        let num_classes = weight.shape()[1];
        Self {
            params: vec![Parameter::new("weight", weight), Parameter::new("bias", bias)],
            in_features,
            num_classes,
            training: true,
            cached_inputs: None,
        }
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn weight(&self) -> Result<ArrayView2<'_, f32>> {
        self.params[WEIGHT]
            .value()
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::InvalidParameter(format!("weight: {e}")))
    }

    fn bias(&self) -> Result<ArrayView1<'_, f32>> {
        self.params[BIAS]
            .value()
            .view()
            .into_dimensionality::<Ix1>()
            .map_err(|e| Error::InvalidParameter(format!("bias: {e}")))
    }

    fn flatten(&self, inputs: &ArrayD<f32>) -> Result<Array2<f32>> {
        let rows = inputs.shape().first().copied().unwrap_or(0);
        let features: usize = inputs.shape().iter().skip(1).product();
        if features != self.in_features {
            return Err(Error::ShapeMismatch {
                expected: vec![rows, self.in_features],
                got: inputs.shape().to_vec(),
            });
        }
        inputs
            .as_standard_layout()
            .into_owned()
            .into_shape((rows, features))
            .map_err(|e| Error::InvalidParameter(format!("flatten inputs: {e}")))
    }
}

impl Model for LinearClassifier {
    fn name(&self) -> &str {
        "linear"
    }

    fn train_mode(&mut self) {
        self.training = true;
    }

    fn eval_mode(&mut self) {
        self.training = false;
        self.cached_inputs = None;
    }

    fn is_training(&self) -> bool {
        self.training
    }

    fn forward(&mut self, inputs: &ArrayD<f32>) -> Result<Array2<f32>> {
        let x = self.flatten(inputs)?;
        let logits = x.dot(&self.weight()?) + &self.bias()?;
        if self.training {
            self.cached_inputs = Some(x);
        }
        Ok(logits)
    }

    fn backward(&mut self, grad_logits: &Array2<f32>) -> Result<()> {
        let x = self.cached_inputs.as_ref().ok_or_else(|| {
            Error::InvalidParameter("backward called without a training forward pass".into())
        })?;
        if grad_logits.dim() != (x.nrows(), self.num_classes) {
            return Err(Error::ShapeMismatch {
                expected: vec![x.nrows(), self.num_classes],
                got: grad_logits.shape().to_vec(),
            });
        }

        // dL/dW = X^T G, dL/db = sum_rows(G)
        let grad_w = x.t().dot(grad_logits).into_dyn();
        let grad_b = grad_logits.sum_axis(Axis(0)).into_dyn();
        self.params[WEIGHT].accumulate_grad(grad_w)?;
        self.params[BIAS].accumulate_grad(grad_b)?;
        Ok(())
    }

    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut [Parameter] {
        &mut self.params
    }

    fn to_device(&mut self, device: &Device) -> Result<()> {
        if device.is_cpu() {
            Ok(())
        } else {
            Err(Error::UnsupportedDevice(format!(
                "LinearClassifier runs on the host only, requested {device}"
            )))
        }
    }

    fn place_batch(&self, batch: Batch, device: &Device) -> Result<Batch> {
        if device.is_cpu() {
            Ok(batch)
        } else {
            Err(Error::UnsupportedDevice(format!(
                "LinearClassifier reads host batches only, requested {device}"
            )))
        }
    }

    fn release_buffers(&mut self) {
        self.cached_inputs = None;
    }

    fn boxed_clone(&self) -> Box<dyn Model> {
        Box::new(self.clone())
    }
}
