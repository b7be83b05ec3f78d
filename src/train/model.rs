//! Model capability trait and trainable parameters

use super::{Batch, Device};
use crate::io::ModelState;
use crate::{Error, Result};
use ndarray::{Array2, ArrayD};

/// A named trainable tensor with an optional accumulated gradient
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    value: ArrayD<f32>,
    grad: Option<ArrayD<f32>>,
}

impl Parameter {
    /// Create a parameter without a gradient
    pub fn new(name: impl Into<String>, value: ArrayD<f32>) -> Self {
        Self {
            name: name.into(),
            value,
            grad: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &ArrayD<f32> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.value
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }

    /// Number of scalar elements
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Get gradient (if computed)
    pub fn grad(&self) -> Option<&ArrayD<f32>> {
        self.grad.as_ref()
    }

    pub fn grad_mut(&mut self) -> Option<&mut ArrayD<f32>> {
        self.grad.as_mut()
    }

    /// Accumulate a gradient (summed with any existing one)
    pub fn accumulate_grad(&mut self, grad: ArrayD<f32>) -> Result<()> {
        if grad.shape() != self.value.shape() {
            return Err(Error::ShapeMismatch {
                expected: self.value.shape().to_vec(),
                got: grad.shape().to_vec(),
            });
        }
        match self.grad.as_mut() {
            Some(existing) => *existing += &grad,
            None => self.grad = Some(grad),
        }
        Ok(())
    }

    /// Zero out gradient
    pub fn zero_grad(&mut self) {
        self.grad = None;
    }
}

/// Capabilities the trainer needs from a classification model
///
/// Implementations own their parameters. `backward` receives the gradient of
/// the loss with respect to the logits of the most recent training-mode
/// `forward` call and accumulates parameter gradients.
pub trait Model: Send {
    /// Model name for logs and checkpoint metadata
    fn name(&self) -> &str;

    /// Switch to training behaviour (activation caching, dropout, ...)
    fn train_mode(&mut self);

    /// Switch to inference behaviour
    fn eval_mode(&mut self);

    fn is_training(&self) -> bool;

    /// Compute `batch x classes` logits
    fn forward(&mut self, inputs: &ArrayD<f32>) -> Result<Array2<f32>>;

    /// Back-propagate `d loss / d logits` into parameter gradients
    fn backward(&mut self, grad_logits: &Array2<f32>) -> Result<()>;

    fn parameters(&self) -> &[Parameter];

    fn parameters_mut(&mut self) -> &mut [Parameter];

    /// Place parameters on `device`
    fn to_device(&mut self, device: &Device) -> Result<()>;

    /// Move a loader batch to `device` ahead of `forward`
    ///
    /// The default hands host batches through unchanged.
    fn place_batch(&self, batch: Batch, _device: &Device) -> Result<Batch> {
        Ok(batch)
    }

    /// Drop cached activations and scratch buffers
    fn release_buffers(&mut self) {}

    /// Clone into a new boxed model (used for the EMA shadow)
    fn boxed_clone(&self) -> Box<dyn Model>;

    /// Snapshot parameter values
    fn state(&self) -> ModelState {
        ModelState::from_parameters(self.parameters())
    }

    /// Restore parameter values from a snapshot
    fn load_state(&mut self, state: &ModelState) -> Result<()> {
        state.apply_to(self.parameters_mut())
    }

    /// Total number of scalar parameters
    fn num_parameters(&self) -> usize {
        self.parameters().iter().map(Parameter::len).sum()
    }
}
