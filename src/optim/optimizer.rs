//! Optimizer trait

use crate::io::TensorRecord;
use crate::train::Parameter;
use crate::{Error, Result};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serializable optimizer state (hyper-parameters live in the config)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    /// Optimizer name, checked on restore
    pub kind: String,
    pub lr: f32,
    /// Number of steps that updated at least one parameter
    pub step: u64,
    /// Per-parameter buffers by slot name (e.g. `exp_avg`)
    pub slots: BTreeMap<String, Vec<Option<TensorRecord>>>,
}

/// Trait for optimization algorithms
pub trait Optimizer: Send {
    /// Perform a single optimization step
    ///
    /// Parameters without a gradient are left untouched.
    fn step(&mut self, params: &mut [Parameter]) -> Result<()>;

    /// Zero out all gradients
    fn zero_grad(&mut self, params: &mut [Parameter]) {
        for param in params {
            param.zero_grad();
        }
    }

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);

    fn name(&self) -> &str;

    /// Snapshot internal buffers
    fn state(&self) -> OptimizerState;

    /// Restore internal buffers
    fn load_state(&mut self, state: &OptimizerState) -> Result<()>;
}

/// Grow `slots` to one entry per parameter
pub(crate) fn ensure_slots(slots: &mut Vec<Option<ArrayD<f32>>>, len: usize) {
    if slots.len() < len {
        slots.resize(len, None);
    }
}

pub(crate) fn slots_to_records(slots: &[Option<ArrayD<f32>>]) -> Vec<Option<TensorRecord>> {
    slots
        .iter()
        .enumerate()
        .map(|(i, s)| s.as_ref().map(|a| TensorRecord::from_array(i.to_string(), a)))
        .collect()
}

pub(crate) fn records_to_slots(
    state: &OptimizerState,
    slot: &str,
) -> Result<Vec<Option<ArrayD<f32>>>> {
    state
        .slots
        .get(slot)
        .map(|records| {
            records
                .iter()
                .map(|r| r.as_ref().map(TensorRecord::to_array).transpose())
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

pub(crate) fn check_kind(state: &OptimizerState, expected: &str) -> Result<()> {
    if state.kind == expected {
        Ok(())
    } else {
        Err(Error::ConfigError(format!(
            "optimizer state is for '{}', cannot load into '{expected}'",
            state.kind
        )))
    }
}
