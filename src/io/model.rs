//! Serializable parameter snapshots

use crate::train::Parameter;
use crate::{Error, Result};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// One named tensor, flattened in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorRecord {
    /// Tensor name (e.g., "weight", "bias")
    pub name: String,

    /// Tensor shape
    pub shape: Vec<usize>,

    /// Flattened data
    pub data: Vec<f32>,
}

impl TensorRecord {
    pub fn from_array(name: impl Into<String>, array: &ArrayD<f32>) -> Self {
        Self {
            name: name.into(),
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    /// Rebuild the array, checking data length against the shape
    pub fn to_array(&self) -> Result<ArrayD<f32>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone()).map_err(|_| {
            Error::ShapeMismatch {
                expected: self.shape.clone(),
                got: vec![self.data.len()],
            }
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered snapshot of a model's parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub tensors: Vec<TensorRecord>,
}

impl ModelState {
    pub fn from_parameters(params: &[Parameter]) -> Self {
        Self {
            tensors: params
                .iter()
                .map(|p| TensorRecord::from_array(p.name(), p.value()))
                .collect(),
        }
    }

    /// Copy values into `params`; names and shapes must match one-to-one
    pub fn apply_to(&self, params: &mut [Parameter]) -> Result<()> {
        if self.tensors.len() != params.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![params.len()],
                got: vec![self.tensors.len()],
            });
        }
        // Validate everything before mutating
        let arrays = self
            .tensors
            .iter()
            .zip(params.iter())
            .map(|(record, param)| {
                if record.name != param.name() {
                    return Err(Error::ConfigError(format!(
                        "state tensor '{}' does not match parameter '{}'",
                        record.name,
                        param.name()
                    )));
                }
                let array = record.to_array()?;
                if array.shape() != param.shape() {
                    return Err(Error::ShapeMismatch {
                        expected: param.shape().to_vec(),
                        got: array.shape().to_vec(),
                    });
                }
                Ok(array)
            })
            .collect::<Result<Vec<_>>>()?;

        for (param, array) in params.iter_mut().zip(arrays) {
            *param.value_mut() = array;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TensorRecord> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Total number of scalars
    pub fn num_elements(&self) -> usize {
        self.tensors.iter().map(TensorRecord::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Vec<Parameter> {
        vec![
            Parameter::new("weight", ArrayD::from_elem(IxDyn(&[2, 3]), 1.5)),
            Parameter::new("bias", ArrayD::zeros(IxDyn(&[3]))),
        ]
    }

    #[test]
    fn test_snapshot_and_restore() {
        let source = params();
        let state = ModelState::from_parameters(&source);
        assert_eq!(state.num_elements(), 9);
        assert_eq!(state.get("weight").unwrap().shape, vec![2, 3]);

        let mut target = params();
        target[0].value_mut().fill(0.0);
        state.apply_to(&mut target).unwrap();
        assert_eq!(target[0].value(), source[0].value());
    }

    #[test]
    fn test_restore_rejects_wrong_names_without_partial_write() {
        let mut state = ModelState::from_parameters(&params());
        state.tensors[0].data.fill(9.0);
        state.tensors[1].name = "other".into();

        let mut target = params();
        assert!(state.apply_to(&mut target).is_err());
        assert_eq!(target[0].value()[[0, 0]], 1.5);
    }

    #[test]
    fn test_record_with_bad_length() {
        let record = TensorRecord {
            name: "w".into(),
            shape: vec![2, 2],
            data: vec![1.0; 3],
        };
        assert!(matches!(
            record.to_array(),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
