//! Checkpoint and weight loading

use super::save::ORDER_KEY;
use super::{Checkpoint, ModelState, TensorRecord};
use crate::{Error, Result};
use safetensors::tensor::Dtype;
use safetensors::SafeTensors;
use std::path::Path;

/// Load a checkpoint written by [`save_checkpoint`](super::save_checkpoint)
pub fn load_checkpoint(path: impl AsRef<Path>) -> Result<Checkpoint> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| {
        Error::Serialization(format!("invalid checkpoint {}: {e}", path.display()))
    })
}

/// Load f32 weights from a SafeTensors file
///
/// Tensors come back in the order recorded at save time, or sorted by name
/// for files written elsewhere.
pub fn load_safetensors(path: impl AsRef<Path>) -> Result<ModelState> {
    let data = std::fs::read(path)?;

    let (_, st_metadata) = SafeTensors::read_metadata(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;
    let recorded_order: Option<Vec<String>> = st_metadata
        .metadata()
        .as_ref()
        .and_then(|m| m.get(ORDER_KEY))
        .and_then(|order| serde_json::from_str(order).ok());

    let safetensors = SafeTensors::deserialize(&data)
        .map_err(|e| Error::Serialization(format!("SafeTensors parsing failed: {e}")))?;

    let names = recorded_order.unwrap_or_else(|| {
        let mut names: Vec<String> = safetensors
            .names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        names.sort();
        names
    });

    let tensors = names
        .into_iter()
        .map(|name| {
            let view = safetensors
                .tensor(&name)
                .map_err(|e| Error::Serialization(format!("tensor '{name}': {e}")))?;
            if view.dtype() != Dtype::F32 {
                return Err(Error::Serialization(format!(
                    "tensor '{name}' has dtype {:?}, expected F32",
                    view.dtype()
                )));
            }
            let data = view
                .data()
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            Ok(TensorRecord {
                name,
                shape: view.shape().to_vec(),
                data,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ModelState { tensors })
}
