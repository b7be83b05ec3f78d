//! Checkpoint and weight saving

use super::{Checkpoint, Checkpointer, ModelState};
use crate::{Error, Result};
use safetensors::tensor::{Dtype, TensorView};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const LAST_CHECKPOINT: &str = "checkpoint_last.json";
pub const BEST_CHECKPOINT: &str = "checkpoint_best.json";
pub const EMA_BEST_CHECKPOINT: &str = "checkpoint_ema_best.json";
pub const BEST_WEIGHTS: &str = "model_best.safetensors";
pub const EMA_BEST_WEIGHTS: &str = "model_ema_best.safetensors";

/// Metadata key listing tensor names in parameter order
pub(crate) const ORDER_KEY: &str = "parameters";

/// Write a checkpoint as JSON
pub fn save_checkpoint(checkpoint: &Checkpoint, path: impl AsRef<Path>) -> Result<()> {
    let data = serde_json::to_vec(checkpoint)
        .map_err(|e| Error::Serialization(format!("JSON serialization failed: {e}")))?;
    let mut file = File::create(path)?;
    file.write_all(&data)?;
    Ok(())
}

/// Save model weights in SafeTensors format (HuggingFace compatible)
pub fn save_safetensors(
    state: &ModelState,
    path: impl AsRef<Path>,
    mut metadata: HashMap<String, String>,
) -> Result<()> {
    let order = serde_json::to_string(
        &state.tensors.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
    )?;
    metadata.insert(ORDER_KEY.to_string(), order);

    let bytes: Vec<&[u8]> = state
        .tensors
        .iter()
        .map(|t| bytemuck::cast_slice::<f32, u8>(&t.data))
        .collect();

    let views = state
        .tensors
        .iter()
        .zip(&bytes)
        .map(|(t, data)| {
            TensorView::new(Dtype::F32, t.shape.clone(), data)
                .map(|view| (t.name.as_str(), view))
                .map_err(|e| Error::Serialization(format!("tensor '{}': {e:?}", t.name)))
        })
        .collect::<Result<Vec<_>>>()?;

    let safetensor_bytes = safetensors::serialize(views, &Some(metadata))
        .map_err(|e| Error::Serialization(format!("SafeTensors serialization failed: {e}")))?;
    std::fs::write(path, safetensor_bytes)?;
    Ok(())
}

/// Writes checkpoints and best weights under a run directory
///
/// Layout:
///
/// ```text
/// save_dir/
///   checkpoint_last.json        every epoch
///   checkpoint_best.json        new best live accuracy
///   model_best.safetensors
///   checkpoint_ema_best.json    new best EMA accuracy
///   model_ema_best.safetensors
/// ```
#[derive(Debug, Clone)]
pub struct FileCheckpointer {
    dir: PathBuf,
    model_name: String,
}

impl FileCheckpointer {
    /// Create the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            model_name: "model".to_string(),
        })
    }

    /// Name recorded in SafeTensors metadata
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn weights_metadata(&self, checkpoint: &Checkpoint, metric: f32) -> HashMap<String, String> {
        HashMap::from([
            ("name".to_string(), self.model_name.clone()),
            ("epoch".to_string(), checkpoint.epoch.to_string()),
            ("accuracy".to_string(), metric.to_string()),
        ])
    }
}

impl Checkpointer for FileCheckpointer {
    fn save(&mut self, checkpoint: &Checkpoint, is_best: bool, is_ema_best: bool) -> Result<()> {
        let last = self.dir.join(LAST_CHECKPOINT);
        save_checkpoint(checkpoint, &last)?;
        debug!("Saved checkpoint {}", last.display());

        if is_best {
            std::fs::copy(&last, self.dir.join(BEST_CHECKPOINT))?;
            save_safetensors(
                &checkpoint.model,
                self.dir.join(BEST_WEIGHTS),
                self.weights_metadata(checkpoint, checkpoint.best_metric),
            )?;
            info!(
                "New best model at epoch {} (acc {:.4})",
                checkpoint.epoch, checkpoint.best_metric
            );
        }
        if is_ema_best {
            std::fs::copy(&last, self.dir.join(EMA_BEST_CHECKPOINT))?;
            save_safetensors(
                &checkpoint.ema,
                self.dir.join(EMA_BEST_WEIGHTS),
                self.weights_metadata(checkpoint, checkpoint.best_ema_metric),
            )?;
            info!(
                "New best EMA model at epoch {} (acc {:.4})",
                checkpoint.epoch, checkpoint.best_ema_metric
            );
        }
        Ok(())
    }
}
