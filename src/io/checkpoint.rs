//! Training checkpoints

use super::ModelState;
use crate::optim::{OptimizerState, ScalerState};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Everything needed to resume a run after `epoch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Last completed epoch
    pub epoch: usize,
    pub model: ModelState,
    pub ema: ModelState,
    pub optimizer: OptimizerState,
    pub scaler: ScalerState,
    pub best_metric: f32,
    pub best_ema_metric: f32,
    /// Global iteration counter
    #[serde(default)]
    pub log_iter: u64,
    /// EMA update count (drives the decay warmup)
    #[serde(default)]
    pub ema_updates: u64,
}

/// Persists checkpoints at the end of each epoch
pub trait Checkpointer: Send {
    /// Save the end-of-epoch checkpoint; the flags mark a new best live or
    /// EMA validation accuracy
    fn save(&mut self, checkpoint: &Checkpoint, is_best: bool, is_ema_best: bool) -> Result<()>;
}

/// One call recorded by [`InMemoryCheckpointer`]
#[derive(Debug, Clone, PartialEq)]
pub struct SavedCheckpoint {
    pub checkpoint: Checkpoint,
    pub is_best: bool,
    pub is_ema_best: bool,
}

/// Keeps saved checkpoints in memory
///
/// Clones share storage, so a handle kept outside the trainer can inspect
/// what was saved.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointer {
    saved: Arc<Mutex<Vec<SavedCheckpoint>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All saves so far, oldest first
    pub fn saved(&self) -> Vec<SavedCheckpoint> {
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent checkpoint flagged as best
    pub fn best(&self) -> Option<Checkpoint> {
        self.saved()
            .into_iter()
            .rev()
            .find(|s| s.is_best)
            .map(|s| s.checkpoint)
    }
}

impl Checkpointer for InMemoryCheckpointer {
    fn save(&mut self, checkpoint: &Checkpoint, is_best: bool, is_ema_best: bool) -> Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SavedCheckpoint {
                checkpoint: checkpoint.clone(),
                is_best,
                is_ema_best,
            });
        Ok(())
    }
}
