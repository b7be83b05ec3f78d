//! Checkpoint I/O
//!
//! Parameter snapshots, JSON checkpoints and SafeTensors weight export.

mod checkpoint;
mod load;
mod model;
mod save;

#[cfg(test)]
mod tests;

pub use checkpoint::{Checkpoint, Checkpointer, InMemoryCheckpointer, SavedCheckpoint};
pub use load::{load_checkpoint, load_safetensors};
pub use model::{ModelState, TensorRecord};
pub use save::{
    save_checkpoint, save_safetensors, FileCheckpointer, BEST_CHECKPOINT, BEST_WEIGHTS,
    EMA_BEST_CHECKPOINT, EMA_BEST_WEIGHTS, LAST_CHECKPOINT,
};
