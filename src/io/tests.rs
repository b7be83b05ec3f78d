//! Integration tests for checkpoint I/O

use super::*;
use crate::optim::{GradScaler, OptimizerState};
use crate::train::{LinearClassifier, Model};
use tempfile::TempDir;

fn checkpoint(epoch: usize) -> Checkpoint {
    let model = LinearClassifier::new(3, 2, 1).unwrap();
    let ema = LinearClassifier::new(3, 2, 2).unwrap();
    Checkpoint {
        epoch,
        model: model.state(),
        ema: ema.state(),
        optimizer: OptimizerState::default(),
        scaler: GradScaler::default().state(),
        best_metric: 0.75,
        best_ema_metric: 0.5,
        log_iter: 40,
        ema_updates: 40,
    }
}

#[test]
fn test_checkpoint_json_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ckpt.json");
    let original = checkpoint(4);
    save_checkpoint(&original, &path).unwrap();
    assert_eq!(load_checkpoint(&path).unwrap(), original);
}

#[test]
fn test_load_checkpoint_errors() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        load_checkpoint(dir.path().join("missing.json")),
        Err(crate::Error::Io(_))
    ));

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();
    assert!(matches!(
        load_checkpoint(&bad),
        Err(crate::Error::Serialization(_))
    ));
}

#[test]
fn test_safetensors_preserves_parameter_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("w.safetensors");
    // "weight" sorts after "bias"; order must still come back as saved
    let state = checkpoint(0).model;
    save_safetensors(&state, &path, Default::default()).unwrap();
    assert_eq!(load_safetensors(&path).unwrap(), state);
}

#[test]
fn test_file_checkpointer_layout() {
    let dir = TempDir::new().unwrap();
    let run_dir = dir.path().join("run");
    let mut checkpointer = FileCheckpointer::new(&run_dir).unwrap();

    checkpointer.save(&checkpoint(0), false, false).unwrap();
    assert!(run_dir.join(LAST_CHECKPOINT).exists());
    assert!(!run_dir.join(BEST_CHECKPOINT).exists());
    assert!(!run_dir.join(EMA_BEST_WEIGHTS).exists());

    checkpointer.save(&checkpoint(1), true, false).unwrap();
    assert_eq!(load_checkpoint(run_dir.join(BEST_CHECKPOINT)).unwrap().epoch, 1);
    assert!(run_dir.join(BEST_WEIGHTS).exists());
    assert!(!run_dir.join(EMA_BEST_CHECKPOINT).exists());

    checkpointer.save(&checkpoint(2), false, true).unwrap();
    assert_eq!(load_checkpoint(run_dir.join(LAST_CHECKPOINT)).unwrap().epoch, 2);
    assert_eq!(load_checkpoint(run_dir.join(BEST_CHECKPOINT)).unwrap().epoch, 1);
    assert_eq!(
        load_checkpoint(run_dir.join(EMA_BEST_CHECKPOINT)).unwrap().epoch,
        2
    );
    let ema_weights = load_safetensors(run_dir.join(EMA_BEST_WEIGHTS)).unwrap();
    assert_eq!(ema_weights, checkpoint(2).ema);
}

#[test]
fn test_restored_weights_load_into_model() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("w.safetensors");
    let source = LinearClassifier::new(3, 2, 9).unwrap();
    save_safetensors(&source.state(), &path, Default::default()).unwrap();

    let mut target = LinearClassifier::zeros(3, 2);
    target.load_state(&load_safetensors(&path).unwrap()).unwrap();
    assert_eq!(target.state(), source.state());
}
