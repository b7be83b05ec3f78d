//! Single-command training from YAML configuration

use super::builder::build_trainer;
use super::schema::TrainSpec;
use super::validate::validate_config;
use crate::error::{Error, Result};
use crate::io::load_checkpoint;
use crate::train::TrainSummary;
use std::fs;
use std::path::Path;
use tracing::info;

/// Train a model from YAML configuration file
///
/// This is the main entry point for declarative training. It:
/// 1. Loads and parses the YAML config
/// 2. Validates the configuration
/// 3. Builds the model, data, optimizer and EMA shadow
/// 4. Runs the epoch loop, checkpointing under `common.save_dir`
///
/// # Example
///
/// ```no_run
/// use afinar::config::train_from_yaml;
///
/// let summary = train_from_yaml("config.yaml")?;
/// println!("best accuracy {:.3}", summary.best_metric);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn train_from_yaml<P: AsRef<Path>>(config_path: P) -> Result<TrainSummary> {
    let spec = load_config(config_path)?;
    run_training(&spec, None)
}

/// Run training for an already validated spec, optionally resuming
pub fn run_training(spec: &TrainSpec, resume: Option<&Path>) -> Result<TrainSummary> {
    info!(
        "Training {} ({} classes) with {} (lr={}) for epochs {}..{}",
        spec.model.arch,
        spec.model.num_classes,
        spec.optimizer.name,
        spec.optimizer.lr,
        spec.trainer.start_epoch,
        spec.trainer.max_epoch
    );

    let mut trainer = build_trainer(spec)?;
    if let Some(path) = resume {
        let checkpoint = load_checkpoint(path)?;
        trainer.resume_from(&checkpoint)?;
    }

    let summary = trainer.run()?;
    info!(
        "Training complete in {:.2}s: best {:.4}, best EMA {:.4}",
        summary.elapsed_secs, summary.best_metric, summary.best_ema_metric
    );
    Ok(summary)
}

/// Parse a training spec from YAML text and validate it
pub fn parse_config(yaml: &str) -> Result<TrainSpec> {
    let spec: TrainSpec = serde_yaml::from_str(yaml)
        .map_err(|e| Error::ConfigError(format!("Failed to parse YAML config: {}", e)))?;

    validate_config(&spec).map_err(|e| Error::ConfigError(format!("Invalid config: {}", e)))?;

    Ok(spec)
}

/// Load training spec from YAML file (without running training)
///
/// Useful for testing config parsing and validation separately from training.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<TrainSpec> {
    let yaml_content = fs::read_to_string(config_path.as_ref()).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read config file {}: {}",
            config_path.as_ref().display(),
            e
        ))
    })?;

    parse_config(&yaml_content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BEST_CHECKPOINT, LAST_CHECKPOINT};
    use crate::monitor::read_jsonl;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();
        temp_file
    }

    fn training_yaml(save_dir: &Path, max_epoch: usize) -> String {
        format!(
            r#"
common:
  log_freq: 2
  mixed_precision: false
  seed: 3
  save_dir: {}

trainer:
  max_epoch: {max_epoch}

model:
  num_classes: 3

data:
  batch_size: 16
  source:
    synthetic: {{ samples: 120, features: 4, spread: 0.3 }}

optimizer:
  name: sgd
  lr: 0.1

ema:
  decay: 0.9
"#,
            save_dir.display()
        )
    }

    #[test]
    fn test_load_valid_config() {
        let yaml = r#"
model:
  num_classes: 4

data:
  batch_size: 8
  source:
    synthetic: {}

optimizer:
  name: adamw
  lr: 0.001
"#;

        let temp_file = write_config(yaml);
        let spec = load_config(temp_file.path()).unwrap();
        assert_eq!(spec.optimizer.name, "adamw");
        assert_eq!(spec.data.batch_size, 8);
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
model:
  num_classes: 4

data:
  batch_size: 0
  source:
    synthetic: {}

optimizer:
  name: adamw
  lr: 0.001
"#;

        let temp_file = write_config(yaml);
        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_malformed_yaml() {
        let temp_file = write_config("this is not valid yaml: [}");
        let result = load_config(temp_file.path());
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/afinar.yaml");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_train_from_yaml_writes_outputs() {
        let dir = TempDir::new().unwrap();
        let temp_file = write_config(&training_yaml(dir.path(), 3));

        let summary = train_from_yaml(temp_file.path()).unwrap();
        assert_eq!(summary.epochs_run, 3);
        assert!(summary.best_metric > 0.0);
        assert!(dir.path().join(LAST_CHECKPOINT).exists());
        assert!(dir.path().join(BEST_CHECKPOINT).exists());

        let records = read_jsonl(dir.path().join(super::super::builder::SCALARS_FILE)).unwrap();
        let epochs = records.iter().filter(|r| r.tag == "Valid/Accuracy").count();
        assert_eq!(epochs, 3);
    }

    #[test]
    fn test_run_training_resumes_after_checkpoint() {
        let dir = TempDir::new().unwrap();
        let first = parse_config(&training_yaml(dir.path(), 2)).unwrap();
        let first_summary = run_training(&first, None).unwrap();

        let second = parse_config(&training_yaml(dir.path(), 4)).unwrap();
        let resumed =
            run_training(&second, Some(&dir.path().join(LAST_CHECKPOINT))).unwrap();
        assert_eq!(resumed.epochs_run, 2);
        assert_eq!(resumed.last.as_ref().unwrap().epoch, 3);
        assert!(resumed.best_metric >= first_summary.best_metric);
    }
}
