//! CLI argument parsing and validation
//!
//! This module provides the command-line interface for afinar training.
//!
//! # Usage
//!
//! ```bash
//! afinar train config.yaml
//! afinar train config.yaml --output-dir ./checkpoints
//! afinar train config.yaml --resume results/checkpoint.json
//! afinar validate config.yaml
//! afinar info config.yaml --format json
//! ```

use super::TrainSpec;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Afinar: supervised training with EMA weights, mixup and cutmix
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "afinar")]
#[command(version)]
#[command(about = "Epoch-driven classifier training with EMA shadow weights and mixup/cutmix")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Train a model from YAML configuration
    Train(TrainArgs),

    /// Validate a configuration file without training
    Validate(ValidateArgs),

    /// Display information about a configuration
    Info(InfoArgs),
}

/// Arguments for the train command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TrainArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Override output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Resume training from checkpoint
    #[arg(short, long)]
    pub resume: Option<PathBuf>,

    /// Override the last epoch bound
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Override batch size
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Override learning rate
    #[arg(short, long)]
    pub lr: Option<f32>,

    /// Override device (cpu, cuda, cuda:N, mps)
    #[arg(long)]
    pub device: Option<String>,

    /// Dry run (validate config but don't train)
    #[arg(long)]
    pub dry_run: bool,

    /// Log per-iteration scalars every N iterations
    #[arg(long)]
    pub log_every: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the validate command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Show detailed validation report
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for the info command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct InfoArgs {
    /// Path to YAML configuration file
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Output format (text, json, yaml)
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for info command
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            _ => Err(format!(
                "Unknown output format: {}. Valid formats: text, json, yaml",
                s
            )),
        }
    }
}

/// Parse CLI arguments from a string slice (for testing)
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Apply command-line overrides to a TrainSpec
pub fn apply_overrides(spec: &mut TrainSpec, args: &TrainArgs) {
    if let Some(output_dir) = &args.output_dir {
        spec.common.save_dir = output_dir.clone();
    }
    if let Some(epochs) = args.epochs {
        spec.trainer.max_epoch = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        spec.data.batch_size = batch_size;
    }
    if let Some(lr) = args.lr {
        spec.optimizer.lr = lr;
    }
    if let Some(device) = &args.device {
        spec.trainer.device = device.clone();
    }
    if let Some(log_every) = args.log_every {
        spec.common.log_freq = log_every;
    }
    if let Some(seed) = args.seed {
        spec.common.seed = seed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_train_command() {
        let cli = parse_args(["afinar", "train", "config.yaml"]).unwrap();
        match cli.command {
            Command::Train(args) => {
                assert_eq!(args.config, PathBuf::from("config.yaml"));
                assert!(!args.dry_run);
                assert!(args.resume.is_none());
            }
            _ => panic!("Expected Train command"),
        }
    }

    #[test]
    fn test_parse_train_with_overrides() {
        let cli = parse_args([
            "afinar",
            "train",
            "config.yaml",
            "--output-dir",
            "./out",
            "--resume",
            "out/checkpoint.json",
            "--epochs",
            "20",
            "--lr",
            "0.01",
            "--device",
            "cuda:1",
            "--log-every",
            "5",
            "--seed",
            "9",
            "--dry-run",
        ])
        .unwrap();
        let Command::Train(args) = cli.command else {
            panic!("Expected Train command");
        };
        assert_eq!(args.output_dir, Some(PathBuf::from("./out")));
        assert_eq!(args.resume, Some(PathBuf::from("out/checkpoint.json")));
        assert_eq!(args.epochs, Some(20));
        assert_eq!(args.lr, Some(0.01));
        assert_eq!(args.device.as_deref(), Some("cuda:1"));
        assert_eq!(args.log_every, Some(5));
        assert_eq!(args.seed, Some(9));
        assert!(args.dry_run);
    }

    #[test]
    fn test_parse_validate_and_info() {
        let cli = parse_args(["afinar", "validate", "c.yaml", "--detailed"]).unwrap();
        assert!(matches!(cli.command, Command::Validate(ValidateArgs { detailed: true, .. })));

        let cli = parse_args(["afinar", "info", "c.yaml", "--format", "json"]).unwrap();
        match cli.command {
            Command::Info(args) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("Expected Info command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = parse_args(["afinar", "--verbose", "validate", "c.yaml"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.quiet);

        let cli = parse_args(["afinar", "info", "c.yaml", "-q"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(parse_args(["afinar", "info", "c.yaml", "--format", "xml"]).is_err());
        assert!(parse_args(["afinar", "train"]).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let yaml = r#"
model:
  num_classes: 3
data:
  batch_size: 8
  source:
    synthetic: {}
optimizer:
  name: sgd
  lr: 0.1
"#;
        let mut spec: TrainSpec = serde_yaml::from_str(yaml).unwrap();
        let args = TrainArgs {
            config: PathBuf::from("c.yaml"),
            output_dir: Some(PathBuf::from("/tmp/run")),
            resume: None,
            epochs: Some(7),
            batch_size: Some(32),
            lr: Some(0.05),
            device: Some("mps".to_string()),
            dry_run: false,
            log_every: Some(3),
            seed: Some(11),
        };
        apply_overrides(&mut spec, &args);
        assert_eq!(spec.common.save_dir, PathBuf::from("/tmp/run"));
        assert_eq!(spec.trainer.max_epoch, 7);
        assert_eq!(spec.data.batch_size, 32);
        assert_eq!(spec.optimizer.lr, 0.05);
        assert_eq!(spec.trainer.device, "mps");
        assert_eq!(spec.common.log_freq, 3);
        assert_eq!(spec.common.seed, 11);
    }
}
