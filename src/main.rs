//! Afinar CLI
//!
//! Single-command training entry point for the afinar library.
//!
//! # Usage
//!
//! ```bash
//! # Train from config
//! afinar train config.yaml
//!
//! # Train with overrides
//! afinar train config.yaml --epochs 10 --lr 0.001
//!
//! # Continue an interrupted run
//! afinar train config.yaml --resume results/checkpoint.json
//!
//! # Validate config
//! afinar validate config.yaml --detailed
//!
//! # Show config info
//! afinar info config.yaml --format yaml
//! ```

use afinar::config::{
    apply_overrides, load_config, run_training, validate_config, Cli, Command, DataSource,
    InfoArgs, OutputFormat, TrainArgs, TrainSpec, ValidateArgs,
};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match cli.command {
        Command::Train(args) => run_train(args),
        Command::Validate(args) => run_validate(args),
        Command::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG wins; otherwise --verbose/--quiet pick the level
fn init_tracing(cli: &Cli) {
    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_train(args: TrainArgs) -> Result<(), String> {
    info!("Afinar: Training from {}", args.config.display());

    // Load and validate config
    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    // Apply command-line overrides
    apply_overrides(&mut spec, &args);
    validate_config(&spec).map_err(|e| format!("Invalid override: {e}"))?;

    if args.dry_run {
        info!("Dry run - config validated successfully");
        print_summary(&spec);
        return Ok(());
    }

    let summary = run_training(&spec, args.resume.as_deref())
        .map_err(|e| format!("Training error: {e}"))?;

    info!(
        "Training complete: {} epochs, best accuracy {:.4}, best EMA accuracy {:.4}",
        summary.epochs_run, summary.best_metric, summary.best_ema_metric
    );
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    info!("Validating config: {}", args.config.display());

    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    info!("Configuration is valid");

    if args.detailed {
        println!();
        println!("Configuration Summary:");
        print_summary(&spec);
    }

    Ok(())
}

fn print_summary(spec: &TrainSpec) {
    println!("  Model: {} ({} classes)", spec.model.arch, spec.model.num_classes);
    println!();
    match &spec.data.source {
        DataSource::Synthetic(s) => println!(
            "  Training data: synthetic ({} samples, {} features)",
            s.samples, s.features
        ),
        DataSource::Path(path) => println!("  Training data: {}", path.display()),
    }
    match &spec.data.valid {
        Some(path) => println!("  Validation data: {}", path.display()),
        None => println!("  Validation split: {}", spec.data.valid_fraction),
    }
    println!("  Batch size: {}", spec.data.batch_size);
    println!();
    println!("  Optimizer: {}", spec.optimizer.name);
    println!("  Learning rate: {}", spec.optimizer.lr);
    if spec.optimizer.weight_decay > 0.0 {
        println!("  Weight decay: {}", spec.optimizer.weight_decay);
    }
    println!("  Scheduler: {}", spec.scheduler.name);
    println!();
    println!(
        "  Epochs: {}..{}",
        spec.trainer.start_epoch, spec.trainer.max_epoch
    );
    println!("  Device: {}", spec.trainer.device);
    println!("  Mixed precision: {}", spec.common.mixed_precision);
    println!("  EMA decay: {}", spec.ema.decay);
    if spec.mix.is_enabled() {
        println!(
            "  Mix: mixup_alpha={} cutmix_alpha={} prob={}",
            spec.mix.mixup_alpha, spec.mix.cutmix_alpha, spec.mix.prob
        );
    }
    println!("  Output dir: {}", spec.common.save_dir.display());
}

fn run_info(args: InfoArgs) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            println!("Configuration Info:");
            println!();
            print_summary(&spec);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&spec)
                .map_err(|e| format!("JSON serialization error: {e}"))?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&spec)
                .map_err(|e| format!("YAML serialization error: {e}"))?;
            println!("{yaml}");
        }
    }

    Ok(())
}
