//! Training configuration and per-epoch history

use super::{Device, EpochMetrics};
use serde::{Deserialize, Serialize};

/// Training configuration
#[derive(Clone, Debug, PartialEq)]
pub struct TrainConfig {
    /// Time each phase of the first trained epoch
    pub profile_first: bool,

    /// Use dynamic loss scaling
    pub mixed_precision: bool,

    /// Write per-iteration scalars every N iterations
    pub log_freq: usize,

    /// First epoch to run (inclusive)
    pub start_epoch: usize,

    /// Last epoch bound (exclusive)
    pub max_epoch: usize,

    /// Device models and batches are placed on
    pub device: Device,

    /// Best live-model accuracy carried over from a previous run
    pub best_metric: Option<f32>,

    /// Best EMA-model accuracy carried over from a previous run
    pub best_ema_metric: Option<f32>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            profile_first: false,
            mixed_precision: true,
            log_freq: 100,
            start_epoch: 0,
            max_epoch: 50,
            device: Device::Cpu,
            best_metric: None,
            best_ema_metric: None,
        }
    }
}

impl TrainConfig {
    /// Create a new training configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the epoch range `start..max`
    pub fn with_epochs(mut self, start_epoch: usize, max_epoch: usize) -> Self {
        self.start_epoch = start_epoch;
        self.max_epoch = max_epoch;
        self
    }

    /// Set per-iteration logging frequency
    pub fn with_log_freq(mut self, log_freq: usize) -> Self {
        self.log_freq = log_freq.max(1);
        self
    }

    pub fn with_mixed_precision(mut self, enabled: bool) -> Self {
        self.mixed_precision = enabled;
        self
    }

    pub fn with_profile_first(mut self, enabled: bool) -> Self {
        self.profile_first = enabled;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Seed best metrics (resume)
    pub fn with_best_metrics(mut self, best_metric: f32, best_ema_metric: f32) -> Self {
        self.best_metric = Some(best_metric);
        self.best_ema_metric = Some(best_ema_metric);
        self
    }
}

/// Everything measured in one epoch
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub epoch: usize,
    pub lr: f32,
    pub train: EpochMetrics,
    pub valid: EpochMetrics,
    pub valid_ema: EpochMetrics,
    pub is_best: bool,
    pub is_ema_best: bool,
}

/// Tracks epoch reports across a run
#[derive(Clone, Debug, Default)]
pub struct MetricsTracker {
    pub reports: Vec<EpochReport>,
}

impl MetricsTracker {
    /// Create a new metrics tracker
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: EpochReport) {
        self.reports.push(report);
    }

    pub fn last(&self) -> Option<&EpochReport> {
        self.reports.last()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(epoch: usize, loss: f32, is_best: bool) -> EpochReport {
        EpochReport {
            epoch,
            lr: 0.1,
            train: EpochMetrics {
                accuracy: 0.5,
                loss,
            },
            valid: EpochMetrics::default(),
            valid_ema: EpochMetrics::default(),
            is_best,
            is_ema_best: false,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.log_freq, 100);
        assert!(config.mixed_precision);
        assert!(!config.profile_first);
        assert_eq!((config.start_epoch, config.max_epoch), (0, 50));
        assert_eq!(config.device, Device::Cpu);
        assert!(config.best_metric.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = TrainConfig::new()
            .with_epochs(3, 5)
            .with_log_freq(0)
            .with_mixed_precision(false)
            .with_best_metrics(0.4, 0.5);
        assert_eq!((config.start_epoch, config.max_epoch), (3, 5));
        assert_eq!(config.log_freq, 1);
        assert!(!config.mixed_precision);
        assert_eq!(config.best_ema_metric, Some(0.5));
    }

    #[test]
    fn test_tracker() {
        let mut tracker = MetricsTracker::new();
        assert!(tracker.is_empty());
        tracker.record(report(0, 1.0, true));
        tracker.record(report(1, 0.8, false));
        assert_eq!(tracker.len(), 2);
        let last = tracker.last().unwrap();
        assert_eq!((last.epoch, last.train.loss, last.is_best), (1, 0.8, false));
    }
}
