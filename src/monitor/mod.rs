//! Scalar metrics sink
//!
//! The trainer reports every metric as a `(tag, value, step)` triple through
//! [`ScalarWriter`]. Tags follow the `Phase/Metric` convention, e.g.
//! `Train/Loss` or `Valid/EMA_Accuracy`.
//!
//! # Example
//!
//! ```
//! use afinar::monitor::{InMemoryWriter, ScalarWriter};
//!
//! let handle = InMemoryWriter::new();
//! let mut writer = handle.clone();
//! writer.add_scalar("Train/Loss", 0.5, 0).unwrap();
//! writer.add_scalar("Train/Loss", 0.3, 1).unwrap();
//!
//! let stats = handle.stats("Train/Loss").unwrap();
//! assert_eq!(stats.count, 2);
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod storage;

pub use storage::{read_jsonl, InMemoryWriter, JsonlWriter};

/// A single scalar observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    pub tag: String,
    pub value: f64,
    /// Epoch or global iteration, depending on the tag
    pub step: u64,
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
}

impl ScalarRecord {
    /// Create a new record with current timestamp
    pub fn new(tag: impl Into<String>, value: f64, step: u64) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            tag: tag.into(),
            value,
            step,
            timestamp,
        }
    }
}

/// Destination for scalar metrics
pub trait ScalarWriter: Send {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> Result<()>;

    /// Persist buffered records
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Summary statistics over one tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarStats {
    /// Number of values
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub has_nan: bool,
}

impl ScalarStats {
    /// Compute statistics; `None` for an empty slice
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let variance = if count > 1 {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64
        } else {
            0.0
        };

        Some(Self {
            count,
            mean,
            std: variance.sqrt(),
            min,
            max,
            has_nan: values.iter().any(|v| v.is_nan()),
        })
    }
}
