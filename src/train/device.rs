//! Compute device selection

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where tensors and parameters live during training
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Device {
    /// Host memory
    #[default]
    Cpu,
    /// CUDA device with ordinal
    Cuda(usize),
    /// Apple Metal
    Mps,
}

impl Device {
    /// Whether this device is host memory
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            "mps" => Ok(Device::Mps),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse::<usize>()
                    .map(Device::Cuda)
                    .map_err(|_| Error::ConfigError(format!("invalid CUDA ordinal in '{s}'"))),
                None => Err(Error::ConfigError(format!("unknown device type '{s}'"))),
            },
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(i) => write!(f, "cuda:{i}"),
            Device::Mps => write!(f, "mps"),
        }
    }
}
