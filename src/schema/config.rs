//! Configuration types for import and playback.

use serde::{Deserialize, Serialize};

use crate::rotation::AngleUnit;

fn default_decimation() -> usize {
    1
}

/// Top-level session configuration, as loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Log-file import settings.
    #[serde(default)]
    pub import: ImportConfig,
    /// Motion-output playback settings.
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Settings for parsing the solver log file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Unit of Euler angles in `structural node:` records.
    #[serde(default)]
    pub log_units: AngleUnit,
}

/// What to do when one sample's orientation cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Drop the sample, record the failure on the frame and keep going.
    #[default]
    Skip,
    /// Stop playback with an error.
    Abort,
}

/// Settings for streaming a motion-output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Replay every Nth time step (1 = every step).
    #[serde(default = "default_decimation")]
    pub decimation: usize,
    /// First time step to emit (0-indexed).
    #[serde(default)]
    pub first_step: usize,
    /// Last time step to emit, inclusive (None = until the end of the file).
    #[serde(default)]
    pub last_step: Option<usize>,
    /// Unit of Euler angles in text motion files.
    #[serde(default)]
    pub euler_units: AngleUnit,
    /// Per-sample decode failure handling.
    #[serde(default)]
    pub decode_policy: DecodePolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            decimation: 1,
            first_step: 0,
            last_step: None,
            euler_units: AngleUnit::Degrees,
            decode_policy: DecodePolicy::Skip,
        }
    }
}

impl PlaybackConfig {
    /// Config that replays every `decimation`-th step of the whole file.
    pub fn with_decimation(decimation: usize) -> Self {
        Self {
            decimation,
            ..Default::default()
        }
    }

    /// Whether time step `step` is emitted under this config.
    #[inline]
    pub fn emits(&self, step: usize) -> bool {
        step >= self.first_step
            && self.last_step.is_none_or(|last| step <= last)
            && (step - self.first_step) % self.decimation == 0
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.decimation == 0 {
            return Err(ConfigError::InvalidDecimation);
        }
        if let Some(last) = self.last_step
            && last < self.first_step
        {
            return Err(ConfigError::EmptyStepRange {
                first: self.first_step,
                last,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Decimation frequency must be at least 1")]
    InvalidDecimation,
    #[error("Step range is empty (first {first} > last {last})")]
    EmptyStepRange { first: usize, last: usize },
}
