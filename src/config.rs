use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;

pub const DEFAULT_SPEED_LIMIT_KMH: f64 = 60.0;
pub const DEFAULT_DECEL_THRESHOLD_MPS2: f64 = -3.5;
pub const DEFAULT_IDLE_TIME_SEC: f64 = 120.0;
pub const DEFAULT_IDLE_SPEED_KMH: f64 = 0.5;
pub const DEFAULT_INTERPOLATION_LIMIT: usize = 5;
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Thresholds and tunables for one analysis run.
///
/// Values are taken as given: a negative idle time or an inverted
/// threshold just produces a degenerate result set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub speed_limit_kmh: f64,
    pub decel_threshold_mps2: f64,
    pub idle_time_sec: f64,
    pub idle_speed_kmh: f64,
    /// Longest run of missing samples that is still filled by interpolation.
    pub interpolation_limit: usize,
    pub smoothing_window: usize,
    pub parallel_detectors: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            speed_limit_kmh: DEFAULT_SPEED_LIMIT_KMH,
            decel_threshold_mps2: DEFAULT_DECEL_THRESHOLD_MPS2,
            idle_time_sec: DEFAULT_IDLE_TIME_SEC,
            idle_speed_kmh: DEFAULT_IDLE_SPEED_KMH,
            interpolation_limit: DEFAULT_INTERPOLATION_LIMIT,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            parallel_detectors: false,
        }
    }
}

impl AnalyzerConfig {
    /// Load from a JSON file. Keys that are absent keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
