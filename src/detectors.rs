//! Driving-behaviour rules evaluated over a conditioned series.
//!
//! All three detectors are read-only over the series and independent of
//! each other. Rows whose input value is absent never match.

use log::debug;

use crate::config::{AnalyzerConfig, DEFAULT_IDLE_SPEED_KMH};
use crate::types::{seconds_between, ConditionedSample, IdleEvent};

/// Every row whose smoothed speed is strictly above `limit_kmh`.
pub fn detect_overspeed(series: &[ConditionedSample], limit_kmh: f64) -> Vec<ConditionedSample> {
    series
        .iter()
        .filter(|s| s.speed_smooth.is_some_and(|v| v > limit_kmh))
        .copied()
        .collect()
}

/// Every row whose acceleration is strictly below `decel_threshold_mps2`.
/// The first row has no acceleration and is never reported.
pub fn detect_harsh_braking(
    series: &[ConditionedSample],
    decel_threshold_mps2: f64,
) -> Vec<ConditionedSample> {
    series
        .iter()
        .filter(|s| s.acceleration.is_some_and(|a| a < decel_threshold_mps2))
        .copied()
        .collect()
}

/// Idle runs (smoothed speed at or below 0.5 km/h) lasting at least `idle_time_sec`.
pub fn detect_idling(series: &[ConditionedSample], idle_time_sec: f64) -> Vec<IdleEvent> {
    detect_idling_below(series, idle_time_sec, DEFAULT_IDLE_SPEED_KMH)
}

/// Like [`detect_idling`] with an explicit idle speed cutoff.
///
/// A run's duration is the time between its first and last row, so a
/// single-row run lasts 0 s and only qualifies when `idle_time_sec <= 0`.
pub fn detect_idling_below(
    series: &[ConditionedSample],
    idle_time_sec: f64,
    idle_speed_kmh: f64,
) -> Vec<IdleEvent> {
    let runs = segment_runs(
        series
            .iter()
            .map(|s| s.speed_smooth.is_some_and(|v| v <= idle_speed_kmh)),
    );
    let idle_runs = runs.iter().filter(|r| r.tag).count();

    let events: Vec<IdleEvent> = runs
        .into_iter()
        .filter(|run| run.tag)
        .filter_map(|run| {
            let duration_sec =
                seconds_between(series[run.start].timestamp, series[run.end].timestamp);
            (duration_sec >= idle_time_sec).then(|| IdleEvent {
                start_index: run.start,
                end_index: run.end,
                duration_sec,
                samples: series[run.start..=run.end].to_vec(),
            })
        })
        .collect();

    debug!(
        "Idling: {} idle runs, {} at or above {}s",
        idle_runs,
        events.len(),
        idle_time_sec
    );
    events
}

/// A maximal stretch of consecutive rows sharing the same tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub tag: bool,
    pub start: usize,
    pub end: usize, // inclusive
}

/// Partition a tag sequence into maximal runs, in order. A new run starts
/// whenever the tag differs from the previous row's.
pub fn segment_runs(tags: impl IntoIterator<Item = bool>) -> Vec<Run> {
    tags.into_iter()
        .enumerate()
        .fold(Vec::new(), |mut runs: Vec<Run>, (i, tag)| {
            match runs.last_mut() {
                Some(run) if run.tag == tag => run.end = i,
                _ => runs.push(Run {
                    tag,
                    start: i,
                    end: i,
                }),
            }
            runs
        })
}

/// The three rules with their thresholds, for callers that hold them together.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventRules {
    pub speed_limit_kmh: f64,
    pub decel_threshold_mps2: f64,
    pub idle_time_sec: f64,
    pub idle_speed_kmh: f64,
}

impl Default for EventRules {
    fn default() -> Self {
        Self::from_config(&AnalyzerConfig::default())
    }
}

impl EventRules {
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            speed_limit_kmh: config.speed_limit_kmh,
            decel_threshold_mps2: config.decel_threshold_mps2,
            idle_time_sec: config.idle_time_sec,
            idle_speed_kmh: config.idle_speed_kmh,
        }
    }

    pub fn overspeed(&self, series: &[ConditionedSample]) -> Vec<ConditionedSample> {
        detect_overspeed(series, self.speed_limit_kmh)
    }

    pub fn harsh_braking(&self, series: &[ConditionedSample]) -> Vec<ConditionedSample> {
        detect_harsh_braking(series, self.decel_threshold_mps2)
    }

    pub fn idling(&self, series: &[ConditionedSample]) -> Vec<IdleEvent> {
        detect_idling_below(series, self.idle_time_sec, self.idle_speed_kmh)
    }
}
