use std::panic;

use log::{debug, info};

use crate::conditioning::SignalConditioner;
use crate::config::AnalyzerConfig;
use crate::detectors::EventRules;
use crate::types::{ConditionedSample, EventKind, EventSummary, IdleEvent, Sample};

/// Everything derived from one trip.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TripAnalysis {
    pub series: Vec<ConditionedSample>,
    pub overspeed: Vec<ConditionedSample>,
    pub harsh_braking: Vec<ConditionedSample>,
    pub idle: Vec<IdleEvent>,
}

impl TripAnalysis {
    /// Events flagged by `kind`; idle events count once per run.
    pub fn count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Overspeed => self.overspeed.len(),
            EventKind::HarshBraking => self.harsh_braking.len(),
            EventKind::Idle => self.idle.len(),
        }
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            overspeed_count: self.count(EventKind::Overspeed),
            harsh_braking_count: self.count(EventKind::HarshBraking),
            idle_count: self.count(EventKind::Idle),
        }
    }

    /// Rows across all idle events.
    pub fn idle_sample_count(&self) -> usize {
        self.idle.iter().map(IdleEvent::len).sum()
    }

    pub fn total_idle_sec(&self) -> f64 {
        self.idle.iter().map(|e| e.duration_sec).sum()
    }
}

/// Conditions a trip once, then evaluates the three event rules on it.
pub struct Pipeline {
    conditioner: SignalConditioner,
    rules: EventRules,
    parallel: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&AnalyzerConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            conditioner: SignalConditioner::from_config(config),
            rules: EventRules::from_config(config),
            parallel: config.parallel_detectors,
        }
    }

    pub fn run(&self, samples: &[Sample]) -> TripAnalysis {
        let series = self.conditioner.condition(samples);
        debug!("Conditioned {} samples", series.len());

        let (overspeed, harsh_braking, idle) = if self.parallel {
            self.detect_parallel(&series)
        } else {
            self.detect_sequential(&series)
        };

        let analysis = TripAnalysis {
            series,
            overspeed,
            harsh_braking,
            idle,
        };
        let summary = analysis.summary();
        info!(
            "Trip analysed: {} samples, {} overspeed, {} harsh braking, {} idle events ({} rows, {:.0}s)",
            analysis.series.len(),
            summary.overspeed_count,
            summary.harsh_braking_count,
            summary.idle_count,
            analysis.idle_sample_count(),
            analysis.total_idle_sec()
        );
        analysis
    }

    fn detect_sequential(
        &self,
        series: &[ConditionedSample],
    ) -> (Vec<ConditionedSample>, Vec<ConditionedSample>, Vec<IdleEvent>) {
        (
            self.rules.overspeed(series),
            self.rules.harsh_braking(series),
            self.rules.idling(series),
        )
    }

    /// Same result as [`Self::detect_sequential`]; the rules share the series read-only.
    /// A panicking detector is propagated to the caller.
    fn detect_parallel(
        &self,
        series: &[ConditionedSample],
    ) -> (Vec<ConditionedSample>, Vec<ConditionedSample>, Vec<IdleEvent>) {
        let rules = &self.rules;
        crossbeam::thread::scope(|scope| {
            let overspeed = scope.spawn(|_| rules.overspeed(series));
            let harsh = scope.spawn(|_| rules.harsh_braking(series));
            let idle = rules.idling(series);
            (
                overspeed.join().unwrap_or_else(|e| panic::resume_unwind(e)),
                harsh.join().unwrap_or_else(|e| panic::resume_unwind(e)),
                idle,
            )
        })
        .unwrap_or_else(|e| panic::resume_unwind(e))
    }
}

/// Run the full pipeline with default thresholds.
pub fn run(samples: &[Sample]) -> TripAnalysis {
    Pipeline::default().run(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn uniform_trip(speeds: &[f64], spacing_sec: i64) -> Vec<Sample> {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 10, 17, 0, 0).unwrap();
        speeds
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                Sample::new(
                    t0 + Duration::seconds(i as i64 * spacing_sec),
                    v,
                    Some(48.85 + i as f64 * 1e-4),
                    Some(2.35),
                )
            })
            .collect()
    }

    #[test]
    fn test_short_trip_defaults() {
        let samples = uniform_trip(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 80.0, 80.0, 0.0, 0.0], 1);
        let analysis = run(&samples);

        assert_eq!(analysis.series.len(), 10);
        // smoothed: .., 26.7, 53.3, 53.3, 26.7 -> none above 60
        assert!(analysis.overspeed.iter().all(|s| s.speed_smooth.unwrap() > 60.0));
        assert!(analysis.overspeed.is_empty());
        // rising to 80 then dropping 26.7 km/h in 1s is harsh braking
        assert!(!analysis.harsh_braking.is_empty());
        // 9 seconds of data cannot hold a 120s idle run
        assert!(analysis.idle.is_empty());

        let summary = analysis.summary();
        assert_eq!(summary.idle_count, 0);
        assert_eq!(summary.overspeed_count, analysis.overspeed.len());
    }

    #[test]
    fn test_sustained_speed_and_long_stop() {
        let mut speeds = vec![0.0; 15];
        speeds.extend([70.0, 90.0, 90.0, 90.0, 0.0, 0.0, 0.0]);
        let samples = uniform_trip(&speeds, 10);
        let analysis = run(&samples);

        assert_eq!(analysis.idle.len(), 1);
        assert_eq!(analysis.idle[0].start_index, 0);
        assert_eq!(analysis.idle[0].duration_sec, 140.0);
        assert_eq!(analysis.idle_sample_count(), 15);
        // smoothed tail: 23.3, 53.3, 83.3, 90, 60, 30, 0
        assert_eq!(analysis.overspeed.len(), 2);
        assert_eq!(analysis.summary().overspeed_count, 2);
        assert_eq!(analysis.count(EventKind::Overspeed), 2);
        assert_eq!(analysis.count(EventKind::Idle), 1);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut speeds = vec![0.0; 20];
        speeds.extend([40.0, 95.0, 100.0, 30.0, 0.0, 0.0]);
        let samples = uniform_trip(&speeds, 8);

        let sequential = Pipeline::default().run(&samples);
        let config = AnalyzerConfig {
            parallel_detectors: true,
            ..AnalyzerConfig::default()
        };
        let parallel = Pipeline::new(&config).run(&samples);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_parallel_detectors_on_idle_and_empty_trips() {
        let config = AnalyzerConfig {
            parallel_detectors: true,
            ..AnalyzerConfig::default()
        };
        let pipeline = Pipeline::new(&config);
        assert_eq!(pipeline.run(&[]).summary(), EventSummary::default());

        let analysis = pipeline.run(&uniform_trip(&[0.0; 20], 10));
        assert_eq!(analysis.count(EventKind::Idle), 1);
        assert_eq!(analysis.idle[0].duration_sec, 190.0);
        assert!(analysis.overspeed.is_empty());
    }

    #[test]
    fn test_empty_trip() {
        let analysis = run(&[]);
        assert!(analysis.series.is_empty());
        assert_eq!(analysis.summary(), EventSummary::default());
    }
}
