//! Signal conditioning: raw samples to a physically consistent derived series.
//!
//! Each step is a total function over the whole trip:
//! coerce → gap-fill → smooth → dt → km/h to m/s → finite-difference acceleration.
//! Nothing here fails; unreadable or underdetermined values become `None`.

use log::debug;

use crate::config::AnalyzerConfig;
use crate::smoothing::MovingAverage;
use crate::types::{seconds_between, ConditionedSample, Sample};

const KMH_TO_MPS: f64 = 1000.0 / 3600.0;

/// Assumed spacing for the first row, which has no predecessor.
pub const FIRST_ROW_DT_SEC: f64 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct SignalConditioner {
    interpolation_limit: usize,
    smoothing_window: usize,
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::from_config(&AnalyzerConfig::default())
    }
}

impl SignalConditioner {
    pub fn new(interpolation_limit: usize, smoothing_window: usize) -> Self {
        Self {
            interpolation_limit,
            smoothing_window,
        }
    }

    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self::new(config.interpolation_limit, config.smoothing_window)
    }

    /// Condition a trip. Output has the same length and order as `samples`,
    /// which the caller must already have sorted by timestamp.
    pub fn condition(&self, samples: &[Sample]) -> Vec<ConditionedSample> {
        let mut speed: Vec<Option<f64>> = samples.iter().map(|s| s.speed.coerce()).collect();
        let mut latitude: Vec<Option<f64>> = samples.iter().map(|s| s.latitude.coerce()).collect();
        let mut longitude: Vec<Option<f64>> =
            samples.iter().map(|s| s.longitude.coerce()).collect();

        let filled_speed = interpolate_gaps(&mut speed, self.interpolation_limit);
        let filled_lat = interpolate_gaps(&mut latitude, self.interpolation_limit);
        let filled_lon = interpolate_gaps(&mut longitude, self.interpolation_limit);
        debug!(
            "Gap-filled {} speed, {} latitude, {} longitude values over {} samples",
            filled_speed,
            filled_lat,
            filled_lon,
            samples.len()
        );

        let speed_smooth = MovingAverage::smooth_all(self.smoothing_window, &speed);

        let mut series = Vec::with_capacity(samples.len());
        let mut previous: Option<&Sample> = None;
        let mut previous_mps: Option<f64> = None;

        for (i, sample) in samples.iter().enumerate() {
            let dt = match previous {
                Some(prev) => seconds_between(prev.timestamp, sample.timestamp),
                None => FIRST_ROW_DT_SEC,
            };
            let speed_mps = speed_smooth[i].map(|v| v * KMH_TO_MPS);
            let acceleration = if previous.is_some() {
                finite_difference(previous_mps, speed_mps, dt)
            } else {
                None
            };

            series.push(ConditionedSample {
                timestamp: sample.timestamp,
                speed_interpolated: speed[i],
                latitude: latitude[i],
                longitude: longitude[i],
                speed_smooth: speed_smooth[i],
                dt,
                speed_mps,
                acceleration,
            });

            previous = Some(sample);
            previous_mps = speed_mps;
        }

        series
    }
}

/// Condition with default settings.
pub fn condition(samples: &[Sample]) -> Vec<ConditionedSample> {
    SignalConditioner::default().condition(samples)
}

/// `(current - previous) / dt`. A zero `dt` (duplicate timestamps) gives an
/// infinite rate when the speed changed; `0/0` is treated as absent.
fn finite_difference(previous: Option<f64>, current: Option<f64>, dt: f64) -> Option<f64> {
    let rate = (current? - previous?) / dt;
    (!rate.is_nan()).then_some(rate)
}

/// Fill interior runs of `None` no longer than `limit` by linear
/// interpolation between the bounding values (index-spaced).
///
/// Runs touching either end of the slice, and runs longer than `limit`, are
/// left untouched. Returns the number of values filled.
pub fn interpolate_gaps(values: &mut [Option<f64>], limit: usize) -> usize {
    let mut filled = 0;
    let mut i = 0;

    while i < values.len() {
        if values[i].is_some() {
            i += 1;
            continue;
        }

        let start = i;
        while i < values.len() && values[i].is_none() {
            i += 1;
        }
        let end = i; // exclusive
        let gap = end - start;

        let left = start.checked_sub(1).and_then(|j| values[j]);
        let right = values.get(end).copied().flatten();

        if let (Some(left), Some(right)) = (left, right) {
            if gap <= limit {
                let step = (right - left) / (gap + 1) as f64;
                for (k, slot) in values[start..end].iter_mut().enumerate() {
                    *slot = Some(left + step * (k + 1) as f64);
                }
                filled += gap;
            }
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::detect_harsh_braking;
    use crate::types::Field;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap()
    }

    fn samples_at(offsets: &[i64], speeds: &[Option<f64>]) -> Vec<Sample> {
        offsets
            .iter()
            .zip(speeds)
            .map(|(&secs, &speed)| {
                Sample::new(t0() + Duration::seconds(secs), speed, Some(52.0), Some(13.0))
            })
            .collect()
    }

    fn uniform(speeds: &[Option<f64>]) -> Vec<Sample> {
        let offsets: Vec<i64> = (0..speeds.len() as i64).collect();
        samples_at(&offsets, speeds)
    }

    #[test]
    fn test_length_and_order_preserved() {
        let samples = uniform(&[Some(10.0), None, Some(30.0), Some(20.0)]);
        let series = condition(&samples);
        assert_eq!(series.len(), samples.len());
        for (raw, out) in samples.iter().zip(&series) {
            assert_eq!(raw.timestamp, out.timestamp);
        }
        assert!(condition(&[]).is_empty());
    }

    #[test]
    fn test_single_gap_interpolated() {
        let mut values = vec![Some(10.0), None, Some(20.0), Some(30.0)];
        assert_eq!(interpolate_gaps(&mut values, 5), 1);
        assert_eq!(values[1], Some(15.0));
    }

    #[test]
    fn test_gap_at_limit_filled() {
        let mut values = vec![Some(0.0), None, None, None, None, None, Some(60.0)];
        assert_eq!(interpolate_gaps(&mut values, 5), 5);
        for (i, v) in values.iter().enumerate() {
            assert_relative_eq!(v.unwrap(), i as f64 * 10.0);
        }
    }

    #[test]
    fn test_long_gap_left_missing() {
        let mut values = vec![Some(0.0), None, None, None, None, None, None, Some(70.0)];
        assert_eq!(interpolate_gaps(&mut values, 5), 0);
        assert!(values[1..7].iter().all(Option::is_none));
    }

    #[test]
    fn test_edge_gaps_left_missing() {
        let mut values = vec![None, Some(5.0), Some(6.0), None];
        assert_eq!(interpolate_gaps(&mut values, 5), 0);
        assert_eq!(values, vec![None, Some(5.0), Some(6.0), None]);
    }

    #[test]
    fn test_non_numeric_speed_degrades_to_missing() {
        let mut samples = uniform(&[Some(10.0), None, Some(30.0)]);
        samples[1].speed = Field::Text("garbage".into());
        samples[2].latitude = Field::Text("??".into());

        let series = condition(&samples);
        assert_eq!(series[1].speed_interpolated, Some(20.0));
        assert_eq!(series[2].latitude, None); // trailing, nothing to interpolate to
    }

    #[test]
    fn test_smoothing_window() {
        let series = condition(&uniform(&[Some(3.0), Some(6.0), Some(9.0), Some(30.0)]));
        assert_eq!(series[0].speed_smooth, series[0].speed_interpolated);
        assert_relative_eq!(series[1].speed_smooth.unwrap(), 4.5);
        assert_relative_eq!(series[2].speed_smooth.unwrap(), 6.0);
        assert_relative_eq!(series[3].speed_smooth.unwrap(), 15.0);
    }

    #[test]
    fn test_dt_and_unit_conversion() {
        let samples = samples_at(&[0, 2, 7], &[Some(36.0), Some(36.0), Some(36.0)]);
        let series = condition(&samples);
        assert_eq!(series[0].dt, 1.0);
        assert_eq!(series[1].dt, 2.0);
        assert_eq!(series[2].dt, 5.0);
        assert_relative_eq!(series[0].speed_mps.unwrap(), 10.0);
    }

    #[test]
    fn test_acceleration_finite_difference() {
        let samples = samples_at(&[0, 1, 3], &[Some(36.0), Some(36.0), Some(36.0)]);
        let series = condition(&samples);
        assert_eq!(series[0].acceleration, None);
        for i in 1..series.len() {
            let expected = (series[i].speed_mps.unwrap() - series[i - 1].speed_mps.unwrap())
                / series[i].dt;
            assert_abs_diff_eq!(series[i].acceleration.unwrap(), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_decreasing_speed_gives_negative_acceleration() {
        let series = condition(&uniform(&[
            Some(90.0),
            Some(80.0),
            Some(70.0),
            Some(55.0),
            Some(40.0),
            Some(20.0),
        ]));
        assert!(series[1..].iter().all(|s| s.acceleration.unwrap() < 0.0));
    }

    #[test]
    fn test_acceleration_absent_when_speed_missing() {
        let series = condition(&uniform(&[Some(50.0), None, None, None, None, None, None]));
        assert_eq!(series[1].acceleration, Some(0.0));
        // window [50, -, -] still has a value; [-, -, -] does not
        assert_eq!(series[3].speed_smooth, None);
        assert_eq!(series[3].acceleration, None);
        assert_eq!(series[4].acceleration, None);
    }

    #[test]
    fn test_duplicate_timestamps_kept() {
        let samples = samples_at(&[0, 1, 1, 2], &[Some(10.0), Some(10.0), Some(10.0), Some(10.0)]);
        let series = condition(&samples);
        assert_eq!(series.len(), 4);
        assert_eq!(series[2].dt, 0.0);
        assert_eq!(series[2].acceleration, None); // 0/0
    }

    #[test]
    fn test_speed_drop_at_duplicate_timestamp() {
        let samples = samples_at(&[0, 1, 1], &[Some(50.0), Some(50.0), Some(20.0)]);
        let series = condition(&samples);
        assert_eq!(series[1].acceleration, Some(0.0));
        assert_eq!(series[2].acceleration, Some(f64::NEG_INFINITY));
        assert_eq!(detect_harsh_braking(&series, -3.5).len(), 1);
    }

    fn positioned(latitude: &[Option<f64>], longitude: &[Option<f64>]) -> Vec<Sample> {
        latitude
            .iter()
            .zip(longitude)
            .enumerate()
            .map(|(i, (&lat, &lon))| {
                Sample::new(t0() + Duration::seconds(i as i64), 40.0, lat, lon)
            })
            .collect()
    }

    #[test]
    fn test_position_gaps_filled_per_column() {
        let latitude = [Some(1.0), None, Some(3.0), Some(4.0), Some(5.0), Some(6.0)];
        let longitude = [Some(2.0), Some(3.0), Some(4.0), None, None, Some(10.0)];
        let series = condition(&positioned(&latitude, &longitude));

        assert_relative_eq!(series[1].latitude.unwrap(), 2.0);
        assert_eq!(series[1].longitude, Some(3.0));
        assert_eq!(series[3].latitude, Some(4.0));
        assert_relative_eq!(series[3].longitude.unwrap(), 6.0);
        assert_relative_eq!(series[4].longitude.unwrap(), 8.0);
    }

    #[test]
    fn test_long_position_gap_left_missing() {
        let mut latitude = vec![Some(1.0)];
        latitude.extend([None; 6]);
        latitude.push(Some(8.0));
        let longitude: Vec<Option<f64>> = (0..8).map(|i| Some(i as f64)).collect();
        let series = condition(&positioned(&latitude, &longitude));

        assert!(series[1..7].iter().all(|s| s.latitude.is_none()));
        assert_eq!(series[0].latitude, Some(1.0));
        assert_eq!(series[7].latitude, Some(8.0));
        assert!(series.iter().all(|s| s.longitude.is_some()));
    }
}
