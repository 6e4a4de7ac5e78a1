use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw cell of a numeric telemetry column, before coercion.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Number(f64),
    Text(String),
    Missing,
}

impl Field {
    /// Classify a raw CSV cell. Blank cells are `Missing`, anything else is
    /// kept as text until the conditioner coerces it.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Field::Missing
        } else {
            Field::Text(trimmed.to_string())
        }
    }

    /// Numeric value of the field, or `None` if it cannot be read as a finite number.
    pub fn coerce(&self) -> Option<f64> {
        match self {
            Field::Number(v) => Some(*v).filter(|v| v.is_finite()),
            Field::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Field::Missing => None,
        }
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Number(value)
    }
}

impl From<Option<f64>> for Field {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Field::Missing, Field::Number)
    }
}

/// Raw telemetry record, one per input row.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub speed: Field,     // km/h
    pub latitude: Field,  // degrees
    pub longitude: Field, // degrees
}

impl Sample {
    pub fn new(
        timestamp: DateTime<Utc>,
        speed: impl Into<Field>,
        latitude: impl Into<Field>,
        longitude: impl Into<Field>,
    ) -> Self {
        Self {
            timestamp,
            speed: speed.into(),
            latitude: latitude.into(),
            longitude: longitude.into(),
        }
    }
}

/// Derived per-row signal. `None` marks a value that is absent and never
/// satisfies a threshold rule.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionedSample {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "speed")]
    pub speed_interpolated: Option<f64>, // km/h
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_smooth: Option<f64>, // km/h
    pub dt: f64,                   // seconds since previous row
    pub speed_mps: Option<f64>,
    pub acceleration: Option<f64>, // m/s²
}

/// A maximal run of idle rows that lasted at least the idle threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct IdleEvent {
    pub start_index: usize,
    pub end_index: usize, // inclusive
    pub duration_sec: f64,
    pub samples: Vec<ConditionedSample>,
}

impl IdleEvent {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// The rule that flagged an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Overspeed,
    HarshBraking,
    Idle,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [
        EventKind::Overspeed,
        EventKind::HarshBraking,
        EventKind::Idle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Overspeed => "overspeed",
            EventKind::HarshBraking => "harsh_braking",
            EventKind::Idle => "idle",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub overspeed_count: usize,
    pub harsh_braking_count: usize,
    pub idle_count: usize,
}

/// Seconds from `earlier` to `later`, with sub-millisecond precision.
pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later.signed_duration_since(earlier);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}
