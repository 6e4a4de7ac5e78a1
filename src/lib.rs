//! Driving-behaviour analysis for a single recorded trip.
//!
//! Raw telemetry samples are conditioned into a smoothed speed and
//! acceleration signal, then checked for overspeeding, harsh braking and
//! prolonged idling. Loading, reporting and charts sit around that core.

pub mod charts;
pub mod conditioning;
pub mod config;
pub mod detectors;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod smoothing;
pub mod types;

pub use conditioning::{condition, SignalConditioner};
pub use config::AnalyzerConfig;
pub use detectors::{detect_harsh_braking, detect_idling, detect_idling_below, detect_overspeed};
pub use error::{AnalyzerError, Result};
pub use pipeline::{Pipeline, TripAnalysis};
pub use types::{ConditionedSample, EventKind, EventSummary, Field, IdleEvent, Sample};
