use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;

use crate::error::Result;
use crate::pipeline::TripAnalysis;
use crate::types::{ConditionedSample, EventKind, EventSummary, IdleEvent};

pub const OVERSPEED_FILE: &str = "overspeed_events.csv";
pub const HARSH_BRAKING_FILE: &str = "harsh_braking.csv";
pub const IDLE_FILE: &str = "idle_events.csv";
pub const SUMMARY_FILE: &str = "summary.json";

const SAMPLE_HEADER: [&str; 8] = [
    "timestamp",
    "speed",
    "latitude",
    "longitude",
    "speed_smooth",
    "dt",
    "speed_mps",
    "acceleration",
];

/// Idle rows carry their event number and the event's duration.
#[derive(Serialize)]
struct IdleRow {
    timestamp: DateTime<Utc>,
    speed: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    speed_smooth: Option<f64>,
    dt: f64,
    speed_mps: Option<f64>,
    acceleration: Option<f64>,
    idle_event: usize,
    duration_sec: f64,
}

impl IdleRow {
    fn new(sample: &ConditionedSample, idle_event: usize, duration_sec: f64) -> Self {
        Self {
            timestamp: sample.timestamp,
            speed: sample.speed_interpolated,
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed_smooth: sample.speed_smooth,
            dt: sample.dt,
            speed_mps: sample.speed_mps,
            acceleration: sample.acceleration,
            idle_event,
            duration_sec,
        }
    }
}

/// CSV table written for each rule.
pub fn table_file(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Overspeed => OVERSPEED_FILE,
        EventKind::HarshBraking => HARSH_BRAKING_FILE,
        EventKind::Idle => IDLE_FILE,
    }
}

/// Write the three event tables and `summary.json` into `out_dir`,
/// creating it if needed. Returns the files written.
pub fn write_report(out_dir: impl AsRef<Path>, analysis: &TripAnalysis) -> Result<Vec<PathBuf>> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(EventKind::ALL.len() + 1);
    for kind in EventKind::ALL {
        let path = out_dir.join(table_file(kind));
        let file = File::create(&path)?;
        match kind {
            EventKind::Overspeed => write_sample_rows(file, &analysis.overspeed)?,
            EventKind::HarshBraking => write_sample_rows(file, &analysis.harsh_braking)?,
            EventKind::Idle => write_idle_rows(file, &analysis.idle)?,
        }
        debug!("{}: {} events -> {}", kind, analysis.count(kind), path.display());
        written.push(path);
    }

    let summary_path = out_dir.join(SUMMARY_FILE);
    write_summary(&summary_path, &analysis.summary())?;
    written.push(summary_path);

    info!("Report written to {}", out_dir.display());
    Ok(written)
}

/// Header is always written, so an empty event set still yields a valid table.
pub fn write_sample_rows<W: Write>(writer: W, rows: &[ConditionedSample]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(SAMPLE_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_idle_rows<W: Write>(writer: W, events: &[IdleEvent]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(
        SAMPLE_HEADER
            .iter()
            .copied()
            .chain(["idle_event", "duration_sec"]),
    )?;
    for (n, event) in events.iter().enumerate() {
        for sample in &event.samples {
            writer.serialize(IdleRow::new(sample, n + 1, event.duration_sec))?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &EventSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}
