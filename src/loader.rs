use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use log::{debug, warn};

use crate::error::{AnalyzerError, Result};
use crate::types::{Field, Sample};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// Load a telemetry CSV (plain or `.gz`) and return its samples sorted by time.
pub fn load_samples(path: impl AsRef<Path>) -> Result<Vec<Sample>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        read_samples(BufReader::new(GzDecoder::new(file)))
    } else {
        read_samples(BufReader::new(file))
    }
}

struct Columns {
    timestamp: usize,
    speed: usize,
    latitude: Option<usize>,
    longitude: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Ok(Self {
            timestamp: find("timestamp")
                .ok_or_else(|| AnalyzerError::MissingColumn("timestamp".into()))?,
            speed: find("speed").ok_or_else(|| AnalyzerError::MissingColumn("speed".into()))?,
            latitude: find("latitude"),
            longitude: find("longitude"),
        })
    }

    fn field(record: &csv::StringRecord, index: Option<usize>) -> Field {
        index
            .and_then(|i| record.get(i))
            .map_or(Field::Missing, Field::from_raw)
    }
}

/// Parse samples from any CSV source with a header row.
///
/// Rows whose timestamp cannot be parsed are dropped. Numeric columns are
/// kept raw; the conditioner decides what is usable.
pub fn read_samples<R: Read>(reader: R) -> Result<Vec<Sample>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::locate(csv_reader.headers()?)?;

    let mut samples = Vec::new();
    let mut dropped = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        let Some(timestamp) = record.get(columns.timestamp).and_then(parse_timestamp) else {
            dropped += 1;
            continue;
        };
        samples.push(Sample {
            timestamp,
            speed: Columns::field(&record, Some(columns.speed)),
            latitude: Columns::field(&record, columns.latitude),
            longitude: Columns::field(&record, columns.longitude),
        });
    }

    if dropped > 0 {
        warn!("Dropped {} rows with unparseable timestamps", dropped);
    }

    // stable: duplicate timestamps keep file order
    samples.sort_by_key(|s| s.timestamp);
    debug!("Loaded {} samples", samples.len());
    Ok(samples)
}

/// Parse a timestamp cell: RFC 3339, common naive layouts (taken as UTC),
/// a bare date, or Unix epoch seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }

    let secs = raw.parse::<f64>().ok().filter(|s| s.is_finite())?;
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
