use thiserror::Error;

/// Failures at the I/O edge of the analyzer. Signal conditioning and event
/// detection never fail; they degrade to missing values or empty results.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
