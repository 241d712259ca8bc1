use thiserror::Error;

#[derive(Error, Debug)]
pub enum GardenReportError {
    #[error("Invalid activity record {id}: {details}")]
    InvalidRecord { id: String, details: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("Chart synthesis failed: {0}")]
    Chart(String),

    #[error("Narrative insight request failed: {0}")]
    Insight(String),

    #[error("Layout error: {0}")]
    Layout(String),

    #[error("Activity source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "insight-http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GardenReportError>;
