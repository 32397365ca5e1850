//! Error types for the recovery scoring pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Recording contains no samples")]
    EmptyRecording,

    #[error("Insufficient data: need {required} samples, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Timestamps must be strictly increasing (violated at sample {index})")]
    NonMonotonicTimestamp { index: usize },

    #[error("No stable orientation detected: vertical acceleration never reached {target}")]
    NoStableOrientation { target: f64 },

    #[error("No attempt to stand was detected")]
    NoAttemptDetected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
