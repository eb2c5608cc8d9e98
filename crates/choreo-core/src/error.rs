//! Core error types for choreo-core.
//!
//! Pattern and configuration errors are construction-time and fatal: they are
//! raised before any run starts. Operation errors describe the external
//! analysis call and are recovered by the [`Choreographer`](crate::Choreographer).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for choreo-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timing pattern rejected before a run could start
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternConfigError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The external analysis call failed
    #[error("Operation failed: {0}")]
    Operation(#[from] OperationError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// An attempt is already in flight
    #[error("An audit is already in progress")]
    Busy,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Timing pattern errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternConfigError {
    /// Catalog has no patterns to choose from
    #[error("Pattern catalog is empty")]
    EmptyCatalog,

    /// Speed table length does not match the segment count
    #[error("Pattern '{name}' has {actual} speed multipliers, expected {expected}")]
    SpeedTableLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// Speed multiplier is zero, negative or not finite
    #[error("Pattern '{name}' has invalid speed multiplier {value} at segment {index}")]
    InvalidSpeed {
        name: String,
        index: usize,
        value: f64,
    },

    /// Pause point outside `[0, total_segments)`
    #[error("Pattern '{name}' pauses at segment {segment}, but only {total_segments} segments exist")]
    PauseOutOfRange {
        name: String,
        segment: usize,
        total_segments: usize,
    },

    /// Pause points must be strictly ascending
    #[error("Pattern '{name}' pause points are not strictly ascending")]
    PauseOrder { name: String },

    /// Fewer pause durations than pause points
    #[error("Pattern '{name}' declares {points} pause points but only {durations} pause durations")]
    MissingPauseDurations {
        name: String,
        points: usize,
        durations: usize,
    },

    /// A pause duration of zero
    #[error("Pattern '{name}' has a zero pause duration at position {index}")]
    ZeroPauseDuration { name: String, index: usize },

    /// Ignoring pauses, the curve never reaches 100 within the nominal run
    #[error("Pattern '{name}' only reaches {reached:.2}% after {total_steps} ticks")]
    Unreachable {
        name: String,
        reached: f64,
        total_steps: u64,
    },
}

/// External analysis call failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Request could not be sent or the response could not be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server rejected the request
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Response body was not valid JSON
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The invoice document is required
    #[error("Please select an invoice to upload.")]
    MissingInvoice,

    /// Document type not accepted by the analysis service
    #[error("Unsupported document type for {}: expected one of .pdf, .jpg, .jpeg, .png", path.display())]
    UnsupportedDocument { path: PathBuf },

    /// Document could not be found on disk
    #[error("Document not found: {}", path.display())]
    DocumentNotFound { path: PathBuf },
}

/// Session collaborator errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No signed-in user
    #[error("Not signed in")]
    NotSignedIn,
}

impl From<reqwest::Error> for OperationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            OperationError::MalformedResponse(err.to_string())
        } else {
            OperationError::Transport(err.to_string())
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
