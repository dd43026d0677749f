//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while driving the external encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The encoder binary could not be started.
    #[error("Failed to launch encoder at {path}: {source}")]
    LaunchFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The encoding attributes describe nothing to encode.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    /// A line required at a strict checkpoint was missing.
    #[error("Unexpected encoder output: {line}")]
    UnexpectedOutputFormat { line: String },

    /// The encoder finished without a recognizable success summary.
    #[error("Encoding failed: {line}")]
    EncodingFailure {
        line: String,
        exit_code: Option<i32>,
    },

    /// The encoder rejected the input file.
    #[error("Unsupported input {path}: {reason}")]
    InputFormat { path: PathBuf, reason: String },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on the process streams.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The invocation was cancelled by the caller.
    #[error("Encoding cancelled")]
    Cancelled,
}

impl EncoderError {
    /// Creates a new invalid configuration error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Creates a new unexpected output error carrying the offending line.
    pub fn unexpected_output(line: impl Into<String>) -> Self {
        Self::UnexpectedOutputFormat { line: line.into() }
    }

    /// Creates a new encoding failure carrying the last diagnostic line.
    pub fn encoding_failed(line: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self::EncodingFailure {
            line: line.into(),
            exit_code,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LaunchFailure { .. } => "launch_failure",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::UnexpectedOutputFormat { .. } => "unexpected_output",
            Self::EncodingFailure { .. } => "encoding_failure",
            Self::InputFormat { .. } => "input_format",
            Self::OutputDirectoryFailed { .. } => "output_directory",
            Self::Io(_) => "io",
            Self::Cancelled => "cancelled",
        }
    }
}
