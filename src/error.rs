//! Error handling for barn report processing and distribution.
//!
//! Structural problems with the input report abort a run; coercion problems
//! never reach this type (they default to zero), and per-subscriber delivery
//! failures are collected in a report instead of being raised.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BarnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Header marker '{marker}' not found in report: {path}")]
    MissingHeaderMarker { path: PathBuf, marker: String },

    #[error("Required column '{column}' not found in report")]
    MissingColumn { column: String },

    #[error("Missing required input: {message}")]
    MissingInput { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{feature} mode is not implemented")]
    NotImplemented { feature: String },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Interrupted: {reason}")]
    Interrupted { reason: String },
}

impl BarnError {
    /// Create a missing header marker error for the given report path
    pub fn missing_header_marker(path: impl Into<PathBuf>, marker: impl Into<String>) -> Self {
        Self::MissingHeaderMarker {
            path: path.into(),
            marker: marker.into(),
        }
    }

    /// Create a missing column error
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Create a missing input error
    pub fn missing_input(message: impl Into<String>) -> Self {
        Self::MissingInput {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not implemented error
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Create a storage error with context
    pub fn storage(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an interrupted error
    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }

    /// Whether this error means the input report itself is structurally invalid
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MissingHeaderMarker { .. } | Self::MissingColumn { .. } | Self::Csv(_)
        )
    }

    /// Persistent store failures, which the listener treats as fatal
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

pub type Result<T> = std::result::Result<T, BarnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_classification() {
        assert!(BarnError::missing_header_marker("report.csv", "House Code").is_malformed_input());
        assert!(BarnError::missing_column("House Code").is_malformed_input());
        assert!(!BarnError::not_implemented("auto").is_malformed_input());
        assert!(!BarnError::transport("timeout").is_malformed_input());
    }

    #[test]
    fn test_error_messages() {
        let err = BarnError::missing_header_marker("data/report.csv", "House Code");
        assert_eq!(
            err.to_string(),
            "Header marker 'House Code' not found in report: data/report.csv"
        );
        assert_eq!(
            BarnError::not_implemented("auto").to_string(),
            "auto mode is not implemented"
        );
    }
}
