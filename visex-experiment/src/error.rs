//! Error types for experiment setup and data logging

use std::fmt;
use std::path::PathBuf;

/// Main error type for experiment operations
#[derive(Debug)]
pub enum ExperimentError {
    /// A stimulus folder is missing or unreadable
    StimulusDirectory {
        /// Path that was expected to hold stimuli
        path: PathBuf,
        /// Description of the problem
        reason: String,
    },

    /// A stimulus folder exists but holds no usable images
    EmptyStimulusSet {
        /// The offending folder
        path: PathBuf,
    },

    /// Configuration parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Configuration file could not be parsed
    ConfigParse {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// Failure writing a trial row to the data file
    DataWrite {
        /// Path to the data file
        path: PathBuf,
        /// Underlying CSV error
        source: csv::Error,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StimulusDirectory { path, reason } => {
                write!(f, "Invalid stimulus directory '{}': {reason}", path.display())
            }
            Self::EmptyStimulusSet { path } => {
                write!(f, "No stimulus images found in '{}'", path.display())
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::ConfigParse { path, source } => {
                write!(f, "Failed to parse config '{}': {source}", path.display())
            }
            Self::DataWrite { path, source } => {
                write!(f, "Failed to write data to '{}': {source}", path.display())
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for ExperimentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigParse { source, .. } => Some(source),
            Self::DataWrite { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for experiment results
pub type Result<T> = std::result::Result<T, ExperimentError>;

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> ExperimentError {
    ExperimentError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
