use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A spec entry that cannot be used as configured.
    #[error("invalid configuration for spec '{spec}': {message}")]
    Configuration { spec: String, message: String },

    #[error("failed to load configuration file {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    #[error("failed to fetch schema from {location}: {message}")]
    Fetch { location: String, message: String },

    #[error("failed to parse schema from {location}: {message}")]
    Parse { location: String, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("service generation failed for spec '{spec}': {message}")]
    Generation { spec: String, message: String },

    #[error("dev server error: {0}")]
    Server(String),

    /// A background task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

impl Error {
    pub(crate) fn configuration(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Configuration {
            spec: spec.into(),
            message: message.into(),
        }
    }

    pub(crate) fn generation(spec: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Generation {
            spec: spec.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}
