//! Error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure reading or writing a setup file
#[derive(Debug, Error)]
pub enum SetupFileError {
    #[error("couldn't access setup file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("setup data is truncated or unreadable: {0}")]
    Malformed(#[from] io::Error),

    #[error("setup holds {count} platforms, at most {max} are allowed")]
    TooManyPlatforms { count: u32, max: usize },

    #[error("platform {index} is invalid: {reason}")]
    InvalidPlatform { index: usize, reason: String },
}

/// Failure loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("couldn't access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}
