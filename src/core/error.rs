//! Error types for scanner sessions
//!
//! This module defines the error type shared by the device client, the
//! event sources and the persisters. The session loop never lets these
//! escape: it classifies them instead (see [`crate::core::session`]).

use thiserror::Error;

/// Main error type for device and persistence operations
#[derive(Error, Debug)]
pub enum ScanError {
    /// General device communication error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// The device did not answer at all
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// The device answered with something we could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The device (or its client) does not offer the requested operation
    #[error("Operation not supported by this device: {0}")]
    Unsupported(String),

    /// The device reported a scan job but delivered no pages
    #[error("Scan job {job} produced no pages")]
    EmptyScan { job: String },

    /// A wait on the device did not complete in time
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// Writing or moving an output artifact failed
    #[error("Failed to store '{path}': {message}")]
    StoreError { path: String, message: String },

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),

    /// Page image could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ScanError>;

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::IoError(err.to_string())
    }
}

impl ScanError {
    /// Build a store error for a path
    pub fn store(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        ScanError::StoreError {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
