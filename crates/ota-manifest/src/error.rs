//! Error types for manifest construction and persistence.

use std::io;

use thiserror::Error;

/// Errors from building, serializing, or writing a manifest
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("invalid device name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid md5 digest '{0}': expected 32 hexadecimal characters")]
    InvalidMd5(String),

    #[error("invalid OTA path '{path}': {reason}")]
    InvalidOtaPath { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ManifestError {
    /// True for errors caused by bad caller input rather than the environment
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ManifestError::EmptyField { .. }
                | ManifestError::InvalidName { .. }
                | ManifestError::InvalidMd5(_)
                | ManifestError::InvalidOtaPath { .. }
        )
    }
}
