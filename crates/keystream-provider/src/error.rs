//! Provider error types

use keystream_crypto::{DeriveError, ErrorKind};
use thiserror::Error;

/// Errors from native providers and provider selection
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A provider call failed. Never retried, never masked by a fallback.
    #[error("{operation} failed on {platform}: {reason}")]
    Platform {
        /// Name of the platform that failed
        platform: &'static str,
        /// Provider operation that failed (open, derive, ...)
        operation: &'static str,
        /// Error reported by the platform
        reason: String,
    },

    /// The process-wide provider has already been selected
    #[error("process-wide provider already selected")]
    AlreadyInstalled,
}

impl ProviderError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Platform { .. } => ErrorKind::Platform,
            Self::AlreadyInstalled => ErrorKind::InvalidState,
        }
    }
}

impl From<ProviderError> for DeriveError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Platform { operation, reason, .. } => {
                DeriveError::Platform { operation, reason }
            },
            ProviderError::AlreadyInstalled => DeriveError::Platform {
                operation: "select",
                reason: ProviderError::AlreadyInstalled.to_string(),
            },
        }
    }
}
