//! Error types for keyed hashing and key stream derivation

use thiserror::Error;

/// Broad classification of every error this workspace can return.
///
/// Configuration errors happen at construction or mutation time, invalid
/// requests and invalid states at call time, platform errors only on the
/// accelerated path. None of them are transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad construction or mutation parameters (salt, iteration count)
    Configuration,
    /// A call-time request that can never be satisfied (zero-length read)
    InvalidRequest,
    /// The caller broke a two-phase protocol (rekeying mid-message)
    InvalidState,
    /// The native provider failed or ran out of resources
    Platform,
}

/// Errors from unkeyed hash primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HashError {
    /// The output buffer is not exactly one digest long
    #[error("output buffer is {actual} bytes, digest is {expected}")]
    OutputLength {
        /// Digest size of the primitive
        expected: usize,
        /// Length of the buffer that was supplied
        actual: usize,
    },
}

impl HashError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutputLength { .. } => ErrorKind::InvalidRequest,
        }
    }
}

/// Errors from the HMAC engine
#[derive(Debug, Error)]
pub enum HmacError {
    /// The key cannot change while a message is being hashed
    #[error("cannot change HMAC key while a message is in progress")]
    KeyChangeInProgress,

    /// The OS random source could not produce key material
    #[error("random source unavailable: {reason}")]
    RandomUnavailable {
        /// Error reported by the OS RNG
        reason: String,
    },

    /// The MAC output buffer has the wrong length
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl HmacError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyChangeInProgress => ErrorKind::InvalidState,
            Self::RandomUnavailable { .. } => ErrorKind::Platform,
            Self::Hash(e) => e.kind(),
        }
    }
}

/// Errors from PBKDF2 stream derivation and derivation backends
#[derive(Debug, Error)]
pub enum DeriveError {
    /// Salt is shorter than the minimum length
    #[error("salt too short: need at least {minimum} bytes, got {actual}")]
    SaltTooShort {
        /// Minimum accepted salt length
        minimum: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Iteration count must be positive
    #[error("iteration count must be positive")]
    InvalidIterationCount,

    /// Zero bytes were requested
    #[error("requested byte count must be positive")]
    EmptyRequest,

    /// The 32-bit block counter has no blocks left
    #[error("key stream exhausted after block {last_block}")]
    StreamExhausted {
        /// Last block index that was produced
        last_block: u32,
    },

    /// The OS random source could not produce a salt
    #[error("random source unavailable: {reason}")]
    RandomUnavailable {
        /// Error reported by the OS RNG
        reason: String,
    },

    /// The native provider failed
    #[error("platform provider failed during {operation}: {reason}")]
    Platform {
        /// Provider operation that failed
        operation: &'static str,
        /// Error reported by the provider
        reason: String,
    },
}

impl DeriveError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SaltTooShort { .. } | Self::InvalidIterationCount => ErrorKind::Configuration,
            Self::EmptyRequest | Self::StreamExhausted { .. } => ErrorKind::InvalidRequest,
            Self::RandomUnavailable { .. } | Self::Platform { .. } => ErrorKind::Platform,
        }
    }
}
