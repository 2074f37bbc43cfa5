//! One-shot derivation backends
//!
//! A [`DerivationBackend`] computes `size` bytes of PBKDF2-HMAC-SHA1 output
//! from block 1, with no cursor and no reset. The software backend drives
//! [`Pbkdf2Stream`]; the accelerated backend lives in `keystream-provider`
//! and hands the whole computation to a pooled provider handle. Both accept
//! and reject exactly the same inputs.

use crate::{
    error::DeriveError,
    hash::Sha1Primitive,
    pbkdf2::{Pbkdf2Stream, validate_parameters},
};

/// Something that can compute PBKDF2-HMAC-SHA1 output in one call.
pub trait DerivationBackend: Send + Sync {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Derive `size` bytes from `password` and `salt`.
    ///
    /// # Errors
    ///
    /// - `SaltTooShort`, `InvalidIterationCount`: bad parameters
    /// - `EmptyRequest`: `size` is zero
    /// - `Platform`: the backend's provider failed (never retried)
    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        size: usize,
    ) -> Result<Vec<u8>, DeriveError>;
}

/// Validate a one-shot request the same way for every backend.
pub fn validate_request(salt: &[u8], iterations: u32, size: usize) -> Result<(), DeriveError> {
    validate_parameters(salt, iterations)?;
    if size == 0 {
        return Err(DeriveError::EmptyRequest);
    }
    Ok(())
}

/// Pure Rust backend built on [`Pbkdf2Stream`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareBackend;

impl DerivationBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        size: usize,
    ) -> Result<Vec<u8>, DeriveError> {
        validate_request(salt, iterations, size)?;
        let mut stream = Pbkdf2Stream::<Sha1Primitive>::new(password, salt, iterations)?;
        stream.get_bytes(size)
    }
}
