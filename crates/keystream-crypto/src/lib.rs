//! Keystream Cryptographic Primitives
//!
//! Password-based key streams: HMAC over a pluggable unkeyed hash, and
//! PBKDF2 exposed as a stream that can be read in chunks of any size.
//!
//! # Layering
//!
//! ```text
//! HashPrimitive (SHA-1)
//!        │  two instances
//!        ▼
//! HmacEngine  (inner pad + data, outer pad + inner digest)
//!        │  once per round
//!        ▼
//! Pbkdf2Stream (block counter, XOR of rounds, leftover cursor)
//!        │
//!        ▼
//! DerivationBackend (one-shot; software here, pooled provider elsewhere)
//! ```
//!
//! # Security
//!
//! - Every buffer holding password, key, pad, salt or round material is
//!   zeroized when its owner is dropped
//! - Errors are raised synchronously and are deterministic functions of the
//!   inputs; nothing here is retried

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backend;
pub mod error;
pub mod hash;
pub mod hmac;
pub mod pbkdf2;

pub use backend::{DerivationBackend, SoftwareBackend, validate_request};
pub use error::{DeriveError, ErrorKind, HashError, HmacError};
pub use hash::{DigestPrimitive, HashPrimitive, Sha1Primitive};
pub use hmac::HmacEngine;
pub use pbkdf2::{
    DEFAULT_ITERATIONS, MIN_SALT_LEN, Pbkdf2Stream, pbkdf2_hmac, pbkdf2_hmac_sha1,
    validate_parameters,
};
