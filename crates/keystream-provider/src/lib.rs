//! Keystream provider pooling and selection.
//!
//! The accelerated derivation path: instead of driving HMAC block by block,
//! a derivation borrows an opened provider handle from a [`ResourcePool`],
//! runs the platform's one-call PBKDF2 on it, and gives it back.
//!
//! # Components
//!
//! - [`ResourcePool`]: generic pool with `Reuse`, `AlwaysCreate` and
//!   `SingleInstance` policies, plus scoped [`PoolLease`]s
//! - [`NativePlatform`]: the provider seam (open, close, derive)
//! - [`AcceleratedPlatform`]: in-process platform on RustCrypto `pbkdf2`
//! - [`ProviderSelector`]: capability probe → pooling policy, once
//! - [`Provider`]: the pooled backend, a [`keystream_crypto::DerivationBackend`]
//!
//! Platform failures are returned to the caller as fatal errors. Nothing
//! here falls back to the software backend on its own.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
pub mod platform;
pub mod pool;
mod selector;

pub use error::ProviderError;
pub use platform::{
    AcceleratedPlatform, AcceleratedProvider, CapabilityProbe, FixedProbe, NativePlatform,
    PlatformVersion, ProviderFlags, ProviderHandle,
};
pub use pool::{PoolLease, PoolingPolicy, ResourcePool};
pub use selector::{Provider, ProviderSelector, global, install_global};
