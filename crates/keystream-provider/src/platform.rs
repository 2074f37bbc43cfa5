//! Native provider platforms and their handles
//!
//! A [`NativePlatform`] opens provider handles and runs a complete PBKDF2
//! derivation in one call on such a handle. Handles are owned by
//! [`ProviderHandle`], which closes the raw handle exactly once when dropped.
//!
//! [`AcceleratedPlatform`] is the in-process platform: its one-call
//! derivation is the RustCrypto `pbkdf2` implementation.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
};

use sha1::Sha1;

use crate::error::ProviderError;

/// Capability version reported by a platform, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl PlatformVersion {
    /// First version whose provider handles may be reused across hash
    /// operations. Anything older gets a fresh handle per derivation.
    pub const REUSABLE_HASH_MIN: Self = Self::new(6, 2);

    /// Build a version.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Whether handles opened with the reusable-hash flag are safe here.
    pub fn supports_reusable_hash(self) -> bool {
        self >= Self::REUSABLE_HASH_MIN
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Reports the platform's capability version.
pub trait CapabilityProbe {
    /// Version to compare against [`PlatformVersion::REUSABLE_HASH_MIN`].
    fn platform_version(&self) -> PlatformVersion;
}

/// Probe that always reports the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedProbe(pub PlatformVersion);

impl CapabilityProbe for FixedProbe {
    fn platform_version(&self) -> PlatformVersion {
        self.0
    }
}

/// Flags requested when opening a provider handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderFlags {
    /// Open the hash provider in HMAC mode
    pub hmac: bool,
    /// Allow the handle to be reused across hash operations
    pub reusable_hash: bool,
}

impl ProviderFlags {
    /// HMAC provider that must not be reused.
    pub const HMAC: Self = Self { hmac: true, reusable_hash: false };

    /// HMAC provider that may be reused.
    pub const HMAC_REUSABLE: Self = Self { hmac: true, reusable_hash: true };
}

/// A platform offering one-call PBKDF2-HMAC-SHA1 on opened provider handles.
pub trait NativePlatform: Send + Sync + 'static {
    /// Raw handle type returned by [`open_provider`](Self::open_provider).
    type Raw: Send + Sync + 'static;

    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Open a SHA-1 provider handle.
    fn open_provider(&self, flags: ProviderFlags) -> Result<Self::Raw, ProviderError>;

    /// Close a handle opened by this platform. Called exactly once per handle.
    fn close_provider(&self, raw: &Self::Raw);

    /// Fill `out` with PBKDF2 output from block 1.
    fn derive_pbkdf2(
        &self,
        raw: &Self::Raw,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> Result<(), ProviderError>;
}

/// An open provider handle, closed when dropped.
pub struct ProviderHandle<P: NativePlatform> {
    platform: Arc<P>,
    raw: P::Raw,
    flags: ProviderFlags,
}

impl<P: NativePlatform> ProviderHandle<P> {
    /// Open a handle on `platform`.
    pub fn open(platform: &Arc<P>, flags: ProviderFlags) -> Result<Self, ProviderError> {
        let raw = platform.open_provider(flags)?;
        tracing::trace!(platform = platform.name(), ?flags, "provider handle opened");
        Ok(Self { platform: Arc::clone(platform), raw, flags })
    }

    /// Flags the handle was opened with.
    pub fn flags(&self) -> ProviderFlags {
        self.flags
    }

    /// Raw platform handle.
    pub fn raw(&self) -> &P::Raw {
        &self.raw
    }

    /// Run the platform's one-call derivation on this handle.
    pub fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> Result<(), ProviderError> {
        self.platform.derive_pbkdf2(&self.raw, password, salt, iterations, out)
    }
}

impl<P: NativePlatform> Drop for ProviderHandle<P> {
    fn drop(&mut self) {
        self.platform.close_provider(&self.raw);
        tracing::trace!(platform = self.platform.name(), "provider handle closed");
    }
}

/// Raw handle of an [`AcceleratedPlatform`].
#[derive(Debug)]
pub struct AcceleratedProvider {
    id: u64,
    flags: ProviderFlags,
}

impl AcceleratedProvider {
    /// Unique id assigned at open time.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// In-process platform backed by the RustCrypto `pbkdf2` crate.
///
/// The derivation is reentrant, so by default the platform reports
/// [`PlatformVersion::REUSABLE_HASH_MIN`]. Open and close calls are counted.
#[derive(Debug)]
pub struct AcceleratedPlatform {
    version: PlatformVersion,
    next_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl AcceleratedPlatform {
    /// Platform reporting `version` to capability probes.
    pub fn with_version(version: PlatformVersion) -> Self {
        Self {
            version,
            next_id: AtomicU64::new(1),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        }
    }

    /// Handles opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handles closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for AcceleratedPlatform {
    fn default() -> Self {
        Self::with_version(PlatformVersion::REUSABLE_HASH_MIN)
    }
}

impl CapabilityProbe for AcceleratedPlatform {
    fn platform_version(&self) -> PlatformVersion {
        self.version
    }
}

impl NativePlatform for AcceleratedPlatform {
    type Raw = AcceleratedProvider;

    fn name(&self) -> &'static str {
        "accelerated"
    }

    fn open_provider(&self, flags: ProviderFlags) -> Result<Self::Raw, ProviderError> {
        if flags.reusable_hash && !self.version.supports_reusable_hash() {
            return Err(ProviderError::Platform {
                platform: self.name(),
                operation: "open",
                reason: format!("reusable hash handles need {}", PlatformVersion::REUSABLE_HASH_MIN),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(AcceleratedProvider { id, flags })
    }

    fn close_provider(&self, _raw: &Self::Raw) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    fn derive_pbkdf2(
        &self,
        raw: &Self::Raw,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        out: &mut [u8],
    ) -> Result<(), ProviderError> {
        if !raw.flags.hmac {
            return Err(ProviderError::Platform {
                platform: self.name(),
                operation: "derive",
                reason: format!("provider {} was not opened in HMAC mode", raw.id),
            });
        }

        pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, iterations, out);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        assert!(!PlatformVersion::new(6, 1).supports_reusable_hash());
        assert!(!PlatformVersion::new(5, 9).supports_reusable_hash());
        assert!(PlatformVersion::new(6, 2).supports_reusable_hash());
        assert!(PlatformVersion::new(6, 3).supports_reusable_hash());
        assert!(PlatformVersion::new(10, 0).supports_reusable_hash());
    }

    #[test]
    fn version_display() {
        assert_eq!(PlatformVersion::new(6, 2).to_string(), "6.2");
    }

    #[test]
    fn handle_closed_exactly_once_on_drop() {
        let platform = Arc::new(AcceleratedPlatform::default());

        let handle = ProviderHandle::open(&platform, ProviderFlags::HMAC_REUSABLE).unwrap();
        assert_eq!(platform.opened(), 1);
        assert_eq!(platform.closed(), 0);
        assert!(handle.flags().reusable_hash);

        drop(handle);
        assert_eq!(platform.closed(), 1);
    }

    #[test]
    fn handles_get_distinct_ids() {
        let platform = Arc::new(AcceleratedPlatform::default());
        let a = ProviderHandle::open(&platform, ProviderFlags::HMAC).unwrap();
        let b = ProviderHandle::open(&platform, ProviderFlags::HMAC).unwrap();
        assert_ne!(a.raw().id(), b.raw().id());
    }

    #[test]
    fn old_platform_refuses_reusable_flag() {
        let platform = Arc::new(AcceleratedPlatform::with_version(PlatformVersion::new(6, 1)));
        let result = ProviderHandle::open(&platform, ProviderFlags::HMAC_REUSABLE);
        assert!(matches!(result, Err(ProviderError::Platform { operation: "open", .. })));
        assert_eq!(platform.opened(), 0);
    }

    #[test]
    fn derive_requires_hmac_mode() {
        let platform = Arc::new(AcceleratedPlatform::default());
        let handle = ProviderHandle::open(&platform, ProviderFlags::default()).unwrap();

        let mut out = [0u8; 20];
        let result = handle.derive(b"password", b"saltsalt", 1, &mut out);
        assert!(matches!(result, Err(ProviderError::Platform { operation: "derive", .. })));
    }

    #[test]
    fn derive_known_answer() {
        let platform = Arc::new(AcceleratedPlatform::default());
        let handle = ProviderHandle::open(&platform, ProviderFlags::HMAC).unwrap();

        let mut out = [0u8; 20];
        handle.derive(b"password", b"salt", 1, &mut out).unwrap();
        assert_eq!(hex::encode(out), "0c60c80f961f0e71f3a9b524af6012062fe037a6");
    }
}
