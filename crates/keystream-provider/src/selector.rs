//! One-time provider selection and the pooled accelerated backend
//!
//! [`ProviderSelector::select`] probes the platform once and binds a
//! [`ResourcePool`] of [`ProviderHandle`]s:
//!
//! - Below [`PlatformVersion::REUSABLE_HASH_MIN`], handles are not safe to
//!   reuse, so the pool is `AlwaysCreate` and handles are opened without the
//!   reusable-hash flag. Each derivation opens and closes its own handle.
//! - Otherwise the pool is `Reuse` and handles carry the reusable-hash flag.
//!
//! [`global`] caches that decision for the whole process. It is made on first
//! use and never re-probed. [`install_global`] injects a different decision
//! (for example a simulated old platform) before that first use.

use std::{fmt, sync::Arc};

use keystream_crypto::{DerivationBackend, DeriveError, validate_request};
use once_cell::sync::OnceCell;
use zeroize::Zeroize;

use crate::{
    error::ProviderError,
    platform::{
        AcceleratedPlatform, CapabilityProbe, NativePlatform, PlatformVersion, ProviderFlags,
        ProviderHandle,
    },
    pool::{PoolingPolicy, ResourcePool},
};

/// Process-wide accelerated provider
static GLOBAL: OnceCell<Provider<AcceleratedPlatform>> = OnceCell::new();

/// Chooses a pooling policy and handle flags from a capability probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderSelector;

impl ProviderSelector {
    /// Pooling policy and open flags appropriate for `version`.
    pub fn policy_for(version: PlatformVersion) -> (PoolingPolicy, ProviderFlags) {
        if version.supports_reusable_hash() {
            (PoolingPolicy::Reuse, ProviderFlags::HMAC_REUSABLE)
        } else {
            (PoolingPolicy::AlwaysCreate, ProviderFlags::HMAC)
        }
    }

    /// Probe once and bind a handle pool on `platform`.
    pub fn select<P: NativePlatform>(
        probe: &dyn CapabilityProbe,
        platform: Arc<P>,
    ) -> Result<Provider<P>, ProviderError> {
        let version = probe.platform_version();
        let (policy, flags) = Self::policy_for(version);

        tracing::info!(
            platform = platform.name(),
            %version,
            ?policy,
            reusable_hash = flags.reusable_hash,
            "provider selected"
        );

        let generator_platform = Arc::clone(&platform);
        let pool =
            ResourcePool::new(policy, move || ProviderHandle::open(&generator_platform, flags))?;

        Ok(Provider { platform, pool, version, flags })
    }
}

/// Accelerated derivation backend over a pool of provider handles.
pub struct Provider<P: NativePlatform> {
    platform: Arc<P>,
    pool: ResourcePool<ProviderHandle<P>, ProviderError>,
    version: PlatformVersion,
    flags: ProviderFlags,
}

impl<P: NativePlatform> Provider<P> {
    /// Platform this provider derives on.
    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    /// Version reported by the probe at selection time.
    pub fn version(&self) -> PlatformVersion {
        self.version
    }

    /// Pooling policy chosen at selection time.
    pub fn policy(&self) -> PoolingPolicy {
        self.pool.policy()
    }

    /// Flags every pooled handle is opened with.
    pub fn flags(&self) -> ProviderFlags {
        self.flags
    }

    /// Handle pool.
    pub fn pool(&self) -> &ResourcePool<ProviderHandle<P>, ProviderError> {
        &self.pool
    }
}

impl<P: NativePlatform> DerivationBackend for Provider<P> {
    fn name(&self) -> &'static str {
        self.platform.name()
    }

    fn derive(
        &self,
        password: &[u8],
        salt: &[u8],
        iterations: u32,
        size: usize,
    ) -> Result<Vec<u8>, DeriveError> {
        validate_request(salt, iterations, size)?;

        let handle = self.pool.lease()?;
        let mut out = vec![0u8; size];
        if let Err(e) = handle.derive(password, salt, iterations, &mut out) {
            out.zeroize();
            tracing::error!(platform = self.platform.name(), error = %e, "native derivation failed");
            return Err(e.into());
        }

        Ok(out)
    }
}

impl<P: NativePlatform> fmt::Debug for Provider<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("platform", &self.platform.name())
            .field("version", &self.version)
            .field("flags", &self.flags)
            .field("pool", &self.pool)
            .finish()
    }
}

/// The process-wide accelerated provider.
///
/// Selected on first call from [`AcceleratedPlatform::default`] and its own
/// capability report, unless [`install_global`] ran first. Later calls return
/// the cached provider without probing again.
pub fn global() -> Result<&'static Provider<AcceleratedPlatform>, ProviderError> {
    GLOBAL.get_or_try_init(|| {
        let platform = Arc::new(AcceleratedPlatform::default());
        ProviderSelector::select(platform.as_ref(), Arc::clone(&platform))
    })
}

/// Install the process-wide provider before its first use.
///
/// # Errors
///
/// - `AlreadyInstalled`: [`global`] or `install_global` already ran
pub fn install_global(provider: Provider<AcceleratedPlatform>) -> Result<(), ProviderError> {
    GLOBAL.set(provider).map_err(|_| ProviderError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use keystream_crypto::{ErrorKind, SoftwareBackend};

    use super::*;
    use crate::platform::FixedProbe;

    #[test]
    fn old_platform_gets_always_create_without_reuse_flag() {
        let (policy, flags) = ProviderSelector::policy_for(PlatformVersion::new(6, 1));
        assert_eq!(policy, PoolingPolicy::AlwaysCreate);
        assert!(flags.hmac);
        assert!(!flags.reusable_hash);
    }

    #[test]
    fn new_platform_gets_reuse_with_reuse_flag() {
        let (policy, flags) = ProviderSelector::policy_for(PlatformVersion::new(6, 2));
        assert_eq!(policy, PoolingPolicy::Reuse);
        assert!(flags.reusable_hash);
    }

    #[test]
    fn selection_does_not_open_handles_eagerly() {
        let platform = Arc::new(AcceleratedPlatform::default());
        let provider = ProviderSelector::select(platform.as_ref(), Arc::clone(&platform)).unwrap();

        assert_eq!(provider.policy(), PoolingPolicy::Reuse);
        assert_eq!(platform.opened(), 0);
    }

    #[test]
    fn reuse_provider_keeps_one_handle_for_sequential_calls() {
        let platform = Arc::new(AcceleratedPlatform::default());
        let provider = ProviderSelector::select(platform.as_ref(), Arc::clone(&platform)).unwrap();

        for _ in 0..5 {
            let _ = provider.derive(b"password", b"saltsalt", 2, 32).unwrap();
        }

        assert_eq!(platform.opened(), 1);
        assert_eq!(platform.closed(), 0);
        assert_eq!(provider.pool().idle(), 1);
    }

    #[test]
    fn always_create_provider_closes_every_handle() {
        let platform = Arc::new(AcceleratedPlatform::with_version(PlatformVersion::new(6, 1)));
        let probe = FixedProbe(PlatformVersion::new(6, 1));
        let provider = ProviderSelector::select(&probe, Arc::clone(&platform)).unwrap();
        assert_eq!(provider.policy(), PoolingPolicy::AlwaysCreate);

        for _ in 0..3 {
            let _ = provider.derive(b"password", b"saltsalt", 2, 32).unwrap();
        }

        assert_eq!(platform.opened(), 3);
        assert_eq!(platform.closed(), 3);
    }

    #[test]
    fn provider_matches_software_backend() {
        let platform = Arc::new(AcceleratedPlatform::default());
        let provider = ProviderSelector::select(platform.as_ref(), Arc::clone(&platform)).unwrap();

        let salt = b"saltSALTsaltSALTsaltSALTsaltSALTsalt";
        let native = provider.derive(b"passwordPASSWORDpassword", salt, 4096, 25).unwrap();
        let software = SoftwareBackend.derive(b"passwordPASSWORDpassword", salt, 4096, 25).unwrap();

        assert_eq!(native, software);
        assert_eq!(hex::encode(native), "3d2eec4fe41c849b80c8d83662c0e44a8b291a964cf2f07038");
    }

    #[test]
    fn provider_validates_like_software_backend() {
        let platform = Arc::new(AcceleratedPlatform::default());
        let provider = ProviderSelector::select(platform.as_ref(), Arc::clone(&platform)).unwrap();

        let short_salt = provider.derive(b"password", b"salt", 1, 20).unwrap_err();
        assert_eq!(short_salt.kind(), ErrorKind::Configuration);

        let empty = provider.derive(b"password", b"saltsalt", 1, 0).unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::InvalidRequest);

        assert_eq!(platform.opened(), 0, "invalid requests never touch the pool");
    }

    #[test]
    fn global_is_selected_once() {
        let first = global().unwrap();
        let second = global().unwrap();
        assert!(std::ptr::eq(first, second));

        let platform = Arc::new(AcceleratedPlatform::default());
        let late = ProviderSelector::select(platform.as_ref(), Arc::clone(&platform)).unwrap();
        assert!(matches!(install_global(late), Err(ProviderError::AlreadyInstalled)));
    }
}
