//! Process-wide selection with an injected old platform
//!
//! Kept in its own test binary: the global provider is chosen once per
//! process, so installing it must happen before anything calls `global()`.

use std::sync::Arc;

use keystream_crypto::DerivationBackend;
use keystream_provider::{
    AcceleratedPlatform, FixedProbe, PlatformVersion, PoolingPolicy, ProviderError,
    ProviderSelector, global, install_global,
};

#[test]
fn injected_selection_is_used_and_never_replaced() {
    let old = PlatformVersion::new(6, 1);
    let platform = Arc::new(AcceleratedPlatform::with_version(old));
    let provider = ProviderSelector::select(&FixedProbe(old), Arc::clone(&platform)).unwrap();
    install_global(provider).unwrap();

    let selected = global().unwrap();
    assert_eq!(selected.policy(), PoolingPolicy::AlwaysCreate);
    assert_eq!(selected.version(), old);

    let out = selected.derive(b"password", b"saltsalt", 2, 20).unwrap();
    assert_eq!(out.len(), 20);
    assert_eq!(platform.opened(), 1);
    assert_eq!(platform.closed(), 1);

    let again = ProviderSelector::select(&FixedProbe(old), Arc::clone(&platform)).unwrap();
    assert!(matches!(install_global(again), Err(ProviderError::AlreadyInstalled)));
    assert!(std::ptr::eq(selected, global().unwrap()));
}
