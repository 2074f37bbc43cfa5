//! Fuzz target for incremental HMAC
//!
//! # Invariants
//!
//! - Any split of the message gives the same MAC as one-shot `compute`
//! - The engine is reusable after finalize
//! - Key changes are refused while a message is in progress

#![no_main]

use arbitrary::Arbitrary;
use keystream_crypto::{HmacEngine, HmacError};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct HmacScenario {
    key: Vec<u8>,
    message: Vec<u8>,
    /// Split points, taken modulo the remaining message length
    splits: Vec<u8>,
}

fuzz_target!(|scenario: HmacScenario| {
    let mut engine: HmacEngine = HmacEngine::new(&scenario.key);
    let one_shot = engine.compute(&scenario.message);
    assert_eq!(one_shot.len(), engine.digest_size());

    let mut rest = scenario.message.as_slice();
    for split in scenario.splits {
        if rest.is_empty() {
            break;
        }
        let at = usize::from(split) % (rest.len() + 1);
        let (head, tail) = rest.split_at(at);
        engine.transform_block(head);
        rest = tail;

        // INVARIANT 3: no key change mid-message
        if engine.is_hashing() {
            assert!(matches!(engine.set_key(b"other"), Err(HmacError::KeyChangeInProgress)));
        }
    }
    engine.transform_block(rest);

    // INVARIANT 1: split MAC equals one-shot MAC
    assert_eq!(engine.finalize(), one_shot, "split input changed the MAC");

    // INVARIANT 2: reusable after finalize
    assert!(!engine.is_hashing());
    assert_eq!(engine.compute(&scenario.message), one_shot);
});
