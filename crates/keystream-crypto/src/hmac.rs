//! HMAC built from two instances of an unkeyed hash primitive
//!
//! `hash1` absorbs the inner pad and the message, `hash2` absorbs the outer
//! pad and the inner digest. The inner pad is fed lazily on the first
//! [`HmacEngine::transform_block`] of each message, so one engine can MAC any
//! number of messages under the same key.
//!
//! # Security
//!
//! - The key, both pads and the inner digest are zeroized on drop
//! - Rekeying is refused while a message is in progress

use std::fmt;

use zeroize::Zeroize;

use crate::{
    error::{HashError, HmacError},
    hash::{HashPrimitive, Sha1Primitive},
};

/// Byte XORed into the key for the inner pad
const IPAD: u8 = 0x36;

/// Byte XORed into the key for the outer pad
const OPAD: u8 = 0x5C;

/// Keyed MAC over a [`HashPrimitive`], HMAC-SHA1 by default.
pub struct HmacEngine<H: HashPrimitive = Sha1Primitive> {
    /// Effective key: the caller's key, or its digest if longer than a block
    key: Vec<u8>,
    /// `key XOR 0x36`, zero padded to the block size
    inner_pad: Vec<u8>,
    /// `key XOR 0x5C`, zero padded to the block size
    outer_pad: Vec<u8>,
    /// Scratch for the inner digest between the two passes
    inner_digest: Vec<u8>,
    /// Inner pass: inner pad, then message
    hash1: H,
    /// Outer pass: outer pad, then inner digest
    hash2: H,
    /// Whether the inner pad has been absorbed for the current message
    hashing: bool,
}

impl<H: HashPrimitive> HmacEngine<H> {
    /// Create an engine keyed with `key`.
    ///
    /// Keys longer than the primitive's block size are hashed down to the
    /// digest size first.
    pub fn new(key: &[u8]) -> Self {
        let hash1 = H::default();
        let hash2 = H::default();
        let block_size = hash1.block_size();
        let digest_size = hash1.digest_size();

        let mut engine = Self {
            key: Vec::new(),
            inner_pad: vec![0u8; block_size],
            outer_pad: vec![0u8; block_size],
            inner_digest: vec![0u8; digest_size],
            hash1,
            hash2,
            hashing: false,
        };
        engine.install_key(key);
        engine
    }

    /// Create an engine keyed with one block of OS randomness.
    pub fn with_random_key() -> Result<Self, HmacError> {
        let mut key = vec![0u8; H::default().block_size()];
        getrandom::fill(&mut key)
            .map_err(|e| HmacError::RandomUnavailable { reason: e.to_string() })?;

        let engine = Self::new(&key);
        key.zeroize();
        Ok(engine)
    }

    /// Block size of the underlying primitive.
    pub fn block_size(&self) -> usize {
        self.inner_pad.len()
    }

    /// MAC length in bytes.
    pub fn digest_size(&self) -> usize {
        self.inner_digest.len()
    }

    /// Effective key after any pre-hashing.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Whether a message has been started and not yet finalized.
    pub fn is_hashing(&self) -> bool {
        self.hashing
    }

    /// Replace the key.
    ///
    /// # Errors
    ///
    /// - `KeyChangeInProgress`: a message has been started with
    ///   [`transform_block`](Self::transform_block) and not finalized
    pub fn set_key(&mut self, key: &[u8]) -> Result<(), HmacError> {
        if self.hashing {
            return Err(HmacError::KeyChangeInProgress);
        }
        self.install_key(key);
        Ok(())
    }

    /// Drop any partial message and return both primitives to empty state.
    pub fn initialize(&mut self) {
        self.hash1.reset();
        self.hash2.reset();
        self.hashing = false;
    }

    /// Absorb message bytes.
    pub fn transform_block(&mut self, data: &[u8]) {
        self.begin_message();
        self.hash1.transform_block(data);
    }

    /// Finish the current message and write its MAC into `out`.
    ///
    /// The engine is ready for the next message under the same key afterwards.
    ///
    /// # Errors
    ///
    /// - `Hash(OutputLength)`: `out` is not exactly
    ///   [`digest_size`](Self::digest_size) bytes. The message in progress is
    ///   left as it was.
    pub fn finalize_into(&mut self, out: &mut [u8]) -> Result<(), HmacError> {
        let expected = self.digest_size();
        if out.len() != expected {
            return Err(HashError::OutputLength { expected, actual: out.len() }.into());
        }
        self.finish(out);
        Ok(())
    }

    /// Finish the current message and return its MAC.
    pub fn finalize(&mut self) -> Vec<u8> {
        let mut mac = vec![0u8; self.digest_size()];
        self.finish(&mut mac);
        mac
    }

    /// MAC of `data` as a single message.
    pub fn compute(&mut self, data: &[u8]) -> Vec<u8> {
        self.transform_block(data);
        self.finalize()
    }

    /// Finalize into `out`, which the caller has sized to one digest.
    pub(crate) fn finish(&mut self, out: &mut [u8]) {
        self.begin_message();
        let Ok(()) = self.hash1.transform_final(&mut self.inner_digest) else {
            unreachable!("inner digest buffer is sized from the primitive");
        };

        self.hash2.transform_block(&self.outer_pad);
        self.hash2.transform_block(&self.inner_digest);
        let Ok(()) = self.hash2.transform_final(out) else {
            unreachable!("MAC output must be exactly one digest");
        };

        self.inner_digest.as_mut_slice().zeroize();
        self.hashing = false;
    }

    fn begin_message(&mut self) {
        if !self.hashing {
            self.hash1.transform_block(&self.inner_pad);
            self.hashing = true;
        }
    }

    fn install_key(&mut self, key: &[u8]) {
        self.key.zeroize();

        if key.len() > self.block_size() {
            let mut hashed = vec![0u8; self.digest_size()];
            self.hash1.reset();
            self.hash1.transform_block(key);
            let Ok(()) = self.hash1.transform_final(&mut hashed) else {
                unreachable!("hashed key buffer is sized from the primitive");
            };
            self.key = hashed;
        } else {
            self.key = key.to_vec();
        }

        self.inner_pad.fill(IPAD);
        self.outer_pad.fill(OPAD);
        for (i, byte) in self.key.iter().enumerate() {
            self.inner_pad[i] ^= byte;
            self.outer_pad[i] ^= byte;
        }
    }
}

impl<H: HashPrimitive> fmt::Debug for HmacEngine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacEngine")
            .field("key", &"<redacted>")
            .field("block_size", &self.block_size())
            .field("digest_size", &self.digest_size())
            .field("hashing", &self.hashing)
            .finish()
    }
}

impl<H: HashPrimitive> Drop for HmacEngine<H> {
    fn drop(&mut self) {
        self.hash1.reset();
        self.hash2.reset();
        self.key.zeroize();
        self.inner_pad.zeroize();
        self.outer_pad.zeroize();
        self.inner_digest.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac_hex(key: &[u8], data: &[u8]) -> String {
        let mut hmac = HmacEngine::<Sha1Primitive>::new(key);
        hex::encode(hmac.compute(data))
    }

    // RFC 2202, test cases 1, 2, 3
    #[test]
    fn rfc2202_short_keys() {
        assert_eq!(mac_hex(&[0x0b; 20], b"Hi There"), "b617318655057264e28bc0b6fb378c8ef146be00");
        assert_eq!(
            mac_hex(b"Jefe", b"what do ya want for nothing?"),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
        assert_eq!(mac_hex(&[0xaa; 20], &[0xdd; 50]), "125d7342b9ac11cd91a39af48aa17b4f63f175d3");
    }

    // RFC 2202, test case 6
    #[test]
    fn rfc2202_key_longer_than_block() {
        assert_eq!(
            mac_hex(&[0xaa; 80], b"Test Using Larger Than Block-Size Key - Hash Key First"),
            "aa4ae5e15272d00e95705637ce8a3b55ed402112"
        );
    }

    #[test]
    fn long_key_is_prehashed_to_digest_size() {
        let hmac = HmacEngine::<Sha1Primitive>::new(&[0xaa; 80]);
        assert_eq!(hmac.key().len(), 20);

        let hmac = HmacEngine::<Sha1Primitive>::new(&[0xaa; 64]);
        assert_eq!(hmac.key().len(), 64, "a key of exactly one block is used as is");
    }

    #[test]
    fn empty_message_is_outer_hash_of_inner_pad_hash() {
        let key = b"Jefe";
        let mut hmac = HmacEngine::<Sha1Primitive>::new(key);
        let mac = hmac.finalize();

        let mut ipad = [IPAD; 64];
        let mut opad = [OPAD; 64];
        for (i, byte) in key.iter().enumerate() {
            ipad[i] ^= byte;
            opad[i] ^= byte;
        }

        let mut hash = Sha1Primitive::default();
        let mut inner = [0u8; 20];
        hash.transform_block(&ipad);
        hash.transform_final(&mut inner).unwrap();

        let mut expected = [0u8; 20];
        hash.transform_block(&opad);
        hash.transform_block(&inner);
        hash.transform_final(&mut expected).unwrap();

        assert_eq!(mac, expected);
        assert_eq!(hex::encode(&mac), "09d9e59d72239e62a8155c583d52743de9b7231a");
    }

    #[test]
    fn empty_key_and_message() {
        assert_eq!(mac_hex(b"", b""), "fbdb1d1b18aa6c08324b7d64b71fb76370690e1d");
    }

    #[test]
    fn split_message_matches_single_message() {
        let mut split = HmacEngine::<Sha1Primitive>::new(b"Jefe");
        split.transform_block(b"what do ya ");
        split.transform_block(b"want for nothing?");

        assert_eq!(hex::encode(split.finalize()), "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn engine_is_reusable_after_finalize() {
        let mut hmac = HmacEngine::<Sha1Primitive>::new(b"Jefe");
        let first = hmac.compute(b"what do ya want for nothing?");
        let second = hmac.compute(b"what do ya want for nothing?");
        assert_eq!(first, second);
    }

    #[test]
    fn initialize_discards_partial_message() {
        let mut hmac = HmacEngine::<Sha1Primitive>::new(b"Jefe");
        hmac.transform_block(b"noise");
        hmac.initialize();
        hmac.initialize();

        assert!(!hmac.is_hashing());
        assert_eq!(
            hex::encode(hmac.compute(b"what do ya want for nothing?")),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn finalize_into_checks_output_length() {
        let mut hmac = HmacEngine::<Sha1Primitive>::new(b"Jefe");
        hmac.transform_block(b"what do ya ");

        let mut long = [0u8; 32];
        let result = hmac.finalize_into(&mut long);
        assert!(matches!(
            result,
            Err(HmacError::Hash(HashError::OutputLength { expected: 20, actual: 32 }))
        ));
        assert!(hmac.is_hashing(), "rejected finalize keeps the message in progress");

        hmac.transform_block(b"want for nothing?");
        let mut mac = [0u8; 20];
        hmac.finalize_into(&mut mac).unwrap();
        assert_eq!(hex::encode(mac), "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn set_key_rejected_mid_message() {
        let mut hmac = HmacEngine::<Sha1Primitive>::new(b"Jefe");
        hmac.transform_block(b"partial");

        let result = hmac.set_key(b"other");
        assert!(matches!(result, Err(HmacError::KeyChangeInProgress)));
        assert_eq!(hmac.key(), b"Jefe", "rejected rekey must not touch the key");
    }

    #[test]
    fn set_key_allowed_after_finalize() {
        let mut hmac = HmacEngine::<Sha1Primitive>::new(b"other");
        hmac.transform_block(b"partial");
        let _ = hmac.finalize();

        hmac.set_key(b"Jefe").unwrap();
        assert_eq!(
            hex::encode(hmac.compute(b"what do ya want for nothing?")),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn random_keys_differ() {
        let a = HmacEngine::<Sha1Primitive>::with_random_key().unwrap();
        let b = HmacEngine::<Sha1Primitive>::with_random_key().unwrap();

        assert_eq!(a.key().len(), 64);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn debug_redacts_key() {
        let hmac = HmacEngine::<Sha1Primitive>::new(b"secret-key");
        let rendered = format!("{hmac:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
