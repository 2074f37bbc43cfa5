//! Unkeyed hash primitives driven block by block
//!
//! [`crate::HmacEngine`] and [`crate::Pbkdf2Stream`] never call a hash
//! function directly. They drive a [`HashPrimitive`], which only exposes
//! reset, absorb and finalize. Any RustCrypto hasher can be plugged in
//! through [`DigestPrimitive`].

use digest::{Digest, FixedOutputReset, Output, core_api::BlockSizeUser};
use sha1::Sha1;

use crate::error::HashError;

/// An incremental, fixed-width hash function.
pub trait HashPrimitive: Default + Send {
    /// Internal block size in bytes (64 for SHA-1).
    fn block_size(&self) -> usize;

    /// Digest size in bytes (20 for SHA-1).
    fn digest_size(&self) -> usize;

    /// Return to the empty state, discarding anything absorbed so far.
    fn reset(&mut self);

    /// Absorb `data`.
    fn transform_block(&mut self, data: &[u8]);

    /// Write the digest of everything absorbed into `out` and reset.
    ///
    /// # Errors
    ///
    /// - `OutputLength`: `out` is not exactly [`digest_size`](Self::digest_size)
    ///   bytes. Nothing is written and the absorbed state is kept.
    fn transform_final(&mut self, out: &mut [u8]) -> Result<(), HashError>;
}

/// [`HashPrimitive`] over a RustCrypto [`Digest`].
#[derive(Default, Clone)]
pub struct DigestPrimitive<D> {
    inner: D,
}

/// The SHA-1 primitive used by HMAC-SHA1 and PBKDF2-HMAC-SHA1.
pub type Sha1Primitive = DigestPrimitive<Sha1>;

impl<D> HashPrimitive for DigestPrimitive<D>
where
    D: Digest + FixedOutputReset + BlockSizeUser + Default + Send,
{
    fn block_size(&self) -> usize {
        <D as BlockSizeUser>::block_size()
    }

    fn digest_size(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn reset(&mut self) {
        Digest::reset(&mut self.inner);
    }

    fn transform_block(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn transform_final(&mut self, out: &mut [u8]) -> Result<(), HashError> {
        let expected = <D as Digest>::output_size();
        if out.len() != expected {
            return Err(HashError::OutputLength { expected, actual: out.len() });
        }
        Digest::finalize_into_reset(&mut self.inner, Output::<D>::from_mut_slice(out));
        Ok(())
    }
}
