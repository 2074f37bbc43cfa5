//! PBKDF2 as an incrementally consumable key stream
//!
//! [`Pbkdf2Stream`] yields the PBKDF2 output `T1 || T2 || ...` where
//!
//! ```text
//! U1 = HMAC(password, salt || BE32(i))
//! Uj = HMAC(password, U(j-1))              j = 2..=iterations
//! Ti = U1 ^ U2 ^ ... ^ U(iterations)
//! ```
//!
//! Reads may have any length. The unread tail of the last computed block is
//! kept in a digest-sized buffer and served before the next block is
//! computed, so a sequence of reads always concatenates to one contiguous
//! read of the same total length.

use std::fmt;

use zeroize::Zeroize;

use crate::{
    error::DeriveError,
    hash::{HashPrimitive, Sha1Primitive},
    hmac::HmacEngine,
};

/// Shortest salt a stream accepts
pub const MIN_SALT_LEN: usize = 8;

/// Iteration count used when the caller has no stronger requirement
pub const DEFAULT_ITERATIONS: u32 = 1000;

/// Check stream construction parameters.
///
/// # Errors
///
/// - `SaltTooShort`: fewer than [`MIN_SALT_LEN`] bytes of salt
/// - `InvalidIterationCount`: zero iterations
pub fn validate_parameters(salt: &[u8], iterations: u32) -> Result<(), DeriveError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(DeriveError::SaltTooShort { minimum: MIN_SALT_LEN, actual: salt.len() });
    }
    if iterations == 0 {
        return Err(DeriveError::InvalidIterationCount);
    }
    Ok(())
}

/// Fill `out` with PBKDF2 output starting at block 1.
///
/// This is the bare RFC 8018 function: unlike [`Pbkdf2Stream`] it places no
/// lower bound on the salt length.
///
/// # Errors
///
/// - `InvalidIterationCount`: zero iterations
/// - `EmptyRequest`: `out` is empty
/// - `StreamExhausted`: `out` needs more than `u32::MAX` blocks
pub fn pbkdf2_hmac<H: HashPrimitive>(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out: &mut [u8],
) -> Result<(), DeriveError> {
    if iterations == 0 {
        return Err(DeriveError::InvalidIterationCount);
    }
    if out.is_empty() {
        return Err(DeriveError::EmptyRequest);
    }

    let mut hmac = HmacEngine::<H>::new(password);
    let digest_size = hmac.digest_size();
    let mut block = vec![0u8; digest_size];
    let mut round = vec![0u8; digest_size];

    for (n, chunk) in out.chunks_mut(digest_size).enumerate() {
        let index = u32::try_from(n + 1)
            .map_err(|_| DeriveError::StreamExhausted { last_block: u32::MAX })?;
        compute_block(&mut hmac, salt, iterations, index, &mut block, &mut round);
        chunk.copy_from_slice(&block[..chunk.len()]);
    }

    block.zeroize();
    Ok(())
}

/// PBKDF2-HMAC-SHA1 into `out`, see [`pbkdf2_hmac`].
pub fn pbkdf2_hmac_sha1(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out: &mut [u8],
) -> Result<(), DeriveError> {
    pbkdf2_hmac::<Sha1Primitive>(password, salt, iterations, out)
}

/// Compute block `index` into `block`, using `round` as scratch for `Uj`.
fn compute_block<H: HashPrimitive>(
    hmac: &mut HmacEngine<H>,
    salt: &[u8],
    iterations: u32,
    index: u32,
    block: &mut [u8],
    round: &mut [u8],
) {
    hmac.initialize();
    hmac.transform_block(salt);
    hmac.transform_block(&index.to_be_bytes());
    hmac.finish(round);
    block.copy_from_slice(round);

    for _ in 1..iterations {
        hmac.transform_block(round);
        hmac.finish(round);
        for (acc, u) in block.iter_mut().zip(round.iter()) {
            *acc ^= u;
        }
    }

    round.zeroize();
}

/// A PBKDF2 session producing one unbounded output stream.
///
/// Successive [`get_bytes`](Self::get_bytes) calls continue the same stream;
/// they are not independent derivations. [`reset`](Self::reset) (or changing
/// the salt or iteration count) restarts it from block 1.
///
/// # Security
///
/// - The password lives only inside the owned [`HmacEngine`]
/// - Salt, leftover buffer and round scratch are zeroized on drop and reset
/// - Not meant to be shared between threads; one session, one owner
pub struct Pbkdf2Stream<H: HashPrimitive = Sha1Primitive> {
    hmac: HmacEngine<H>,
    salt: Vec<u8>,
    iterations: u32,
    /// Index of the next block to compute; `u32::MAX + 1` once exhausted
    block: u64,
    /// Last computed block; `buffer[start..end]` is not yet returned
    buffer: Vec<u8>,
    /// Scratch for `Uj` while computing a block
    round: Vec<u8>,
    start: usize,
    end: usize,
}

impl<H: HashPrimitive> Pbkdf2Stream<H> {
    /// Start a stream for `password` and `salt`.
    ///
    /// # Errors
    ///
    /// - `SaltTooShort`: fewer than [`MIN_SALT_LEN`] bytes of salt
    /// - `InvalidIterationCount`: zero iterations
    pub fn new(password: &[u8], salt: &[u8], iterations: u32) -> Result<Self, DeriveError> {
        validate_parameters(salt, iterations)?;

        let hmac = HmacEngine::new(password);
        let digest_size = hmac.digest_size();

        Ok(Self {
            hmac,
            salt: salt.to_vec(),
            iterations,
            block: 1,
            buffer: vec![0u8; digest_size],
            round: vec![0u8; digest_size],
            start: 0,
            end: 0,
        })
    }

    /// Start a stream with `salt_len` bytes of fresh OS randomness as salt.
    ///
    /// Read the generated salt back with [`salt`](Self::salt); it is needed to
    /// reproduce the stream.
    pub fn with_random_salt(
        password: &[u8],
        salt_len: usize,
        iterations: u32,
    ) -> Result<Self, DeriveError> {
        let mut salt = vec![0u8; salt_len];
        validate_parameters(&salt, iterations)?;
        getrandom::fill(&mut salt)
            .map_err(|e| DeriveError::RandomUnavailable { reason: e.to_string() })?;

        let stream = Self::new(password, &salt, iterations);
        salt.zeroize();
        stream
    }

    /// Salt in use.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Replace the salt and restart the stream.
    pub fn set_salt(&mut self, salt: &[u8]) -> Result<(), DeriveError> {
        validate_parameters(salt, self.iterations)?;
        self.salt.zeroize();
        self.salt = salt.to_vec();
        self.reset();
        Ok(())
    }

    /// Iteration count in use.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Replace the iteration count and restart the stream.
    pub fn set_iterations(&mut self, iterations: u32) -> Result<(), DeriveError> {
        validate_parameters(&self.salt, iterations)?;
        self.iterations = iterations;
        self.reset();
        Ok(())
    }

    /// Index of the next block that will be computed.
    pub fn block_index(&self) -> u64 {
        self.block
    }

    /// Number of already computed bytes waiting to be read.
    pub fn buffered(&self) -> usize {
        self.end - self.start
    }

    /// Restart the stream at block 1, keeping password, salt and iterations.
    pub fn reset(&mut self) {
        self.buffer.as_mut_slice().zeroize();
        self.block = 1;
        self.start = 0;
        self.end = 0;
        self.hmac.initialize();
        tracing::debug!(iterations = self.iterations, "key stream reset");
    }

    /// Read the next `count` bytes of the stream.
    ///
    /// # Errors
    ///
    /// - `EmptyRequest`: `count` is zero
    /// - `StreamExhausted`: the stream ran past block `u32::MAX`
    pub fn get_bytes(&mut self, count: usize) -> Result<Vec<u8>, DeriveError> {
        let mut out = vec![0u8; count];
        if let Err(e) = self.fill(&mut out) {
            out.zeroize();
            return Err(e);
        }
        Ok(out)
    }

    /// Fill `out` with the next `out.len()` bytes of the stream.
    ///
    /// Leftover bytes from the previous read are served first. Whenever the
    /// leftover runs dry a new block is computed and its unread tail becomes
    /// the new leftover.
    ///
    /// A read that would run past block `u32::MAX` fails before consuming
    /// anything, so the leftover stays available to a shorter read.
    pub fn fill(&mut self, out: &mut [u8]) -> Result<(), DeriveError> {
        if out.is_empty() {
            return Err(DeriveError::EmptyRequest);
        }
        if out.len() as u64 > self.remaining() {
            return Err(DeriveError::StreamExhausted { last_block: u32::MAX });
        }

        let mut written = 0;
        while written < out.len() {
            if self.start == self.end {
                self.next_block()?;
            }

            let take = (self.end - self.start).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.buffer[self.start..self.start + take]);
            self.start += take;
            written += take;
        }

        Ok(())
    }

    /// Bytes left before the block counter runs out.
    fn remaining(&self) -> u64 {
        let blocks = (u64::from(u32::MAX) + 1).saturating_sub(self.block);
        blocks.saturating_mul(self.buffer.len() as u64).saturating_add(self.buffered() as u64)
    }

    fn next_block(&mut self) -> Result<(), DeriveError> {
        let index = u32::try_from(self.block)
            .map_err(|_| DeriveError::StreamExhausted { last_block: u32::MAX })?;

        compute_block(
            &mut self.hmac,
            &self.salt,
            self.iterations,
            index,
            &mut self.buffer,
            &mut self.round,
        );

        self.block += 1;
        self.start = 0;
        self.end = self.buffer.len();
        Ok(())
    }
}

impl<H: HashPrimitive> fmt::Debug for Pbkdf2Stream<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pbkdf2Stream")
            .field("salt_len", &self.salt.len())
            .field("iterations", &self.iterations)
            .field("block", &self.block)
            .field("buffered", &self.buffered())
            .finish_non_exhaustive()
    }
}

impl<H: HashPrimitive> Drop for Pbkdf2Stream<H> {
    fn drop(&mut self) {
        self.salt.zeroize();
        self.buffer.zeroize();
        self.round.zeroize();
    }
}
