//! Fuzz target for the PBKDF2 stream cursor
//!
//! Drives a stream with arbitrary read sizes, resets and parameter changes,
//! and checks every byte against a one-shot derivation.
//!
//! # Strategy
//!
//! - Arbitrary passwords (empty, block-sized, longer than a block)
//! - Salts around the minimum length
//! - Read sizes of 0, 1, a digest, and anything in between
//! - Resets and salt/iteration changes at arbitrary points
//!
//! # Invariants
//!
//! - Concatenated reads equal the prefix of a one-shot derivation
//! - Reset returns to the first byte of the stream
//! - A rejected salt or iteration count leaves the stream untouched
//! - Zero-length reads never advance the cursor

#![no_main]

use arbitrary::Arbitrary;
use keystream_crypto::{pbkdf2_hmac_sha1, Pbkdf2Stream, Sha1Primitive, MIN_SALT_LEN};
use libfuzzer_sys::fuzz_target;

/// Keeps each run cheap; the cursor logic is independent of the count
const MAX_ITERATIONS: u32 = 4;

/// Upper bound on total stream output per run
const MAX_OUTPUT: usize = 512;

#[derive(Debug, Clone, Arbitrary)]
struct CursorScenario {
    password: Password,
    salt: Vec<u8>,
    iterations: u8,
    operations: Vec<StreamOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Password {
    Empty,
    Short([u8; 8]),
    Block([u8; 64]),
    Long([u8; 100]),
    Arbitrary(Vec<u8>),
}

impl Password {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Password::Empty => &[],
            Password::Short(b) => b,
            Password::Block(b) => b,
            Password::Long(b) => b,
            Password::Arbitrary(b) => b,
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
enum StreamOperation {
    /// Read this many bytes
    Read { count: u8 },
    /// Restart from block 1
    Reset,
    /// Replace the salt (may be rejected)
    SetSalt { salt: Vec<u8> },
    /// Replace the iteration count (may be rejected)
    SetIterations { iterations: u8 },
}

fn expected(password: &[u8], salt: &[u8], iterations: u32, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len.max(1)];
    pbkdf2_hmac_sha1(password, salt, iterations, &mut out).unwrap();
    out.truncate(len);
    out
}

fuzz_target!(|scenario: CursorScenario| {
    let password = scenario.password.as_bytes();
    let iterations = u32::from(scenario.iterations) % MAX_ITERATIONS;

    // INVARIANT 1: Construction validates salt length and iteration count
    let created = Pbkdf2Stream::<Sha1Primitive>::new(password, &scenario.salt, iterations);
    let mut stream = match created {
        Ok(stream) => stream,
        Err(_) => {
            assert!(scenario.salt.len() < MIN_SALT_LEN || iterations == 0);
            return;
        },
    };

    let mut salt = scenario.salt.clone();
    let mut iterations = iterations;
    let mut produced = Vec::new();

    for op in scenario.operations {
        match op {
            StreamOperation::Read { count } => {
                let count = usize::from(count);
                if produced.len() + count > MAX_OUTPUT {
                    break;
                }

                let before = stream.block_index();
                match stream.get_bytes(count) {
                    Ok(bytes) => {
                        assert_eq!(bytes.len(), count, "reads return exactly what was asked");
                        produced.extend_from_slice(&bytes);
                    },
                    Err(_) => {
                        // INVARIANT 4: Zero-length reads never advance
                        assert_eq!(count, 0, "only empty reads are rejected");
                        assert_eq!(stream.block_index(), before);
                    },
                }

                // INVARIANT 2: Reads concatenate to the one-shot derivation
                let reference = expected(password, &salt, iterations, produced.len());
                assert_eq!(produced, reference, "stream diverged from one-shot derivation");
            },

            StreamOperation::Reset => {
                // INVARIANT 3: Reset restarts the stream
                stream.reset();
                produced.clear();
                assert_eq!(stream.block_index(), 1);
                assert_eq!(stream.buffered(), 0);
            },

            StreamOperation::SetSalt { salt: next } => match stream.set_salt(&next) {
                Ok(()) => {
                    salt = next;
                    produced.clear();
                },
                Err(_) => {
                    // INVARIANT 5: Rejected salt leaves the stream untouched
                    assert!(next.len() < MIN_SALT_LEN);
                    assert_eq!(stream.salt(), salt.as_slice());
                },
            },

            StreamOperation::SetIterations { iterations: next } => {
                let next = u32::from(next) % MAX_ITERATIONS;
                match stream.set_iterations(next) {
                    Ok(()) => {
                        iterations = next;
                        produced.clear();
                    },
                    Err(_) => {
                        assert_eq!(next, 0);
                        assert_eq!(stream.iterations(), iterations);
                    },
                }
            },
        }
    }
});
