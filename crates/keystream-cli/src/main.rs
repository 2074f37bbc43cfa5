//! Keystream derivation binary.
//!
//! # Usage
//!
//! ```bash
//! # 32 bytes from a known salt, software backend
//! keystream --password secret --salt 73616c7473616c74 --length 32
//!
//! # Fresh 16-byte salt, pulled from the stream 7 bytes at a time
//! keystream --password secret --random-salt 16 --length 40 --chunk 7
//!
//! # One-call derivation on the pooled accelerated provider
//! keystream --password secret --salt 73616c7473616c74 --backend accelerated
//! ```

use std::io::{self, Write};

use clap::{Parser, ValueEnum};
use keystream_crypto::{
    DEFAULT_ITERATIONS, DerivationBackend, DeriveError, Pbkdf2Stream, Sha1Primitive,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use zeroize::Zeroizing;

/// Derivation backend to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Incremental HMAC-SHA1 stream
    Software,
    /// Pooled platform provider, selected once per process
    Accelerated,
}

/// PBKDF2-HMAC-SHA1 key stream
#[derive(Parser, Debug)]
#[command(name = "keystream")]
#[command(about = "Derive key bytes with PBKDF2-HMAC-SHA1")]
#[command(version)]
struct Args {
    /// Password to derive from
    #[arg(short, long)]
    password: String,

    /// Salt as hex (at least 8 bytes)
    #[arg(short, long, conflicts_with = "random_salt", required_unless_present = "random_salt")]
    salt: Option<String>,

    /// Generate a random salt of this many bytes and print it
    #[arg(long, value_name = "LEN")]
    random_salt: Option<usize>,

    /// PBKDF2 iteration count
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: u32,

    /// Number of bytes to derive
    #[arg(short, long, default_value = "20")]
    length: usize,

    /// Pull the stream in reads of this many bytes (software backend only)
    #[arg(long)]
    chunk: Option<usize>,

    /// Derivation backend
    #[arg(short, long, value_enum, default_value_t = Backend::Software)]
    backend: Backend,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = Args::parse();
    let password = take_password(&mut args);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let (salt, generated) = match (args.salt.as_deref(), args.random_salt) {
        (Some(hex_salt), _) => (hex::decode(hex_salt)?, false),
        (None, Some(len)) => {
            let mut salt = vec![0u8; len];
            getrandom::fill(&mut salt)
                .map_err(|e| DeriveError::RandomUnavailable { reason: e.to_string() })?;
            (salt, true)
        },
        (None, None) => return Err("either --salt or --random-salt is required".into()),
    };

    tracing::info!(
        backend = ?args.backend,
        salt_len = salt.len(),
        iterations = args.iterations,
        length = args.length,
        "deriving"
    );

    let key = derive(&args, password.as_bytes(), &salt)?;
    let encoded = Zeroizing::new(hex::encode(key.as_slice()));

    let mut out = io::stdout().lock();
    if generated {
        writeln!(out, "salt: {}", hex::encode(&salt))?;
    }
    writeln!(out, "{}", encoded.as_str())?;

    Ok(())
}

/// Move the password out of the parsed arguments into a zeroizing buffer.
fn take_password(args: &mut Args) -> Zeroizing<String> {
    Zeroizing::new(std::mem::take(&mut args.password))
}

fn derive(
    args: &Args,
    password: &[u8],
    salt: &[u8],
) -> Result<Zeroizing<Vec<u8>>, Box<dyn std::error::Error>> {
    match args.backend {
        Backend::Software => {
            let mut stream = Pbkdf2Stream::<Sha1Primitive>::new(password, salt, args.iterations)?;
            let chunk = args.chunk.unwrap_or(args.length);
            if args.length == 0 || chunk == 0 {
                return Err(DeriveError::EmptyRequest.into());
            }

            let mut key = Zeroizing::new(vec![0u8; args.length]);
            let mut written = 0;
            while written < args.length {
                let take = chunk.min(args.length - written);
                stream.fill(&mut key[written..written + take])?;
                written += take;
                tracing::debug!(
                    read = take,
                    buffered = stream.buffered(),
                    next_block = stream.block_index(),
                    "stream read"
                );
            }
            Ok(key)
        },
        Backend::Accelerated => {
            if args.chunk.is_some() {
                tracing::warn!("--chunk is ignored by the accelerated backend");
            }
            let provider = keystream_provider::global()?;
            Ok(Zeroizing::new(provider.derive(password, salt, args.iterations, args.length)?))
        },
    }
}
