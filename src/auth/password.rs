use base64ct::{Base64, Encoding};
use rand::{rngs::OsRng, RngCore};
use tracing::error;

use crate::error::{AppError, AppResult};

pub const SALT_LEN: usize = 32;

const SALT_MIN: u8 = 33;
const SALT_MAX: u8 = 126;
const SALT_SPAN: u8 = SALT_MAX - SALT_MIN + 1;
// Largest multiple of the span that fits in a byte; bytes above it are rejected.
const SALT_ACCEPT_BELOW: u8 = SALT_SPAN * 2;

/// N = 2^15.
const LOG_N: u8 = 15;
const BLOCK_SIZE: u32 = 8;
const PARALLELISM: u32 = 1;
const OUTPUT_LEN: usize = 32;

/// Random printable-ASCII salt drawn from the OS entropy source.
pub fn generate_salt() -> AppResult<String> {
    let mut salt = String::with_capacity(SALT_LEN);
    let mut buf = [0u8; SALT_LEN];
    while salt.len() < SALT_LEN {
        OsRng.try_fill_bytes(&mut buf).map_err(|e| {
            error!(error = %e, "os rng unavailable");
            AppError::RandomSource(e)
        })?;
        for b in buf.iter().copied().filter(|b| *b < SALT_ACCEPT_BELOW) {
            salt.push(char::from(SALT_MIN + b % SALT_SPAN));
            if salt.len() == SALT_LEN {
                break;
            }
        }
    }
    Ok(salt)
}

/// Deterministic memory-hard derivation of `plain` under `salt`, base64 encoded.
pub fn hash(plain: &str, salt: &str) -> AppResult<String> {
    let params = scrypt::Params::new(LOG_N, BLOCK_SIZE, PARALLELISM, OUTPUT_LEN)
        .map_err(|e| AppError::Hash(e.to_string()))?;

    let mut out = [0u8; OUTPUT_LEN];
    scrypt::scrypt(plain.as_bytes(), salt.as_bytes(), &params, &mut out).map_err(|e| {
        error!(error = %e, "scrypt derivation error");
        AppError::Hash(e.to_string())
    })?;
    Ok(Base64::encode_string(&out))
}
