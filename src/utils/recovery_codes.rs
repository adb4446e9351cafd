//! Generation and hashing of single-use recovery codes.
//!
//! Codes take the form `XXXX-XXXX`: two uppercase hex segments of two
//! random bytes each. Only a SHA-256 digest of the normalized form is
//! ever persisted.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

const SEGMENT_BYTES: usize = 2;
pub const BATCH_SIZE: usize = 8;

pub fn generate_recovery_code() -> String {
    format!("{}-{}", random_segment(), random_segment())
}

pub fn generate_batch() -> Vec<String> {
    (0..BATCH_SIZE).map(|_| generate_recovery_code()).collect()
}

/// Hashes a candidate code after normalization, so user input survives
/// lowercasing and stray whitespace.
pub fn hash_recovery_code(code: &str) -> String {
    let normalized = code.trim().to_uppercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn random_segment() -> String {
    let mut bytes = [0u8; SEGMENT_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}
