//! BLAKE3 content hashing
//!
//! Every stored payload is addressed by the BLAKE3 hash of its plaintext,
//! rendered as 64 lowercase hex chars. Chain-level hashes reuse the same
//! digest type over a domain-separated input.

use crate::error::CryptoError;

/// A BLAKE3 digest (32 bytes), displayed as 64 hex chars
pub type Hash = blake3::Hash;

/// Hash a byte slice in memory.
pub fn hash_bytes(data: &[u8]) -> Hash {
    blake3::hash(data)
}

/// Hash a byte slice and render the digest as lowercase hex.
pub fn hash_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Parse a 64-char hex string back into a digest.
pub fn hash_from_hex(hex: &str) -> Result<Hash, CryptoError> {
    blake3::Hash::from_hex(hex).map_err(|_| CryptoError::InvalidDigest(hex.to_string()))
}
