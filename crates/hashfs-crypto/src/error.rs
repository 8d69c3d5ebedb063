//! Cryptographic error types.

use thiserror::Error;

/// Failures surfaced by the crypto primitives.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Passphrase shorter than the accepted minimum after normalization
    #[error("passphrase too short: {actual} bytes (minimum {min})")]
    PassphraseTooShort {
        /// Required minimum in bytes
        min: usize,
        /// Observed length in bytes
        actual: usize,
    },

    /// scrypt or HKDF rejected its inputs or failed to produce output
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// AEAD encryption failed
    #[error("encryption failed")]
    EncryptFailed,

    /// AEAD decryption failed (tag mismatch or corrupted ciphertext)
    #[error("decryption failed: authentication failure")]
    DecryptFailed,

    /// Sealed blob shorter than nonce + tag
    #[error("sealed blob too short: {len} bytes (minimum {min})")]
    TruncatedBlob {
        /// Observed length
        len: usize,
        /// Required minimum
        min: usize,
    },

    /// A hex digest string failed to parse
    #[error("invalid BLAKE3 digest: {0}")]
    InvalidDigest(String),
}
