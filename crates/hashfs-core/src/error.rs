//! The public error taxonomy of the vault engine.
//!
//! Every failure crossing the engine boundary is one of these kinds, with
//! filename/version context where it exists. No foreign error types leak;
//! crypto and store failures are mapped into their vault-level kinds.

use hashfs_crypto::CryptoError;
use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Operation attempted before a successful `init`
    #[error("not authenticated: unlock the vault first")]
    Unauthenticated,

    /// Passphrase shorter than the accepted minimum
    #[error("passphrase too short: {actual} bytes (minimum {min})")]
    PassphraseTooShort { min: usize, actual: usize },

    /// Filename not present in the metadata index
    #[error("file not found: {name}")]
    NotFound { name: String },

    /// Requested version not retained in the (possibly pruned) chain
    #[error("version {version} of '{name}' is not retained")]
    VersionNotFound { name: String, version: u64 },

    /// The file's entire history is unrecoverable
    #[error("file corrupt beyond recovery: {name}")]
    FileCorrupt { name: String },

    /// A specific historical version failed its integrity checks
    #[error("version {version} of '{name}' is corrupt")]
    VersionCorrupt { name: String, version: u64 },

    /// A chain blob or chain-level hash/signature failed verification
    #[error("chain corrupt: {reason}")]
    ChainCorrupt {
        reason: String,
        /// Offending version number, when one is identifiable
        version: Option<u64>,
    },

    /// Recomputed plaintext hash does not match the recorded version hash
    #[error("content hash mismatch for '{name}' version {version}")]
    HashMismatch { name: String, version: u64 },

    /// Recorded signature does not verify under the vault public key
    #[error("signature invalid for '{name}' version {version}")]
    SignatureInvalid { name: String, version: u64 },

    /// AEAD authentication failure (tag mismatch, truncated blob)
    #[error("decryption failed")]
    DecryptFailure,

    /// scrypt/HKDF failure surfaced from the primitives
    #[error("key derivation failed: {0}")]
    KdfFailure(String),

    /// Rename target already exists
    #[error("rename target already exists: {name}")]
    RenameConflict { name: String },

    /// Rename with an empty name or a missing source
    #[error("invalid rename: {reason}")]
    RenameInvalid { reason: String },

    /// The backing store aborted; the vault is unchanged and the caller may
    /// retry
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A problem found (and reported) by integrity-check
    #[error("integrity issue: {0}")]
    IntegrityIssue(String),
}

impl From<CryptoError> for VaultError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::PassphraseTooShort { min, actual } => {
                VaultError::PassphraseTooShort { min, actual }
            }
            CryptoError::Kdf(msg) => VaultError::KdfFailure(msg),
            CryptoError::DecryptFailed | CryptoError::TruncatedBlob { .. } => {
                VaultError::DecryptFailure
            }
            // AES-GCM encrypt only fails on pathological input lengths; the
            // write aborts with no state change, so retry semantics apply.
            CryptoError::EncryptFailed => {
                VaultError::StoreUnavailable("encryption primitive failed".into())
            }
            CryptoError::InvalidDigest(d) => VaultError::ChainCorrupt {
                reason: format!("unparseable digest: {d}"),
                version: None,
            },
        }
    }
}
