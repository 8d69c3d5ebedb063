//! hashfs-crypto: the cryptographic core of a HashFS vault
//!
//! Pipeline: passphrase → scrypt → HKDF subkeys → per-write sign/encrypt
//!
//! Key hierarchy:
//! ```text
//! Passphrase (NFC-normalized, trimmed, >= 8 bytes)
//!   └── scrypt(N=2^17, r=8, p=1) → 256-bit master secret
//!         ├── HKDF-SHA256 "signing"    → Ed25519 signing key (sig_key)
//!         │     └── public key → vault id = hex(BLAKE3(pub)[0..16])
//!         └── HKDF-SHA256 "encryption" → AES-256-GCM key (enc_key)
//! ```
//!
//! The scrypt salt embeds [`CRYPTO_VERSION`], so bumping the version yields
//! a disjoint vault namespace for the same passphrase.

pub mod aead;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod sign;

pub use aead::{decrypt, encrypt, SealedBlob};
pub use error::CryptoError;
pub use hash::{hash_bytes, hash_from_hex, hash_hex, Hash};
pub use kdf::{derive_key_set, KdfParams};
pub use keys::KeySet;
pub use sign::{sign_digest, verify_digest};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of an Ed25519 signature
pub const SIG_SIZE: usize = 64;

/// Minimum accepted passphrase length after normalization, in bytes
pub const MIN_PASSPHRASE_BYTES: usize = 8;

/// Crypto-format version tag. Part of the KDF salt and the vault namespace;
/// bumping it forces new vault identities.
pub const CRYPTO_VERSION: &str = "v6";
