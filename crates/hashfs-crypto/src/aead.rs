//! AES-256-GCM payload sealing
//!
//! Sealed blob format (binary):
//! ```text
//! [12 bytes: random IV][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! A fresh IV is drawn from the OS CSPRNG for every call; IVs are never
//! reused under a key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::error::CryptoError;
use crate::{IV_SIZE, KEY_SIZE, TAG_SIZE};

/// An encrypted payload: random IV plus ciphertext (tag included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
}

impl SealedBlob {
    /// Serialize as `[iv][ciphertext]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IV_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse `[iv][ciphertext]`, rejecting anything shorter than IV + tag.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() < IV_SIZE + TAG_SIZE {
            return Err(CryptoError::TruncatedBlob {
                len: data.len(),
                min: IV_SIZE + TAG_SIZE,
            });
        }
        let (iv_bytes, ciphertext) = data.split_at(IV_SIZE);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(iv_bytes);
        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt a payload under the vault encryption key with a fresh random IV.
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<SealedBlob, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());

    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptFailed)?;

    Ok(SealedBlob { iv, ciphertext })
}

/// Decrypt a sealed payload. Fails on tag mismatch.
pub fn decrypt(key: &[u8; KEY_SIZE], blob: &SealedBlob) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Nonce::from_slice(&blob.iv);
    cipher
        .decrypt(nonce, blob.ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptFailed)
}
