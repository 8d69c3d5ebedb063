//! Session key set: Ed25519 signing key + AES-256-GCM key, vault identity

use ed25519_dalek::{SigningKey, VerifyingKey};
use zeroize::Zeroize;

use crate::{CRYPTO_VERSION, KEY_SIZE};

/// The derived key material for one unlocked vault session.
///
/// Held in memory only, never persisted. The encryption key is zeroized on
/// drop; the signing key zeroizes itself.
pub struct KeySet {
    signing: SigningKey,
    enc_key: [u8; KEY_SIZE],
}

impl KeySet {
    /// Assemble a key set from derived subkeys. The signing seed is consumed
    /// and wiped.
    pub fn from_parts(mut sig_seed: [u8; KEY_SIZE], enc_key: [u8; KEY_SIZE]) -> Self {
        let signing = SigningKey::from_bytes(&sig_seed);
        sig_seed.zeroize();
        Self { signing, enc_key }
    }

    /// The Ed25519 verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Raw public key bytes.
    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        self.signing.verifying_key().to_bytes()
    }

    /// The AES-256-GCM content encryption key.
    pub fn enc_key(&self) -> &[u8; KEY_SIZE] {
        &self.enc_key
    }

    pub(crate) fn signing(&self) -> &SigningKey {
        &self.signing
    }

    /// Vault identity: first 16 bytes of BLAKE3 of the public key, as hex.
    ///
    /// Distinct passphrases land in distinct namespaces; the id exposes no
    /// key material.
    pub fn vault_id(&self) -> String {
        let digest = blake3::hash(&self.public_bytes());
        hex::encode(&digest.as_bytes()[..16])
    }

    /// Storage namespace for this vault: `<vault_id>-<crypto_version>`.
    pub fn namespace(&self) -> String {
        format!("{}-{}", self.vault_id(), CRYPTO_VERSION)
    }
}

impl Drop for KeySet {
    fn drop(&mut self) {
        self.enc_key.zeroize();
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("vault_id", &self.vault_id())
            .field("keys", &"[REDACTED]")
            .finish()
    }
}
