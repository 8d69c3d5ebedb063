//! Key derivation: passphrase → scrypt → HKDF-SHA256 subkeys
//!
//! The scrypt salt is a fixed label that embeds the crypto-format version,
//! so the same passphrase under a bumped version derives a disjoint key set
//! (and therefore a disjoint vault namespace).

use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::keys::KeySet;
use crate::{CRYPTO_VERSION, KEY_SIZE, MIN_PASSPHRASE_BYTES};

/// HKDF info string for the signing subkey
const INFO_SIGNING: &[u8] = b"signing";
/// HKDF info string for the encryption subkey
const INFO_ENCRYPTION: &[u8] = b"encryption";

/// scrypt cost parameters.
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// log2 of the scrypt work factor N (default: 17, i.e. N = 2^17)
    pub log_n: u8,
    /// Block size (default: 8)
    pub r: u32,
    /// Parallelism (default: 1)
    pub p: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self { log_n: 17, r: 8, p: 1 }
    }
}

impl KdfParams {
    /// Reduced-cost profile for tests. Far too weak for real vaults.
    pub fn fast_insecure() -> Self {
        Self { log_n: 10, r: 8, p: 1 }
    }
}

/// The versioned scrypt/HKDF salt.
fn kdf_salt() -> Vec<u8> {
    format!("hashfs-kdf-{CRYPTO_VERSION}").into_bytes()
}

/// Derive a session [`KeySet`] from a passphrase.
///
/// The passphrase is NFC-normalized and trimmed of outer whitespace before
/// encoding; anything shorter than [`MIN_PASSPHRASE_BYTES`] after that is
/// rejected with a distinct error.
pub fn derive_key_set(
    passphrase: &SecretString,
    params: &KdfParams,
) -> Result<KeySet, CryptoError> {
    let mut normalized: String = passphrase.expose_secret().nfc().collect();
    let trimmed = normalized.trim();

    let byte_len = trimmed.len();
    if byte_len < MIN_PASSPHRASE_BYTES {
        normalized.zeroize();
        return Err(CryptoError::PassphraseTooShort {
            min: MIN_PASSPHRASE_BYTES,
            actual: byte_len,
        });
    }

    let salt = kdf_salt();
    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, KEY_SIZE)
        .map_err(|e| CryptoError::Kdf(format!("invalid scrypt params: {e}")))?;

    let mut master = [0u8; KEY_SIZE];
    let result = scrypt::scrypt(trimmed.as_bytes(), &salt, &scrypt_params, &mut master);
    normalized.zeroize();
    result.map_err(|e| CryptoError::Kdf(format!("scrypt failed: {e}")))?;

    let hk = Hkdf::<Sha256>::new(Some(&salt), &master);
    master.zeroize();

    let mut sig_seed = [0u8; KEY_SIZE];
    hk.expand(INFO_SIGNING, &mut sig_seed)
        .map_err(|e| CryptoError::Kdf(format!("HKDF expand (signing): {e}")))?;

    let mut enc_key = [0u8; KEY_SIZE];
    if let Err(e) = hk.expand(INFO_ENCRYPTION, &mut enc_key) {
        sig_seed.zeroize();
        return Err(CryptoError::Kdf(format!("HKDF expand (encryption): {e}")));
    }

    Ok(KeySet::from_parts(sig_seed, enc_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn derive(pass: &str) -> Result<KeySet, CryptoError> {
        derive_key_set(&SecretString::from(pass), &KdfParams::fast_insecure())
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = derive("correct horse battery staple").unwrap();
        let b = derive("correct horse battery staple").unwrap();
        assert_eq!(a.public_bytes(), b.public_bytes());
        assert_eq!(a.enc_key(), b.enc_key());
    }

    #[test]
    fn different_passphrases_different_keys() {
        let a = derive("passphrase-aaaa").unwrap();
        let b = derive("passphrase-bbbb").unwrap();
        assert_ne!(a.public_bytes(), b.public_bytes());
        assert_ne!(a.vault_id(), b.vault_id());
    }

    #[test]
    fn short_passphrase_rejected() {
        let err = derive("short").unwrap_err();
        assert!(matches!(err, CryptoError::PassphraseTooShort { actual: 5, .. }));
    }

    #[test]
    fn whitespace_is_trimmed_before_length_check() {
        // 7 meaningful bytes padded with spaces must still be rejected
        let err = derive("   abcdefg   ").unwrap_err();
        assert!(matches!(err, CryptoError::PassphraseTooShort { .. }));
    }

    #[test]
    fn trimmed_variants_derive_the_same_vault() {
        let a = derive("open sesame now").unwrap();
        let b = derive("  open sesame now\n").unwrap();
        assert_eq!(a.vault_id(), b.vault_id());
    }

    #[test]
    fn nfc_normalization_unifies_composed_forms() {
        // U+00E9 vs U+0065 U+0301 — same text after NFC
        let composed = derive("caf\u{00e9} au lait").unwrap();
        let decomposed = derive("cafe\u{0301} au lait").unwrap();
        assert_eq!(composed.vault_id(), decomposed.vault_id());
    }

    #[test]
    fn signing_and_encryption_subkeys_differ() {
        let keys = derive("sufficiently long pass").unwrap();
        assert_ne!(&keys.public_bytes(), keys.enc_key());
    }
}
