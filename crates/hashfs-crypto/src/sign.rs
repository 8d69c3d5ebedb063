//! Ed25519 signatures over hex digests
//!
//! Content and chain hashes travel as 64-char hex strings; signatures cover
//! the ASCII bytes of that string. Verification is total: any malformed
//! input yields `false`, never an error.

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};

use crate::keys::KeySet;
use crate::SIG_SIZE;

/// Sign a hex digest, returning the signature as hex.
pub fn sign_digest(keys: &KeySet, digest_hex: &str) -> String {
    let sig = keys.signing().sign(digest_hex.as_bytes());
    hex::encode(sig.to_bytes())
}

/// Verify a hex signature over a hex digest. Returns `false` on any parse
/// failure or mismatch.
pub fn verify_digest(public: &VerifyingKey, digest_hex: &str, sig_hex: &str) -> bool {
    let Ok(raw) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(bytes) = <[u8; SIG_SIZE]>::try_from(raw.as_slice()) else {
        return false;
    };
    let sig = Signature::from_bytes(&bytes);
    public.verify(digest_hex.as_bytes(), &sig).is_ok()
}
