//! Per-file version chains.
//!
//! Chain blob format (binary):
//! ```text
//! [12 bytes: IV][64 bytes: Ed25519 sig][N bytes: AES-GCM ciphertext]
//! ```
//! The signature covers the BLAKE3 hex digest of the *compressed* chain
//! JSON — the bytes inside the ciphertext — so verification decrypts
//! first, hashes the compressed payload, checks the signature, and only
//! then inflates and parses.
//!
//! The chain-level hash commits to every retained version:
//! `BLAKE3("HashFS-Chain-v6" ‖ version hashes as raw bytes, in order)`.
//! Legacy chains that predate the chain hash are upgraded (computed,
//! signed, rewritten) on first access.

use hashfs_codec::{compress, inflate};
use hashfs_core::types::{Chain, VersionEntry};
use hashfs_core::{VaultError, VaultResult};
use hashfs_crypto::{
    decrypt, encrypt, hash_from_hex, hash_hex, sign_digest, verify_digest, KeySet, SealedBlob,
    IV_SIZE, SIG_SIZE, TAG_SIZE,
};
use hashfs_store::{BlobStore, Collection};
use tracing::{debug, info, warn};

use crate::lru::LruCache;
use crate::store_err;

/// Domain-separation prefix for the chain-level hash
const CHAIN_DOMAIN: &str = "HashFS-Chain-v6";

fn corrupt(reason: impl Into<String>, version: Option<u64>) -> VaultError {
    VaultError::ChainCorrupt {
        reason: reason.into(),
        version,
    }
}

/// Loads, verifies, appends to, and prunes version chains, with a bounded
/// write-through cache in front of the store.
#[derive(Debug)]
pub struct ChainManager {
    cache: LruCache<String, Chain>,
}

impl ChainManager {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: LruCache::new(cache_capacity),
        }
    }

    /// Load a chain, verifying the blob signature, the payload, and the
    /// chain-level hash. A missing chain is an empty chain, so fresh files
    /// share the append path.
    pub async fn load(
        &mut self,
        store: &BlobStore,
        keys: &KeySet,
        chain_id: &str,
    ) -> VaultResult<Chain> {
        if let Some(chain) = self.cache.get(&chain_id.to_string()) {
            return Ok(chain.clone());
        }

        let Some(bytes) = store
            .get(Collection::Chains, chain_id)
            .await
            .map_err(store_err)?
        else {
            return Ok(Chain::empty());
        };

        let mut chain = decode_and_verify(keys, &bytes)?;

        if chain.chain_hash.is_none() || chain.chain_sig.is_none() {
            info!(chain_id = %chain_id, "upgrading legacy chain without chain hash");
            seal_chain(keys, &mut chain)?;
            self.save(store, keys, chain_id, &chain).await?;
        } else {
            self.cache.insert(chain_id.to_string(), chain.clone());
        }
        Ok(chain)
    }

    /// Serialize, compress, sign, and encrypt a chain into its stored form.
    pub fn encode(&self, keys: &KeySet, chain: &Chain) -> VaultResult<Vec<u8>> {
        let json = serde_json::to_vec(chain)
            .map_err(|e| corrupt(format!("chain serialization: {e}"), None))?;
        let compressed = compress(&json)
            .map_err(|e| VaultError::StoreUnavailable(format!("chain compression: {e:#}")))?;
        let digest = hash_hex(&compressed);
        let sig_hex = sign_digest(keys, &digest);
        let sealed = encrypt(keys.enc_key(), &compressed)?;

        let mut raw_sig = [0u8; SIG_SIZE];
        hex::decode_to_slice(&sig_hex, &mut raw_sig)
            .map_err(|e| corrupt(format!("signature encoding: {e}"), None))?;

        let mut out = Vec::with_capacity(IV_SIZE + SIG_SIZE + sealed.ciphertext.len());
        out.extend_from_slice(&sealed.iv);
        out.extend_from_slice(&raw_sig);
        out.extend_from_slice(&sealed.ciphertext);
        Ok(out)
    }

    /// Write a chain under its id and refresh the cache.
    pub async fn save(
        &mut self,
        store: &BlobStore,
        keys: &KeySet,
        chain_id: &str,
        chain: &Chain,
    ) -> VaultResult<()> {
        let bytes = self.encode(keys, chain)?;
        store
            .put(Collection::Chains, chain_id, &bytes)
            .await
            .map_err(store_err)?;
        self.cache.insert(chain_id.to_string(), chain.clone());
        Ok(())
    }

    /// Append a version entry, prune the front down to `version_limit`,
    /// re-seal the chain hash, and persist. Returns the blob keys of
    /// pruned entries, which the caller deletes in its own transaction.
    pub async fn append(
        &mut self,
        store: &BlobStore,
        keys: &KeySet,
        chain_id: &str,
        entry: VersionEntry,
        version_limit: usize,
    ) -> VaultResult<Vec<String>> {
        let mut chain = self.load(store, keys, chain_id).await?;
        chain.versions.push(entry);

        let mut dropped = Vec::new();
        while chain.versions.len() > version_limit.max(1) {
            let removed = chain.versions.remove(0);
            debug!(chain_id = %chain_id, version = removed.version, "pruning version");
            dropped.push(removed.key);
            chain.pruned.count += 1;
        }
        if !dropped.is_empty() {
            chain.pruned.oldest_kept = chain.versions.first().map(|v| v.version).unwrap_or(0);
        }

        seal_chain(keys, &mut chain)?;
        self.save(store, keys, chain_id, &chain).await?;
        Ok(dropped)
    }

    /// Drop a chain from the cache (after delete).
    pub fn invalidate(&mut self, chain_id: &str) {
        self.cache.remove(&chain_id.to_string());
    }

    /// Truncate a chain so `keep_version` becomes its head, re-seal, and
    /// persist. Returns the blob keys of the discarded later entries.
    /// Used by head-corruption recovery.
    pub async fn truncate_to(
        &mut self,
        store: &BlobStore,
        keys: &KeySet,
        chain_id: &str,
        mut chain: Chain,
        keep_version: u64,
    ) -> VaultResult<Vec<String>> {
        let mut dropped = Vec::new();
        while chain
            .versions
            .last()
            .is_some_and(|e| e.version > keep_version)
        {
            if let Some(removed) = chain.versions.pop() {
                warn!(chain_id = %chain_id, version = removed.version, "discarding corrupt head version");
                dropped.push(removed.key);
            }
        }
        seal_chain(keys, &mut chain)?;
        self.save(store, keys, chain_id, &chain).await?;
        Ok(dropped)
    }

    /// Validate every retained version: blob present, decrypts, inflates,
    /// rehashes to the recorded hash, signature verifies. Returns one
    /// `(version, problem)` pair per failing entry.
    pub async fn validate_versions(
        &self,
        store: &BlobStore,
        keys: &KeySet,
        chain: &Chain,
    ) -> Vec<(u64, String)> {
        let mut problems = Vec::new();
        for entry in &chain.versions {
            if let Err(problem) = check_version(store, keys, entry).await {
                problems.push((entry.version, problem));
            }
        }
        problems
    }

    /// Fail-fast full validation, used by `load(..., validate: true)`.
    pub async fn validate(
        &self,
        store: &BlobStore,
        keys: &KeySet,
        chain: &Chain,
    ) -> VaultResult<()> {
        match self.validate_versions(store, keys, chain).await.into_iter().next() {
            None => Ok(()),
            Some((version, problem)) => Err(corrupt(problem, Some(version))),
        }
    }
}

/// Verify one version entry's stored blob end to end.
async fn check_version(store: &BlobStore, keys: &KeySet, entry: &VersionEntry) -> Result<(), String> {
    let bytes = store
        .get(Collection::Files, &entry.key)
        .await
        .map_err(|e| format!("blob read failed: {e:#}"))?
        .ok_or_else(|| "blob missing".to_string())?;
    let sealed = SealedBlob::from_bytes(&bytes).map_err(|e| e.to_string())?;
    let compressed = decrypt(keys.enc_key(), &sealed).map_err(|e| e.to_string())?;
    let plain = inflate(&compressed).map_err(|e| format!("inflate failed: {e:#}"))?;
    if hash_hex(&plain) != entry.hash {
        return Err("content hash mismatch".to_string());
    }
    if !verify_digest(&keys.verifying_key(), &entry.hash, &entry.sig) {
        return Err("version signature invalid".to_string());
    }
    Ok(())
}

/// Recompute the domain-separated chain hash. An empty chain hashes the
/// empty input.
pub fn compute_chain_hash(versions: &[VersionEntry]) -> VaultResult<String> {
    if versions.is_empty() {
        return Ok(hash_hex(b""));
    }
    let mut buf = Vec::with_capacity(CHAIN_DOMAIN.len() + versions.len() * 32);
    buf.extend_from_slice(CHAIN_DOMAIN.as_bytes());
    for entry in versions {
        let digest = hash_from_hex(&entry.hash)
            .map_err(|_| corrupt("unparseable version hash", Some(entry.version)))?;
        buf.extend_from_slice(digest.as_bytes());
    }
    Ok(hash_hex(&buf))
}

/// Recompute and re-sign the chain hash in place.
fn seal_chain(keys: &KeySet, chain: &mut Chain) -> VaultResult<()> {
    let digest = compute_chain_hash(&chain.versions)?;
    chain.chain_sig = Some(sign_digest(keys, &digest));
    chain.chain_hash = Some(digest);
    Ok(())
}

/// Parse and verify a stored chain blob.
fn decode_and_verify(keys: &KeySet, bytes: &[u8]) -> VaultResult<Chain> {
    if bytes.len() < IV_SIZE + SIG_SIZE + TAG_SIZE {
        return Err(corrupt("truncated chain blob (signature missing)", None));
    }
    let (head, ciphertext) = bytes.split_at(IV_SIZE + SIG_SIZE);
    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&head[..IV_SIZE]);
    let sig_hex = hex::encode(&head[IV_SIZE..]);

    let sealed = SealedBlob {
        iv,
        ciphertext: ciphertext.to_vec(),
    };
    let compressed = decrypt(keys.enc_key(), &sealed)?;

    let digest = hash_hex(&compressed);
    if !verify_digest(&keys.verifying_key(), &digest, &sig_hex) {
        return Err(corrupt("chain blob signature invalid", None));
    }

    let json = inflate(&compressed).map_err(|e| corrupt(format!("chain inflate: {e:#}"), None))?;
    let chain: Chain =
        serde_json::from_slice(&json).map_err(|e| corrupt(format!("chain parse: {e}"), None))?;

    if let (Some(stored_hash), Some(stored_sig)) = (&chain.chain_hash, &chain.chain_sig) {
        let recomputed = compute_chain_hash(&chain.versions)?;
        if recomputed != *stored_hash {
            return Err(corrupt("chain hash mismatch", None));
        }
        if !verify_digest(&keys.verifying_key(), stored_hash, stored_sig) {
            return Err(corrupt("chain signature invalid", None));
        }
    }
    Ok(chain)
}
