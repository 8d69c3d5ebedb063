//! The encrypted metadata index.
//!
//! Stored at `meta/index` as `[iv][ciphertext]` of the JSON document
//! `{files, schemaVersion, lastSaved}`. Writes are always whole-document
//! rewrites, encrypted before the transaction that carries them begins.
//!
//! On load: decrypt → validate shape → migrate older schemas in place. If
//! the payload is absent or unreadable, the index is rebuilt from whatever
//! chains survive in the store.

use hashfs_core::types::{FileRecord, MetadataDoc};
use hashfs_core::{VaultResult, DEFAULT_MIME, META_SCHEMA_VERSION};
use hashfs_crypto::{decrypt, encrypt, KeySet, SealedBlob};
use hashfs_store::{BlobStore, Collection};
use tracing::{info, warn};

use crate::chain::ChainManager;
use crate::{now_millis, store_err};

/// Key of the index document inside the `meta` collection
pub const INDEX_KEY: &str = "index";

/// Outcome of loading the index at init.
pub struct IndexLoad {
    pub doc: MetadataDoc,
    /// The stored index was invalid and had to be rebuilt from chains
    pub rebuilt: bool,
    /// Names synthesized during rebuild
    pub recovered_files: Vec<String>,
    /// The loaded document differs from the stored bytes and must be
    /// persisted (migration or rebuild)
    pub dirty: bool,
}

/// Encrypt an index document into its stored form.
pub fn encode(keys: &KeySet, doc: &MetadataDoc) -> VaultResult<Vec<u8>> {
    let json = serde_json::to_vec(doc).map_err(|e| {
        hashfs_core::VaultError::StoreUnavailable(format!("index serialization: {e}"))
    })?;
    let sealed = encrypt(keys.enc_key(), &json)?;
    Ok(sealed.to_bytes())
}

/// Load (or rebuild) the metadata index.
pub async fn load(
    store: &BlobStore,
    keys: &KeySet,
    chains: &mut ChainManager,
) -> VaultResult<IndexLoad> {
    let stored = store
        .get(Collection::Meta, INDEX_KEY)
        .await
        .map_err(store_err)?;

    match stored {
        None => {
            // Fresh vault (or index lost with everything else): rebuild.
            // With no surviving chains this is just an empty document.
            let (doc, recovered) = rebuild_from_chains(store, keys, chains).await?;
            let rebuilt = !recovered.is_empty();
            Ok(IndexLoad {
                dirty: rebuilt,
                doc,
                rebuilt,
                recovered_files: recovered,
            })
        }
        Some(bytes) => match decode(keys, &bytes) {
            Ok(mut doc) => {
                let migrated = migrate(&mut doc);
                Ok(IndexLoad {
                    doc,
                    rebuilt: false,
                    recovered_files: Vec::new(),
                    dirty: migrated,
                })
            }
            Err(reason) => {
                warn!(reason = %reason, "metadata index unreadable, rebuilding from chains");
                let (doc, recovered) = rebuild_from_chains(store, keys, chains).await?;
                Ok(IndexLoad {
                    doc,
                    rebuilt: true,
                    recovered_files: recovered,
                    dirty: true,
                })
            }
        },
    }
}

/// Decrypt and shape-validate a stored index payload.
fn decode(keys: &KeySet, bytes: &[u8]) -> Result<MetadataDoc, String> {
    let sealed = SealedBlob::from_bytes(bytes).map_err(|e| e.to_string())?;
    let json = decrypt(keys.enc_key(), &sealed).map_err(|e| e.to_string())?;
    // The typed decode enforces the shape: a top-level object whose `files`
    // maps filenames to records that carry at least a mime string.
    serde_json::from_slice(&json).map_err(|e| format!("index parse: {e}"))
}

/// Fill defaults on records written by older schemas. Returns whether the
/// document changed.
fn migrate(doc: &mut MetadataDoc) -> bool {
    if doc.schema_version >= META_SCHEMA_VERSION {
        return false;
    }
    let now = now_millis();
    for record in doc.files.values_mut() {
        if record.mime.is_empty() {
            record.mime = DEFAULT_MIME.to_string();
        }
        if record.last_modified == 0 {
            record.last_modified = now;
        }
    }
    info!(
        from = doc.schema_version,
        to = META_SCHEMA_VERSION,
        "migrated metadata index schema"
    );
    doc.schema_version = META_SCHEMA_VERSION;
    true
}

/// Synthesize an index from surviving chains: each chain whose head blob
/// still exists gets a `recovered_<chainId[0..8]>` record.
async fn rebuild_from_chains(
    store: &BlobStore,
    keys: &KeySet,
    chains: &mut ChainManager,
) -> VaultResult<(MetadataDoc, Vec<String>)> {
    let mut doc = MetadataDoc {
        schema_version: META_SCHEMA_VERSION,
        last_saved: now_millis(),
        ..MetadataDoc::default()
    };
    let mut recovered = Vec::new();

    let chain_ids = store.list_keys(Collection::Chains).await.map_err(store_err)?;
    for chain_id in chain_ids {
        let chain = match chains.load(store, keys, &chain_id).await {
            Ok(chain) => chain,
            Err(e) => {
                warn!(chain_id = %chain_id, error = %e, "skipping unreadable chain during rebuild");
                continue;
            }
        };
        let Some(head) = chain.head() else { continue };

        let blob_exists = store
            .get(Collection::Files, &head.key)
            .await
            .map_err(store_err)?
            .is_some();
        if !blob_exists {
            warn!(chain_id = %chain_id, "head blob missing, chain not recovered");
            continue;
        }

        let short = &chain_id[..chain_id.len().min(8)];
        let mut name = format!("recovered_{short}");
        if doc.files.contains_key(&name) {
            name = format!("recovered_{chain_id}");
        }

        doc.files.insert(
            name.clone(),
            FileRecord {
                mime: DEFAULT_MIME.to_string(),
                chain_id: chain_id.clone(),
                head_version: head.version,
                last_modified: head.ts,
                last_size: head.size,
                last_compressed_size: 0,
                active_key: Some(head.key.clone()),
            },
        );
        info!(name = %name, chain_id = %chain_id, "recovered file from chain");
        recovered.push(name);
    }

    Ok((doc, recovered))
}
