//! The vault engine.
//!
//! One `Vault` owns the derived keys, the open store, the decoded metadata
//! index, and the chain cache for a single unlocked session. Operations are
//! `&mut self` and serialized by the dispatcher; the in-memory index is only
//! updated after its transaction commits, so a failed write leaves the
//! session identical to its pre-call state.

use rand::RngCore;
use secrecy::SecretString;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use hashfs_codec::{compress, inflate, zip_pack, zip_unpack};
use hashfs_core::types::{
    Chain, FileRecord, FileSummary, Fingerprint, ImportItem, ImportOutcome, InitOutcome,
    IntegrityReport, LoadedFile, MetadataDoc, ProgressEvent, RecoveryInfo, SaveOptions,
    SaveOutcome, VersionEntry, VersionRange,
};
use hashfs_core::{VaultConfig, VaultError, VaultResult, DEFAULT_MIME, META_SCHEMA_VERSION};
use hashfs_crypto::{
    decrypt, derive_key_set, encrypt, hash_bytes, hash_hex, sign_digest, verify_digest, KeySet,
    SealedBlob,
};
use hashfs_store::{probe, BlobStore, Collection, Transaction};

use crate::chain::ChainManager;
use crate::interchange::{
    import_failure, import_item, parse_sidecar, sidecar_bytes, OCTET_STREAM, SIDECAR_NAME,
};
use crate::{index, now_millis, store_err};

const CREATED_KEY: &str = "created";
const META_VERSION_KEY: &str = "metaVersion";

/// An unlocked vault session.
#[derive(Debug)]
pub struct Vault {
    keys: KeySet,
    store: BlobStore,
    chains: ChainManager,
    meta: MetadataDoc,
    config: VaultConfig,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl Vault {
    /// Unlock (or create) the vault addressed by `passphrase` under
    /// `base_dir`. Recovers the namespace when the store is damaged and
    /// rebuilds the metadata index when it is unreadable; anything rebuilt
    /// is reported in the outcome's `recovery`.
    pub async fn init(
        passphrase: &SecretString,
        base_dir: &Path,
        config: VaultConfig,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> VaultResult<(Self, InitOutcome)> {
        let keys = derive_key_set(passphrase, &config.kdf_params())?;
        let namespace = keys.namespace();
        let mut recovery = RecoveryInfo::default();

        let store = match BlobStore::open(base_dir, &namespace).await {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "store open failed, recreating namespace");
                recovery.database_rebuilt = true;
                BlobStore::reset(base_dir, &namespace)
                    .await
                    .map_err(store_err)?
            }
        };
        let store = match probe(&store).await {
            Ok(()) => store,
            Err(e) => {
                warn!(error = %e, "health probe failed, recreating namespace");
                recovery.database_rebuilt = true;
                let store = BlobStore::reset(base_dir, &namespace)
                    .await
                    .map_err(store_err)?;
                probe(&store).await.map_err(store_err)?;
                store
            }
        };

        let mut chains = ChainManager::new(config.chain_cache_capacity);
        let loaded = index::load(&store, &keys, &mut chains).await?;
        if loaded.rebuilt {
            recovery.metadata_rebuilt = true;
            recovery.recovered_files = loaded.recovered_files.clone();
        }
        let mut meta = loaded.doc;
        if loaded.dirty {
            meta.schema_version = META_SCHEMA_VERSION;
            meta.last_saved = now_millis();
            store
                .put(Collection::Meta, index::INDEX_KEY, &index::encode(&keys, &meta)?)
                .await
                .map_err(store_err)?;
        }

        let created_absent = store
            .get(Collection::Integrity, CREATED_KEY)
            .await
            .map_err(store_err)?
            .is_none();
        if created_absent {
            store
                .put(
                    Collection::Integrity,
                    CREATED_KEY,
                    now_millis().to_string().as_bytes(),
                )
                .await
                .map_err(store_err)?;
        }
        store
            .put(
                Collection::Integrity,
                META_VERSION_KEY,
                META_SCHEMA_VERSION.to_string().as_bytes(),
            )
            .await
            .map_err(store_err)?;

        let fingerprint = fingerprint(&namespace, &keys);
        info!(
            namespace = %namespace,
            files = meta.files.len(),
            rebuilt = recovery.any(),
            "vault unlocked"
        );

        let mut vault = Self {
            keys,
            store,
            chains,
            meta,
            config,
            progress,
        };

        if vault.config.cleanup_orphans_on_init {
            match vault.sweep_orphans().await {
                Ok(removed) if removed > 0 => {
                    info!(removed, "swept orphan blobs during init")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "orphan sweep during init failed"),
            }
        }

        let outcome = InitOutcome {
            files: vault.summaries(),
            fingerprint,
            recovery: recovery.any().then_some(recovery),
        };
        Ok((vault, outcome))
    }

    /// The storage namespace of this session's vault.
    pub fn namespace(&self) -> String {
        self.keys.namespace()
    }

    /// Sorted per-file summaries.
    pub fn summaries(&self) -> Vec<FileSummary> {
        self.meta
            .files
            .iter()
            .map(|(name, record)| FileSummary {
                name: name.clone(),
                mime: record.mime.clone(),
                head_version: record.head_version,
                last_size: record.last_size,
                last_compressed_size: record.last_compressed_size,
                last_modified: record.last_modified,
            })
            .collect()
    }

    // ── load ─────────────────────────────────────────────────────────────────

    /// Read a file, latest version unless pinned. A corrupt head (missing
    /// blob, failed decrypt, bad hash or signature) triggers the recovery
    /// walk back through earlier versions; corrupt historical versions
    /// surface directly.
    pub async fn load(
        &mut self,
        name: &str,
        version: Option<u64>,
        validate: bool,
    ) -> VaultResult<LoadedFile> {
        let Some(record) = self.meta.files.get(name).cloned() else {
            return Ok(empty_file(DEFAULT_MIME));
        };
        if record.active_key.is_none() {
            return Ok(empty_file(&record.mime));
        }

        let chain = self
            .chains
            .load(&self.store, &self.keys, &record.chain_id)
            .await?;

        let target = match version {
            Some(v) => match chain.find_version(v) {
                Some(entry) => entry.clone(),
                None => {
                    return Err(VaultError::VersionNotFound {
                        name: name.into(),
                        version: v,
                    })
                }
            },
            None => match chain.head() {
                Some(entry) => entry.clone(),
                None => {
                    // Record points at a blob but the chain is empty:
                    // nothing left to recover from.
                    return self.drop_unrecoverable(name).await;
                }
            },
        };

        let blob = self
            .store
            .get(Collection::Files, &target.key)
            .await
            .map_err(store_err)?;
        let verified: VaultResult<Vec<u8>> = match blob {
            // FileCorrupt doubles as the head-blob-missing marker; the
            // recovery walk below distinguishes it from crypto failures.
            None => Err(VaultError::FileCorrupt { name: name.into() }),
            Some(bytes) => self.open_blob(&bytes).map(|(plain, _)| plain).and_then(|plain| {
                if hash_hex(&plain) != target.hash {
                    Err(VaultError::HashMismatch {
                        name: name.into(),
                        version: target.version,
                    })
                } else if !verify_digest(&self.keys.verifying_key(), &target.hash, &target.sig) {
                    Err(VaultError::SignatureInvalid {
                        name: name.into(),
                        version: target.version,
                    })
                } else {
                    Ok(plain)
                }
            }),
        };

        match verified {
            Ok(bytes) => {
                if validate {
                    self.chains
                        .validate(&self.store, &self.keys, &chain)
                        .await?;
                }
                Ok(LoadedFile {
                    size: bytes.len() as u64,
                    bytes,
                    mime: record.mime.clone(),
                    version: target.version,
                    current_version: chain.head().map(|e| e.version).unwrap_or(0),
                    available_versions: chain.version_range(),
                    recovered: false,
                })
            }
            Err(e) if version.is_none() => {
                warn!(name = %name, error = %e, "head version unreadable, walking chain");
                self.recover_head(name, &record, chain, e).await
            }
            Err(VaultError::DecryptFailure) => Err(VaultError::VersionCorrupt {
                name: name.into(),
                version: target.version,
            }),
            Err(VaultError::FileCorrupt { .. }) => Err(VaultError::VersionCorrupt {
                name: name.into(),
                version: target.version,
            }),
            Err(e) => Err(e),
        }
    }

    /// Walk backwards from the version before the head; promote the first
    /// earlier version that still verifies. With no survivor, a missing
    /// head blob removes the file, while a tampered head surfaces its
    /// original integrity error.
    async fn recover_head(
        &mut self,
        name: &str,
        record: &FileRecord,
        chain: Chain,
        original: VaultError,
    ) -> VaultResult<LoadedFile> {
        let head_version = chain.head().map(|e| e.version).unwrap_or(0);

        let mut survivor: Option<(VersionEntry, Vec<u8>, usize)> = None;
        for entry in chain.versions.iter().rev().skip(1) {
            let Some(bytes) = self
                .store
                .get(Collection::Files, &entry.key)
                .await
                .map_err(store_err)?
            else {
                continue;
            };
            match self.open_blob(&bytes) {
                Ok((plain, compressed_len))
                    if hash_hex(&plain) == entry.hash
                        && verify_digest(&self.keys.verifying_key(), &entry.hash, &entry.sig) =>
                {
                    survivor = Some((entry.clone(), plain, compressed_len));
                    break;
                }
                _ => {
                    warn!(name = %name, version = entry.version, "candidate version also unreadable");
                }
            }
        }

        let Some((entry, bytes, compressed_len)) = survivor else {
            if matches!(original, VaultError::FileCorrupt { .. }) {
                return self.drop_unrecoverable(name).await;
            }
            return Err(original);
        };

        info!(name = %name, from = head_version, to = entry.version, "recovered to earlier version");

        let dead = self
            .chains
            .truncate_to(&self.store, &self.keys, &record.chain_id, chain, entry.version)
            .await?;

        let mut next = self.meta.clone();
        if let Some(rec) = next.files.get_mut(name) {
            rec.head_version = entry.version;
            rec.active_key = Some(entry.key.clone());
            rec.last_size = entry.size;
            rec.last_compressed_size = compressed_len as u64;
        }
        self.persist_meta(next).await?;

        if !dead.is_empty() {
            let mut txn = Transaction::new();
            for key in &dead {
                txn.delete(Collection::Files, key);
            }
            if let Err(e) = self.store.commit(txn).await {
                warn!(name = %name, error = %e, "dead head blob delete failed, orphans remain");
            }
        }

        let chain = self
            .chains
            .load(&self.store, &self.keys, &record.chain_id)
            .await?;
        Ok(LoadedFile {
            size: bytes.len() as u64,
            bytes,
            mime: record.mime.clone(),
            version: entry.version,
            current_version: entry.version,
            available_versions: chain.version_range(),
            recovered: true,
        })
    }

    async fn drop_unrecoverable(&mut self, name: &str) -> VaultResult<LoadedFile> {
        warn!(name = %name, "no recoverable version, removing file record");
        let mut next = self.meta.clone();
        next.files.remove(name);
        self.persist_meta(next).await?;
        Err(VaultError::FileCorrupt { name: name.into() })
    }

    // ── save ─────────────────────────────────────────────────────────────────

    /// Commit a new version of `name`. Content identical to the head is a
    /// no-op (`Unchanged`), save for a MIME update when one was supplied.
    pub async fn save(
        &mut self,
        name: &str,
        bytes: &[u8],
        mime: Option<&str>,
        options: SaveOptions,
    ) -> VaultResult<SaveOutcome> {
        let hash = hash_hex(bytes);
        let now = now_millis();
        let limit = options.version_limit.unwrap_or(self.config.version_limit);

        let mut next = self.meta.clone();
        if !next.files.contains_key(name) {
            next.files.insert(
                name.to_string(),
                FileRecord {
                    mime: mime.unwrap_or(DEFAULT_MIME).to_string(),
                    chain_id: uuid::Uuid::new_v4().to_string(),
                    head_version: 0,
                    last_modified: now,
                    last_size: 0,
                    last_compressed_size: 0,
                    active_key: None,
                },
            );
        }
        let record = match next.files.get(name) {
            Some(record) => record.clone(),
            None => return Err(VaultError::NotFound { name: name.into() }),
        };

        let chain = self
            .chains
            .load(&self.store, &self.keys, &record.chain_id)
            .await?;
        if chain.head().is_some_and(|head| head.hash == hash) {
            if let Some(new_mime) = mime {
                if new_mime != record.mime {
                    let mut next = self.meta.clone();
                    if let Some(rec) = next.files.get_mut(name) {
                        rec.mime = new_mime.to_string();
                    }
                    self.persist_meta(next).await?;
                    debug!(name = %name, mime = %new_mime, "unchanged content, updated mime");
                }
            }
            return Ok(SaveOutcome::Unchanged);
        }

        let sig = sign_digest(&self.keys, &hash);
        let blob_key = uuid::Uuid::new_v4().to_string();
        let version = record.head_version + 1;
        let compressed = compress(bytes)
            .map_err(|e| VaultError::StoreUnavailable(format!("compression: {e:#}")))?;
        let sealed = encrypt(self.keys.enc_key(), &compressed)?;

        if let Some(rec) = next.files.get_mut(name) {
            if let Some(new_mime) = mime {
                rec.mime = new_mime.to_string();
            }
            rec.head_version = version;
            rec.last_modified = now;
            rec.last_size = bytes.len() as u64;
            rec.last_compressed_size = compressed.len() as u64;
            rec.active_key = Some(blob_key.clone());
        }
        next.schema_version = META_SCHEMA_VERSION;
        next.last_saved = now;

        // Transaction A: the content blob and the index land together
        let mut txn = Transaction::new();
        txn.put(Collection::Files, blob_key.clone(), sealed.to_bytes());
        txn.put(
            Collection::Meta,
            index::INDEX_KEY,
            index::encode(&self.keys, &next)?,
        );
        self.store.commit(txn).await.map_err(store_err)?;
        self.meta = next;

        let entry = VersionEntry {
            version,
            hash,
            sig,
            key: blob_key,
            size: bytes.len() as u64,
            ts: now,
        };
        let dropped = self
            .chains
            .append(&self.store, &self.keys, &record.chain_id, entry, limit)
            .await?;

        // Transaction B: pruned blobs. Failure leaves orphans, not damage.
        if !dropped.is_empty() {
            let mut txn = Transaction::new();
            for key in &dropped {
                txn.delete(Collection::Files, key);
            }
            if let Err(e) = self.store.commit(txn).await {
                warn!(name = %name, error = %e, "pruned blob delete failed, orphans remain until integrity-check");
            }
        }

        debug!(name = %name, version, size = bytes.len(), "saved");
        Ok(SaveOutcome::Written {
            version,
            files: self.summaries(),
        })
    }

    // ── delete / rename ──────────────────────────────────────────────────────

    /// Remove a file, its chain, and every blob its history references, in
    /// one transaction.
    pub async fn delete(&mut self, name: &str) -> VaultResult<Vec<FileSummary>> {
        let Some(record) = self.meta.files.get(name).cloned() else {
            return Err(VaultError::NotFound { name: name.into() });
        };

        let chain = match self
            .chains
            .load(&self.store, &self.keys, &record.chain_id)
            .await
        {
            Ok(chain) => chain,
            Err(e) => {
                warn!(name = %name, error = %e, "chain unreadable during delete, removing what is known");
                Chain::empty()
            }
        };

        let mut blob_keys: BTreeSet<String> =
            chain.versions.iter().map(|e| e.key.clone()).collect();
        if let Some(active) = &record.active_key {
            blob_keys.insert(active.clone());
        }

        let mut next = self.meta.clone();
        next.files.remove(name);
        next.schema_version = META_SCHEMA_VERSION;
        next.last_saved = now_millis();

        let mut txn = Transaction::new();
        for key in &blob_keys {
            txn.delete(Collection::Files, key);
        }
        txn.delete(Collection::Chains, record.chain_id.clone());
        txn.put(
            Collection::Meta,
            index::INDEX_KEY,
            index::encode(&self.keys, &next)?,
        );
        self.store.commit(txn).await.map_err(store_err)?;

        self.meta = next;
        self.chains.invalidate(&record.chain_id);
        info!(name = %name, blobs = blob_keys.len(), "deleted");
        Ok(self.summaries())
    }

    /// Move a record to a new name, keeping its chain and statistics.
    pub async fn rename(&mut self, old: &str, new: &str) -> VaultResult<Vec<FileSummary>> {
        if old.trim().is_empty() || new.trim().is_empty() {
            return Err(VaultError::RenameInvalid {
                reason: "empty filename".into(),
            });
        }
        if !self.meta.files.contains_key(old) {
            return Err(VaultError::RenameInvalid {
                reason: format!("source does not exist: {old}"),
            });
        }
        if self.meta.files.contains_key(new) {
            return Err(VaultError::RenameConflict { name: new.into() });
        }

        let mut next = self.meta.clone();
        if let Some(record) = next.files.remove(old) {
            next.files.insert(new.to_string(), record);
        }
        self.persist_meta(next).await?;
        info!(old = %old, new = %new, "renamed");
        Ok(self.summaries())
    }

    // ── export / import ──────────────────────────────────────────────────────

    /// Export every file's head version (plus the MIME sidecar) as a ZIP.
    /// Unreadable heads are skipped with a warning rather than failing the
    /// whole archive.
    pub async fn export_zip(&mut self, operation_id: Option<&str>) -> VaultResult<Vec<u8>> {
        let op_id = operation_id.unwrap_or("export-zip");
        let targets: Vec<(String, FileRecord)> = self
            .meta
            .files
            .iter()
            .filter(|(_, record)| record.active_key.is_some())
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect();
        let total = targets.len() as u64;

        let mut entries = BTreeMap::new();
        let mut mimes = BTreeMap::new();
        for (i, (name, record)) in targets.iter().enumerate() {
            self.emit_progress(op_id, i as u64, total, name);
            let Some(key) = &record.active_key else { continue };
            match self
                .store
                .get(Collection::Files, key)
                .await
                .map_err(store_err)?
            {
                None => warn!(name = %name, "head blob missing, skipped in export"),
                Some(bytes) => match self.open_blob(&bytes) {
                    Ok((plain, _)) => {
                        entries.insert(name.clone(), plain);
                        mimes.insert(name.clone(), record.mime.clone());
                    }
                    Err(e) => warn!(name = %name, error = %e, "head blob unreadable, skipped in export"),
                },
            }
            self.emit_progress(op_id, i as u64 + 1, total, name);
        }

        entries.insert(SIDECAR_NAME.to_string(), sidecar_bytes(&mimes)?);
        zip_pack(&entries).map_err(|e| VaultError::StoreUnavailable(format!("zip pack: {e:#}")))
    }

    /// Unpack an archive into importable items. Nothing is saved here; the
    /// host feeds each item back through `save` so the normal write
    /// pipeline (and its dedup) applies.
    pub async fn import_zip(
        &mut self,
        data: &[u8],
        operation_id: Option<&str>,
    ) -> VaultResult<Vec<ImportOutcome>> {
        let op_id = operation_id.unwrap_or("import-zip");
        let entries = zip_unpack(data)
            .map_err(|e| VaultError::IntegrityIssue(format!("invalid zip archive: {e:#}")))?;

        let sidecar = entries
            .get(SIDECAR_NAME)
            .map(|bytes| parse_sidecar(bytes))
            .unwrap_or_default();

        let total = entries.len().saturating_sub(usize::from(entries.contains_key(SIDECAR_NAME)));
        let mut out = Vec::with_capacity(total);
        for (name, bytes) in entries {
            if name == SIDECAR_NAME {
                continue;
            }
            self.emit_progress(op_id, out.len() as u64, total as u64, &name);
            let mime = sidecar
                .mimes
                .get(&name)
                .cloned()
                .unwrap_or_else(|| OCTET_STREAM.to_string());
            out.push(import_item(name, bytes, mime));
        }
        self.emit_progress(op_id, total as u64, total as u64, "done");
        Ok(out)
    }

    /// Wrap host-picked files into importable items (no sidecar; MIME comes
    /// from each item or defaults to octet-stream).
    pub async fn import_files(
        &mut self,
        items: Vec<ImportItem>,
        operation_id: Option<&str>,
    ) -> VaultResult<Vec<ImportOutcome>> {
        let op_id = operation_id.unwrap_or("import-files");
        let total = items.len() as u64;
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            self.emit_progress(op_id, i as u64, total, &item.name);
            if item.name.is_empty() {
                out.push(import_failure(item.name, "empty filename"));
                continue;
            }
            let mime = item.mime.unwrap_or_else(|| OCTET_STREAM.to_string());
            out.push(import_item(item.name, item.bytes, mime));
        }
        self.emit_progress(op_id, total, total, "done");
        Ok(out)
    }

    // ── integrity ────────────────────────────────────────────────────────────

    /// Validate every chain fully, remove files with no recoverable
    /// version, then sweep blobs nothing references.
    pub async fn integrity_check(
        &mut self,
        operation_id: Option<&str>,
    ) -> VaultResult<IntegrityReport> {
        let op_id = operation_id.unwrap_or("integrity-check");
        let mut report = IntegrityReport::default();
        let names: Vec<String> = self.meta.files.keys().cloned().collect();
        let total = names.len() as u64 + 1;

        for (i, name) in names.iter().enumerate() {
            self.emit_progress(op_id, i as u64, total, name);
            let Some(record) = self.meta.files.get(name).cloned() else {
                continue;
            };
            match self
                .chains
                .load(&self.store, &self.keys, &record.chain_id)
                .await
            {
                Err(e) => {
                    report.issues.push(format!("{name}: chain unreadable: {e}"));
                    self.delete(name).await?;
                    report.files_removed.push(name.clone());
                }
                Ok(chain) => {
                    let problems = self
                        .chains
                        .validate_versions(&self.store, &self.keys, &chain)
                        .await;
                    for (version, problem) in &problems {
                        report
                            .issues
                            .push(format!("{name}: version {version}: {problem}"));
                    }
                    let unrecoverable =
                        !chain.versions.is_empty() && problems.len() == chain.versions.len();
                    if unrecoverable {
                        self.delete(name).await?;
                        report.files_removed.push(name.clone());
                    }
                }
            }
        }

        self.emit_progress(op_id, total - 1, total, "orphan sweep");
        report.orphans_removed = self.sweep_orphans().await?;
        self.emit_progress(op_id, total, total, "done");

        if !report.issues.is_empty() {
            warn!(
                issues = report.issues.len(),
                removed = report.files_removed.len(),
                "integrity check found problems"
            );
        }
        Ok(report)
    }

    /// Delete every `files` blob that no surviving chain version and no
    /// active key references. Returns how many were removed.
    async fn sweep_orphans(&mut self) -> VaultResult<u64> {
        let records: Vec<(String, Option<String>)> = self
            .meta
            .files
            .values()
            .map(|r| (r.chain_id.clone(), r.active_key.clone()))
            .collect();

        let mut referenced: BTreeSet<String> = BTreeSet::new();
        for (chain_id, active_key) in records {
            if let Some(key) = active_key {
                referenced.insert(key);
            }
            match self.chains.load(&self.store, &self.keys, &chain_id).await {
                Ok(chain) => {
                    referenced.extend(chain.versions.iter().map(|e| e.key.clone()));
                }
                Err(e) => {
                    warn!(chain_id = %chain_id, error = %e, "chain unreadable during orphan sweep");
                }
            }
        }

        let all_keys = self
            .store
            .list_keys(Collection::Files)
            .await
            .map_err(store_err)?;
        let orphans: Vec<String> = all_keys
            .into_iter()
            .filter(|key| !referenced.contains(key))
            .collect();
        if orphans.is_empty() {
            return Ok(0);
        }

        let mut txn = Transaction::new();
        for key in &orphans {
            txn.delete(Collection::Files, key);
        }
        self.store.commit(txn).await.map_err(store_err)?;
        info!(count = orphans.len(), "removed orphan blobs");
        Ok(orphans.len() as u64)
    }

    // ── internals ────────────────────────────────────────────────────────────

    /// Decrypt and inflate a stored content blob. Returns the plaintext and
    /// the compressed payload length.
    fn open_blob(&self, bytes: &[u8]) -> VaultResult<(Vec<u8>, usize)> {
        let sealed = SealedBlob::from_bytes(bytes)?;
        let compressed = decrypt(self.keys.enc_key(), &sealed)?;
        let plain = inflate(&compressed).map_err(|_| VaultError::DecryptFailure)?;
        Ok((plain, compressed.len()))
    }

    /// Encrypt and commit a new index document, then adopt it in memory.
    async fn persist_meta(&mut self, mut next: MetadataDoc) -> VaultResult<()> {
        next.schema_version = META_SCHEMA_VERSION;
        next.last_saved = now_millis();
        let mut txn = Transaction::new();
        txn.put(
            Collection::Meta,
            index::INDEX_KEY,
            index::encode(&self.keys, &next)?,
        );
        self.store.commit(txn).await.map_err(store_err)?;
        self.meta = next;
        Ok(())
    }

    fn emit_progress(&self, operation_id: &str, completed: u64, total: u64, current: &str) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(ProgressEvent {
                operation_id: operation_id.to_string(),
                completed,
                total,
                current: current.to_string(),
            });
        }
    }
}

fn empty_file(mime: &str) -> LoadedFile {
    LoadedFile {
        bytes: Vec::new(),
        mime: mime.to_string(),
        size: 0,
        version: 0,
        current_version: 0,
        available_versions: VersionRange { min: 0, max: 0 },
        recovered: false,
    }
}

/// `base` identifies the vault (stable across unlocks of the same
/// passphrase); `session` folds in time and fresh randomness so every
/// unlock is distinguishable.
fn fingerprint(namespace: &str, keys: &KeySet) -> Fingerprint {
    let ns = namespace.as_bytes();
    let mut base_input = Vec::with_capacity(64);
    base_input.extend_from_slice(&ns[..ns.len().min(32)]);
    base_input.extend_from_slice(keys.enc_key());
    let base = hash_bytes(&base_input);

    let mut entropy = [0u8; 40];
    entropy[..8].copy_from_slice(&now_millis().to_be_bytes());
    rand::rngs::OsRng.fill_bytes(&mut entropy[8..]);

    let mut session_input = Vec::with_capacity(72);
    session_input.extend_from_slice(base.as_bytes());
    session_input.extend_from_slice(&entropy);

    Fingerprint {
        base: base.to_hex().to_string(),
        session: hash_hex(&session_input),
    }
}
