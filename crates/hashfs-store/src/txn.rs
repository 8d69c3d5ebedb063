//! Staged-journal transactions.
//!
//! A transaction stages its payloads and a JSON manifest under
//! `.txn/<id>/`, then commits by renaming `manifest.json.tmp` to
//! `manifest.json` — that rename is the commit point. Applying the staged
//! ops is idempotent, so a crash between commit and cleanup is healed by
//! replaying the journal on the next open; a stage without a manifest was
//! never committed and is discarded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::store::{BlobStore, Collection};

const TXN_DIR: &str = ".txn";
const MANIFEST: &str = "manifest.json";

enum PendingOp {
    Put {
        collection: Collection,
        key: String,
        data: Vec<u8>,
    },
    Delete {
        collection: Collection,
        key: String,
    },
}

/// Journaled form of one operation. Put payloads live in sibling files
/// named by `payload`.
#[derive(Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalOp {
    Put {
        collection: String,
        key: String,
        payload: String,
    },
    Delete {
        collection: String,
        key: String,
    },
}

/// An atomic multi-key write: either every op lands or none do.
#[derive(Default)]
pub struct Transaction {
    ops: Vec<PendingOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, collection: Collection, key: impl Into<String>, data: Vec<u8>) {
        self.ops.push(PendingOp::Put {
            collection,
            key: key.into(),
            data,
        });
    }

    pub fn delete(&mut self, collection: Collection, key: impl Into<String>) {
        self.ops.push(PendingOp::Delete {
            collection,
            key: key.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

impl BlobStore {
    /// Commit a transaction. On return the journal has been applied and
    /// cleared; on error before the commit point the store is untouched.
    pub async fn commit(&self, txn: Transaction) -> Result<()> {
        if txn.is_empty() {
            return Ok(());
        }

        let stage = self
            .root()
            .join(TXN_DIR)
            .join(uuid::Uuid::new_v4().to_string());
        fs::create_dir_all(&stage)
            .await
            .with_context(|| format!("creating txn stage: {}", stage.display()))?;

        // Stage payloads, then the manifest describing every op in order.
        let mut journal = Vec::with_capacity(txn.ops.len());
        for (i, op) in txn.ops.iter().enumerate() {
            match op {
                PendingOp::Put {
                    collection,
                    key,
                    data,
                } => {
                    let payload = format!("p{i}");
                    fs::write(stage.join(&payload), data)
                        .await
                        .with_context(|| format!("staging payload for: {key}"))?;
                    journal.push(JournalOp::Put {
                        collection: collection.dir_name().to_string(),
                        key: key.clone(),
                        payload,
                    });
                }
                PendingOp::Delete { collection, key } => {
                    journal.push(JournalOp::Delete {
                        collection: collection.dir_name().to_string(),
                        key: key.clone(),
                    });
                }
            }
        }

        let manifest_json = serde_json::to_vec(&journal).context("serializing txn manifest")?;
        let manifest_tmp = stage.join(format!("{MANIFEST}.tmp"));
        let manifest_path = stage.join(MANIFEST);
        fs::write(&manifest_tmp, &manifest_json)
            .await
            .context("staging txn manifest")?;
        // Commit point
        fs::rename(&manifest_tmp, &manifest_path)
            .await
            .context("committing txn manifest")?;

        debug!(ops = txn.ops.len(), stage = %stage.display(), "transaction committed");

        self.apply_stage(&stage, &journal).await?;
        if let Err(e) = fs::remove_dir_all(&stage).await {
            warn!(stage = %stage.display(), error = %e, "failed to clear txn stage");
        }
        Ok(())
    }

    /// Apply journaled ops. Idempotent: puts rewrite the same bytes,
    /// deletes tolerate already-missing keys.
    async fn apply_stage(&self, stage: &std::path::Path, journal: &[JournalOp]) -> Result<()> {
        for op in journal {
            match op {
                JournalOp::Put {
                    collection,
                    key,
                    payload,
                } => {
                    let collection = Collection::from_dir_name(collection)
                        .with_context(|| format!("unknown collection in journal: {collection}"))?;
                    let data = fs::read(stage.join(payload))
                        .await
                        .with_context(|| format!("reading staged payload: {payload}"))?;
                    self.put(collection, key, &data).await?;
                }
                JournalOp::Delete { collection, key } => {
                    let collection = Collection::from_dir_name(collection)
                        .with_context(|| format!("unknown collection in journal: {collection}"))?;
                    self.delete(collection, key).await?;
                }
            }
        }
        Ok(())
    }

    /// Called by `open`: replay committed stages, discard uncommitted ones.
    pub(crate) async fn recover_journal(&self) -> Result<()> {
        let txn_root = self.root().join(TXN_DIR);
        let mut entries = match fs::read_dir(&txn_root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e).context("listing txn stages"),
        };

        while let Some(entry) = entries.next_entry().await? {
            let stage = entry.path();
            let manifest_path = stage.join(MANIFEST);
            match fs::read(&manifest_path).await {
                Ok(bytes) => {
                    let journal: Vec<JournalOp> = serde_json::from_slice(&bytes)
                        .with_context(|| format!("parsing txn manifest: {}", stage.display()))?;
                    warn!(stage = %stage.display(), ops = journal.len(), "replaying committed transaction");
                    self.apply_stage(&stage, &journal).await?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(stage = %stage.display(), "discarding uncommitted transaction stage");
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("reading txn manifest: {}", stage.display()))
                }
            }
            if let Err(e) = fs::remove_dir_all(&stage).await {
                warn!(stage = %stage.display(), error = %e, "failed to clear txn stage");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "txn-test-v6";

    #[tokio::test]
    async fn multi_collection_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::open(tmp.path(), NS).await.unwrap();

        let mut txn = Transaction::new();
        txn.put(Collection::Files, "blob1", b"content".to_vec());
        txn.put(Collection::Meta, "index", b"meta doc".to_vec());
        txn.put(Collection::Chains, "chain1", b"chain".to_vec());
        store.commit(txn).await.unwrap();

        assert!(store.get(Collection::Files, "blob1").await.unwrap().is_some());
        assert!(store.get(Collection::Meta, "index").await.unwrap().is_some());
        assert!(store.get(Collection::Chains, "chain1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn puts_and_deletes_in_one_txn() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::open(tmp.path(), NS).await.unwrap();
        store.put(Collection::Files, "old", b"old").await.unwrap();

        let mut txn = Transaction::new();
        txn.delete(Collection::Files, "old");
        txn.put(Collection::Files, "new", b"new".to_vec());
        store.commit(txn).await.unwrap();

        assert!(store.get(Collection::Files, "old").await.unwrap().is_none());
        assert!(store.get(Collection::Files, "new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_transaction_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::open(tmp.path(), NS).await.unwrap();
        store.commit(Transaction::new()).await.unwrap();
        assert!(!tmp.path().join(NS).join(TXN_DIR).exists() || {
            std::fs::read_dir(tmp.path().join(NS).join(TXN_DIR))
                .map(|mut d| d.next().is_none())
                .unwrap_or(true)
        });
    }

    #[tokio::test]
    async fn committed_stage_replays_on_open() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::open(tmp.path(), NS).await.unwrap();

        // Hand-craft a committed-but-unapplied stage, as if the process
        // died right after the manifest rename.
        let stage = tmp.path().join(NS).join(TXN_DIR).join("recovered-txn");
        std::fs::create_dir_all(&stage).unwrap();
        std::fs::write(stage.join("p0"), b"replayed payload").unwrap();
        let journal = serde_json::json!([
            {"op": "put", "collection": "files", "key": "replayed", "payload": "p0"},
            {"op": "delete", "collection": "files", "key": "never-existed"}
        ]);
        std::fs::write(stage.join(MANIFEST), journal.to_string()).unwrap();
        drop(store);

        let store = BlobStore::open(tmp.path(), NS).await.unwrap();
        assert_eq!(
            store.get(Collection::Files, "replayed").await.unwrap().unwrap(),
            b"replayed payload"
        );
        assert!(!stage.exists(), "replayed stage must be cleared");
    }

    #[tokio::test]
    async fn uncommitted_stage_is_discarded_on_open() {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::open(tmp.path(), NS).await.unwrap();

        // A stage with payloads but no manifest: crash before commit point.
        let stage = tmp.path().join(NS).join(TXN_DIR).join("abandoned-txn");
        std::fs::create_dir_all(&stage).unwrap();
        std::fs::write(stage.join("p0"), b"should never land").unwrap();
        drop(store);

        let store = BlobStore::open(tmp.path(), NS).await.unwrap();
        assert!(store.list_keys(Collection::Files).await.unwrap().is_empty());
        assert!(!stage.exists(), "abandoned stage must be cleared");
    }
}
