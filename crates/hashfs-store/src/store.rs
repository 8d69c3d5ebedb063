//! Blob-per-file store with namespaced collections.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// The four collections of a vault namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Encrypted content blobs, keyed by blob key
    Files,
    /// The encrypted metadata index (`index`)
    Meta,
    /// Encrypted version chains, keyed by chain id
    Chains,
    /// Small bookkeeping values (creation time, schema version)
    Integrity,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Files,
        Collection::Meta,
        Collection::Chains,
        Collection::Integrity,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            Collection::Files => "files",
            Collection::Meta => "meta",
            Collection::Chains => "chains",
            Collection::Integrity => "integrity",
        }
    }

    pub(crate) fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "files" => Some(Collection::Files),
            "meta" => Some(Collection::Meta),
            "chains" => Some(Collection::Chains),
            "integrity" => Some(Collection::Integrity),
            _ => None,
        }
    }
}

/// Handle to one vault namespace on disk.
#[derive(Debug)]
pub struct BlobStore {
    root: PathBuf,
}

/// Keys map to filenames, so anything that could escape the collection
/// directory is rejected before touching the filesystem.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        anyhow::bail!("empty blob key");
    }
    if key.starts_with('.') || key.contains('/') || key.contains('\\') || key.contains("..") {
        anyhow::bail!("invalid blob key: {key:?}");
    }
    Ok(())
}

impl BlobStore {
    /// Open a namespace, creating its collection directories and replaying
    /// any committed-but-unapplied transaction journal.
    pub async fn open(base: &Path, namespace: &str) -> Result<Self> {
        let root = base.join(namespace);
        for collection in Collection::ALL {
            fs::create_dir_all(root.join(collection.dir_name()))
                .await
                .with_context(|| format!("creating collection dir: {}", collection.dir_name()))?;
        }
        let store = Self { root };
        store.recover_journal().await?;
        Ok(store)
    }

    /// Drop the whole namespace and recreate it empty. Used when the store
    /// fails to open or fails its health probe.
    pub async fn reset(base: &Path, namespace: &str) -> Result<Self> {
        let root = base.join(namespace);
        match fs::remove_dir_all(&root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("dropping namespace: {}", root.display()))
            }
        }
        Self::open(base, namespace).await
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path_for(&self, collection: Collection, key: &str) -> PathBuf {
        self.root.join(collection.dir_name()).join(key)
    }

    /// Read a blob. `Ok(None)` when the key is absent.
    pub async fn get(&self, collection: Collection, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        match fs::read(self.path_for(collection, key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading blob: {key}")),
        }
    }

    /// Write a blob atomically (temp → rename).
    pub async fn put(&self, collection: Collection, key: &str, data: &[u8]) -> Result<()> {
        validate_key(key)?;
        let path = self.path_for(collection, key);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data)
            .await
            .with_context(|| format!("writing blob tmp: {key}"))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("renaming blob into place: {key}"))?;
        Ok(())
    }

    /// Delete a blob. Deleting an absent key is a no-op.
    pub async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        validate_key(key)?;
        match fs::remove_file(self.path_for(collection, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting blob: {key}")),
        }
    }

    /// List every key in a collection, sorted. Transient `.tmp` files and
    /// hidden entries are skipped.
    pub async fn list_keys(&self, collection: Collection) -> Result<Vec<String>> {
        let dir = self.root.join(collection.dir_name());
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&dir)
            .await
            .with_context(|| format!("listing collection: {}", collection.dir_name()))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name.ends_with(".tmp") {
                continue;
            }
            keys.push(name);
        }
        keys.sort();
        Ok(keys)
    }
}
