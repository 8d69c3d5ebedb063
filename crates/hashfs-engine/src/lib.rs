//! hashfs-engine: the HashFS vault engine
//!
//! A passphrase unlocks a vault (`init`); files are then saved, loaded,
//! renamed, deleted, exported and imported through a single-owner engine.
//! Every write runs the hash → sign → compress → encrypt pipeline and lands
//! atomically; every read proves what it returns.
//!
//! Architecture:
//! ```text
//! VaultHandle (mpsc, FIFO)
//!   └── Vault ─── MetadataIndex (encrypted, meta/index)
//!         ├────── ChainManager + LRU cache (chains/<chain_id>)
//!         └────── BlobStore (files/<blob_key>, transactions)
//! ```

pub mod chain;
pub mod dispatch;
pub mod index;
pub mod interchange;
mod lru;
pub mod request;
pub mod vault;

pub use dispatch::VaultHandle;
pub use request::{VaultRequest, VaultResponse};
pub use vault::Vault;

use hashfs_core::VaultError;

/// Millisecond epoch timestamp.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Map a backing-store failure to its vault-level kind.
pub(crate) fn store_err(e: anyhow::Error) -> VaultError {
    VaultError::StoreUnavailable(format!("{e:#}"))
}
