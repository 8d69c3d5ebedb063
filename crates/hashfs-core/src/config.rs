//! Engine configuration.

use hashfs_crypto::KdfParams;
use serde::{Deserialize, Serialize};

use crate::{DEFAULT_CHAIN_CACHE_CAPACITY, DEFAULT_VERSION_LIMIT};

/// Tunables for one vault engine instance. All fields have sane defaults;
/// hosts usually construct this once and pass it to `init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Maximum retained versions per file (default: 15)
    pub version_limit: usize,
    /// Capacity of the per-vault chain LRU cache (default: 20)
    pub chain_cache_capacity: usize,
    /// Sweep unreferenced blobs during `init` instead of waiting for an
    /// explicit integrity-check (default: false)
    pub cleanup_orphans_on_init: bool,
    /// scrypt cost: log2 of the work factor N (default: 17)
    pub kdf_log_n: u8,
    /// scrypt block size (default: 8)
    pub kdf_r: u32,
    /// scrypt parallelism (default: 1)
    pub kdf_p: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        let kdf = KdfParams::default();
        Self {
            version_limit: DEFAULT_VERSION_LIMIT,
            chain_cache_capacity: DEFAULT_CHAIN_CACHE_CAPACITY,
            cleanup_orphans_on_init: false,
            kdf_log_n: kdf.log_n,
            kdf_r: kdf.r,
            kdf_p: kdf.p,
        }
    }
}

impl VaultConfig {
    /// The scrypt parameters this config selects.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            log_n: self.kdf_log_n,
            r: self.kdf_r,
            p: self.kdf_p,
        }
    }

    /// Config with the reduced-cost KDF profile. For tests only.
    pub fn with_fast_kdf() -> Self {
        let kdf = KdfParams::fast_insecure();
        Self {
            kdf_log_n: kdf.log_n,
            kdf_r: kdf.r,
            kdf_p: kdf.p,
            ..Self::default()
        }
    }
}
