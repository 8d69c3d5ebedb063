//! Persisted document shapes and operation result types.
//!
//! The on-disk JSON uses camelCase field names; missing fields deserialize
//! to defaults so older documents load and are then migrated explicitly by
//! the metadata index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Persisted: metadata index ────────────────────────────────────────────────

/// One record per logical filename, kept in the encrypted metadata index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// MIME type of the current content
    pub mime: String,
    /// Version chain this record points at (UUID-formatted)
    pub chain_id: String,
    /// Latest persisted version number; 0 before the first write
    #[serde(default)]
    pub head_version: u64,
    /// Millisecond epoch of the last committed write
    #[serde(default)]
    pub last_modified: u64,
    /// Plaintext size of the head version
    #[serde(default)]
    pub last_size: u64,
    /// Compressed size of the head version
    #[serde(default)]
    pub last_compressed_size: u64,
    /// Blob key of the head version's ciphertext, if any
    #[serde(default)]
    pub active_key: Option<String>,
}

/// The whole metadata index document, stored encrypted at `meta/index`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDoc {
    #[serde(default)]
    pub files: BTreeMap<String, FileRecord>,
    #[serde(default)]
    pub schema_version: u32,
    /// Millisecond epoch of the last index rewrite
    #[serde(default)]
    pub last_saved: u64,
}

// ── Persisted: version chains ────────────────────────────────────────────────

/// One committed write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    /// 1-based, monotone per file
    pub version: u64,
    /// BLAKE3 of the plaintext content (hex)
    pub hash: String,
    /// Ed25519 signature of `hash` (hex)
    pub sig: String,
    /// Blob key locating the encrypted-compressed payload
    pub key: String,
    /// Plaintext length
    pub size: u64,
    /// Millisecond epoch
    pub ts: u64,
}

/// Pruning bookkeeping for a chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrunedInfo {
    /// How many historical entries have been dropped
    #[serde(default)]
    pub count: u64,
    /// Smallest retained version number (0 while nothing was pruned)
    #[serde(default)]
    pub oldest_kept: u64,
}

/// The ordered version history of one logical file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    #[serde(default)]
    pub pruned: PrunedInfo,
    /// BLAKE3 over the domain-separated concatenation of version hashes.
    /// Absent only on legacy chains, which are upgraded on first access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_hash: Option<String>,
    /// Ed25519 signature of `chain_hash`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_sig: Option<String>,
}

impl Chain {
    /// A fresh, never-written chain.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The latest version entry, if any.
    pub fn head(&self) -> Option<&VersionEntry> {
        self.versions.last()
    }

    /// Find a retained entry by version number.
    pub fn find_version(&self, version: u64) -> Option<&VersionEntry> {
        self.versions.iter().find(|e| e.version == version)
    }

    /// First and last retained version numbers; `(0, 0)` when empty.
    pub fn version_range(&self) -> VersionRange {
        match (self.versions.first(), self.versions.last()) {
            (Some(first), Some(last)) => VersionRange {
                min: first.version,
                max: last.version,
            },
            _ => VersionRange { min: 0, max: 0 },
        }
    }
}

// ── Operation results ────────────────────────────────────────────────────────

/// Per-file summary returned by listing operations, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub name: String,
    pub mime: String,
    pub head_version: u64,
    pub last_size: u64,
    pub last_compressed_size: u64,
    pub last_modified: u64,
}

/// Vault/session fingerprint pair. `base` identifies the vault across
/// unlocks; `session` is unique per unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub base: String,
    pub session: String,
}

/// What `init` had to rebuild, surfaced so the host can inform the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInfo {
    /// The backing store failed its open or health probe and was recreated
    pub database_rebuilt: bool,
    /// The metadata index was invalid and rebuilt from surviving chains
    pub metadata_rebuilt: bool,
    /// Names synthesized during rebuild-from-chains
    pub recovered_files: Vec<String>,
}

impl RecoveryInfo {
    pub fn any(&self) -> bool {
        self.database_rebuilt || self.metadata_rebuilt || !self.recovered_files.is_empty()
    }
}

/// Inclusive range of retained version numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: u64,
    pub max: u64,
}

/// Result of `init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOutcome {
    pub files: Vec<FileSummary>,
    /// `{base, session}` hash pair, surfaced to hosts as `messageHash`
    pub fingerprint: Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryInfo>,
}

/// Result of `load`. The plaintext is owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedFile {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub size: u64,
    /// Version actually returned
    pub version: u64,
    /// Head version after the call (may differ from `version` after recovery)
    pub current_version: u64,
    pub available_versions: VersionRange,
    /// True when the head was corrupt and an earlier version was promoted
    #[serde(default)]
    pub recovered: bool,
}

/// Result of `save`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveOutcome {
    /// Content hash matched the head version; nothing was written (except a
    /// MIME update, when it differed)
    Unchanged,
    Written {
        version: u64,
        files: Vec<FileSummary>,
    },
}

/// Per-call overrides for `save`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOptions {
    /// Overrides `VaultConfig::version_limit` for this write
    #[serde(default)]
    pub version_limit: Option<usize>,
}

/// An item handed to `import-files` (`{name, bytes, type?}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportItem {
    pub name: String,
    pub bytes: Vec<u8>,
    /// MIME type; defaults to `application/octet-stream`
    #[serde(default, rename = "type")]
    pub mime: Option<String>,
}

/// Decoded file payload inside a successful import outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub size: u64,
}

/// Per-entry result of `import-zip` / `import-files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ImportedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of `integrity-check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Human-readable description of each problem found
    pub issues: Vec<String>,
    /// Files whose entire chain was unrecoverable and were removed
    pub files_removed: Vec<String>,
    /// Blobs referenced by no chain and no active key, deleted
    pub orphans_removed: u64,
}

/// Side-band progress message for long-running operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub operation_id: String,
    pub completed: u64,
    pub total: u64,
    pub current: String,
}
