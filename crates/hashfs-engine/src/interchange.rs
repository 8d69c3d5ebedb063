//! ZIP interchange sidecar.
//!
//! Exported archives carry one `.hashfs_meta.json` entry next to the file
//! entries: `{"mimes": {filename: mime, ...}}`. On import the sidecar's map
//! overrides the default MIME; without it everything imports as
//! `application/octet-stream`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use hashfs_core::types::{ImportOutcome, ImportedFile};
use hashfs_core::{VaultError, VaultResult};

/// Archive path of the MIME sidecar
pub const SIDECAR_NAME: &str = ".hashfs_meta.json";

/// MIME assumed for imported entries the sidecar does not cover
pub const OCTET_STREAM: &str = "application/octet-stream";

/// The sidecar document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SidecarMeta {
    #[serde(default)]
    pub mimes: BTreeMap<String, String>,
}

/// Serialize a MIME map into sidecar bytes.
pub fn sidecar_bytes(mimes: &BTreeMap<String, String>) -> VaultResult<Vec<u8>> {
    serde_json::to_vec(&SidecarMeta {
        mimes: mimes.clone(),
    })
    .map_err(|e| VaultError::StoreUnavailable(format!("sidecar serialization: {e}")))
}

/// Parse a sidecar entry. A malformed sidecar degrades to defaults rather
/// than failing the whole import.
pub fn parse_sidecar(bytes: &[u8]) -> SidecarMeta {
    match serde_json::from_slice(bytes) {
        Ok(meta) => meta,
        Err(e) => {
            warn!(error = %e, "malformed import sidecar, falling back to default MIME");
            SidecarMeta::default()
        }
    }
}

/// Build a successful import item.
pub fn import_item(name: String, bytes: Vec<u8>, mime: String) -> ImportOutcome {
    let size = bytes.len() as u64;
    ImportOutcome {
        name: name.clone(),
        success: true,
        data: Some(ImportedFile {
            filename: name,
            mime,
            bytes,
            size,
        }),
        error: None,
    }
}

/// Build a failed import item.
pub fn import_failure(name: String, error: impl Into<String>) -> ImportOutcome {
    ImportOutcome {
        name,
        success: false,
        data: None,
        error: Some(error.into()),
    }
}
