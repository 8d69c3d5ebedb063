//! The typed request/response vocabulary of the engine.
//!
//! Hosts speak to the vault in tagged messages; every request maps to one
//! engine operation and yields either a typed response or a `VaultError`.

use serde::{Deserialize, Serialize};

use hashfs_core::types::{
    FileSummary, ImportItem, ImportOutcome, InitOutcome, IntegrityReport, LoadedFile, SaveOptions,
    SaveOutcome,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VaultRequest {
    /// Unlock the vault. Must precede every other request.
    Init { passphrase: String },
    #[serde(rename_all = "camelCase")]
    Load {
        filename: String,
        #[serde(default)]
        version: Option<u64>,
        #[serde(default)]
        validate: bool,
    },
    #[serde(rename_all = "camelCase")]
    Save {
        filename: String,
        bytes: Vec<u8>,
        #[serde(default)]
        mime: Option<String>,
        #[serde(default)]
        options: SaveOptions,
    },
    #[serde(rename_all = "camelCase")]
    Delete { filename: String },
    #[serde(rename_all = "camelCase")]
    Rename { old_name: String, new_name: String },
    #[serde(rename_all = "camelCase")]
    ExportZip {
        #[serde(default)]
        operation_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ImportZip {
        bytes: Vec<u8>,
        #[serde(default)]
        operation_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ImportFiles {
        items: Vec<ImportItem>,
        #[serde(default)]
        operation_id: Option<String>,
    },
    GetFiles,
    #[serde(rename_all = "camelCase")]
    IntegrityCheck {
        #[serde(default)]
        operation_id: Option<String>,
    },
}

/// Externally tagged (`{"loaded": {...}}`) since several variants carry
/// bare sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VaultResponse {
    Init(InitOutcome),
    Loaded(LoadedFile),
    Saved(SaveOutcome),
    /// Result of delete, rename, and get-files
    Files(Vec<FileSummary>),
    Zip(Vec<u8>),
    Imported(Vec<ImportOutcome>),
    Integrity(IntegrityReport),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_tagged_kebab_case() {
        let json = serde_json::to_string(&VaultRequest::GetFiles).unwrap();
        assert_eq!(json, r#"{"type":"get-files"}"#);

        let json = serde_json::to_string(&VaultRequest::IntegrityCheck { operation_id: None })
            .unwrap();
        assert!(json.contains(r#""type":"integrity-check""#));
    }

    #[test]
    fn load_request_parses_with_optional_fields_absent() {
        let parsed: VaultRequest =
            serde_json::from_str(r#"{"type":"load","filename":"a.txt"}"#).unwrap();
        match parsed {
            VaultRequest::Load {
                filename,
                version,
                validate,
            } => {
                assert_eq!(filename, "a.txt");
                assert!(version.is_none());
                assert!(!validate);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn save_request_roundtrip() {
        let request = VaultRequest::Save {
            filename: "notes.md".into(),
            bytes: b"hello".to_vec(),
            mime: Some("text/markdown".into()),
            options: SaveOptions {
                version_limit: Some(3),
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"save""#));
        assert!(json.contains("versionLimit"));
        let back: VaultRequest = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, VaultRequest::Save { .. }));
    }
}
