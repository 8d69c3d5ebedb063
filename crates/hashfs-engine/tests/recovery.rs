//! Pruning, head-corruption recovery, and init-time rebuild tests.

use secrecy::SecretString;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hashfs_core::types::SaveOptions;
use hashfs_core::{VaultConfig, VaultError};
use hashfs_engine::Vault;

async fn unlock(dir: &Path, passphrase: &str) -> Vault {
    let (vault, _) = Vault::init(
        &SecretString::from(passphrase),
        dir,
        VaultConfig::with_fast_kdf(),
        None,
    )
    .await
    .expect("init should succeed");
    vault
}

fn files_dir(base: &Path, namespace: &str) -> PathBuf {
    base.join(namespace).join("files")
}

fn blob_keys(base: &Path, namespace: &str) -> BTreeSet<String> {
    std::fs::read_dir(files_dir(base, namespace))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn pruning_keeps_only_the_newest_versions() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "pruning passphrase").await;
    let limit = SaveOptions {
        version_limit: Some(3),
    };

    for v in 1..=5 {
        vault
            .save("p", format!("v{v}").as_bytes(), None, limit)
            .await
            .unwrap();
    }

    let latest = vault.load("p", None, false).await.unwrap();
    assert_eq!(latest.version, 5);
    assert_eq!(latest.available_versions.min, 3);
    assert_eq!(latest.available_versions.max, 5);

    let err = vault.load("p", Some(1), false).await.unwrap_err();
    assert!(matches!(
        err,
        VaultError::VersionNotFound { version: 1, .. }
    ));

    let oldest_kept = vault.load("p", Some(3), false).await.unwrap();
    assert_eq!(oldest_kept.bytes, b"v3");

    // Pruned blobs were actually deleted from the store
    let keys = blob_keys(tmp.path(), &vault.namespace());
    assert_eq!(keys.len(), 3);
}

#[tokio::test]
async fn corrupt_head_recovers_to_previous_version() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "head recovery passphrase").await;
    let namespace = vault.namespace();

    vault.save("a.txt", b"hello", None, SaveOptions::default()).await.unwrap();
    let after_v1 = blob_keys(tmp.path(), &namespace);
    vault.save("a.txt", b"hello world", None, SaveOptions::default()).await.unwrap();
    let after_v2 = blob_keys(tmp.path(), &namespace);

    // Delete the head version's blob directly
    let head_key = after_v2.difference(&after_v1).next().unwrap().clone();
    std::fs::remove_file(files_dir(tmp.path(), &namespace).join(&head_key)).unwrap();

    let recovered = vault.load("a.txt", None, false).await.unwrap();
    assert!(recovered.recovered);
    assert_eq!(recovered.bytes, b"hello");
    assert_eq!(recovered.version, 1);
    assert_eq!(recovered.current_version, 1);

    // The demotion was persisted: a fresh session agrees
    drop(vault);
    let mut vault = unlock(tmp.path(), "head recovery passphrase").await;
    let summaries = vault.summaries();
    assert_eq!(summaries[0].head_version, 1);
    let loaded = vault.load("a.txt", None, false).await.unwrap();
    assert_eq!(loaded.bytes, b"hello");
    assert!(!loaded.recovered);
}

#[tokio::test]
async fn recovered_file_accepts_new_versions() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "recovery then save passphrase").await;
    let namespace = vault.namespace();

    vault.save("doc", b"one", None, SaveOptions::default()).await.unwrap();
    let after_v1 = blob_keys(tmp.path(), &namespace);
    vault.save("doc", b"two", None, SaveOptions::default()).await.unwrap();
    let after_v2 = blob_keys(tmp.path(), &namespace);

    let head_key = after_v2.difference(&after_v1).next().unwrap().clone();
    std::fs::remove_file(files_dir(tmp.path(), &namespace).join(&head_key)).unwrap();

    let recovered = vault.load("doc", None, false).await.unwrap();
    assert_eq!(recovered.version, 1);

    // The next write continues from the recovered head
    vault.save("doc", b"three", None, SaveOptions::default()).await.unwrap();
    let latest = vault.load("doc", None, false).await.unwrap();
    assert_eq!(latest.bytes, b"three");
    assert_eq!(latest.version, 2);
}

#[tokio::test]
async fn unrecoverable_file_is_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "unrecoverable passphrase").await;
    let namespace = vault.namespace();

    vault.save("only.md", b"single version", None, SaveOptions::default()).await.unwrap();
    // Remove its only blob
    for key in blob_keys(tmp.path(), &namespace) {
        std::fs::remove_file(files_dir(tmp.path(), &namespace).join(key)).unwrap();
    }

    let err = vault.load("only.md", None, false).await.unwrap_err();
    assert!(matches!(err, VaultError::FileCorrupt { .. }));
    assert!(vault.summaries().is_empty(), "record must be dropped");
}

#[tokio::test]
async fn historical_version_corruption_surfaces_directly() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "historical corruption passphrase").await;
    let namespace = vault.namespace();

    vault.save("h", b"first", None, SaveOptions::default()).await.unwrap();
    let after_v1 = blob_keys(tmp.path(), &namespace);
    vault.save("h", b"second", None, SaveOptions::default()).await.unwrap();

    // Remove version 1's blob; the head stays intact
    let v1_key = after_v1.iter().next().unwrap().clone();
    std::fs::remove_file(files_dir(tmp.path(), &namespace).join(&v1_key)).unwrap();

    let err = vault.load("h", Some(1), false).await.unwrap_err();
    assert!(matches!(err, VaultError::VersionCorrupt { version: 1, .. }));

    // Latest still loads fine
    let latest = vault.load("h", None, false).await.unwrap();
    assert_eq!(latest.bytes, b"second");
}

#[tokio::test]
async fn wrecked_metadata_index_rebuilds_from_chains() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "index rebuild passphrase").await;
    let namespace = vault.namespace();
    vault.save("important.md", b"precious bytes", None, SaveOptions::default()).await.unwrap();
    drop(vault);

    // Corrupt the stored index
    let index_path = tmp.path().join(&namespace).join("meta").join("index");
    std::fs::write(&index_path, b"garbage, not an encrypted index").unwrap();

    let (mut vault, outcome) = Vault::init(
        &SecretString::from("index rebuild passphrase"),
        tmp.path(),
        VaultConfig::with_fast_kdf(),
        None,
    )
    .await
    .unwrap();

    let recovery = outcome.recovery.expect("rebuild must be reported");
    assert!(recovery.metadata_rebuilt);
    assert_eq!(recovery.recovered_files.len(), 1);

    let name = recovery.recovered_files[0].clone();
    assert!(name.starts_with("recovered_"));
    let loaded = vault.load(&name, None, false).await.unwrap();
    assert_eq!(loaded.bytes, b"precious bytes");
    assert_eq!(loaded.mime, "text/markdown");
}

#[tokio::test]
async fn broken_store_is_recreated_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "store recovery passphrase").await;
    let namespace = vault.namespace();
    vault.save("lost.md", b"gone after recovery", None, SaveOptions::default()).await.unwrap();
    drop(vault);

    // Replace the files collection directory with a plain file so the
    // store cannot open it
    let files_path = tmp.path().join(&namespace).join("files");
    std::fs::remove_dir_all(&files_path).unwrap();
    std::fs::write(&files_path, b"in the way").unwrap();

    let (vault, outcome) = Vault::init(
        &SecretString::from("store recovery passphrase"),
        tmp.path(),
        VaultConfig::with_fast_kdf(),
        None,
    )
    .await
    .unwrap();

    let recovery = outcome.recovery.expect("database rebuild must be reported");
    assert!(recovery.database_rebuilt);
    assert!(vault.summaries().is_empty());
}
