//! Integrity check: full-chain validation, unrecoverable-file removal,
//! orphan sweep.

use secrecy::SecretString;
use std::path::Path;

use hashfs_core::types::SaveOptions;
use hashfs_core::VaultConfig;
use hashfs_engine::Vault;

async fn unlock_with(dir: &Path, passphrase: &str, config: VaultConfig) -> Vault {
    let (vault, _) = Vault::init(&SecretString::from(passphrase), dir, config, None)
        .await
        .expect("init should succeed");
    vault
}

async fn unlock(dir: &Path, passphrase: &str) -> Vault {
    unlock_with(dir, passphrase, VaultConfig::with_fast_kdf()).await
}

#[tokio::test]
async fn healthy_vault_reports_clean() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "clean check passphrase").await;

    vault.save("a.md", b"alpha", None, SaveOptions::default()).await.unwrap();
    vault.save("b.md", b"beta", None, SaveOptions::default()).await.unwrap();

    let report = vault.integrity_check(None).await.unwrap();
    assert!(report.issues.is_empty());
    assert!(report.files_removed.is_empty());
    assert_eq!(report.orphans_removed, 0);
}

#[tokio::test]
async fn orphan_blobs_are_collected() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "orphan sweep passphrase").await;
    let namespace = vault.namespace();

    vault.save("kept.md", b"real content", None, SaveOptions::default()).await.unwrap();

    // Plant two stray blobs nothing references
    let files_dir = tmp.path().join(&namespace).join("files");
    std::fs::write(files_dir.join("orphan-one"), b"junk").unwrap();
    std::fs::write(files_dir.join("orphan-two"), b"more junk").unwrap();

    let report = vault.integrity_check(None).await.unwrap();
    assert_eq!(report.orphans_removed, 2);
    assert!(report.files_removed.is_empty());

    // The real file is untouched
    let loaded = vault.load("kept.md", None, false).await.unwrap();
    assert_eq!(loaded.bytes, b"real content");
    assert!(!files_dir.join("orphan-one").exists());
}

#[tokio::test]
async fn file_with_unreadable_chain_is_removed() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "broken chain passphrase").await;
    let namespace = vault.namespace();

    vault.save("doomed.md", b"chain will break", None, SaveOptions::default()).await.unwrap();
    vault.save("fine.md", b"still fine", None, SaveOptions::default()).await.unwrap();
    drop(vault);

    // Chain ids are opaque from out here, so wreck one of the two chains
    // and assert exactly that file (and only it) gets removed.
    let chains_dir = tmp.path().join(&namespace).join("chains");
    let chain_paths: Vec<_> = std::fs::read_dir(&chains_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(chain_paths.len(), 2);
    std::fs::write(&chain_paths[0], b"wrecked chain blob").unwrap();

    let mut vault = unlock(tmp.path(), "broken chain passphrase").await;
    let report = vault.integrity_check(None).await.unwrap();

    assert_eq!(report.files_removed.len(), 1);
    assert!(!report.issues.is_empty());

    let survivors = vault.summaries();
    assert_eq!(survivors.len(), 1);
    let survivor = survivors[0].name.clone();
    assert_ne!(survivor, report.files_removed[0]);
    let loaded = vault.load(&survivor, None, false).await.unwrap();
    assert!(!loaded.bytes.is_empty());
}

#[tokio::test]
async fn missing_blobs_are_reported_per_version() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "partial damage passphrase").await;
    let namespace = vault.namespace();

    vault.save("partial.md", b"version one", None, SaveOptions::default()).await.unwrap();
    let first_blob: Vec<_> = std::fs::read_dir(tmp.path().join(&namespace).join("files"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    vault.save("partial.md", b"version two", None, SaveOptions::default()).await.unwrap();

    // Destroy version 1's blob only
    std::fs::remove_file(&first_blob[0]).unwrap();

    let report = vault.integrity_check(None).await.unwrap();
    assert_eq!(report.issues.len(), 1);
    assert!(report.issues[0].contains("version 1"));
    assert!(
        report.files_removed.is_empty(),
        "a file with a healthy head must survive"
    );

    let loaded = vault.load("partial.md", None, false).await.unwrap();
    assert_eq!(loaded.bytes, b"version two");
}

#[tokio::test]
async fn init_can_sweep_orphans_when_configured() {
    let tmp = tempfile::tempdir().unwrap();
    let mut vault = unlock(tmp.path(), "init sweep passphrase").await;
    let namespace = vault.namespace();
    vault.save("real.md", b"content", None, SaveOptions::default()).await.unwrap();
    drop(vault);

    let files_dir = tmp.path().join(&namespace).join("files");
    std::fs::write(files_dir.join("stray"), b"junk").unwrap();

    let mut config = VaultConfig::with_fast_kdf();
    config.cleanup_orphans_on_init = true;
    let mut vault = unlock_with(tmp.path(), "init sweep passphrase", config).await;

    assert!(!files_dir.join("stray").exists(), "init must sweep the orphan");
    let loaded = vault.load("real.md", None, false).await.unwrap();
    assert_eq!(loaded.bytes, b"content");
}
