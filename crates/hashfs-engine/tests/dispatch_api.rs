//! The request surface: authentication gating, FIFO ordering, progress
//! events.

use hashfs_core::types::SaveOptions;
use hashfs_core::{VaultConfig, VaultError};
use hashfs_engine::{VaultHandle, VaultRequest, VaultResponse};

fn spawn(dir: &std::path::Path) -> (VaultHandle, tokio::sync::mpsc::UnboundedReceiver<hashfs_core::types::ProgressEvent>) {
    VaultHandle::spawn(dir.to_path_buf(), VaultConfig::with_fast_kdf())
}

#[tokio::test]
async fn requests_before_init_are_unauthenticated() {
    let tmp = tempfile::tempdir().unwrap();
    let (handle, _progress) = spawn(tmp.path());

    let err = handle.request(VaultRequest::GetFiles).await.unwrap_err();
    assert!(matches!(err, VaultError::Unauthenticated));

    let err = handle
        .request(VaultRequest::Load {
            filename: "a.txt".into(),
            version: None,
            validate: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::Unauthenticated));
}

#[tokio::test]
async fn full_request_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let (handle, _progress) = spawn(tmp.path());

    let response = handle.init("dispatch test passphrase").await.unwrap();
    match response {
        VaultResponse::Init(outcome) => assert!(outcome.files.is_empty()),
        other => panic!("expected init response, got {other:?}"),
    }

    let response = handle
        .request(VaultRequest::Save {
            filename: "queued.md".into(),
            bytes: b"through the queue".to_vec(),
            mime: Some("text/markdown".into()),
            options: SaveOptions::default(),
        })
        .await
        .unwrap();
    assert!(matches!(response, VaultResponse::Saved(_)));

    let response = handle
        .request(VaultRequest::Load {
            filename: "queued.md".into(),
            version: None,
            validate: false,
        })
        .await
        .unwrap();
    match response {
        VaultResponse::Loaded(file) => {
            assert_eq!(file.bytes, b"through the queue");
            assert_eq!(file.version, 1);
        }
        other => panic!("expected loaded response, got {other:?}"),
    }

    let response = handle.request(VaultRequest::GetFiles).await.unwrap();
    match response {
        VaultResponse::Files(files) => assert_eq!(files.len(), 1),
        other => panic!("expected files response, got {other:?}"),
    }
}

#[tokio::test]
async fn requests_are_served_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let (handle, _progress) = spawn(tmp.path());
    handle.init("fifo passphrase").await.unwrap();

    // Fire a burst of writes to the same file without awaiting in between;
    // FIFO serialization must produce consecutive versions.
    let mut pending = Vec::new();
    for i in 1..=4u8 {
        let handle = handle.clone();
        pending.push(tokio::spawn(async move {
            handle
                .request(VaultRequest::Save {
                    filename: "contested.md".into(),
                    bytes: vec![i; 8],
                    mime: None,
                    options: SaveOptions::default(),
                })
                .await
        }));
    }
    for task in pending {
        task.await.unwrap().unwrap();
    }

    let response = handle
        .request(VaultRequest::Load {
            filename: "contested.md".into(),
            version: None,
            validate: true,
        })
        .await
        .unwrap();
    match response {
        VaultResponse::Loaded(file) => {
            assert_eq!(file.current_version, 4, "four writes, four versions");
        }
        other => panic!("expected loaded response, got {other:?}"),
    }
}

#[tokio::test]
async fn export_emits_progress_events() {
    let tmp = tempfile::tempdir().unwrap();
    let (handle, mut progress) = spawn(tmp.path());
    handle.init("progress passphrase").await.unwrap();

    for name in ["one.md", "two.md", "three.md"] {
        handle
            .request(VaultRequest::Save {
                filename: name.into(),
                bytes: name.as_bytes().to_vec(),
                mime: None,
                options: SaveOptions::default(),
            })
            .await
            .unwrap();
    }

    let response = handle
        .request(VaultRequest::ExportZip {
            operation_id: Some("op-42".into()),
        })
        .await
        .unwrap();
    assert!(matches!(response, VaultResponse::Zip(_)));

    let mut events = Vec::new();
    while let Ok(event) = progress.try_recv() {
        events.push(event);
    }
    assert!(!events.is_empty(), "export must emit progress");
    assert!(events.iter().all(|e| e.operation_id == "op-42"));
    assert!(events.iter().any(|e| e.completed == e.total));
    assert_eq!(events.last().unwrap().total, 3);
}

#[tokio::test]
async fn reinit_replaces_the_session() {
    let tmp = tempfile::tempdir().unwrap();
    let (handle, _progress) = spawn(tmp.path());

    handle.init("first session passphrase").await.unwrap();
    handle
        .request(VaultRequest::Save {
            filename: "mine.md".into(),
            bytes: b"first vault".to_vec(),
            mime: None,
            options: SaveOptions::default(),
        })
        .await
        .unwrap();

    // A different passphrase swaps in a different vault namespace
    let response = handle.init("second session passphrase").await.unwrap();
    match response {
        VaultResponse::Init(outcome) => assert!(outcome.files.is_empty()),
        other => panic!("expected init response, got {other:?}"),
    }
}
