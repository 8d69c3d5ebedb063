//! The serialized dispatcher.
//!
//! One task owns the engine and drains a FIFO queue; at most one operation
//! is ever in flight, so the engine itself needs no locking. A caller that
//! drops its reply handle does not cancel the operation — the task drives
//! it to completion to keep the vault's invariants.

use secrecy::SecretString;
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use hashfs_core::types::ProgressEvent;
use hashfs_core::{VaultConfig, VaultError, VaultResult};

use crate::request::{VaultRequest, VaultResponse};
use crate::vault::Vault;

struct Envelope {
    request: VaultRequest,
    reply: oneshot::Sender<VaultResult<VaultResponse>>,
}

/// Handle to a spawned vault engine task. Cloneable; all clones feed the
/// same FIFO queue. Dropping every handle stops the engine and zeroizes
/// the session keys.
#[derive(Clone)]
pub struct VaultHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl VaultHandle {
    /// Spawn the engine task for vaults stored under `base_dir`. Returns
    /// the handle plus the side-band progress event receiver.
    pub fn spawn(
        base_dir: PathBuf,
        config: VaultConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_engine(base_dir, config, rx, progress_tx));
        (Self { tx }, progress_rx)
    }

    /// Enqueue a request and await its result.
    pub async fn request(&self, request: VaultRequest) -> VaultResult<VaultResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                reply: reply_tx,
            })
            .map_err(|_| VaultError::StoreUnavailable("engine task stopped".into()))?;
        reply_rx
            .await
            .map_err(|_| VaultError::StoreUnavailable("engine dropped the request".into()))?
    }

    /// Convenience: unlock the vault.
    pub async fn init(&self, passphrase: impl Into<String>) -> VaultResult<VaultResponse> {
        self.request(VaultRequest::Init {
            passphrase: passphrase.into(),
        })
        .await
    }
}

async fn run_engine(
    base_dir: PathBuf,
    config: VaultConfig,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    progress: mpsc::UnboundedSender<ProgressEvent>,
) {
    let mut vault: Option<Vault> = None;
    while let Some(Envelope { request, reply }) = rx.recv().await {
        let result = handle(&base_dir, &config, &progress, &mut vault, request).await;
        // The caller may have gone away; the operation already ran to
        // completion either way.
        let _ = reply.send(result);
    }
    debug!("engine task stopping, session keys dropped");
}

async fn handle(
    base_dir: &std::path::Path,
    config: &VaultConfig,
    progress: &mpsc::UnboundedSender<ProgressEvent>,
    vault: &mut Option<Vault>,
    request: VaultRequest,
) -> VaultResult<VaultResponse> {
    let request = match request {
        VaultRequest::Init { passphrase } => {
            let passphrase = SecretString::from(passphrase);
            let (engine, outcome) = Vault::init(
                &passphrase,
                base_dir,
                config.clone(),
                Some(progress.clone()),
            )
            .await?;
            *vault = Some(engine);
            return Ok(VaultResponse::Init(outcome));
        }
        other => other,
    };

    let engine = vault.as_mut().ok_or(VaultError::Unauthenticated)?;
    match request {
        VaultRequest::Init { .. } => unreachable!("handled above"),
        VaultRequest::Load {
            filename,
            version,
            validate,
        } => engine
            .load(&filename, version, validate)
            .await
            .map(VaultResponse::Loaded),
        VaultRequest::Save {
            filename,
            bytes,
            mime,
            options,
        } => engine
            .save(&filename, &bytes, mime.as_deref(), options)
            .await
            .map(VaultResponse::Saved),
        VaultRequest::Delete { filename } => {
            engine.delete(&filename).await.map(VaultResponse::Files)
        }
        VaultRequest::Rename { old_name, new_name } => engine
            .rename(&old_name, &new_name)
            .await
            .map(VaultResponse::Files),
        VaultRequest::ExportZip { operation_id } => engine
            .export_zip(operation_id.as_deref())
            .await
            .map(VaultResponse::Zip),
        VaultRequest::ImportZip {
            bytes,
            operation_id,
        } => engine
            .import_zip(&bytes, operation_id.as_deref())
            .await
            .map(VaultResponse::Imported),
        VaultRequest::ImportFiles {
            items,
            operation_id,
        } => engine
            .import_files(items, operation_id.as_deref())
            .await
            .map(VaultResponse::Imported),
        VaultRequest::GetFiles => Ok(VaultResponse::Files(engine.summaries())),
        VaultRequest::IntegrityCheck { operation_id } => engine
            .integrity_check(operation_id.as_deref())
            .await
            .map(VaultResponse::Integrity),
    }
}
