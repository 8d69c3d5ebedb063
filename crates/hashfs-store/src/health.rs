//! Store health probe.
//!
//! Writes a marker blob into `files`, reads it back, deletes it. Any
//! deviation means the namespace is damaged and should be recreated.

use anyhow::{Context, Result};

use crate::store::{BlobStore, Collection};

const PROBE_KEY: &str = "health-probe";

/// Run the write/read/delete probe against a namespace.
pub async fn probe(store: &BlobStore) -> Result<()> {
    let marker = uuid::Uuid::new_v4().to_string();

    store
        .put(Collection::Files, PROBE_KEY, marker.as_bytes())
        .await
        .context("health probe: write")?;

    let read_back = store
        .get(Collection::Files, PROBE_KEY)
        .await
        .context("health probe: read")?;
    if read_back.as_deref() != Some(marker.as_bytes()) {
        anyhow::bail!("health probe: marker mismatch");
    }

    store
        .delete(Collection::Files, PROBE_KEY)
        .await
        .context("health probe: delete")?;
    Ok(())
}

/// Non-panicking convenience wrapper.
pub async fn is_healthy(store: &BlobStore) -> bool {
    probe(store).await.is_ok()
}
