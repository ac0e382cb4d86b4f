// src/delete.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Delete engine: prefix listing plus bounded-concurrency deletion with aggregated failures.

use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::object_store::{cancellable, ObjectHandle, ObjectStore};

/// Delete every name in `names` from `bucket`, at most `concurrency` at a time.
///
/// Every deletion is attempted. Failures are collected into one
/// `ExportError::DeleteFailed`; objects that were deleted stay deleted.
pub async fn batch_delete(
    store: &dyn ObjectStore,
    bucket: &str,
    names: &[String],
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let results: Vec<(String, Result<()>)> = stream::iter(names)
        .map(|name| async move {
            debug!(object = %name, bucket = %bucket, "deleting object");
            let handle = ObjectHandle::new(bucket, name.as_str());
            (name.clone(), cancellable(cancel, store.delete(&handle)).await)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    if cancel.is_cancelled() {
        bail!(ExportError::Cancelled);
    }

    let mut failed = Vec::new();
    let mut errors = Vec::new();
    for (name, res) in results {
        if let Err(e) = res {
            errors.push(format!("failed to delete {}: {:#}", name, e));
            failed.push(name);
        }
    }
    if failed.is_empty() {
        return Ok(());
    }
    failed.sort();
    errors.sort();
    bail!(ExportError::DeleteFailed { failed, errors })
}

/// Delete every object in `bucket` whose name starts with `prefix`.
///
/// A prefix that matches nothing is not an error.
pub async fn delete_prefix(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let names = cancellable(cancel, store.list(bucket, prefix))
        .await
        .map_err(|e| e.context("failed to list objects"))?;

    if names.is_empty() {
        warn!("no objects found with prefix: {}", prefix);
        return Ok(());
    }

    info!(
        bucket = %bucket,
        name = %prefix,
        objects = names.len(),
        "deleting object(s) with name(prefix): {}", prefix
    );
    batch_delete(store, bucket, &names, concurrency, cancel).await
}
