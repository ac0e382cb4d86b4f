// src/object_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Provider capability interface. The export pipeline only ever talks to `dyn ObjectStore`,
// so it stays provider-agnostic:
//   - put      upload one object from a streaming body
//   - compose  merge up to COMPOSITION_BATCH_LIMIT existing objects into a new one
//   - copy     server-side copy (rename = copy + delete)
//   - delete   remove one object
//   - list     object names starting with a prefix
//
// Supported providers: gcs (gs://), file (local directory tree).

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::error::ExportError;

/// A cloud storage provider the exporter can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gcs,
    File,
}

impl Provider {
    /// URI scheme used when rendering object locations in logs.
    pub fn scheme(&self) -> &'static str {
        match self {
            Provider::Gcs => "gs",
            Provider::File => "file",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gcs => write!(f, "gcs"),
            Provider::File => write!(f, "file"),
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcs" => Ok(Provider::Gcs),
            "file" => Ok(Provider::File),
            _ => Err(anyhow!("unsupported provider: {}", s)),
        }
    }
}

/// How a provider implements compose.
///
/// `DownloadMerge` providers read every source back and rewrite the merged bytes, so
/// composition costs a full pass over the data instead of a metadata operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeSupport {
    Native,
    DownloadMerge,
}

/// Bucket + object name reference used for every provider call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub bucket: String,
    pub name: String,
}

impl ObjectHandle {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}

pub type BoxedReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Streaming body of a `put`.
pub struct ObjectBody {
    pub reader: BoxedReader,
    /// Exact number of bytes the reader yields.
    pub size: u64,
    /// Copy buffer size for moving bytes from `reader` to the provider.
    pub buffer_size: usize,
}

impl ObjectBody {
    pub fn new<R>(reader: R, size: u64, buffer_size: usize) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            size,
            buffer_size: buffer_size.max(1),
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("reader", &"dyn AsyncRead")
            .field("size", &self.size)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

/// ObjectStore trait for pluggable storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn provider(&self) -> Provider;

    fn compose_support(&self) -> ComposeSupport;

    /// Upload an object from a streaming body.
    async fn put(&self, handle: &ObjectHandle, body: ObjectBody) -> Result<()>;

    /// Concatenate `sources` (in order) into `target`, all within `bucket`.
    async fn compose(&self, bucket: &str, sources: &[String], target: &str) -> Result<()>;

    /// Copy one object to another name.
    async fn copy(&self, src: &ObjectHandle, dst: &ObjectHandle) -> Result<()>;

    /// Delete a single object. Deleting a missing object is an error.
    async fn delete(&self, handle: &ObjectHandle) -> Result<()>;

    /// Names of every object in `bucket` starting with `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Object stores lack a native rename: copy to the new name, then delete the old one.
    async fn rename(&self, src: &ObjectHandle, dst: &ObjectHandle) -> Result<()> {
        self.copy(src, dst)
            .await
            .with_context(|| format!("failed to rename object {} -> {}", src.name, dst.name))?;
        self.delete(src).await
    }

    /// Human-readable location, e.g. `gs://bucket/name.tar.gz`.
    fn uri(&self, handle: &ObjectHandle) -> String {
        format!("{}://{}/{}", self.provider().scheme(), handle.bucket, handle.name)
    }
}

/// Run a provider call unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => bail!(ExportError::Cancelled),
        res = fut => res,
    }
}

/// Build the store for `provider`. The `file` provider needs a root directory.
pub async fn store_for_provider(provider: Provider, root: Option<&Path>) -> Result<Arc<dyn ObjectStore>> {
    match provider {
        Provider::Gcs => Ok(Arc::new(crate::gcs_client::GcsObjectStore::new().await?)),
        Provider::File => {
            let root = root.ok_or_else(|| anyhow!("file provider requires a root directory"))?;
            Ok(Arc::new(crate::file_store::FileSystemObjectStore::new(root)))
        }
    }
}
