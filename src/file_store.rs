// src/file_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// FileSystemObjectStore: the ObjectStore interface over a local directory tree.
//
// Layout:
// - object `<bucket>/<name>` lives at `<root>/<bucket>/<name>`
// - names may contain '/', parent directories are created on demand
//
// There is no server-side compose here: sources are read back and concatenated into a
// staging file which is then renamed over the target (ComposeSupport::DownloadMerge).

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::constants::COMPOSITION_BATCH_LIMIT;
use crate::object_store::{ComposeSupport, ObjectBody, ObjectHandle, ObjectStore, Provider};

/// Directory (under the root) holding in-progress compositions.
const STAGING_DIR: &str = ".staging";

#[derive(Debug)]
pub struct FileSystemObjectStore {
    root: PathBuf,
    staging_seq: AtomicU64,
}

impl FileSystemObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            staging_seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        if bucket.is_empty() || bucket == STAGING_DIR || !is_plain_relative(Path::new(bucket)) {
            bail!("invalid bucket name: {:?}", bucket);
        }
        Ok(self.root.join(bucket))
    }

    /// Map an object to its path, refusing names that would escape the bucket.
    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf> {
        if name.is_empty() || !is_plain_relative(Path::new(name)) {
            bail!("invalid object name: {:?}", name);
        }
        Ok(self.bucket_path(bucket)?.join(name))
    }

    fn staging_path(&self) -> PathBuf {
        let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(STAGING_DIR)
            .join(format!("{}-{}", std::process::id(), seq))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn concat_into(&self, bucket: &str, sources: &[String], staging: &Path) -> Result<u64> {
        let mut out = fs::File::create(staging).await?;
        let mut total = 0u64;
        for src in sources {
            let path = self.object_path(bucket, src)?;
            let mut input = fs::File::open(&path)
                .await
                .with_context(|| format!("compose source {}/{} not found", bucket, src))?;
            total += tokio::io::copy(&mut input, &mut out).await?;
        }
        out.flush().await?;
        out.sync_all().await?;
        Ok(total)
    }
}

/// True when the path only has normal components (no `..`, no root).
fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    fn provider(&self) -> Provider {
        Provider::File
    }

    fn compose_support(&self) -> ComposeSupport {
        ComposeSupport::DownloadMerge
    }

    fn uri(&self, handle: &ObjectHandle) -> String {
        format!("file://{}", self.root.join(&handle.bucket).join(&handle.name).display())
    }

    async fn put(&self, handle: &ObjectHandle, body: ObjectBody) -> Result<()> {
        let path = self.object_path(&handle.bucket, &handle.name)?;
        Self::ensure_parent(&path).await?;

        let mut file = fs::File::create(&path).await?;
        let mut reader = BufReader::with_capacity(body.buffer_size, body.reader);
        let written = tokio::io::copy_buf(&mut reader, &mut file).await?;
        file.flush().await?;

        if written != body.size {
            bail!(
                "short write for {}: expected {} bytes, wrote {}",
                handle, body.size, written
            );
        }
        trace!("FILE PUT {} ({} bytes)", path.display(), written);
        Ok(())
    }

    async fn compose(&self, bucket: &str, sources: &[String], target: &str) -> Result<()> {
        if sources.is_empty() {
            bail!("compose into {} requires at least one source", target);
        }
        if sources.len() > COMPOSITION_BATCH_LIMIT {
            bail!(
                "compose accepts at most {} sources, got {}",
                COMPOSITION_BATCH_LIMIT,
                sources.len()
            );
        }
        let target_path = self.object_path(bucket, target)?;
        let staging = self.staging_path();
        Self::ensure_parent(&staging).await?;

        let total = match self.concat_into(bucket, sources, &staging).await {
            Ok(total) => total,
            Err(e) => {
                let _ = fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        Self::ensure_parent(&target_path).await?;
        fs::rename(&staging, &target_path).await?;
        debug!("FILE COMPOSE {} sources -> {} ({} bytes)", sources.len(), target, total);
        Ok(())
    }

    async fn copy(&self, src: &ObjectHandle, dst: &ObjectHandle) -> Result<()> {
        let from = self.object_path(&src.bucket, &src.name)?;
        let to = self.object_path(&dst.bucket, &dst.name)?;
        if !fs::try_exists(&from).await? {
            bail!("object not found: {}", src);
        }
        Self::ensure_parent(&to).await?;
        fs::copy(&from, &to).await?;
        Ok(())
    }

    async fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        let path = self.object_path(&handle.bucket, &handle.name)?;
        fs::remove_file(&path)
            .await
            .with_context(|| format!("failed to delete {}", handle))?;
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let base = self.bucket_path(bucket)?;
        if !fs::try_exists(&base).await? {
            bail!("bucket not found: {}", bucket);
        }
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut names = Vec::new();
            for entry in WalkDir::new(&base).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry.path().strip_prefix(&base)?;
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.starts_with(&prefix) {
                    names.push(name);
                }
            }
            names.sort();
            Ok(names)
        })
        .await?
    }
}
