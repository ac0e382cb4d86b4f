// src/exporter.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Exporter: the only surface callers need.
//
//   upload: stat -> size -> validate -> compress | chunk upload -> compose
//   delete: list prefix -> bounded delete

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytesize::ByteSize;
use tracing::{debug, info};

use crate::composer::Composer;
use crate::compress::spawn_compressor;
use crate::constants::PIPE_BUFFER_SIZE;
use crate::delete::delete_prefix;
use crate::dir_size::dir_size_async;
use crate::error::ExportError;
use crate::naming::final_name;
use crate::object_store::{store_for_provider, ObjectHandle, ObjectStore, Provider};
use crate::options::{DeleteOptions, UploadOptions};
use crate::progress::{spawn_reporter, ExportObserver, LogObserver, ProgressState};
use crate::uploader::ChunkUploader;

/// One upload call: where from, where to, and how.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub source: PathBuf,
    pub bucket: String,
    pub name: String,
    pub options: UploadOptions,
}

impl ExportJob {
    pub fn new(source: impl AsRef<Path>, bucket: &str, name: &str, options: UploadOptions) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            bucket: bucket.to_string(),
            name: name.to_string(),
            options,
        }
    }
}

#[derive(Clone)]
pub struct Exporter {
    store: Arc<dyn ObjectStore>,
    observer: Arc<dyn ExportObserver>,
}

impl Exporter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            observer: Arc::new(LogObserver),
        }
    }

    /// Build an exporter for `provider`; `root` is only used by the file provider.
    pub async fn from_provider(provider: Provider, root: Option<&Path>) -> Result<Self> {
        Ok(Self::new(store_for_provider(provider, root).await?))
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExportObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn provider(&self) -> Provider {
        self.store.provider()
    }

    /// Archive `dir` as `<name>.tar.gz` (or `<name>-part-N.tar.gz`) in `bucket`.
    /// Returns the names of the final objects.
    pub async fn upload(
        &self,
        dir: impl AsRef<Path>,
        bucket: &str,
        name: &str,
        options: UploadOptions,
    ) -> Result<Vec<String>> {
        self.run(ExportJob::new(dir, bucket, name, options)).await
    }

    pub async fn run(&self, job: ExportJob) -> Result<Vec<String>> {
        let opts = &job.options;

        let meta = tokio::fs::metadata(&job.source)
            .await
            .with_context(|| format!("cannot stat directory {:?}", job.source))?;
        if !meta.is_dir() {
            bail!(ExportError::NotADirectory(job.source.clone()));
        }

        let total_size = dir_size_async(job.source.clone())
            .await
            .context("failed to calculate directory size")?;
        opts.validate(total_size)?;

        let target = ObjectHandle::new(&job.bucket, final_name(&job.name));
        info!(
            size = %ByteSize(total_size),
            source = %job.source.display(),
            target = %self.store.uri(&target),
            "start compressing and uploading"
        );

        // The caller's token reaches every provider call. The child token lives as long as
        // this job; the guard cancels it on every exit path, which stops the reporter.
        let cancel = opts.cancel.clone().unwrap_or_default();
        let job_token = cancel.child_token();
        let _stop_reporter = job_token.clone().drop_guard();

        let state = Arc::new(ProgressState::new());
        let _reporter = spawn_reporter(
            Arc::clone(&state),
            total_size,
            opts.report_period,
            Arc::clone(&self.observer),
            job_token,
        );

        let (writer, reader) = tokio::io::duplex(PIPE_BUFFER_SIZE);
        let compressor = spawn_compressor(job.source.clone(), writer);

        let uploader = ChunkUploader::new(
            Arc::clone(&self.store),
            Arc::clone(&self.observer),
            Arc::clone(&state),
            opts,
            cancel.clone(),
        );
        // `reader` is consumed here, so an early return unblocks the compressor.
        let uploaded = uploader.upload(reader, &job.bucket, &job.name).await;

        // A failed walk only truncates the pipe; it must stop us before composing.
        let compressed = compressor.await.context("compressor task failed")?;
        let chunks = uploaded?;
        compressed.context("failed to compress directory")?;
        debug!(chunks = chunks.len(), "all chunk uploads finished");

        let composer = Composer::new(
            Arc::clone(&self.store),
            Arc::clone(&self.observer),
            job.bucket.as_str(),
            opts.concurrent_jobs,
            cancel,
        );
        let finals = composer.compose_parts(&job.name, chunks, total_size, opts).await?;

        info!(objects = finals.len(), "upload complete");
        Ok(finals)
    }

    /// Delete every object in `bucket` whose name starts with `name`.
    pub async fn delete(&self, bucket: &str, name: &str, options: DeleteOptions) -> Result<()> {
        options.validate()?;
        let cancel = options.cancel.clone().unwrap_or_default();
        delete_prefix(self.store.as_ref(), bucket, name, options.concurrent_jobs, &cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_store::FileSystemObjectStore;
    use tempfile::TempDir;

    fn exporter(root: &Path) -> Exporter {
        Exporter::new(Arc::new(FileSystemObjectStore::new(root)))
    }

    #[tokio::test]
    async fn test_upload_rejects_missing_source() -> Result<()> {
        let tmp = TempDir::new()?;
        let err = exporter(tmp.path())
            .upload(tmp.path().join("nope"), "bkt", "snap", UploadOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot stat directory"));
        Ok(())
    }

    #[tokio::test]
    async fn test_upload_rejects_file_source() -> Result<()> {
        let tmp = TempDir::new()?;
        let file = tmp.path().join("plain.txt");
        std::fs::write(&file, b"data")?;

        let err = exporter(tmp.path())
            .upload(&file, "bkt", "snap", UploadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::NotADirectory(_))
        ));
        Ok(())
    }

    #[test]
    fn test_export_job_new() {
        let job = ExportJob::new("/data", "bkt", "snap", UploadOptions::default());
        assert_eq!(job.source, PathBuf::from("/data"));
        assert_eq!(job.bucket, "bkt");
        assert_eq!(job.name, "snap");
    }
}
