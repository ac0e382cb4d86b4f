// src/uploader.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Chunk uploader: cuts the compressed stream into ChunkSize blocks and uploads each block as
// a temporary object, with at most `concurrent_jobs` uploads in flight.
//
// The permit for a chunk is taken *before* the chunk is read, so when every slot is busy the
// read loop stalls, the pipe fills up and the compressor blocks behind it.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use bytesize::ByteSize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::ExportError;
use crate::naming::chunk_name;
use crate::object_store::{cancellable, ObjectBody, ObjectHandle, ObjectStore};
use crate::options::UploadOptions;
use crate::progress::{CountingReader, ExportObserver, ProgressState};

type ChunkOutcome = (String, Result<()>);

pub struct ChunkUploader {
    store: Arc<dyn ObjectStore>,
    observer: Arc<dyn ExportObserver>,
    state: Arc<ProgressState>,
    chunk_size: u64,
    buffer_size: usize,
    concurrent_jobs: usize,
    fail_fast: bool,
    cancel: CancellationToken,
}

impl ChunkUploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        observer: Arc<dyn ExportObserver>,
        state: Arc<ProgressState>,
        opts: &UploadOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            observer,
            state,
            chunk_size: opts.chunk_size.as_u64(),
            buffer_size: usize::try_from(opts.buffer_size.as_u64()).unwrap_or(usize::MAX),
            concurrent_jobs: opts.concurrent_jobs,
            fail_fast: opts.fail_fast,
            cancel,
        }
    }

    /// Upload `stream` as `<name>-part-<index>` objects in `bucket`.
    ///
    /// Returns every chunk name in stream order once all uploads have finished. A failed
    /// chunk is reported to the observer and otherwise ignored, unless `fail_fast` is set,
    /// in which case dispatching stops and `ExportError::ChunkUploadsFailed` is returned
    /// after in-flight uploads drain.
    pub async fn upload<R>(&self, mut stream: R, bucket: &str, name: &str) -> Result<Vec<String>>
    where
        R: AsyncRead + Unpin,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrent_jobs));
        let mut tasks: JoinSet<ChunkOutcome> = JoinSet::new();
        let mut names = Vec::new();
        let mut failed = Vec::new();

        loop {
            let permit = cancellable(&self.cancel, async {
                Ok::<_, anyhow::Error>(semaphore.clone().acquire_owned().await?)
            })
            .await?;

            while let Some(joined) = tasks.try_join_next() {
                self.record(joined, &mut failed);
            }
            if self.fail_fast && !failed.is_empty() {
                debug!("chunk failure seen, no further chunks will be dispatched");
                break;
            }

            let index = names.len();
            trace!(part_index = index, max_size = %ByteSize(self.chunk_size), "reading chunk");
            let chunk = cancellable(&self.cancel, self.read_chunk(&mut stream))
                .await
                .with_context(|| format!("error reading chunk {}", index))?;
            if chunk.is_empty() {
                break;
            }
            let last = (chunk.len() as u64) < self.chunk_size;
            self.state.add_compressed(chunk.len() as u64);

            let object = chunk_name(name, index);
            names.push(object.clone());
            self.spawn_put(&mut tasks, permit, ObjectHandle::new(bucket, object), chunk);

            if last {
                break;
            }
        }

        while let Some(joined) = tasks.join_next().await {
            self.record(joined, &mut failed);
        }

        if self.cancel.is_cancelled() {
            bail!(ExportError::Cancelled);
        }
        if self.fail_fast && !failed.is_empty() {
            failed.sort();
            bail!(ExportError::ChunkUploadsFailed(failed));
        }
        Ok(names)
    }

    /// Read up to `chunk_size` bytes; a short result means the stream has ended.
    async fn read_chunk<R>(&self, stream: &mut R) -> Result<Bytes>
    where
        R: AsyncRead + Unpin,
    {
        let capacity = usize::try_from(self.chunk_size).unwrap_or(usize::MAX);
        let mut buf = Vec::with_capacity(capacity.min(64 * 1024 * 1024));
        (&mut *stream).take(self.chunk_size).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    fn spawn_put(
        &self,
        tasks: &mut JoinSet<ChunkOutcome>,
        permit: tokio::sync::OwnedSemaphorePermit,
        handle: ObjectHandle,
        chunk: Bytes,
    ) {
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        let buffer_size = self.buffer_size;

        tasks.spawn(async move {
            let _permit = permit;
            let size = chunk.len() as u64;
            debug!(part = %handle.name, size = %ByteSize(size), "starting part upload");

            let body = ObjectBody::new(CountingReader::new(Cursor::new(chunk), state), size, buffer_size);
            let res = cancellable(&cancel, store.put(&handle, body)).await;

            debug!(part = %handle.name, size = %ByteSize(size), ok = res.is_ok(), "finish uploading part");
            (handle.name, res)
        });
    }

    fn record(&self, joined: Result<ChunkOutcome, JoinError>, failed: &mut Vec<String>) {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((object, Err(e))) => {
                if !is_cancelled(&e) {
                    self.observer.on_chunk_failed(&object, &e);
                }
                failed.push(object);
            }
            Err(e) => {
                let err = anyhow::Error::new(e).context("chunk upload task panicked");
                self.observer.on_chunk_failed("<unknown>", &err);
                failed.push("<unknown>".to_string());
            }
        }
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<ExportError>(), Some(ExportError::Cancelled))
}
