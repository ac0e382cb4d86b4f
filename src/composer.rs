// src/composer.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Object composer: turns the ordered chunk objects into the deliverable object(s) and
// removes every temporary object along the way.
//
//   total <= size_limit      one `<name>.tar.gz`, batched compose
//   chunk == part            each chunk renamed to `<name>-part-<i>.tar.gz`
//   otherwise                groups of part/chunk chunks, each composed into one part
//
// Providers cap compose at COMPOSITION_BATCH_LIMIT sources per call. Longer lists go through
// rounds: batches are composed concurrently into `<target>-temp-<round>-<batch>`, the
// consumed inputs are deleted, and the shorter list is composed again.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::{COMPOSITION_BATCH_LIMIT, DELETE_CONCURRENCY_MULTIPLIER};
use crate::delete::batch_delete;
use crate::naming::{digit_count, final_name, part_name, round_name};
use crate::object_store::{cancellable, ComposeSupport, ObjectHandle, ObjectStore};
use crate::options::UploadOptions;
use crate::progress::ExportObserver;

/// Part size rounded up to the next multiple of `chunk`.
pub fn effective_part_size(chunk: u64, part: u64) -> u64 {
    match part % chunk {
        0 => part,
        rem => part + (chunk - rem),
    }
}

pub struct Composer {
    store: Arc<dyn ObjectStore>,
    observer: Arc<dyn ExportObserver>,
    bucket: String,
    concurrent_jobs: usize,
    cancel: CancellationToken,
}

impl Composer {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        observer: Arc<dyn ExportObserver>,
        bucket: impl Into<String>,
        concurrent_jobs: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            observer,
            bucket: bucket.into(),
            concurrent_jobs: concurrent_jobs.max(1),
            cancel,
        }
    }

    /// Produce the final object(s) for `name` from `chunks` and return their names.
    pub async fn compose_parts(
        &self,
        name: &str,
        chunks: Vec<String>,
        total_size: u64,
        opts: &UploadOptions,
    ) -> Result<Vec<String>> {
        if self.store.compose_support() == ComposeSupport::DownloadMerge {
            debug!(
                provider = %self.store.provider(),
                "provider composes by download-merge, composition rewrites every byte"
            );
        }

        if !opts.is_multi_part(total_size) {
            let target = final_name(name);
            info!(parts = chunks.len(), name = %target, "composing final file");
            self.compose_into_single_object(chunks, &target).await?;
            return Ok(vec![target]);
        }

        let chunk_size = opts.chunk_size.as_u64();
        if chunk_size == opts.part_size.as_u64() {
            info!(
                parts = chunks.len(),
                part_size = %opts.part_size,
                name = %format!("{}-part-N.tar.gz", name),
                "composing final file parts"
            );
            return self.rename_to_final_names(name, chunks).await;
        }

        let part_size = effective_part_size(chunk_size, opts.part_size.as_u64());
        if part_size != opts.part_size.as_u64() {
            warn!(
                part_size = %opts.part_size,
                new_size = %ByteSize(part_size),
                "adjusting part size to be a multiple of chunk-size"
            );
        }
        let chunks_per_part = (part_size / chunk_size) as usize;
        // Width follows count / chunks_per_part (integer division), which can be one digit
        // short of the highest index when the last part is partial.
        let width = digit_count(chunks.len() / chunks_per_part);

        info!(
            parts = chunks.len().div_ceil(chunks_per_part),
            part_size = %ByteSize(part_size),
            name = %format!("{}-part-N.tar.gz", name),
            "composing final file parts"
        );

        let mut finals = Vec::new();
        for (index, group) in chunks.chunks(chunks_per_part).enumerate() {
            let target = part_name(name, index, width);
            self.compose_into_single_object(group.to_vec(), &target).await?;
            finals.push(target);
        }
        Ok(finals)
    }

    /// Chunk size equals part size: every chunk already is a part, only its name changes.
    async fn rename_to_final_names(&self, name: &str, chunks: Vec<String>) -> Result<Vec<String>> {
        info!("renaming {} objects to have tar.gz extension", chunks.len());

        if let [only] = chunks.as_slice() {
            let target = final_name(name);
            self.rename(only, &target).await?;
            return Ok(vec![target]);
        }

        // Highest index is count - 1; this differs from the grouped path on purpose.
        let width = digit_count(chunks.len().saturating_sub(1));
        let mut finals = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let target = part_name(name, index, width);
            self.rename(chunk, &target).await?;
            finals.push(target);
        }
        Ok(finals)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        debug!("renaming {} to {}", from, to);
        let src = ObjectHandle::new(&self.bucket, from);
        let dst = ObjectHandle::new(&self.bucket, to);
        cancellable(&self.cancel, self.store.rename(&src, &dst)).await
    }

    /// Compose `objects` (in order) into `target`, in as many rounds as the per-call source
    /// limit requires, then delete every input.
    ///
    /// Deleting round inputs is best effort; deleting the inputs of the final compose is not.
    pub async fn compose_into_single_object(&self, objects: Vec<String>, target: &str) -> Result<()> {
        debug!("composing {} objects into {}", objects.len(), target);
        let delete_jobs = self.concurrent_jobs * DELETE_CONCURRENCY_MULTIPLIER;

        let mut objects = objects;
        let mut round = 0;
        while objects.len() > COMPOSITION_BATCH_LIMIT {
            let total_batches = objects.len().div_ceil(COMPOSITION_BATCH_LIMIT);

            let next: Vec<String> = stream::iter(objects.chunks(COMPOSITION_BATCH_LIMIT).enumerate())
                .map(|(batch_index, batch)| {
                    let temp = round_name(target, round, batch_index);
                    async move {
                        debug!(
                            batch = batch_index,
                            total = total_batches,
                            object = %temp,
                            batch_size = batch.len(),
                            "composing batch"
                        );
                        cancellable(&self.cancel, self.store.compose(&self.bucket, batch, &temp))
                            .await
                            .with_context(|| format!("failed to compose batch {} of round {}", batch_index, round))?;
                        Ok::<_, anyhow::Error>(temp)
                    }
                })
                .buffered(self.concurrent_jobs)
                .try_collect()
                .await?;

            debug!("finished composing a round, {} parts remain", next.len());

            if let Err(e) = batch_delete(self.store.as_ref(), &self.bucket, &objects, delete_jobs, &self.cancel).await {
                self.observer.on_cleanup_failed(&e);
            }

            objects = next;
            round += 1;
        }

        cancellable(&self.cancel, self.store.compose(&self.bucket, &objects, target))
            .await
            .context("failed to compose final object")?;

        batch_delete(self.store.as_ref(), &self.bucket, &objects, delete_jobs, &self.cancel).await
    }
}
