// src/progress.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Progress counters shared between the chunk reader and the upload tasks, the periodic
// reporter that watches them, and the observer seam through which the pipeline reports
// progress, swallowed chunk failures and best-effort cleanup failures.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytesize::ByteSize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bytes compressed (read off the pipe) and bytes uploaded (written to the network).
/// Both only ever grow; updates are lock-free.
#[derive(Debug, Default)]
pub struct ProgressState {
    compressed: AtomicU64,
    uploaded: AtomicU64,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_compressed(&self, bytes: u64) {
        self.compressed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_uploaded(&self, bytes: u64) {
        self.uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn compressed(&self) -> u64 {
        self.compressed.load(Ordering::Relaxed)
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }
}

/// One reading of the counters, handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub compressed: u64,
    pub uploaded: u64,
    pub dir_size: u64,
}

/// Receives the events the export pipeline does not turn into errors.
pub trait ExportObserver: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// A chunk upload failed; the pipeline carries on without it.
    fn on_chunk_failed(&self, object: &str, err: &anyhow::Error);

    /// A best-effort cleanup (deleting consumed intermediates) failed.
    fn on_cleanup_failed(&self, err: &anyhow::Error);
}

/// Default observer: everything goes to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ExportObserver for LogObserver {
    fn on_progress(&self, s: &ProgressSnapshot) {
        info!(
            compressed = %ByteSize(s.compressed),
            uploaded = %ByteSize(s.uploaded),
            dir_size = %ByteSize(s.dir_size),
            "compressing and uploading"
        );
    }

    fn on_chunk_failed(&self, object: &str, err: &anyhow::Error) {
        error!("failed to upload part {}: {:#}", object, err);
    }

    fn on_cleanup_failed(&self, err: &anyhow::Error) {
        warn!("failed to delete intermediate parts: {:#}", err);
    }
}

/// Terminal spinner for interactive runs; failures still go to the log.
pub struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    pub fn new(operation: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .template(&format!("{}: {{spinner:.green}} [{{elapsed_precise}}] {{msg}}", operation))
        {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

impl ExportObserver for SpinnerObserver {
    fn on_progress(&self, s: &ProgressSnapshot) {
        self.bar.set_message(format!(
            "compressed {} / uploaded {} (dir {})",
            ByteSize(s.compressed),
            ByteSize(s.uploaded),
            ByteSize(s.dir_size)
        ));
    }

    fn on_chunk_failed(&self, object: &str, err: &anyhow::Error) {
        self.bar.suspend(|| LogObserver.on_chunk_failed(object, err));
    }

    fn on_cleanup_failed(&self, err: &anyhow::Error) {
        self.bar.suspend(|| LogObserver.on_cleanup_failed(err));
    }
}

/// AsyncRead wrapper that adds every byte it yields to the uploaded counter, so progress
/// moves while a chunk is still in flight.
pub struct CountingReader<R> {
    inner: R,
    state: Arc<ProgressState>,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, state: Arc<ProgressState>) -> Self {
        Self { inner, state }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let res = Pin::new(&mut self.inner).poll_read(cx, buf);
        let read = buf.filled().len() - before;
        if read > 0 {
            self.state.add_uploaded(read as u64);
        }
        res
    }
}

/// Report the counters every `period` until `cancel` fires. A tick only reports when either
/// counter moved since the previous tick.
pub fn spawn_reporter(
    state: Arc<ProgressState>,
    dir_size: u64,
    period: Duration,
    observer: Arc<dyn ExportObserver>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = (0u64, 0u64);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let current = (state.compressed(), state.uploaded());
                    if current != last {
                        observer.on_progress(&ProgressSnapshot {
                            compressed: current.0,
                            uploaded: current.1,
                            dir_size,
                        });
                    }
                    last = current;
                }
            }
        }
    })
}
