// src/options.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Knobs for `Exporter::upload` and `Exporter::delete`.
//!
//! Builder helpers are provided so callers can write a fluent style:
//!
//! let opts = UploadOptions::default()
//!     .with_chunk_size(ByteSize::mib(100))
//!     .with_part_size(ByteSize::gib(1))
//!     .with_concurrent_jobs(20);
//!
//! Size strings such as "250MB" or "5TB" are parsed with `parse_size`. Units are
//! powers of 1024 whether or not they carry the `i`: "250MB" and "250MiB" are the same.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use bytesize::ByteSize;
use tokio_util::sync::CancellationToken;

use crate::constants::{DEFAULT_CONCURRENT_JOBS, DEFAULT_REPORT_PERIOD};
use crate::error::ExportError;

/// Parse a human-readable size ("250MB", "500GB", "5TB", "100B") in binary units.
pub fn parse_size(s: &str) -> Result<ByteSize> {
    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let unit = match unit.to_ascii_uppercase().as_str() {
        "K" | "KB" => "KiB",
        "M" | "MB" => "MiB",
        "G" | "GB" => "GiB",
        "T" | "TB" => "TiB",
        "P" | "PB" => "PiB",
        _ => unit,
    };
    format!("{}{}", number.trim_end(), unit)
        .parse::<ByteSize>()
        .map_err(|e| anyhow!("invalid size {:?}: {}", s, e))
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Granularity of the compressed stream: one temporary object per chunk.
    pub chunk_size: ByteSize,
    /// Size of each final object once the archive exceeds `size_limit`.
    pub part_size: ByteSize,
    /// Largest archive kept as one final object.
    pub size_limit: ByteSize,
    /// Copy buffer used while streaming a chunk to the provider.
    pub buffer_size: ByteSize,
    /// Progress reporting interval.
    pub report_period: Duration,
    /// Max in-flight chunk uploads and per-round compositions.
    pub concurrent_jobs: usize,
    /// Abort at the first failed chunk instead of letting composition find the gap.
    pub fail_fast: bool,
    /// Caller-owned cancellation; every provider call observes it.
    pub cancel: Option<CancellationToken>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: ByteSize::mib(250),
            part_size: ByteSize::gib(500),
            size_limit: ByteSize::tib(5),
            buffer_size: ByteSize::mib(32),
            report_period: DEFAULT_REPORT_PERIOD,
            concurrent_jobs: DEFAULT_CONCURRENT_JOBS,
            fail_fast: false,
            cancel: None,
        }
    }
}

impl UploadOptions {
    pub fn with_chunk_size(mut self, size: ByteSize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_part_size(mut self, size: ByteSize) -> Self {
        self.part_size = size;
        self
    }

    pub fn with_size_limit(mut self, size: ByteSize) -> Self {
        self.size_limit = size;
        self
    }

    pub fn with_buffer_size(mut self, size: ByteSize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_report_period(mut self, period: Duration) -> Self {
        self.report_period = period;
        self
    }

    pub fn with_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.concurrent_jobs = jobs;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// True when the data cannot be delivered as one object.
    pub fn is_multi_part(&self, total_size: u64) -> bool {
        total_size > self.size_limit.as_u64()
    }

    /// Reject option combinations before any I/O happens.
    pub fn validate(&self, total_size: u64) -> Result<()> {
        if self.concurrent_jobs == 0 {
            bail!(ExportError::InvalidOptions("concurrent jobs must be >= 1".into()));
        }
        if self.chunk_size.as_u64() == 0 || self.part_size.as_u64() == 0 {
            bail!(ExportError::InvalidOptions("chunk size and part size must be non-zero".into()));
        }
        if self.buffer_size.as_u64() == 0 {
            bail!(ExportError::InvalidOptions("buffer size must be non-zero".into()));
        }
        if self.report_period.is_zero() {
            bail!(ExportError::InvalidOptions("report period must be non-zero".into()));
        }
        if self.is_multi_part(total_size) && self.chunk_size > self.part_size {
            bail!(ExportError::ChunkLargerThanPart {
                chunk: self.chunk_size,
                part: self.part_size,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Max in-flight deletions.
    pub concurrent_jobs: usize,
    pub cancel: Option<CancellationToken>,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            concurrent_jobs: DEFAULT_CONCURRENT_JOBS,
            cancel: None,
        }
    }
}

impl DeleteOptions {
    pub fn with_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.concurrent_jobs = jobs;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrent_jobs == 0 {
            bail!(ExportError::InvalidOptions("concurrent jobs must be >= 1".into()));
        }
        Ok(())
    }
}
