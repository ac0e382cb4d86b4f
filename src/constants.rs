// src/constants.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Centralized constants for the exporter to avoid hardcoded values throughout the codebase

use std::time::Duration;

/// Default size of each chunk read from the compressed stream and uploaded as a temporary object
pub const DEFAULT_CHUNK_SIZE: &str = "250MB";

/// Default size of each final part when the archive exceeds the size limit
pub const DEFAULT_PART_SIZE: &str = "500GB";

/// Largest archive stored as a single final object
pub const DEFAULT_SIZE_LIMIT: &str = "5TB";

/// Copy buffer used when streaming a chunk to the provider
pub const DEFAULT_BUFFER_SIZE: &str = "32MB";

/// How often the progress reporter wakes up
pub const DEFAULT_REPORT_PERIOD: Duration = Duration::from_secs(1);

/// Default number of concurrent uploads / compositions / deletions
pub const DEFAULT_CONCURRENT_JOBS: usize = 10;

/// Maximum number of source objects a single compose call accepts (GCS hard limit)
pub const COMPOSITION_BATCH_LIMIT: usize = 32;

/// Cleanup deletions run with this many times the configured concurrency
pub const DELETE_CONCURRENCY_MULTIPLIER: usize = 10;

/// Zero-padding width of temporary chunk object indices
pub const CHUNK_INDEX_DIGITS: usize = 8;

/// Extension of every final deliverable object
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Capacity of the in-memory pipe between the compressor and the chunk reader (1 MiB)
pub const PIPE_BUFFER_SIZE: usize = 1024 * 1024;

// ============================================================================
// Environment variables
// ============================================================================

/// Environment variable for a custom GCS endpoint URL (fake-gcs-server, proxies)
pub const ENV_GCS_ENDPOINT_URL: &str = "GCS_ENDPOINT_URL";

/// GCS emulator convention: host:port of a local emulator
pub const ENV_STORAGE_EMULATOR_HOST: &str = "STORAGE_EMULATOR_HOST";

pub const ENV_CHUNK_SIZE: &str = "CHUNK_SIZE";
pub const ENV_PART_SIZE: &str = "PART_SIZE";
pub const ENV_SIZE_LIMIT: &str = "SIZE_LIMIT";
pub const ENV_BUFFER_SIZE: &str = "BUFFER_SIZE";
pub const ENV_REPORT_PERIOD: &str = "REPORT_PERIOD";
pub const ENV_CONCURRENT_JOBS: &str = "CONCURRENT_JOBS";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Root directory used by the `file` provider
pub const ENV_FILE_STORE_ROOT: &str = "FILE_STORE_ROOT";
