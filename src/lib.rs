// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: public re-exports.
//
// Exports local directory trees to object storage as `.tar.gz` archives, streaming
// compression straight into chunked uploads and composing the chunks server-side, and
// removes previously exported archives by name prefix.

// ===== Core Public API =====
pub mod exporter;
pub mod options;
pub mod error;

pub use exporter::{ExportJob, Exporter};
pub use options::{parse_size, DeleteOptions, UploadOptions};
pub use error::ExportError;

// ===== Pipeline stages =====
pub mod dir_size;
pub mod compress;
pub mod uploader;
pub mod composer;
pub mod delete;
pub mod progress;
pub mod naming;
pub mod constants;

// ===== Storage backends =====
pub mod object_store;
pub mod file_store;
pub mod gcs_client;

pub use object_store::{store_for_provider, ComposeSupport, ObjectHandle, ObjectStore, Provider};
pub use file_store::FileSystemObjectStore;
pub use gcs_client::GcsObjectStore;
pub use progress::{ExportObserver, LogObserver, ProgressSnapshot};
