// src/error.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Typed failures callers may want to match on. Everything else travels as anyhow::Error;
// these are raised with `bail!(ExportError::..)` and recovered with `downcast_ref`.

use std::path::PathBuf;

use bytesize::ByteSize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("{0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("on multi-part, chunk size ({chunk}) cannot be greater than part size ({part})")]
    ChunkLargerThanPart { chunk: ByteSize, part: ByteSize },

    #[error("{} chunk upload(s) failed: {}", .0.len(), .0.join(", "))]
    ChunkUploadsFailed(Vec<String>),

    /// Aggregate of every object that could not be deleted; successful deletions stand.
    #[error("some deletions failed ({} object(s)): {}", .failed.len(), .errors.join("; "))]
    DeleteFailed {
        failed: Vec<String>,
        errors: Vec<String>,
    },

    #[error("operation cancelled")]
    Cancelled,
}
