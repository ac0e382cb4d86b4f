// src/dir_size.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Total byte size of the regular files under a directory tree.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::{DirEntry, WalkDir};

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error().is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

/// Sum the sizes of every regular file under `path`.
///
/// A missing root is an error. Entries that disappear while the walk is in progress are
/// skipped, since a live data directory may be pruned underneath us.
pub fn dir_size(path: &Path) -> Result<u64> {
    sum_file_sizes(path, WalkDir::new(path))
}

fn sum_file_sizes(
    path: &Path,
    entries: impl IntoIterator<Item = walkdir::Result<DirEntry>>,
) -> Result<u64> {
    let mut size = 0u64;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() > 0 && is_not_found(&e) => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to walk {}", path.display()));
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.metadata() {
            Ok(meta) => size += meta.len(),
            Err(e) if is_not_found(&e) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(size)
}

/// `dir_size` on the blocking pool.
pub async fn dir_size_async(path: PathBuf) -> Result<u64> {
    tokio::task::spawn_blocking(move || dir_size(&path)).await?
}
