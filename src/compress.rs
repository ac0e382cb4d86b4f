// src/compress.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Streaming tar + gzip of a directory tree.
//
// The `tar` and `flate2` writers are blocking, so the compressor runs on the blocking pool
// and writes through a `SyncIoBridge` into one half of an in-memory duplex pipe. The chunk
// uploader reads the other half; the pipe's fixed capacity is the backpressure between the
// two (the compressor blocks while the reader is behind).

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::io::SyncIoBridge;
use tracing::trace;
use walkdir::WalkDir;

/// Write a gzip-compressed tar of every regular file under `dir` into `out`.
///
/// Entries are emitted in file-name order with paths relative to `dir`; directories are
/// not emitted. Any read error aborts the whole archive, including files that vanish
/// mid-walk. Returns `out` once both the tar and the gzip framing are finalized.
pub fn compress_tar_gz<W: Write>(dir: &Path, out: W) -> Result<W> {
    let gz = GzEncoder::new(out, Compression::fast());
    let mut builder = tar::Builder::new(gz);

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dir)?;
        let mut file = File::open(entry.path())
            .with_context(|| format!("failed to open {}", entry.path().display()))?;
        let meta = file.metadata()?;

        let mut header = tar::Header::new_gnu();
        header.set_metadata(&meta);
        header.set_size(meta.len());

        let mut limited = (&mut file).take(meta.len());
        builder
            .append_data(&mut header, rel, &mut limited)
            .with_context(|| format!("write tar entry for {}", rel.display()))?;
        if limited.limit() != 0 {
            bail!("{} shrank while being archived", entry.path().display());
        }
        trace!("archived {} ({} bytes)", rel.display(), meta.len());
    }

    // Inner archive first, then the outer compressor.
    let gz = builder.into_inner().context("finalize tar stream")?;
    let out = gz.finish().context("finalize gzip stream")?;
    Ok(out)
}

/// Run `compress_tar_gz` on the blocking pool, writing into `pipe`.
///
/// The pipe is shut down when compression finishes, so the reader observes EOF. On failure
/// the pipe is dropped (the reader sees a truncated stream), and the error is returned from
/// the join handle; callers must check it before trusting what they read.
pub fn spawn_compressor(dir: PathBuf, pipe: DuplexStream) -> JoinHandle<Result<()>> {
    let writer = SyncIoBridge::new(pipe);
    tokio::task::spawn_blocking(move || {
        let mut writer = compress_tar_gz(&dir, writer)?;
        writer.flush()?;
        writer.shutdown()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn unpack(data: &[u8]) -> BTreeMap<String, Vec<u8>> {
        let mut archive = tar::Archive::new(GzDecoder::new(data));
        let mut found = BTreeMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            found.insert(path, content);
        }
        found
    }

    #[test]
    fn test_compress_tar_gz_round_trip() -> Result<()> {
        let tmp = TempDir::new()?;
        fs::write(tmp.path().join("file1.txt"), b"hello world")?;
        fs::create_dir_all(tmp.path().join("subdir/deeper"))?;
        fs::write(tmp.path().join("subdir/file2.txt"), b"nested content")?;
        fs::write(tmp.path().join("subdir/deeper/empty"), b"")?;

        let buf = compress_tar_gz(tmp.path(), Vec::new())?;
        let found = unpack(&buf);

        assert_eq!(found.len(), 3, "directories must not be emitted");
        assert_eq!(found["file1.txt"], b"hello world");
        assert_eq!(found["subdir/file2.txt"], b"nested content");
        assert!(found["subdir/deeper/empty"].is_empty());
        Ok(())
    }

    #[test]
    fn test_compress_tar_gz_preserves_mode() -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let tmp = TempDir::new()?;
            let path = tmp.path().join("run.sh");
            fs::write(&path, b"#!/bin/sh\n")?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;

            let buf = compress_tar_gz(tmp.path(), Vec::new())?;
            let mut archive = tar::Archive::new(GzDecoder::new(&buf[..]));
            let entry = archive.entries()?.next().unwrap()?;
            assert_eq!(entry.header().mode()? & 0o777, 0o755);
        }
        Ok(())
    }

    #[test]
    fn test_compress_tar_gz_empty_dir() -> Result<()> {
        let tmp = TempDir::new()?;
        let buf = compress_tar_gz(tmp.path(), Vec::new())?;
        assert!(!buf.is_empty());
        assert!(unpack(&buf).is_empty());
        Ok(())
    }

    #[test]
    fn test_compress_tar_gz_nonexistent_dir() {
        assert!(compress_tar_gz(Path::new("/nonexistent/dir"), Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_spawn_compressor_streams_through_small_pipe() -> Result<()> {
        let tmp = TempDir::new()?;
        // Larger than the pipe so the compressor has to block on the reader.
        let payload: Vec<u8> = (0..200_000u32).flat_map(|i| i.to_le_bytes()).collect();
        fs::write(tmp.path().join("big.bin"), &payload)?;

        let (writer, mut reader) = tokio::io::duplex(4 * 1024);
        let handle = spawn_compressor(tmp.path().to_path_buf(), writer);

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        handle.await??;

        assert_eq!(unpack(&buf)["big.bin"], payload);
        Ok(())
    }
}
