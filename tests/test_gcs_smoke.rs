// tests/test_gcs_smoke.rs
//
// Smoke test for the export pipeline against ACTUAL Google Cloud Storage (or an emulator).
//
// Prerequisites:
// 1. GCS authentication: gcloud auth application-default login
//    (or GCS_ENDPOINT_URL / STORAGE_EMULATOR_HOST for an emulator)
// 2. Environment variable:
//    - GCS_TEST_BUCKET: bucket the test may write to and clean up
//
// Run: cargo test --release --test test_gcs_smoke -- --nocapture --test-threads=1

mod common;

use std::env;

use anyhow::Result;
use bytesize::ByteSize;
use dataexporter::{DeleteOptions, Exporter, Provider, UploadOptions};
use tempfile::TempDir;

use common::{noise, write_tree};

/// Helper to check if GCS integration tests should run
fn should_run_gcs_tests() -> bool {
    env::var("GCS_TEST_BUCKET").is_ok()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gcs_upload_then_delete() -> Result<()> {
    if !should_run_gcs_tests() {
        println!("Skipping - set GCS_TEST_BUCKET environment variable");
        return Ok(());
    }
    let bucket = env::var("GCS_TEST_BUCKET")?;
    let name = format!("dataexporter-smoke-{}", std::process::id());

    let src = TempDir::new()?;
    write_tree(
        src.path(),
        &[
            ("data/blob.bin", noise(3 * 1024 * 1024, 11)),
            ("config/app.toml", b"key = \"value\"\n".to_vec()),
        ],
    )?;

    let exporter = Exporter::from_provider(Provider::Gcs, None).await?;

    // 256KiB chunks: a dozen objects, one final compose.
    let opts = UploadOptions::default()
        .with_chunk_size(ByteSize::kib(256))
        .with_concurrent_jobs(4);
    let finals = exporter.upload(src.path(), &bucket, &name, opts).await?;
    assert_eq!(finals, vec![format!("{}.tar.gz", name)]);

    exporter
        .delete(&bucket, &name, DeleteOptions::default())
        .await?;
    Ok(())
}
