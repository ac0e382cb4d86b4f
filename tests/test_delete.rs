// tests/test_delete.rs
//
// Prefix-delete tests through the Exporter surface.

mod common;

use std::sync::Arc;

use anyhow::Result;
use dataexporter::object_store::{ObjectBody, ObjectHandle};
use dataexporter::{DeleteOptions, ExportError, Exporter, ObjectStore};
use tempfile::TempDir;

use common::TestStore;

const BUCKET: &str = "exports";

async fn seed(store: &TestStore, names: &[String]) -> Result<()> {
    for name in names {
        let body = ObjectBody::new(std::io::Cursor::new(name.clone().into_bytes()), name.len() as u64, 64);
        store.put(&ObjectHandle::new(BUCKET, name.as_str()), body).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_delete_with_no_match_succeeds() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = Arc::new(TestStore::new(tmp.path()));
    seed(&store, &["unrelated.tar.gz".to_string()]).await?;

    Exporter::new(store.clone())
        .delete(BUCKET, "snap", DeleteOptions::default())
        .await?;

    assert_eq!(store.list(BUCKET, "").await?, vec!["unrelated.tar.gz"]);
    Ok(())
}

#[tokio::test]
async fn test_delete_removes_all_parts() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = Arc::new(TestStore::new(tmp.path()));
    let names: Vec<String> = (0..12).map(|i| format!("snap-part-{:02}.tar.gz", i)).collect();
    seed(&store, &names).await?;
    seed(&store, &["keep.tar.gz".to_string()]).await?;

    Exporter::new(store.clone())
        .delete(BUCKET, "snap", DeleteOptions::default().with_concurrent_jobs(3))
        .await?;

    assert_eq!(store.list(BUCKET, "").await?, vec!["keep.tar.gz"]);
    Ok(())
}

#[tokio::test]
async fn test_delete_partial_failure_is_aggregated() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = Arc::new(TestStore::new(tmp.path()));
    let names: Vec<String> = (0..50).map(|i| format!("snap-part-{:02}.tar.gz", i)).collect();
    seed(&store, &names).await?;

    let failing: Vec<String> = names.iter().step_by(5).cloned().collect();
    assert_eq!(failing.len(), 10);
    store.fail_delete_of(failing.clone());

    let err = Exporter::new(store.clone())
        .delete(BUCKET, "snap", DeleteOptions::default())
        .await
        .unwrap_err();

    match err.downcast_ref::<ExportError>() {
        Some(ExportError::DeleteFailed { failed, errors }) => {
            assert_eq!(failed, &failing);
            assert_eq!(errors.len(), 10);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let message = err.to_string();
    for name in &failing {
        assert!(message.contains(name.as_str()), "{} missing from {}", name, message);
    }

    // Only the ten that failed are still there.
    assert_eq!(store.list(BUCKET, "").await?, failing);
    Ok(())
}

#[tokio::test]
async fn test_delete_rejects_zero_concurrency() -> Result<()> {
    let tmp = TempDir::new()?;
    let store = Arc::new(TestStore::new(tmp.path()));

    let err = Exporter::new(store)
        .delete(BUCKET, "snap", DeleteOptions::default().with_concurrent_jobs(0))
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<ExportError>(), Some(ExportError::InvalidOptions(_))));
    Ok(())
}
