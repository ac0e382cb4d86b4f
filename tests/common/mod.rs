// tests/common/mod.rs
//
// Common test utilities: a wrapper store that records compose calls and injects failures,
// plus fixtures for source trees and archive inspection.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use dataexporter::object_store::{ComposeSupport, ObjectBody, ObjectHandle, ObjectStore, Provider};
use dataexporter::FileSystemObjectStore;
use flate2::read::GzDecoder;

/// Compose call as seen by the store.
#[derive(Debug, Clone)]
pub struct ComposeCall {
    pub sources: Vec<String>,
    pub target: String,
}

/// FileSystemObjectStore with a recorder and fault injection in front of it.
pub struct TestStore {
    pub inner: FileSystemObjectStore,
    pub composes: Mutex<Vec<ComposeCall>>,
    pub fail_deletes: Mutex<HashSet<String>>,
    pub fail_puts: Mutex<HashSet<String>>,
}

impl TestStore {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: FileSystemObjectStore::new(root),
            composes: Mutex::new(Vec::new()),
            fail_deletes: Mutex::new(HashSet::new()),
            fail_puts: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_delete_of(&self, names: impl IntoIterator<Item = String>) {
        self.fail_deletes.lock().unwrap().extend(names);
    }

    pub fn fail_put_of(&self, name: &str) {
        self.fail_puts.lock().unwrap().insert(name.to_string());
    }

    pub fn compose_calls(&self) -> Vec<ComposeCall> {
        self.composes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for TestStore {
    fn provider(&self) -> Provider {
        self.inner.provider()
    }

    fn compose_support(&self) -> ComposeSupport {
        self.inner.compose_support()
    }

    async fn put(&self, handle: &ObjectHandle, body: ObjectBody) -> Result<()> {
        if self.fail_puts.lock().unwrap().contains(&handle.name) {
            bail!("injected put failure for {}", handle);
        }
        self.inner.put(handle, body).await
    }

    async fn compose(&self, bucket: &str, sources: &[String], target: &str) -> Result<()> {
        self.composes.lock().unwrap().push(ComposeCall {
            sources: sources.to_vec(),
            target: target.to_string(),
        });
        self.inner.compose(bucket, sources, target).await
    }

    async fn copy(&self, src: &ObjectHandle, dst: &ObjectHandle) -> Result<()> {
        self.inner.copy(src, dst).await
    }

    async fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        if self.fail_deletes.lock().unwrap().contains(&handle.name) {
            bail!("injected delete failure");
        }
        self.inner.delete(handle).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(bucket, prefix).await
    }
}

/// Write `files` (relative path, content) under `dir`, creating parents.
pub fn write_tree(dir: &Path, files: &[(&str, Vec<u8>)]) -> Result<()> {
    for (rel, content) in files {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
    }
    Ok(())
}

/// Deterministic bytes that gzip cannot shrink much.
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut x = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            (x >> 24) as u8
        })
        .collect()
}

/// Decode a tar.gz stream into (relative path, content) pairs.
pub fn unpack(data: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    let mut found = BTreeMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        found.insert(path, content);
    }
    Ok(found)
}

/// Concatenate objects (in the given order) as stored by the file store.
pub fn read_objects(root: &Path, bucket: &str, names: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for name in names {
        out.extend(std::fs::read(root.join(bucket).join(name))?);
    }
    Ok(out)
}
