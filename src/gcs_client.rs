// src/gcs_client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Google Cloud Storage backend using the gcloud-storage crate.
// Native server-side compose makes GCS the reference provider for the export pipeline.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use gcloud_storage::client::{Client, ClientConfig};
use gcloud_storage::http::objects::compose::{ComposeObjectRequest, ComposingTargets};
use gcloud_storage::http::objects::copy::CopyObjectRequest;
use gcloud_storage::http::objects::delete::DeleteObjectRequest;
use gcloud_storage::http::objects::list::ListObjectsRequest;
use gcloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use gcloud_storage::http::objects::SourceObjects;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::constants::{COMPOSITION_BATCH_LIMIT, ENV_GCS_ENDPOINT_URL, ENV_STORAGE_EMULATOR_HOST};
use crate::object_store::{ComposeSupport, ObjectBody, ObjectHandle, ObjectStore, Provider};

// Global cached GCS client - initialized once and reused across all operations
static GCS_CLIENT: OnceCell<Arc<Client>> = OnceCell::const_new();

/// GCS object store using Application Default Credentials (ADC).
///
/// Authentication follows the standard ADC chain:
/// 1. GOOGLE_APPLICATION_CREDENTIALS environment variable (service account JSON)
/// 2. GCE/GKE metadata server (automatic for Google Cloud workloads)
/// 3. gcloud CLI credentials (~/.config/gcloud/application_default_credentials.json)
///
/// Custom endpoints for local emulators and proxies:
/// - `GCS_ENDPOINT_URL`: full endpoint URL (e.g., http://localhost:4443)
/// - `STORAGE_EMULATOR_HOST`: host:port, http:// prepended if missing
///
/// When a custom endpoint is set, anonymous authentication is used.
pub struct GcsObjectStore {
    client: Arc<Client>,
}

impl GcsObjectStore {
    pub async fn new() -> Result<Self> {
        let client = GCS_CLIENT
            .get_or_try_init(|| async {
                let config = if let Some(endpoint) = resolve_gcs_endpoint() {
                    info!("Using custom GCS endpoint: {}", endpoint);
                    ClientConfig {
                        storage_endpoint: endpoint,
                        ..ClientConfig::default()
                    }
                    .anonymous()
                } else {
                    debug!("Initializing GCS client with Application Default Credentials");
                    ClientConfig::default()
                        .with_auth()
                        .await
                        .map_err(|e| anyhow!("failed to create client: {}", e))?
                };
                info!("GCS client initialized (cached for reuse)");
                Ok::<Arc<Client>, anyhow::Error>(Arc::new(Client::new(config)))
            })
            .await?;

        Ok(Self {
            client: Arc::clone(client),
        })
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn provider(&self) -> Provider {
        Provider::Gcs
    }

    fn compose_support(&self) -> ComposeSupport {
        ComposeSupport::Native
    }

    async fn put(&self, handle: &ObjectHandle, body: ObjectBody) -> Result<()> {
        debug!("GCS PUT: bucket={}, object={}, size={}", handle.bucket, handle.name, body.size);

        let mut media = Media::new(handle.name.clone());
        media.content_length = Some(body.size);
        let stream = ReaderStream::with_capacity(body.reader, body.buffer_size);

        self.client
            .upload_streamed_object(
                &UploadObjectRequest {
                    bucket: handle.bucket.clone(),
                    ..Default::default()
                },
                stream,
                &UploadType::Simple(media),
            )
            .await
            .map_err(|e| anyhow!("GCS PUT failed for gs://{}: {}", handle, e))?;

        debug!("GCS PUT success: gs://{}", handle);
        Ok(())
    }

    async fn compose(&self, bucket: &str, sources: &[String], target: &str) -> Result<()> {
        debug!("GCS COMPOSE: bucket={}, sources={}, target={}", bucket, sources.len(), target);
        if sources.len() > COMPOSITION_BATCH_LIMIT {
            return Err(anyhow!(
                "GCS compose accepts at most {} sources, got {}",
                COMPOSITION_BATCH_LIMIT,
                sources.len()
            ));
        }

        let source_objects = sources
            .iter()
            .map(|name| SourceObjects {
                name: name.clone(),
                ..Default::default()
            })
            .collect();

        self.client
            .compose_object(&ComposeObjectRequest {
                bucket: bucket.to_string(),
                destination_object: target.to_string(),
                composing_targets: ComposingTargets {
                    source_objects,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("GCS COMPOSE failed for gs://{}/{}: {}", bucket, target, e))?;

        Ok(())
    }

    async fn copy(&self, src: &ObjectHandle, dst: &ObjectHandle) -> Result<()> {
        debug!("GCS COPY: gs://{} -> gs://{}", src, dst);

        self.client
            .copy_object(&CopyObjectRequest {
                source_bucket: src.bucket.clone(),
                source_object: src.name.clone(),
                destination_bucket: dst.bucket.clone(),
                destination_object: dst.name.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("GCS COPY failed for gs://{} -> gs://{}: {}", src, dst, e))?;

        Ok(())
    }

    async fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        debug!("GCS DELETE: bucket={}, object={}", handle.bucket, handle.name);

        self.client
            .delete_object(&DeleteObjectRequest {
                bucket: handle.bucket.clone(),
                object: handle.name.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("GCS DELETE failed for gs://{}: {}", handle, e))?;

        Ok(())
    }

    /// List every object whose name starts with `prefix`.
    ///
    /// GCS returns at most 1000 objects per call, so this follows `next_page_token`
    /// until the listing is exhausted.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        debug!("GCS LIST: bucket={}, prefix={:?}", bucket, prefix);

        let mut results = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = ListObjectsRequest {
                bucket: bucket.to_string(),
                prefix: Some(prefix.to_string()),
                page_token: page_token.clone(),
                ..Default::default()
            };

            let response = self
                .client
                .list_objects(&request)
                .await
                .map_err(|e| anyhow!("failed to list objects in bucket {}: {}", bucket, e))?;

            if let Some(items) = response.items {
                debug!("GCS LIST page received: {} objects", items.len());
                results.extend(items.into_iter().map(|obj| obj.name));
            }

            match response.next_page_token {
                Some(next_token) => page_token = Some(next_token),
                None => break,
            }
        }

        debug!("GCS LIST success: {} total results", results.len());
        Ok(results)
    }
}

/// Custom endpoint from `GCS_ENDPOINT_URL`, else `STORAGE_EMULATOR_HOST`; `None` means
/// the public GCS endpoint.
pub fn resolve_gcs_endpoint() -> Option<String> {
    custom_endpoint(
        std::env::var(ENV_GCS_ENDPOINT_URL).ok(),
        std::env::var(ENV_STORAGE_EMULATOR_HOST).ok(),
    )
}

fn custom_endpoint(endpoint_url: Option<String>, emulator_host: Option<String>) -> Option<String> {
    let emulator = emulator_host.map(|host| {
        if host.contains("://") { host } else { format!("http://{host}") }
    });
    endpoint_url.filter(|url| !url.is_empty()).or(emulator)
}
