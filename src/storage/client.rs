// runtablesync/src/storage/client.rs
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::Region;

use crate::config::StorageConfig;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub created: Option<DateTime<Utc>>,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, created: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            created,
        }
    }
}

/// Read-only access to buckets through the S3-compatible XML endpoint.
pub struct BucketClient {
    client: s3::Client,
}

impl BucketClient {
    pub async fn connect(storage_config: &StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&storage_config.endpoint_url)
            .region(Region::new(storage_config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &storage_config.access_key_id,
                &storage_config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ))
            .load()
            .await;

        // The interop endpoint only understands path-style bucket addressing.
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
        }
    }

    /// Lists every object under `prefix`, following continuation tokens.
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectSummary>> {
        tracing::debug!(bucket, prefix, "Listing objects");

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .with_context(|| format!("Failed to list gs://{}/{}", bucket, prefix))?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let created = object
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
                objects.push(ObjectSummary::new(key, created));
            }
        }

        tracing::debug!(bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    /// Downloads an object and decodes it as UTF-8 text.
    pub async fn download_text(&self, bucket: &str, key: &str) -> Result<String> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to get object gs://{}/{}", bucket, key))?;

        let bytes = object
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of gs://{}/{}", bucket, key))?
            .into_bytes();

        String::from_utf8(bytes.to_vec())
            .with_context(|| format!("Object gs://{}/{} is not valid UTF-8", bucket, key))
    }
}
