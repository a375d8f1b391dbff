//! Object storage access
//!
//! Functions receive bucket names at run time (from configuration or from
//! queue message attributes), so stores are resolved per bucket through a
//! [`BucketResolver`] instead of being fixed at construction.

pub mod keys;

use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Location of one object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    fn path(&self) -> Result<Path> {
        if self.key.is_empty() {
            return Err(Error::InvalidMessage(format!(
                "empty object key for bucket '{}'",
                self.bucket
            )));
        }
        Ok(Path::parse(&self.key)?)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Maps bucket names to object store handles.
#[async_trait]
pub trait BucketResolver: Send + Sync {
    /// Object store rooted at `bucket`.
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;

    /// Store `bytes` at `object`, replacing any previous content.
    async fn put(&self, object: &ObjectRef, bytes: Vec<u8>) -> Result<()> {
        let store = self.resolve(&object.bucket)?;
        let path = object.path()?;
        let size = bytes.len();
        store.put(&path, PutPayload::from(bytes)).await?;
        debug!(object = %object, size_bytes = size, "Object stored");
        Ok(())
    }

    /// Read the whole content of `object`.
    async fn get(&self, object: &ObjectRef) -> Result<Vec<u8>> {
        let store = self.resolve(&object.bucket)?;
        let path = object.path()?;
        let bytes = store.get(&path).await?.bytes().await?;
        debug!(object = %object, size_bytes = bytes.len(), "Object fetched");
        Ok(bytes.to_vec())
    }

    /// Every key in `bucket`, in lexicographic order.
    async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let store = self.resolve(bucket)?;
        let metas: Vec<_> = store.list(None).try_collect().await?;
        let mut keys: Vec<String> = metas.into_iter().map(|m| m.location.to_string()).collect();
        keys.sort();
        Ok(keys)
    }
}

/// In-memory buckets for development and testing.
///
/// Each bucket is created empty on first use and lives as long as the
/// resolver.
#[derive(Debug, Default)]
pub struct MemoryBuckets {
    buckets: DashMap<String, Arc<InMemory>>,
}

impl MemoryBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct handle on one bucket, for seeding and inspection.
    pub fn bucket(&self, bucket: &str) -> Arc<InMemory> {
        self.buckets
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone()
    }
}

impl BucketResolver for MemoryBuckets {
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if bucket.is_empty() {
            return Err(Error::Config("bucket name cannot be empty".to_string()));
        }
        Ok(self.bucket(bucket))
    }
}

/// Settings shared by every S3 bucket handle.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub region: Option<String>,
    /// Custom endpoint (MinIO, LocalStack)
    pub endpoint: Option<String>,
}

/// S3 buckets, one client per bucket built lazily and cached.
pub struct S3Buckets {
    settings: S3Settings,
    clients: DashMap<String, Arc<dyn ObjectStore>>,
}

impl S3Buckets {
    pub fn new(settings: S3Settings) -> Self {
        Self {
            settings,
            clients: DashMap::new(),
        }
    }

    fn build(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        // Credentials and region default to the execution role environment.
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(region) = &self.settings.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &self.settings.endpoint {
            info!(endpoint = %endpoint, "Using custom S3 endpoint");
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        Ok(Arc::new(builder.build()?))
    }
}

impl BucketResolver for S3Buckets {
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        if bucket.is_empty() {
            return Err(Error::Config("bucket name cannot be empty".to_string()));
        }
        if let Some(store) = self.clients.get(bucket) {
            return Ok(store.clone());
        }
        let store = self.build(bucket)?;
        self.clients.insert(bucket.to_string(), store.clone());
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get_list() {
        let buckets = MemoryBuckets::new();
        buckets
            .put(&ObjectRef::new("dumps", "b.json"), b"{}".to_vec())
            .await
            .unwrap();
        buckets
            .put(&ObjectRef::new("dumps", "a.json"), b"[]".to_vec())
            .await
            .unwrap();

        let keys = buckets.list("dumps").await.unwrap();
        assert_eq!(keys, vec!["a.json".to_string(), "b.json".to_string()]);

        let bytes = buckets.get(&ObjectRef::new("dumps", "b.json")).await.unwrap();
        assert_eq!(bytes, b"{}");

        assert!(buckets.list("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_object_is_object_store_error() {
        let buckets = MemoryBuckets::new();
        let err = buckets
            .get(&ObjectRef::new("dumps", "missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ObjectStore(_)));
    }

    #[tokio::test]
    async fn test_rejects_empty_key_and_bucket() {
        let buckets = MemoryBuckets::new();
        let err = buckets.get(&ObjectRef::new("dumps", "")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage(_)));
        assert!(buckets.resolve("").is_err());
    }
}
