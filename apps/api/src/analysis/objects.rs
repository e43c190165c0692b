use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use dashmap::DashMap;

use crate::analysis::store::StoreError;
use crate::config::ObjectStoreConfig;

/// Raw uploaded resume files.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Constructs an S3 client for MinIO (local, via `S3_ENDPOINT`) or AWS.
    /// Without static keys the default AWS credential chain is used.
    pub async fn from_config(config: &ObjectStoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "sumakses-static",
            ));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::Object(format!("put {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Object(format!("get {key}: {e}")))?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Object(format!("read {key}: {e}")))?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StoreError::Object(format!("delete {key}: {e}")))?;
        Ok(())
    }
}

/// Process-local object store used when no bucket is configured, and in tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, Bytes>,
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> Result<(), StoreError> {
        self.objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.objects
            .get(key)
            .map(|b| b.clone())
            .ok_or_else(|| StoreError::Object(format!("no object stored under {key}")))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.remove(key);
        Ok(())
    }
}

impl InMemoryObjectStore {
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_put_get() {
        let store = InMemoryObjectStore::default();
        store
            .put("r-1.txt", Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();

        assert_eq!(store.get("r-1.txt").await.unwrap(), Bytes::from_static(b"hello"));
        assert!(matches!(
            store.get("r-2.txt").await,
            Err(StoreError::Object(_))
        ));

        store.delete("r-1.txt").await.unwrap();
        assert!(store.is_empty());
    }
}
