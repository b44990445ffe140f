//! In-memory object storage bucket

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::facade::{ObjectStorage, UploadOptions};

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: u32,
}

#[derive(Debug, Clone)]
pub struct MemoryObjectStorage {
    base_url: String,
    bucket: String,
    /// Key for signed-URL tokens
    secret: String,
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
}

impl MemoryObjectStorage {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            secret: uuid::Uuid::new_v4().to_string(),
            objects: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn get(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().await.get(path).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Token over path and expiry
    fn sign(&self, path: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(path.as_bytes());
        hasher.update(expires.to_be_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a token produced by [`ObjectStorage::signed_url`]
    pub fn verify_token(&self, path: &str, expires: i64, token: &str) -> bool {
        expires > Utc::now().timestamp() && self.sign(path, expires) == token
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, options: &UploadOptions) -> DbResult<String> {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return Err(DbError::Storage("object path is empty".to_string()));
        }
        let mut objects = self.objects.write().await;
        if !options.upsert && objects.contains_key(path) {
            return Err(DbError::AlreadyExists(format!("object {}", path)));
        }
        debug!(path = %path, size = bytes.len(), "Object stored");
        objects.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: options.content_type.clone(),
                cache_control: options.cache_control,
            },
        );
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> DbResult<String> {
        if !self.objects.read().await.contains_key(path) {
            return Err(DbError::not_found(format!("object {}", path)));
        }
        let expires = Utc::now().timestamp() + expires_in_secs as i64;
        Ok(format!(
            "{}/storage/v1/object/sign/{}/{}?token={}&expires={}",
            self.base_url,
            self.bucket,
            path,
            self.sign(path, expires),
            expires
        ))
    }

    async fn remove(&self, path: &str) -> DbResult<()> {
        let path = path.trim_start_matches('/');
        if self.objects.write().await.remove(path).is_some() {
            debug!(path = %path, "Object removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_upsert() {
        let storage = MemoryObjectStorage::new("http://localhost:54321", "documents");
        let opts = UploadOptions::default();
        storage.upload("u/a.pdf", b"one".to_vec(), &opts).await.unwrap();
        let err = storage
            .upload("u/a.pdf", b"two".to_vec(), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));

        let opts = UploadOptions {
            upsert: true,
            ..Default::default()
        };
        storage.upload("u/a.pdf", b"two".to_vec(), &opts).await.unwrap();
        assert_eq!(storage.get("u/a.pdf").await.unwrap().bytes, b"two");
    }

    #[tokio::test]
    async fn test_remove_object() {
        let storage = MemoryObjectStorage::new("http://localhost:54321", "documents");
        storage
            .upload("u/a.pdf", b"one".to_vec(), &UploadOptions::default())
            .await
            .unwrap();
        storage.remove("/u/a.pdf").await.unwrap();
        assert!(storage.get("u/a.pdf").await.is_none());
        assert!(storage.remove("u/a.pdf").await.is_ok());
    }

    #[tokio::test]
    async fn test_signed_url_token() {
        let storage = MemoryObjectStorage::new("http://localhost:54321/", "documents");
        storage
            .upload("u/a.pdf", vec![1, 2, 3], &UploadOptions::default())
            .await
            .unwrap();
        let url = storage.signed_url("u/a.pdf", 3600).await.unwrap();
        assert!(url.starts_with("http://localhost:54321/storage/v1/object/sign/documents/u/a.pdf?token="));

        let query = url.split('?').nth(1).unwrap();
        let mut token = "";
        let mut expires = 0i64;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("token", v)) => token = v,
                Some(("expires", v)) => expires = v.parse().unwrap(),
                _ => {}
            }
        }
        assert!(storage.verify_token("u/a.pdf", expires, token));
        assert!(!storage.verify_token("u/b.pdf", expires, token));
    }

    #[tokio::test]
    async fn test_signed_url_missing_object() {
        let storage = MemoryObjectStorage::new("http://localhost", "documents");
        assert!(storage.signed_url("nope", 60).await.is_err());
        assert_eq!(
            storage.public_url("x/y.png"),
            "http://localhost/storage/v1/object/public/documents/x/y.png"
        );
    }
}
