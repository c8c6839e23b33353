use crate::error::CoreError;
use crate::traits::BlobStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// HTTP object store for uploaded blobs (any S3-compatible gateway that
/// accepts plain `PUT`/`GET`/`DELETE` on `{base}/{key}`).
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), key)
    }
}

#[async_trait]
impl BlobStore for HttpObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CoreError> {
        let response = self
            .client
            .put(self.object_url(key))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|error| CoreError::StorageUnavailable(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::StorageUnavailable(format!(
                "object store put returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CoreError> {
        let response = self
            .client
            .get(self.object_url(key))
            .send()
            .await
            .map_err(|error| CoreError::StorageUnavailable(error.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CoreError::StorageUnavailable(format!("blob missing: {key}")));
        }
        if !response.status().is_success() {
            return Err(CoreError::StorageUnavailable(format!(
                "object store get returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| CoreError::StorageUnavailable(error.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        let response = self
            .client
            .delete(self.object_url(key))
            .send()
            .await
            .map_err(|error| CoreError::StorageUnavailable(error.to_string()))?;

        // Deleting an already-absent blob is a no-op.
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(CoreError::StorageUnavailable(format!(
                "object store delete returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
