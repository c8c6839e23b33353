use crate::error::CoreError;
use crate::traits::KnowledgeEngine;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// HTTP adapter for the knowledge engine service. The engine itself is an
/// opaque capability; this adapter only speaks its two-endpoint contract:
/// `POST /insert {"text"}` and `POST /query {"question"}` -> `{"response"}`.
pub struct HttpKnowledgeEngine {
    client: Client,
    endpoint: String,
}

impl HttpKnowledgeEngine {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), operation)
    }
}

#[async_trait]
impl KnowledgeEngine for HttpKnowledgeEngine {
    async fn insert(&self, text: &str) -> Result<(), CoreError> {
        let response = self
            .client
            .post(self.url("insert"))
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|error| CoreError::Engine(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::Engine(format!(
                "engine insert returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn query(&self, question: &str) -> Result<String, CoreError> {
        let response = self
            .client
            .post(self.url("query"))
            .json(&json!({ "question": question }))
            .send()
            .await
            .map_err(|error| CoreError::Engine(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::Engine(format!(
                "engine query returned {}",
                response.status()
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|error| CoreError::Engine(error.to_string()))?;

        parsed
            .pointer("/response")
            .and_then(Value::as_str)
            .map(|answer| answer.to_string())
            .ok_or_else(|| {
                CoreError::Engine("engine reply is missing the response field".to_string())
            })
    }
}
