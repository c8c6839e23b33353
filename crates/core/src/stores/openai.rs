use crate::error::CoreError;
use crate::traits::CompletionModel;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// OpenAI-compatible chat-completions client used for query rewriting.
/// Completions run at temperature 0 so a repeated rewrite is deterministic.
pub struct OpenAiCompletionClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompletionClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0,
        });

        let mut request = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.endpoint.trim_end_matches('/')
            ))
            .json(&body);

        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|error| CoreError::Engine(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CoreError::Engine(format!(
                "completion endpoint returned {}",
                response.status()
            )));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|error| CoreError::Engine(error.to_string()))?;

        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.to_string())
            .ok_or_else(|| CoreError::Engine("completion reply had no choices".to_string()))
    }
}
