use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::ProviderSettings;
use crate::core::errors::ApiError;

/// Hosted `/v1/chat/completions` endpoint (OpenAI, Groq, ...).
#[derive(Clone)]
pub struct OpenAiCompatibleProvider {
    name: String,
    base_url: String,
    model: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatibleProvider {
    /// `settings` must already be resolved against the provider preset.
    pub fn new(name: &str, settings: &ProviderSettings) -> Result<Self, ApiError> {
        let base_url = settings
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("providers.{}.base_url is not set", name)))?;
        let model = settings
            .model
            .as_deref()
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("providers.{}.model is not set", name)))?;

        let mut builder = Client::builder();
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(ApiError::internal)?;

        Ok(Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            api_key: settings.api_key.clone().filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ApiError> {
        let Some(api_key) = &self.api_key else {
            return Err(ApiError::ServiceUnavailable(format!(
                "{} API key is not configured",
                self.name
            )));
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature.or(self.temperature) {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens.or(self.max_tokens) {
                obj.insert("max_tokens".to_string(), json!(t));
            }
        }

        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Internal(format!("{} request failed: {}", self.name, e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, %status, "Chat completion rejected");
            return Err(ApiError::Internal(format!(
                "{} chat error ({}): {}",
                self.name, status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Internal(format!("{} returned no message content", self.name)))
    }
}
