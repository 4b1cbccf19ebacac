use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::error::EmbeddingError;
use crate::core::config::EmbeddingSettings;

/// Maps text onto a fixed-width dense vector.
///
/// Implementations must be deterministic for a given model and input; a
/// failed model call is reported, never papered over with placeholder
/// vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds several inputs, preserving order. The default calls
    /// [`Embedder::embed`] sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Width of the vectors this embedder is expected to produce.
    fn dimension(&self) -> usize;
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint
/// (llama.cpp server, LM Studio, text-embeddings-inference, ...).
#[derive(Clone)]
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    client: Client,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings, dimension: usize) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            dimension,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let res = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(EmbeddingError::Status { status, body });
        }

        let payload: EmbeddingsResponse = res
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        let vectors = order_entries(payload.data, inputs.len())?;
        if let Some(vector) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} values per embedding, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(vectors)
    }
}

/// Puts entries back into input order using their `index` field; entries
/// without one are taken positionally.
fn order_entries(
    entries: Vec<EmbeddingEntry>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if entries.len() != expected {
        return Err(EmbeddingError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            entries.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (position, entry) in entries.into_iter().enumerate() {
        let slot = entry.index.unwrap_or(position);
        let Some(target) = slots.get_mut(slot) else {
            return Err(EmbeddingError::Malformed(format!(
                "embedding index {} out of range",
                slot
            )));
        };
        if target.is_some() {
            return Err(EmbeddingError::Malformed(format!(
                "duplicate embedding index {}",
                slot
            )));
        }
        *target = Some(entry.embedding);
    }

    slots
        .into_iter()
        .map(|slot| match slot {
            Some(vector) if !vector.is_empty() => Ok(vector),
            _ => Err(EmbeddingError::Malformed("empty embedding vector".to_string())),
        })
        .collect()
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let mut vectors = self.request(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
