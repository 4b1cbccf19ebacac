//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so an empty `config.yml` still yields a
//! runnable server pointed at `data/wine_embeddings.npy` and
//! `data/wine_metadata.csv`.

use serde::Deserialize;
use serde_json::Value;

use crate::core::errors::ApiError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub server: ServerSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub providers: ProvidersSettings,
    pub prompt: PromptSettings,
}

impl AppSettings {
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        serde_json::from_value(value)
            .map_err(|e| ApiError::BadRequest(format!("Invalid config: {}", e)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            request_timeout_secs: 60,
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// How retrieved documents become response text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingPolicy {
    /// One bullet per catalog row, fields copied verbatim.
    #[default]
    Listing,
    /// Retrieved passages become context for a downstream generator.
    Generate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub embeddings_path: String,
    pub metadata_path: String,
    /// Width of every stored and query vector (384 for all-MiniLM-L6-v2).
    pub dimension: usize,
    pub top_k: usize,
    pub rendering: RenderingPolicy,
    /// Provider used by [`RenderingPolicy::Generate`].
    pub generator_provider: String,
    pub listing_header: String,
    pub columns: ColumnSettings,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            embeddings_path: "data/wine_embeddings.npy".to_string(),
            metadata_path: "data/wine_metadata.csv".to_string(),
            dimension: 384,
            top_k: 3,
            rendering: RenderingPolicy::Listing,
            generator_provider: "openai".to_string(),
            listing_header: "Here are some wines you might enjoy:".to_string(),
            columns: ColumnSettings::default(),
        }
    }
}

/// CSV header names mapped onto [`crate::retrieval::Document`] fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    pub content: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub score: Option<String>,
    pub price: Option<String>,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            content: "description".to_string(),
            title: Some("title".to_string()),
            category: Some("country".to_string()),
            score: Some("points".to_string()),
            price: Some("price".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            model: "all-MiniLM-L6-v2".to_string(),
            timeout_secs: 30,
            api_key: None,
        }
    }
}

/// One hosted chat-completions endpoint. Unset fields fall back to the
/// provider's preset, see [`ProvidersSettings::openai`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub api_key: Option<String>,
}

impl ProviderSettings {
    fn over(&self, preset: ProviderSettings) -> ProviderSettings {
        ProviderSettings {
            base_url: self.base_url.clone().or(preset.base_url),
            model: self.model.clone().or(preset.model),
            temperature: self.temperature.or(preset.temperature),
            max_tokens: self.max_tokens.or(preset.max_tokens),
            timeout_secs: self.timeout_secs.or(preset.timeout_secs),
            api_key: self.api_key.clone().or(preset.api_key),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersSettings {
    openai: ProviderSettings,
    llama: ProviderSettings,
}

impl ProvidersSettings {
    pub fn openai(&self) -> ProviderSettings {
        self.openai.over(ProviderSettings {
            base_url: Some("https://api.openai.com".to_string()),
            model: Some("gpt-4.1".to_string()),
            timeout_secs: Some(60),
            ..ProviderSettings::default()
        })
    }

    /// Llama 3 served by Groq's OpenAI-compatible endpoint.
    pub fn llama(&self) -> ProviderSettings {
        self.llama.over(ProviderSettings {
            base_url: Some("https://api.groq.com/openai".to_string()),
            model: Some("llama3-70b-8192".to_string()),
            temperature: Some(0.7),
            max_tokens: Some(800),
            timeout_secs: Some(60),
            api_key: None,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Replaces the built-in sommelier prompt when set.
    pub system: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_config_uses_defaults() {
        let settings = AppSettings::from_value(json!({})).unwrap();
        assert_eq!(settings.server.port, 5001);
        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.retrieval.dimension, 384);
        assert_eq!(settings.retrieval.rendering, RenderingPolicy::Listing);
        assert_eq!(settings.retrieval.columns.content, "description");
        assert_eq!(settings.providers.llama().model.as_deref(), Some("llama3-70b-8192"));
        assert_eq!(settings.providers.llama().max_tokens, Some(800));
        assert_eq!(settings.providers.openai().model.as_deref(), Some("gpt-4.1"));
        assert_eq!(settings.providers.openai().api_key, None);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let settings = AppSettings::from_value(json!({
            "retrieval": { "top_k": 5, "rendering": "generate" },
            "providers": { "openai": { "api_key": "sk-test" } }
        }))
        .unwrap();

        assert_eq!(settings.retrieval.top_k, 5);
        assert_eq!(settings.retrieval.rendering, RenderingPolicy::Generate);
        assert_eq!(settings.retrieval.metadata_path, "data/wine_metadata.csv");
        let openai = settings.providers.openai();
        assert_eq!(openai.api_key.as_deref(), Some("sk-test"));
        assert_eq!(openai.model.as_deref(), Some("gpt-4.1"));
        assert_eq!(openai.base_url.as_deref(), Some("https://api.openai.com"));
    }

    #[test]
    fn unknown_rendering_policy_is_rejected() {
        let err = AppSettings::from_value(json!({ "retrieval": { "rendering": "canned" } }))
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
