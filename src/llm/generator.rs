use std::sync::Arc;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRequest};
use crate::core::errors::ApiError;
use crate::retrieval::Generator;

/// Lets a chat provider write the answer from retrieved passages.
pub struct ProviderGenerator {
    provider: Arc<dyn LlmProvider>,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

fn grounded_question(context: &str, query: &str) -> String {
    format!(
        "Recommend wines using only the reference wines below.\n\n\
         Reference wines:\n{}\n\nRequest: {}",
        context, query
    )
}

#[async_trait]
impl Generator for ProviderGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        query: &str,
    ) -> Result<String, ApiError> {
        let request = ChatRequest::with_system_prompt(
            system_prompt,
            &[ChatMessage::user(grounded_question(context, query))],
        );
        tracing::debug!(provider = self.provider.name(), "Generating from retrieved context");
        self.provider.chat(request).await
    }
}
