use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::retrieval::RetrievalService;

/// Selector used when a request names no model.
pub const DEFAULT_MODEL: &str = "llama";

/// Which path answers a chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    OpenAi,
    Llama,
    Rag,
}

impl FromStr for ModelChoice {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ModelChoice::OpenAi),
            "llama" => Ok(ModelChoice::Llama),
            "rag" => Ok(ModelChoice::Rag),
            other => Err(ApiError::BadRequest(format!("Unsupported model: {}", other))),
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelChoice::OpenAi => "openai",
            ModelChoice::Llama => "llama",
            ModelChoice::Rag => "rag",
        })
    }
}

/// Routes a conversation to a hosted model or to retrieval.
pub struct ChatOrchestrator {
    openai: Arc<dyn LlmProvider>,
    llama: Arc<dyn LlmProvider>,
    retrieval: Arc<RetrievalService>,
    system_prompt: String,
}

impl ChatOrchestrator {
    pub fn new(
        openai: Arc<dyn LlmProvider>,
        llama: Arc<dyn LlmProvider>,
        retrieval: Arc<RetrievalService>,
        system_prompt: String,
    ) -> Self {
        Self {
            openai,
            llama,
            retrieval,
            system_prompt,
        }
    }

    pub fn retrieval(&self) -> &RetrievalService {
        &self.retrieval
    }

    /// Produces the assistant reply for `messages`.
    ///
    /// Hosted models see the system prompt followed by every message.
    /// Retrieval uses the last message as the query and passes the earlier
    /// ones along as history; `top_k` only applies there.
    pub async fn respond(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        top_k: Option<usize>,
    ) -> Result<String, ApiError> {
        let choice: ModelChoice = model.unwrap_or(DEFAULT_MODEL).parse()?;
        tracing::info!(model = %choice, messages = messages.len(), "Chat request");

        match choice {
            ModelChoice::OpenAi => self.ask(self.openai.as_ref(), messages).await,
            ModelChoice::Llama => self.ask(self.llama.as_ref(), messages).await,
            ModelChoice::Rag => {
                let (query, history) = match messages.split_last() {
                    Some((latest, history)) => (latest.content.as_str(), history),
                    None => ("", messages),
                };
                let top_k = top_k.unwrap_or_else(|| self.retrieval.default_top_k());
                Ok(self.retrieval.retrieve(query, top_k, history).await?)
            }
        }
    }

    async fn ask(
        &self,
        provider: &dyn LlmProvider,
        messages: &[ChatMessage],
    ) -> Result<String, ApiError> {
        let request = ChatRequest::with_system_prompt(&self.system_prompt, messages);
        provider.chat(request).await.map_err(|err| {
            tracing::error!(provider = provider.name(), "Provider call failed: {}", err);
            err
        })
    }
}
