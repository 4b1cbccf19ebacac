pub mod generator;
pub mod openai_compat;
pub mod prompt;
pub mod provider;
pub mod types;

pub use generator::ProviderGenerator;
pub use openai_compat::OpenAiCompatibleProvider;
pub use prompt::{system_prompt, SOMMELIER_SYSTEM_PROMPT};
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
