use std::sync::Arc;

use crate::chat::ChatOrchestrator;
use crate::core::config::{AppPaths, AppSettings, ConfigService, RenderingPolicy};
use crate::llm::{system_prompt, LlmProvider, OpenAiCompatibleProvider, ProviderGenerator};
use crate::retrieval::{load_corpus, Embedder, HttpEmbedder, Rendering, RetrievalService, VectorIndex};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
///
/// Everything here is built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<AppSettings>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading and validating configuration
    /// 2. Loading the embedding matrix and wine metadata
    /// 3. Setting up the embedder and the hosted chat providers
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let index = load_corpus(&paths, &settings.retrieval)
            .map_err(|e| InitializationError::Corpus(e.into()))?;
        if index.is_empty() {
            tracing::warn!("Wine corpus is empty; retrieval will only return the placeholder");
        }

        let embedder = HttpEmbedder::new(&settings.embedding, settings.retrieval.dimension)
            .map_err(|e| InitializationError::Embedder(e.into()))?;
        tracing::info!(model = embedder.model(), "Embedder configured");

        let openai = OpenAiCompatibleProvider::new("openai", &settings.providers.openai())
            .map_err(|e| InitializationError::Provider(e.into()))?;
        let llama = OpenAiCompatibleProvider::new("llama", &settings.providers.llama())
            .map_err(|e| InitializationError::Provider(e.into()))?;

        Ok(Self::assemble(
            settings,
            Arc::new(embedder),
            index,
            Arc::new(openai),
            Arc::new(llama),
        ))
    }

    /// Wires already-constructed collaborators together.
    pub fn assemble(
        settings: AppSettings,
        embedder: Arc<dyn Embedder>,
        index: VectorIndex,
        openai: Arc<dyn LlmProvider>,
        llama: Arc<dyn LlmProvider>,
    ) -> Arc<Self> {
        let prompt = system_prompt(&settings.prompt);

        let rendering = match settings.retrieval.rendering {
            RenderingPolicy::Listing => Rendering::Listing {
                header: settings.retrieval.listing_header.clone(),
            },
            RenderingPolicy::Generate => {
                let provider = match settings.retrieval.generator_provider.as_str() {
                    "llama" => llama.clone(),
                    _ => openai.clone(),
                };
                tracing::info!(provider = provider.name(), "Retrieval renders through a provider");
                Rendering::Generate {
                    generator: Arc::new(ProviderGenerator::new(provider)),
                    system_prompt: prompt.clone(),
                }
            }
        };

        let retrieval = Arc::new(RetrievalService::new(
            embedder,
            index,
            rendering,
            settings.retrieval.top_k,
        ));
        let orchestrator = Arc::new(ChatOrchestrator::new(openai, llama, retrieval, prompt));

        Arc::new(AppState {
            settings: Arc::new(settings),
            orchestrator,
        })
    }

    pub fn retrieval(&self) -> &RetrievalService {
        self.orchestrator.retrieval()
    }
}
