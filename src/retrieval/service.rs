use std::sync::Arc;

use super::embedder::Embedder;
use super::error::{RetrievalError, RetrievalFailure, NO_RESULTS_MESSAGE};
use super::index::VectorIndex;
use super::render::{build_context, render_listing, Generator};
use crate::llm::ChatMessage;

/// How hits become response text. Fixed when the service is built.
pub enum Rendering {
    /// Header plus one verbatim bullet per hit.
    Listing { header: String },
    /// Hits become context for a downstream generator.
    Generate {
        generator: Arc<dyn Generator>,
        system_prompt: String,
    },
}

/// Embed, search, render. Shared read-only across requests.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    index: VectorIndex,
    rendering: Rendering,
    default_top_k: usize,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: VectorIndex,
        rendering: Rendering,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            rendering,
            default_top_k,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Answers `query` from the corpus.
    ///
    /// `history` is accepted for interface parity with the chat providers
    /// and does not influence ranking or rendering. Every failure surfaces
    /// as a [`RetrievalFailure`] whose display text is the fixed apology;
    /// the cause is logged here.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        history: &[ChatMessage],
    ) -> Result<String, RetrievalFailure> {
        tracing::debug!(top_k, history_turns = history.len(), "Retrieving");
        self.run(query, top_k).await.map_err(|cause| {
            let failure = RetrievalFailure::new(cause);
            tracing::error!(error = %failure.diagnostic(), "Retrieval failed");
            failure
        })
    }

    async fn run(&self, query: &str, top_k: usize) -> Result<String, RetrievalError> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.index.search(&vector, top_k)?;
        tracing::debug!(hits = hits.len(), "Search complete");

        if hits.is_empty() {
            return Ok(NO_RESULTS_MESSAGE.to_string());
        }

        match &self.rendering {
            Rendering::Listing { header } => Ok(render_listing(header, &hits)),
            Rendering::Generate {
                generator,
                system_prompt,
            } => {
                let context = build_context(&hits);
                Ok(generator.generate(system_prompt, &context, query).await?)
            }
        }
    }
}
