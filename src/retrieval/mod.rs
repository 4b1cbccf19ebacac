//! Retrieval subsystem: embedder, exact vector index, and the service that
//! turns a query into rendered recommendations.

pub mod corpus;
pub mod document;
pub mod embedder;
pub mod error;
pub mod index;
pub mod npy;
pub mod render;
pub mod service;

pub use corpus::load_corpus;
pub use document::{Document, ScoredDocument};
pub use embedder::{Embedder, HttpEmbedder};
pub use error::{
    CorpusError, EmbeddingError, IndexError, RetrievalError, RetrievalFailure, NO_RESULTS_MESSAGE,
    RETRIEVAL_APOLOGY,
};
pub use index::VectorIndex;
pub use render::Generator;
pub use service::{Rendering, RetrievalService};
