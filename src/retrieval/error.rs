use thiserror::Error;

use crate::core::errors::ApiError;

/// Shown to end users whenever retrieval fails, whatever the cause.
pub const RETRIEVAL_APOLOGY: &str =
    "Sorry, I encountered an error while fetching wine recommendations.";

/// Returned instead of an empty body when the corpus yields no hits.
pub const NO_RESULTS_MESSAGE: &str =
    "Sorry, I couldn't find any wines matching your request.";

/// The embedding model could not produce a vector.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("cannot embed empty input")]
    EmptyInput,
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("embedding endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("dimension mismatch on {subject}: expected {expected}, got {actual}")]
    DimensionMismatch {
        subject: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid k: top_k must be positive")]
    InvalidK,
}

/// Load-time failures. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid embedding matrix {path}: {message}")]
    Npy { path: String, message: String },
    #[error("invalid metadata {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("embedding matrix {path} has a non-finite value in row {row}")]
    NonFinite { path: String, row: usize },
    #[error("metadata {path} has no '{column}' column")]
    MissingColumn { path: String, column: String },
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Internal cause of a failed retrieval. Never leaves the retrieval boundary.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("generation failed: {0}")]
    Generation(#[from] ApiError),
}

/// The only error retrieval exposes. `Display` is the user-safe apology;
/// the cause is reachable through [`RetrievalFailure::diagnostic`] and
/// `source()` for logging.
#[derive(Debug, Error)]
#[error("{}", RETRIEVAL_APOLOGY)]
pub struct RetrievalFailure {
    #[source]
    cause: RetrievalError,
}

impl RetrievalFailure {
    pub fn new(cause: impl Into<RetrievalError>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    pub fn user_message(&self) -> &'static str {
        RETRIEVAL_APOLOGY
    }

    pub fn diagnostic(&self) -> String {
        self.cause.to_string()
    }

    pub fn cause(&self) -> &RetrievalError {
        &self.cause
    }
}
