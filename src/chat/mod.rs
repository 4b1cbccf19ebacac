pub mod orchestrator;

pub use orchestrator::{ChatOrchestrator, ModelChoice, DEFAULT_MODEL};
