pub mod chat;
pub mod core;
pub mod llm;
pub mod retrieval;
pub mod server;
pub mod state;
