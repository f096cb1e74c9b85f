//! HygieiAI core: triage pipeline for utterances from older adults living at home.
//!
//! An utterance flows through a keyword gate, a model-backed intent
//! classifier, a precedence resolver, a history-aware reply generator and a
//! safety reviewer, and comes out as a reply plus a tagged memory note.

pub mod actors;
pub mod brain;
pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use actors::conversation::{ConversationState, InMemoryConversationStore};
pub use actors::llm::LlmActorHandle;
pub use actors::supervisor::{SupervisorHandle, TriageSupervisor};
pub use config::PipelineConfig;
pub use error::AppError;
pub use models::{PipelineOutput, TriageReport, Utterance};
