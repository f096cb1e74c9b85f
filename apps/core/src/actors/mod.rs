//! Actors and the seams between them: the completion service, the
//! conversation store, and the supervisor that drives the pipeline.

pub mod conversation;
pub mod llm;
pub mod messages;
pub mod supervisor;
pub mod traits;
