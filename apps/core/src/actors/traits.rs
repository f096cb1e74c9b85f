use crate::actors::conversation::ConversationGuard;
use crate::actors::messages::{CompletionRequest, ExternalServiceError};
use crate::models::ConversationTurn;
use async_trait::async_trait;

/// Defines the public interface for the completion service.
///
/// This trait abstracts the concrete protocol, allowing the HTTP actor and
/// scripted test doubles to be used interchangeably by every pipeline stage.
#[async_trait]
pub trait LlmActor: Send + Sync + 'static {
    /// Runs one completion and returns the raw text the model produced.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ExternalServiceError>;
}

/// Defines the public interface for per-conversation turn history.
///
/// Implementations must hand out at most one guard per conversation id at a
/// time; requests for different ids must not wait on each other.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    /// Waits for exclusive access to a conversation, creating it if needed.
    async fn acquire(&self, conversation_id: &str) -> ConversationGuard;

    /// Returns a copy of the stored turns, oldest first. Unknown ids yield an
    /// empty history.
    async fn snapshot(&self, conversation_id: &str) -> Vec<ConversationTurn>;

    /// Number of conversation ids currently tracked.
    fn conversation_count(&self) -> usize;

    /// Drops idle conversations and returns how many were removed.
    fn evict_idle(&self) -> usize;
}
