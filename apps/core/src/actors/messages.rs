use serde::Serialize;
use tokio::sync::oneshot;

use crate::models::{PipelineOutput, Utterance};

/// Defines the failures of a single call to the completion service.
///
/// Every variant is recoverable by the classifier and the safety reviewer;
/// only the response generator lets it escape to the caller.
#[derive(Debug, thiserror::Error, Serialize, Clone, PartialEq, Eq)]
pub enum ExternalServiceError {
    /// The call did not complete within its bounded timeout.
    #[error("Completion call timed out: {0}")]
    Timeout(String),
    /// The service answered with a non-success HTTP status.
    #[error("Completion request failed with status {status}: {body}")]
    NonSuccessStatus { status: u16, body: String },
    /// The service could not be reached or returned an unusable envelope.
    #[error("Completion transport failed: {0}")]
    Transport(String),
}

impl From<tokio::time::error::Elapsed> for ExternalServiceError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ExternalServiceError::Timeout(format!("Completion call timed out: {}", err))
    }
}

impl From<reqwest::Error> for ExternalServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExternalServiceError::Timeout(err.to_string())
        } else {
            ExternalServiceError::Transport(err.to_string())
        }
    }
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// One request to the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model_id: String,
    pub system_prompt: String,
    pub user_content: String,
    /// Ask the service for a JSON object instead of free text.
    pub structured_output: bool,
}

impl CompletionRequest {
    /// A free-text request.
    pub fn text(
        model_id: impl Into<String>,
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            system_prompt: system_prompt.into(),
            user_content: user_content.into(),
            structured_output: false,
        }
    }

    /// A request whose answer must be a JSON object.
    pub fn structured(
        model_id: impl Into<String>,
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
    ) -> Self {
        Self {
            structured_output: true,
            ..Self::text(model_id, system_prompt, user_content)
        }
    }
}

/// Messages that can be sent to the `LlmActor`.
#[derive(Debug)]
pub enum LlmMessage {
    /// A request to generate a complete response.
    Complete {
        request: CompletionRequest,
        /// A channel to send the completion text back.
        responder: oneshot::Sender<Result<String, ExternalServiceError>>,
    },
}

/// Messages that can be sent to the supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Run one utterance through the whole pipeline.
    ProcessUtterance {
        utterance: Utterance,
        responder: oneshot::Sender<Result<PipelineOutput, AppError>>,
    },
    /// Stop accepting new utterances. In-flight ones still complete.
    Shutdown,
}
