use crate::actors::messages::{AppError, CompletionRequest, ExternalServiceError, LlmMessage};
use crate::actors::traits::LlmActor;
use crate::config::PipelineConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Completion endpoint, relative to the configured base URL.
const COMPLETIONS_PATH: &str = "chat/completions";

/// A handle to the `LlmActor`.
///
/// This struct provides a public, cloneable interface for sending completion
/// requests to the running actor. It abstracts away the `mpsc::Sender` and
/// bounds every wait with the configured call timeout.
#[derive(Clone)]
pub struct LlmActorHandle {
    sender: mpsc::Sender<LlmMessage>,
    call_timeout: Duration,
}

impl LlmActorHandle {
    /// Creates a new `LlmActor` and returns a handle to it.
    ///
    /// This will spawn the `LlmActorRunner` in a new Tokio task, so it must be
    /// called from within a runtime. Fails if the base URL or the headers
    /// derived from the config are invalid.
    pub fn new(config: &PipelineConfig) -> Result<Self, AppError> {
        let (sender, receiver) = mpsc::channel(32);
        let client = CompletionClient::new(config)?;
        let actor = LlmActorRunner { receiver, client };
        tokio::spawn(async move { actor.run().await });
        Ok(Self {
            sender,
            call_timeout: config.call_timeout(),
        })
    }
}

#[async_trait]
impl LlmActor for LlmActorHandle {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ExternalServiceError> {
        let (send, recv) = oneshot::channel();
        let msg = LlmMessage::Complete {
            request,
            responder: send,
        };

        self.sender
            .send(msg)
            .await
            .map_err(|e| ExternalServiceError::Transport(format!("completion actor unavailable: {}", e)))?;
        timeout(self.call_timeout, recv)
            .await?
            .map_err(|e| ExternalServiceError::Transport(format!("completion actor dropped the request: {}", e)))?
    }
}

// --- Actor Runner (Internal Logic) ---
struct LlmActorRunner {
    receiver: mpsc::Receiver<LlmMessage>,
    client: CompletionClient,
}

impl LlmActorRunner {
    async fn run(mut self) {
        info!("LlmActor started");

        // Each request gets its own task so one slow completion does not hold
        // up unrelated conversations.
        while let Some(msg) = self.receiver.recv().await {
            let client = self.client.clone();
            tokio::spawn(async move { client.handle_message(msg).await });
        }

        info!("LlmActor stopped");
    }
}

/// Speaks the OpenAI-compatible chat completion protocol.
#[derive(Clone)]
struct CompletionClient {
    http: Client,
    endpoint: Url,
}

#[derive(Debug, Deserialize)]
struct CompletionEnvelope {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl CompletionClient {
    fn new(config: &PipelineConfig) -> Result<Self, AppError> {
        let mut base = Url::parse(&config.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(COMPLETIONS_PATH)?;

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", config.api_key))?);
        headers.insert("HTTP-Referer", header_value(&config.referer)?);
        headers.insert("X-Title", header_value(&config.title)?);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.call_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, endpoint })
    }

    async fn handle_message(&self, msg: LlmMessage) {
        match msg {
            LlmMessage::Complete { request, responder } => {
                let result = self.complete(request).await;
                let _ = responder.send(result);
            }
        }
    }

    #[instrument(skip_all, fields(model = %request.model_id, structured = request.structured_output))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, ExternalServiceError> {
        let mut payload = serde_json::json!({
            "model": request.model_id,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_content },
            ],
        });
        if request.structured_output {
            payload["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        let res = self
            .http
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Completion request rejected");
            return Err(ExternalServiceError::NonSuccessStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = res.text().await?;
        let envelope: CompletionEnvelope = serde_json::from_str(&body).map_err(|e| {
            ExternalServiceError::Transport(format!("malformed completion envelope: {}", e))
        })?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                ExternalServiceError::Transport("malformed completion envelope: no message content".to_string())
            })?;

        debug!(chars = content.len(), "Completion received");
        Ok(content)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value).map_err(|e| AppError::Config(format!("Invalid header value: {}", e)))
}
