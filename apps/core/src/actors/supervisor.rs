use crate::actors::conversation::InMemoryConversationStore;
use crate::actors::llm::LlmActorHandle;
use crate::actors::messages::{AppError, ExternalServiceError, SupervisorMessage};
use crate::actors::traits::{ConversationStore, LlmActor};
use crate::brain::{
    IntentClassifier, IntentResolver, KeywordGate, MemoryCompiler, ProfileContext,
    ResponseGenerator, SafetyReviewer,
};
use crate::config::PipelineConfig;
use crate::models::{PipelineOutput, TriageReport, Utterance};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Runs utterances through the full triage pipeline.
///
/// Stages run strictly in order: keyword gate, classifier, resolver,
/// responder, safety reviewer, memory compiler. The conversation guard is
/// taken before the first model call and released after the memory note is
/// recorded, so utterances sharing a conversation id never interleave.
pub struct TriageSupervisor<L, S>
where
    L: LlmActor,
    S: ConversationStore,
{
    gate: KeywordGate,
    classifier: IntentClassifier<L>,
    resolver: IntentResolver,
    responder: ResponseGenerator<L>,
    reviewer: SafetyReviewer<L>,
    memory: MemoryCompiler,
    store: Arc<S>,
}

impl<L, S> TriageSupervisor<L, S>
where
    L: LlmActor,
    S: ConversationStore,
{
    pub fn new(llm: Arc<L>, store: Arc<S>, config: &PipelineConfig) -> Self {
        Self {
            gate: KeywordGate::new(),
            classifier: IntentClassifier::new(Arc::clone(&llm), config.classifier_model.clone()),
            resolver: IntentResolver::new(),
            responder: ResponseGenerator::with_limits(
                Arc::clone(&llm),
                config.responder_model.clone(),
                config.context_window,
                config.history_cap,
            ),
            reviewer: SafetyReviewer::new(llm, config.safety_model.clone()),
            memory: MemoryCompiler::new(),
            store,
        }
    }

    /// Replaces the default lexicons.
    pub fn with_keyword_gate(mut self, gate: KeywordGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Processes one utterance end to end.
    ///
    /// Classifier and safety failures degrade to their defaults. A failed
    /// reply fails the whole utterance with `AppError::ExternalService` and
    /// leaves the history untouched.
    #[instrument(skip_all, fields(conversation_id = tracing::field::Empty))]
    pub async fn handle(&self, utterance: Utterance) -> Result<PipelineOutput, AppError> {
        utterance.validate()?;
        let text = utterance.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Utterance text is empty".to_string()));
        }

        let conversation_id = utterance
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        tracing::Span::current().record("conversation_id", conversation_id.as_str());

        let keywords = self.gate.evaluate(text);
        let matched_keywords: Vec<String> = self
            .gate
            .matched_keywords(text)
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut conversation = self.store.acquire(&conversation_id).await;

        let classification = self.classifier.classify(text).await;
        let resolved = self.resolver.resolve(&keywords, classification.value());

        let context = ProfileContext {
            profile: utterance.profile.clone(),
            notes: utterance.notes.clone(),
            memory: conversation.memory_notes(),
        };
        let reply = self
            .responder
            .generate(&mut conversation, &resolved, text, &context)
            .await?;

        let safety = self
            .reviewer
            .review(text, &reply.text, &resolved, keywords.emergency_hit)
            .await;
        let memory_note = self.memory.compile(safety.value());
        if !memory_note.is_empty() {
            conversation.remember(memory_note.clone());
        }
        drop(conversation);

        let classifier_fallback = classification.is_fallback();
        let safety_fallback = safety.is_fallback();
        let safety = safety.into_inner();
        let store = safety.should_store();

        info!(
            intent = %resolved.intent,
            rule = ?resolved.rule,
            template = reply.template.name(),
            classifier_fallback,
            safety_fallback,
            store,
            "Utterance handled"
        );

        Ok(PipelineOutput {
            conversation_id,
            reply: reply.text,
            memory_note,
            report: TriageReport {
                keywords,
                matched_keywords,
                classification: classification.into_inner(),
                classifier_fallback,
                resolved,
                template: reply.template.name().to_string(),
                safety,
                safety_fallback,
                store,
                processed_at: Utc::now(),
            },
        })
    }
}

impl TriageSupervisor<LlmActorHandle, InMemoryConversationStore> {
    /// Wires the production completion actor and in-memory store.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AppError> {
        let llm = Arc::new(LlmActorHandle::new(config)?);
        let store = Arc::new(InMemoryConversationStore::from_config(config));
        Ok(Self::new(llm, store, config))
    }
}

/// A handle to the supervisor actor.
///
/// This is the primary entry point for callers that prefer message passing.
/// Every utterance is processed on its own task, so a slow conversation
/// never blocks the mailbox. There is no deadline at this level: each
/// completion call is already bounded by the LLM actor, and a caller is only
/// ever told about an utterance once its outcome is final.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
}

impl SupervisorHandle {
    /// Creates the production supervisor and returns a handle to it.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, AppError> {
        let supervisor = TriageSupervisor::from_config(config)?;
        Ok(Self::spawn(Arc::new(supervisor)))
    }

    /// Spawns a runner around an existing supervisor.
    pub fn spawn<L, S>(supervisor: Arc<TriageSupervisor<L, S>>) -> Self
    where
        L: LlmActor,
        S: ConversationStore,
    {
        let (sender, receiver) = mpsc::channel(32);
        let runner = SupervisorRunner {
            receiver,
            supervisor,
        };
        tokio::spawn(async move { runner.run().await });
        Self { sender }
    }

    #[instrument(skip_all)]
    pub async fn process_utterance(&self, utterance: Utterance) -> Result<PipelineOutput, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProcessUtterance {
            utterance,
            responder: send,
        };
        self.sender
            .send(msg)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        recv.await.map_err(|e| unavailable(e.to_string()))?
    }

    pub async fn shutdown(&self) -> Result<(), AppError> {
        self.sender
            .send(SupervisorMessage::Shutdown)
            .await
            .map_err(|e| unavailable(e.to_string()))
    }
}

fn unavailable(reason: String) -> AppError {
    AppError::ExternalService(ExternalServiceError::Transport(format!(
        "supervisor unavailable: {}",
        reason
    )))
}

// --- Actor Runner ---
struct SupervisorRunner<L, S>
where
    L: LlmActor,
    S: ConversationStore,
{
    receiver: mpsc::Receiver<SupervisorMessage>,
    supervisor: Arc<TriageSupervisor<L, S>>,
}

impl<L, S> SupervisorRunner<L, S>
where
    L: LlmActor,
    S: ConversationStore,
{
    async fn run(mut self) {
        info!("Supervisor started");
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                SupervisorMessage::ProcessUtterance {
                    utterance,
                    responder,
                } => {
                    let supervisor = Arc::clone(&self.supervisor);
                    tokio::spawn(async move {
                        let result = supervisor.handle(utterance).await;
                        if let Err(e) = &result {
                            error!("Error processing utterance: {}", e);
                        }
                        let _ = responder.send(result);
                    });
                }
                SupervisorMessage::Shutdown => {
                    info!("Supervisor shutting down...");
                    break;
                }
            }
        }
        info!("Supervisor stopped");
    }
}
