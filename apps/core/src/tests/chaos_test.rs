//! Chaos Tests
//!
//! Concurrency, slow dependencies and failures.

use super::actor_tests::{
    classifier_json, safety_json, supervisor_with, test_config, Script, ScriptedLlm,
    CLASSIFIER_MODEL, RESPONDER_MODEL, SAFETY_MODEL,
};
use crate::actors::messages::{AppError, ExternalServiceError};
use crate::actors::supervisor::{SupervisorHandle, TriageSupervisor};
use crate::actors::traits::ConversationStore;
use crate::brain::Intent;
use crate::models::{Role, Utterance};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn echo_pipeline(delay_ms: u64) -> ScriptedLlm {
    ScriptedLlm::new()
        .reply(CLASSIFIER_MODEL, &classifier_json("smalltalk"))
        .script(RESPONDER_MODEL, Script::Echo)
        .reply(SAFETY_MODEL, &safety_json(false, false, "N/A"))
        .with_delay(delay_ms)
}

#[tokio::test]
async fn test_chaos_same_conversation_never_interleaves() {
    let (_llm, supervisor) = supervisor_with(echo_pipeline(20));
    let supervisor = Arc::new(supervisor);

    let requests = (0..10).map(|i| {
        let supervisor = Arc::clone(&supervisor);
        async move {
            supervisor
                .handle(Utterance::new(format!("Message {}", i)).in_conversation("shared"))
                .await
        }
    });
    let results = join_all(requests).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let turns = supervisor.store().snapshot("shared").await;
    assert_eq!(turns.len(), 20);
    for pair in turns.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
    }
}

#[tokio::test]
async fn test_chaos_distinct_conversations_run_in_parallel() {
    // Three calls of 200ms each per utterance: 50 utterances in sequence
    // would take 30s.
    let (llm, supervisor) = supervisor_with(echo_pipeline(200));
    let handle = SupervisorHandle::spawn(Arc::new(supervisor));

    let start_time = std::time::Instant::now();
    let requests = (0..50).map(|i| {
        let handle = handle.clone();
        async move {
            handle
                .process_utterance(Utterance::new(format!("Message {}", i)).in_conversation(format!("c{}", i)))
                .await
        }
    });
    let results = join_all(requests).await;
    let total_duration = start_time.elapsed();

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(llm.call_count.load(Ordering::SeqCst), 150);
    assert!(
        total_duration < Duration::from_secs(3),
        "System is processing sequentially! Duration: {:?}",
        total_duration
    );
}

#[tokio::test]
async fn test_chaos_same_conversation_through_handle_waits_instead_of_failing() {
    // One utterance takes three 300ms calls; the second caller spends about
    // as long again queued on the conversation lock.
    let (_llm, supervisor) = supervisor_with(echo_pipeline(300));
    let supervisor = Arc::new(supervisor);
    let handle = SupervisorHandle::spawn(Arc::clone(&supervisor));

    let start_time = std::time::Instant::now();
    let requests = ["first", "second"].map(|text| {
        let handle = handle.clone();
        async move {
            handle
                .process_utterance(Utterance::new(text).in_conversation("same"))
                .await
        }
    });
    let results = join_all(requests).await;
    let total_duration = start_time.elapsed();

    assert!(total_duration >= Duration::from_millis(1_800));
    for result in &results {
        let output = result.as_ref().expect("queued utterance must not time out");
        assert_eq!(output.conversation_id, "same");
        assert!(output.reply == "echo: first" || output.reply == "echo: second");
    }

    let turns = supervisor.store().snapshot("same").await;
    assert_eq!(turns.len(), 4);
    let mut users: Vec<&str> = turns
        .chunks(2)
        .map(|pair| {
            assert_eq!(pair[1].content, format!("echo: {}", pair[0].content));
            pair[0].content.as_str()
        })
        .collect();
    users.sort_unstable();
    assert_eq!(users, vec!["first", "second"]);
}

#[tokio::test]
async fn test_resilience_under_failure() {
    let llm = ScriptedLlm::new()
        .reply(CLASSIFIER_MODEL, &classifier_json("smalltalk"))
        .fail(
            RESPONDER_MODEL,
            ExternalServiceError::Transport("connection reset".to_string()),
        )
        .with_delay(50);
    let (_llm, supervisor) = supervisor_with(llm);
    let handle = SupervisorHandle::spawn(Arc::new(supervisor));

    let first = handle.process_utterance(Utterance::new("Crash me")).await;
    assert!(matches!(
        first,
        Err(AppError::ExternalService(ExternalServiceError::Transport(msg))) if msg == "connection reset"
    ));

    // The runner is still alive and answers with the same pipeline error,
    // not a closed-channel error.
    let second = handle.process_utterance(Utterance::new("Am I alive?")).await;
    assert!(matches!(
        second,
        Err(AppError::ExternalService(ExternalServiceError::Transport(msg))) if msg == "connection reset"
    ));
}

#[tokio::test]
async fn test_chaos_slow_classifier_times_out_into_fallback() {
    let mock_server = MockServer::start().await;
    let mut config = test_config().with_base_url(mock_server.uri());
    config.call_timeout_secs = 1;

    let envelope = |content: String| {
        json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
    };

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": CLASSIFIER_MODEL })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(classifier_json("medical")))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": RESPONDER_MODEL })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope("Tell me more!".to_string())))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": SAFETY_MODEL })))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let supervisor = TriageSupervisor::from_config(&config).unwrap();
    let output = supervisor
        .handle(Utterance::new("the garden looks lovely"))
        .await
        .unwrap();

    assert!(output.report.classifier_fallback);
    assert_eq!(output.report.resolved.intent, Intent::Smalltalk);
    assert_eq!(output.reply, "Tell me more!");
    assert!(output.report.safety_fallback);
    assert_eq!(output.memory_note, "");
}
