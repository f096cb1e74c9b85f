//! Model-backed intent classification.
//!
//! One structured completion per utterance. Any failure, be it transport,
//! status, timeout or schema, yields the fixed smalltalk fallback.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::intent::{clamp_confidence, ClassificationResult, Intent};
use super::json_repair::{extract_json_object, json_kind};
use super::verdict::{FallbackReason, Verdict};
use crate::actors::messages::CompletionRequest;
use crate::actors::traits::LlmActor;
use crate::error::SchemaViolation;

pub const SYSTEM_CLASSIFIER: &str = r#"You classify a single user message.
Return ONLY JSON with keys:
intent: one of ["smalltalk","medical","emergency_candidate","routine_checkin"]
essence: short noun phrase for the main topic, like "lower back pain" or "cookies"
red_flags: array of strings for any dangerous signals present
confidence: number 0..1 for your intent decision
No extra text."#;

/// Wraps the classification completion call.
pub struct IntentClassifier<L: LlmActor> {
    llm: Arc<L>,
    model_id: String,
}

impl<L: LlmActor> IntentClassifier<L> {
    pub fn new(llm: Arc<L>, model_id: impl Into<String>) -> Self {
        Self {
            llm,
            model_id: model_id.into(),
        }
    }

    /// Classifies `text`. Never fails: problems are logged and collapsed
    /// into [`ClassificationResult::fallback`].
    #[instrument(skip(self, text), fields(model = %self.model_id, text_len = text.len()))]
    pub async fn classify(&self, text: &str) -> Verdict<ClassificationResult> {
        let verdict = Verdict::collapse(self.try_classify(text).await, ClassificationResult::fallback);
        if let Some(reason) = verdict.fallback_reason() {
            warn!(stage = "classifier", %reason, "Classifier failed, falling back to smalltalk");
        }
        verdict
    }

    async fn try_classify(&self, text: &str) -> Result<ClassificationResult, FallbackReason> {
        let request = CompletionRequest::structured(&self.model_id, SYSTEM_CLASSIFIER, text);
        let raw = self.llm.complete(request).await?;
        debug!(raw = %raw, "Classifier raw output");
        Ok(parse_classification(&raw)?)
    }
}

/// Validates a classifier payload.
///
/// `intent` is mandatory and must be one of the four labels. The other
/// fields are repaired rather than rejected: a non-string essence becomes
/// empty, a lone string red flag becomes a one-element set, and a
/// non-numeric confidence becomes 0.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, SchemaViolation> {
    let map = extract_json_object(raw)?;

    let intent = match map.get("intent") {
        None | Some(Value::Null) => return Err(SchemaViolation::MissingField("intent")),
        Some(Value::String(label)) => Intent::from_label(label).ok_or_else(|| {
            SchemaViolation::InvalidField {
                field: "intent",
                reason: format!("unknown intent `{}`", label),
            }
        })?,
        Some(other) => {
            return Err(SchemaViolation::InvalidField {
                field: "intent",
                reason: format!("expected a string, got {}", json_kind(other)),
            })
        }
    };

    Ok(ClassificationResult {
        intent,
        essence: read_essence(&map),
        red_flags: read_red_flags(&map),
        confidence: read_confidence(&map),
    })
}

fn read_essence(map: &Map<String, Value>) -> String {
    match map.get("essence") {
        Some(Value::String(essence)) => essence.trim().to_string(),
        _ => String::new(),
    }
}

fn read_red_flags(map: &Map<String, Value>) -> BTreeSet<String> {
    let flags: Vec<&str> = match map.get("red_flags") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(single)) => vec![single.as_str()],
        _ => Vec::new(),
    };
    flags
        .into_iter()
        .map(str::trim)
        .filter(|flag| !flag.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_confidence(map: &Map<String, Value>) -> f32 {
    let value = match map.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    clamp_confidence(value as f32)
}
