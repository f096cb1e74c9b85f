//! Post-hoc safety and storage review of a completed exchange.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::intent::ResolvedIntent;
use super::json_repair::{extract_json_object, json_kind};
use super::verdict::{FallbackReason, Verdict};
use crate::actors::messages::CompletionRequest;
use crate::actors::traits::LlmActor;
use crate::error::SchemaViolation;

pub const SYSTEM_SAFETY: &str = r#"You judge the reply and create a storage summary.
Return ONLY JSON with:
medically_relevant: boolean
emergency: boolean
safety_ok: boolean
db_summary: string (one short line worth remembering, or "N/A")"#;

/// Placeholder summary meaning "nothing worth storing".
pub const NO_SUMMARY: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub medically_relevant: bool,
    pub emergency: bool,
    /// Whether the reply was safe to have sent.
    pub safety_ok: bool,
    pub db_summary: String,
}

impl Default for SafetyAssessment {
    fn default() -> Self {
        Self::fallback()
    }
}

impl SafetyAssessment {
    /// The assessment used whenever the review cannot be obtained.
    pub fn fallback() -> Self {
        Self {
            medically_relevant: false,
            emergency: false,
            safety_ok: true,
            db_summary: NO_SUMMARY.to_string(),
        }
    }

    /// Storage is warranted for medically relevant or emergency exchanges.
    pub fn should_store(&self) -> bool {
        self.medically_relevant || self.emergency
    }

    /// OR-merges the deterministic upstream signals into the verdict.
    /// Neither flag can be cleared by the model.
    pub fn merge_signals(mut self, resolved: &ResolvedIntent, emergency_gate: bool) -> Self {
        self.medically_relevant |= resolved.intent.is_clinical();
        self.emergency |= emergency_gate;
        self
    }
}

pub struct SafetyReviewer<L: LlmActor> {
    llm: Arc<L>,
    model_id: String,
}

impl<L: LlmActor> SafetyReviewer<L> {
    pub fn new(llm: Arc<L>, model_id: impl Into<String>) -> Self {
        Self {
            llm,
            model_id: model_id.into(),
        }
    }

    /// Reviews one exchange. Never fails: on any problem the fallback
    /// assessment is used, and the deterministic signals are merged in
    /// either way.
    #[instrument(skip_all, fields(model = %self.model_id, intent = %resolved.intent, emergency_gate = emergency_gate))]
    pub async fn review(
        &self,
        user_text: &str,
        reply_text: &str,
        resolved: &ResolvedIntent,
        emergency_gate: bool,
    ) -> Verdict<SafetyAssessment> {
        let verdict = Verdict::collapse(
            self.try_review(user_text, reply_text).await,
            SafetyAssessment::fallback,
        );
        if let Some(reason) = verdict.fallback_reason() {
            warn!(stage = "safety", %reason, "Safety review failed, using default flags");
        }

        let verdict = verdict.map(|assessment| assessment.merge_signals(resolved, emergency_gate));
        let assessment = verdict.value();
        info!(
            medically_relevant = assessment.medically_relevant,
            emergency = assessment.emergency,
            safety_ok = assessment.safety_ok,
            "Safety review complete"
        );
        verdict
    }

    async fn try_review(
        &self,
        user_text: &str,
        reply_text: &str,
    ) -> Result<SafetyAssessment, FallbackReason> {
        let transcript = format!("USER:\n{}\n---\nASSISTANT:\n{}", user_text, reply_text);
        let request = CompletionRequest::structured(&self.model_id, SYSTEM_SAFETY, transcript);
        let raw = self.llm.complete(request).await?;
        debug!(raw = %raw, "Safety raw output");
        Ok(parse_assessment(&raw)?)
    }
}

/// Validates a safety payload. Absent fields take the fallback's value; a
/// field that is present with the wrong type is rejected.
pub fn parse_assessment(raw: &str) -> Result<SafetyAssessment, SchemaViolation> {
    let map = extract_json_object(raw)?;
    let defaults = SafetyAssessment::fallback();

    let db_summary = match map.get("db_summary") {
        None | Some(Value::Null) => defaults.db_summary,
        Some(Value::String(summary)) => summary.trim().to_string(),
        Some(other) => {
            return Err(SchemaViolation::InvalidField {
                field: "db_summary",
                reason: format!("expected a string, got {}", json_kind(other)),
            })
        }
    };

    Ok(SafetyAssessment {
        medically_relevant: read_flag(&map, "medically_relevant", defaults.medically_relevant)?,
        emergency: read_flag(&map, "emergency", defaults.emergency)?,
        safety_ok: read_flag(&map, "safety_ok", defaults.safety_ok)?,
        db_summary,
    })
}

fn read_flag(
    map: &Map<String, Value>,
    field: &'static str,
    default: bool,
) -> Result<bool, SchemaViolation> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(SchemaViolation::InvalidField {
            field,
            reason: format!("expected a boolean, got {}", json_kind(other)),
        }),
    }
}
