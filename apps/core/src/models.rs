use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::brain::{ClassificationResult, KeywordSignals, ResolvedIntent, SafetyAssessment};

/// Longest utterance accepted by the pipeline, in characters.
pub const MAX_UTTERANCE_LEN: u64 = 8_000;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Upper-case label used when rendering a transcript for the model.
    pub fn transcript_label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

/// Represents a single message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// The role of the message sender.
    pub role: Role,
    /// The text content of the message.
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What the caller knows about the person speaking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnoses: Vec<String>,
    /// Any further free-form attributes (medications, living situation...).
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One unit of user input submitted for processing.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Utterance {
    /// The raw text as spoken or typed.
    #[validate(length(min = 1, max = MAX_UTTERANCE_LEN))]
    pub text: String,
    /// The conversation this utterance continues. A fresh id is assigned when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub profile: Option<CallerProfile>,
    /// Free-text notes from the caller (care plan, last visit...).
    #[serde(default)]
    pub notes: Option<String>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            profile: None,
            notes: None,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_profile(mut self, profile: CallerProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Every decision taken while handling one utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageReport {
    pub keywords: KeywordSignals,
    /// Medical lexicon entries found in the text, in lexicon order.
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    pub classification: ClassificationResult,
    /// Whether the classifier stage fell back to its default verdict.
    pub classifier_fallback: bool,
    pub resolved: ResolvedIntent,
    /// Name of the response template used for the reply.
    pub template: String,
    pub safety: SafetyAssessment,
    /// Whether the safety stage fell back to its default verdict.
    pub safety_fallback: bool,
    /// Whether the exchange warrants durable storage.
    pub store: bool,
    pub processed_at: DateTime<Utc>,
}

/// Result of the pipeline entrypoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub conversation_id: String,
    pub reply: String,
    /// Tagged summary for future turns; empty means "do not store".
    pub memory_note: String,
    pub report: TriageReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterance_builder() {
        let utterance = Utterance::new("hello")
            .in_conversation("conv-1")
            .with_notes("Baseline: mild chronic knee pain.");

        assert_eq!(utterance.text, "hello");
        assert_eq!(utterance.conversation_id.as_deref(), Some("conv-1"));
        assert!(utterance.profile.is_none());
        assert_eq!(
            utterance.notes.as_deref(),
            Some("Baseline: mild chronic knee pain.")
        );
    }

    #[test]
    fn test_utterance_length_validation() {
        assert!(Utterance::new("hi").validate().is_ok());
        assert!(Utterance::new("").validate().is_err());
        let limit = "a".repeat(MAX_UTTERANCE_LEN as usize);
        assert!(Utterance::new(limit).validate().is_ok());
        let long = "a".repeat(MAX_UTTERANCE_LEN as usize + 1);
        assert!(Utterance::new(long).validate().is_err());
    }

    #[test]
    fn test_profile_flattens_extra_fields() {
        let profile: CallerProfile = serde_json::from_str(
            r#"{"age": 82, "diagnoses": ["hypertension"], "lives_alone": true}"#,
        )
        .unwrap();

        assert_eq!(profile.age, Some(82));
        assert_eq!(profile.diagnoses, vec!["hypertension".to_string()]);
        assert_eq!(profile.extra.get("lives_alone"), Some(&serde_json::json!(true)));

        let rendered = serde_json::to_value(&profile).unwrap();
        assert_eq!(rendered["lives_alone"], serde_json::json!(true));
    }

    #[test]
    fn test_role_serialization() {
        let turn = ConversationTurn::assistant("How are you?");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::User.transcript_label(), "USER");
    }
}
