//! Intent types and the resolver that merges lexical and model evidence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use super::keywords::KeywordSignals;

/// Red flag added whenever the keyword gate detects an emergency pattern.
pub const EMERGENCY_PATTERN_FLAG: &str = "emergency_pattern_hit";

/// Categorical purpose of an utterance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Casual conversation, no health content
    #[default]
    Smalltalk,
    /// A health complaint or question
    Medical,
    /// Possibly urgent; handled with the emergency template
    EmergencyCandidate,
    /// A scheduled "how are you today" exchange
    RoutineCheckin,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::Smalltalk,
        Intent::Medical,
        Intent::EmergencyCandidate,
        Intent::RoutineCheckin,
    ];

    /// Returns the wire label for the intent
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Smalltalk => "smalltalk",
            Intent::Medical => "medical",
            Intent::EmergencyCandidate => "emergency_candidate",
            Intent::RoutineCheckin => "routine_checkin",
        }
    }

    /// Parses a wire label, ignoring case and surrounding whitespace.
    /// Anything outside the four labels is rejected.
    pub fn from_label(label: &str) -> Option<Intent> {
        let label = label.trim();
        Intent::ALL
            .into_iter()
            .find(|intent| intent.label().eq_ignore_ascii_case(label))
    }

    /// Medical or emergency: the exchange is health-relevant by construction.
    pub fn is_clinical(&self) -> bool {
        matches!(self, Intent::Medical | Intent::EmergencyCandidate)
    }
}

/// Structured verdict produced by the intent classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub intent: Intent,
    /// Short noun phrase for the main topic ("lower back pain", "cookies").
    pub essence: String,
    pub red_flags: BTreeSet<String>,
    /// Always within [0, 1].
    pub confidence: f32,
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::fallback()
    }
}

impl ClassificationResult {
    /// Builds a result, clamping confidence into [0, 1] (non-finite becomes 0).
    pub fn new(
        intent: Intent,
        essence: impl Into<String>,
        red_flags: impl IntoIterator<Item = String>,
        confidence: f32,
    ) -> Self {
        Self {
            intent,
            essence: essence.into(),
            red_flags: red_flags.into_iter().collect(),
            confidence: clamp_confidence(confidence),
        }
    }

    /// The verdict used whenever classification cannot be obtained.
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Smalltalk,
            essence: String::new(),
            red_flags: BTreeSet::new(),
            confidence: 0.0,
        }
    }
}

pub(crate) fn clamp_confidence(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Which precedence rule produced the final intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionRule {
    /// The keyword gate saw an emergency pattern.
    EmergencyPattern,
    /// A medical keyword promoted a smalltalk classification.
    KeywordPromotion,
    /// The classifier's intent stood.
    Classifier,
}

/// The single authoritative intent for an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedIntent {
    pub intent: Intent,
    pub red_flags: BTreeSet<String>,
    pub rule: ResolutionRule,
}

/// Merges keyword gate output with the classifier verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentResolver;

impl IntentResolver {
    pub fn new() -> Self {
        Self
    }

    /// Applies the precedence rules, first match wins:
    /// 1. an emergency pattern forces `emergency_candidate` and adds the
    ///    `emergency_pattern_hit` flag;
    /// 2. a medical keyword promotes `smalltalk` (only) to `medical`;
    /// 3. otherwise the classifier's intent is kept.
    pub fn resolve(
        &self,
        keywords: &KeywordSignals,
        classification: &ClassificationResult,
    ) -> ResolvedIntent {
        let mut red_flags = classification.red_flags.clone();

        let (intent, rule) = if keywords.emergency_hit {
            red_flags.insert(EMERGENCY_PATTERN_FLAG.to_string());
            (Intent::EmergencyCandidate, ResolutionRule::EmergencyPattern)
        } else if keywords.medical_hit && classification.intent == Intent::Smalltalk {
            (Intent::Medical, ResolutionRule::KeywordPromotion)
        } else {
            (classification.intent, ResolutionRule::Classifier)
        };

        debug!(
            classifier_intent = %classification.intent,
            final_intent = %intent,
            rule = ?rule,
            "Intent resolved"
        );

        ResolvedIntent {
            intent,
            red_flags,
            rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(intent: Intent) -> ClassificationResult {
        ClassificationResult::new(intent, "topic", Vec::new(), 0.8)
    }

    #[test]
    fn test_label_round_trip() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_label(intent.label()), Some(intent));
        }
        assert_eq!(Intent::from_label("  Medical "), Some(Intent::Medical));
        assert_eq!(Intent::from_label("urgent"), None);
        assert_eq!(Intent::from_label(""), None);
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(ClassificationResult::new(Intent::Medical, "", Vec::new(), 1.7).confidence, 1.0);
        assert_eq!(ClassificationResult::new(Intent::Medical, "", Vec::new(), -0.2).confidence, 0.0);
        assert_eq!(ClassificationResult::new(Intent::Medical, "", Vec::new(), f32::NAN).confidence, 0.0);
    }

    #[test]
    fn test_emergency_overrides_everything() {
        let resolver = IntentResolver::new();
        let signals = KeywordSignals {
            medical_hit: true,
            emergency_hit: true,
        };

        for intent in Intent::ALL {
            let resolved = resolver.resolve(&signals, &classified(intent));
            assert_eq!(resolved.intent, Intent::EmergencyCandidate);
            assert_eq!(resolved.rule, ResolutionRule::EmergencyPattern);
            assert!(resolved.red_flags.contains(EMERGENCY_PATTERN_FLAG));
        }
    }

    #[test]
    fn test_emergency_flag_is_not_duplicated() {
        let resolver = IntentResolver::new();
        let classification = ClassificationResult::new(
            Intent::Medical,
            "chest pain",
            vec![EMERGENCY_PATTERN_FLAG.to_string(), "sweating".to_string()],
            0.9,
        );
        let resolved = resolver.resolve(
            &KeywordSignals {
                medical_hit: true,
                emergency_hit: true,
            },
            &classification,
        );

        let count = resolved
            .red_flags
            .iter()
            .filter(|flag| flag.as_str() == EMERGENCY_PATTERN_FLAG)
            .count();
        assert_eq!(count, 1);
        assert!(resolved.red_flags.contains("sweating"));
    }

    #[test]
    fn test_medical_keyword_only_promotes_smalltalk() {
        let resolver = IntentResolver::new();
        let signals = KeywordSignals {
            medical_hit: true,
            emergency_hit: false,
        };

        let resolved = resolver.resolve(&signals, &classified(Intent::Smalltalk));
        assert_eq!(resolved.intent, Intent::Medical);
        assert_eq!(resolved.rule, ResolutionRule::KeywordPromotion);

        let resolved = resolver.resolve(&signals, &classified(Intent::RoutineCheckin));
        assert_eq!(resolved.intent, Intent::RoutineCheckin);
        assert_eq!(resolved.rule, ResolutionRule::Classifier);
    }

    #[test]
    fn test_classifier_intent_stands_without_hits() {
        let resolver = IntentResolver::new();
        let resolved = resolver.resolve(&KeywordSignals::default(), &classified(Intent::Medical));
        assert_eq!(resolved.intent, Intent::Medical);
        assert!(resolved.red_flags.is_empty());
    }
}
