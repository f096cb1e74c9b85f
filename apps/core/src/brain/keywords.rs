//! Keyword gate.
//!
//! Deterministic lexicon matching run before any model call. Matching is
//! case-insensitive substring matching, so "pain" also fires inside
//! "painting"; those false positives are accepted in exchange for recall.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Terms whose presence marks an utterance as medically relevant.
const MEDICAL_KEYWORDS: &[&str] = &[
    "pain",
    "ache",
    "dizzy",
    "fall",
    "bleed",
    "cut",
    "chest",
    "breath",
    "shortness of breath",
    "faint",
    "numb",
    "tingling",
    "slurred speech",
    "confusion",
    "swelling",
    "fever",
    "vomit",
    "black stool",
    "pressure",
    "radiating",
    "jaw",
    "left arm",
    "headache",
    "weakness",
    "puffy",
    "stiffness",
    "sore",
    "rash",
];

/// Qualifiers that turn a chest complaint into a cardiac emergency.
const CARDIAC_QUALIFIERS: &[&str] = &[
    "shortness of breath",
    "breathless",
    "sweating",
    "radiating",
    "left arm",
    "jaw",
];

const NO_QUALIFIERS: &[&str] = &[];

/// `(primary phrase, qualifiers)`: the pattern fires when the primary phrase
/// is present and either no qualifiers are listed or at least one is present.
const EMERGENCY_PATTERNS: &[(&str, &[&str])] = &[
    ("chest pain", CARDIAC_QUALIFIERS),
    ("chest hurts", CARDIAC_QUALIFIERS),
    ("chest pressure", CARDIAC_QUALIFIERS),
    ("chest tightness", CARDIAC_QUALIFIERS),
    ("slurred speech", NO_QUALIFIERS),
    ("face droop", NO_QUALIFIERS),
    ("one side weak", NO_QUALIFIERS),
    ("worst headache", NO_QUALIFIERS),
    ("severe bleeding", NO_QUALIFIERS),
];

/// Output of the keyword gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSignals {
    pub medical_hit: bool,
    pub emergency_hit: bool,
}

#[derive(Debug, Clone)]
struct EmergencyPattern {
    primary: String,
    qualifiers: Vec<String>,
}

impl EmergencyPattern {
    fn matches(&self, lowered: &str) -> bool {
        lowered.contains(&self.primary)
            && (self.qualifiers.is_empty() || self.qualifiers.iter().any(|q| lowered.contains(q)))
    }
}

/// Lexicon-based pre-classifier.
#[derive(Debug, Clone)]
pub struct KeywordGate {
    medical_keywords: Vec<String>,
    emergency_patterns: Vec<EmergencyPattern>,
}

impl Default for KeywordGate {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordGate {
    /// Create a gate with the built-in lexicons
    pub fn new() -> Self {
        Self::with_lexicons(MEDICAL_KEYWORDS, EMERGENCY_PATTERNS)
    }

    /// Create a gate from custom lexicons. Entries are lower-cased once here.
    pub fn with_lexicons(medical_keywords: &[&str], emergency_patterns: &[(&str, &[&str])]) -> Self {
        let medical_keywords = medical_keywords.iter().map(|k| k.to_lowercase()).collect();
        let emergency_patterns = emergency_patterns
            .iter()
            .map(|(primary, qualifiers)| EmergencyPattern {
                primary: primary.to_lowercase(),
                qualifiers: qualifiers.iter().map(|q| q.to_lowercase()).collect(),
            })
            .collect();

        Self {
            medical_keywords,
            emergency_patterns,
        }
    }

    /// Evaluate both lexicons against the text.
    pub fn evaluate(&self, text: &str) -> KeywordSignals {
        let lowered = text.to_lowercase();
        let signals = KeywordSignals {
            medical_hit: self.medical_keywords.iter().any(|k| lowered.contains(k.as_str())),
            emergency_hit: self.emergency_patterns.iter().any(|p| p.matches(&lowered)),
        };
        debug!(
            medical_hit = signals.medical_hit,
            emergency_hit = signals.emergency_hit,
            "Keyword gate evaluated"
        );
        signals
    }

    /// Medical keywords found in the text, in lexicon order
    pub fn matched_keywords(&self, text: &str) -> Vec<&str> {
        let lowered = text.to_lowercase();
        self.medical_keywords
            .iter()
            .filter(|k| lowered.contains(k.as_str()))
            .map(|k| k.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chest_pain_needs_a_qualifier() {
        let gate = KeywordGate::new();

        let signals = gate.evaluate("I have chest pain");
        assert!(signals.medical_hit);
        assert!(!signals.emergency_hit);

        let signals = gate.evaluate("Chest pain going down my LEFT ARM");
        assert!(signals.emergency_hit);
    }

    #[test]
    fn test_qualifier_free_pattern() {
        let gate = KeywordGate::new();
        assert!(gate.evaluate("her words came out as slurred speech").emergency_hit);
        assert!(gate.evaluate("Worst headache of my life").emergency_hit);
    }

    #[test]
    fn test_substring_false_positive_is_accepted() {
        let gate = KeywordGate::new();
        let signals = gate.evaluate("I spent the morning painting");
        assert!(signals.medical_hit);
        assert!(!signals.emergency_hit);
    }

    #[test]
    fn test_no_hits() {
        let gate = KeywordGate::new();
        assert_eq!(
            gate.evaluate("how are the cookies coming along"),
            KeywordSignals::default()
        );
        assert_eq!(gate.evaluate(""), KeywordSignals::default());
    }

    #[test]
    fn test_matched_keywords() {
        let gate = KeywordGate::new();
        let matched = gate.matched_keywords("A sore jaw and a fever");
        assert_eq!(matched, vec!["fever", "jaw", "sore"]);
    }

    #[test]
    fn test_custom_lexicons_are_case_insensitive() {
        let gate = KeywordGate::with_lexicons(&["Wheeze"], &[("Blue LIPS", NO_QUALIFIERS)]);
        let signals = gate.evaluate("a WHEEZE and blue lips");
        assert!(signals.medical_hit);
        assert!(signals.emergency_hit);
    }
}
