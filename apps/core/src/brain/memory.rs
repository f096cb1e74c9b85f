//! Formatting of safety verdicts into memory notes.

use super::safety::{SafetyAssessment, NO_SUMMARY};

pub const EMERGENCY_TAG: &str = "[EMERGENCY]";
pub const MEDICAL_TAG: &str = "[MEDICAL]";

/// Turns a safety assessment into a short tagged note.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryCompiler;

impl MemoryCompiler {
    pub fn new() -> Self {
        Self
    }

    /// An empty return value means "do not store".
    pub fn compile(&self, assessment: &SafetyAssessment) -> String {
        let summary = assessment.db_summary.trim();
        if summary.is_empty() || summary == NO_SUMMARY {
            return String::new();
        }

        if assessment.emergency {
            format!("{} {}", EMERGENCY_TAG, summary)
        } else if assessment.medically_relevant {
            format!("{} {}", MEDICAL_TAG, summary)
        } else {
            summary.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(summary: &str, emergency: bool, medically_relevant: bool) -> SafetyAssessment {
        SafetyAssessment {
            medically_relevant,
            emergency,
            safety_ok: true,
            db_summary: summary.to_string(),
        }
    }

    #[test]
    fn test_placeholder_and_empty_are_not_stored() {
        let compiler = MemoryCompiler::new();
        assert_eq!(compiler.compile(&assessment("N/A", true, true)), "");
        assert_eq!(compiler.compile(&assessment("  ", true, true)), "");
        assert_eq!(compiler.compile(&SafetyAssessment::fallback()), "");
    }

    #[test]
    fn test_prefixes() {
        let compiler = MemoryCompiler::new();
        let summary = "mild headache noted";
        assert_eq!(compiler.compile(&assessment(summary, true, false)), "[EMERGENCY] mild headache noted");
        assert_eq!(compiler.compile(&assessment(summary, true, true)), "[EMERGENCY] mild headache noted");
        assert_eq!(compiler.compile(&assessment(summary, false, true)), "[MEDICAL] mild headache noted");
        assert_eq!(compiler.compile(&assessment(summary, false, false)), "mild headache noted");
    }
}
