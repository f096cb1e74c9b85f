//! Validated-or-fallback results for the stages that must never fail their caller.

use std::fmt;

use crate::actors::messages::ExternalServiceError;
use crate::error::SchemaViolation;

/// Why a stage fell back to its designated default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    External(ExternalServiceError),
    Schema(SchemaViolation),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::External(err) => write!(f, "{}", err),
            FallbackReason::Schema(err) => write!(f, "{}", err),
        }
    }
}

impl From<ExternalServiceError> for FallbackReason {
    fn from(err: ExternalServiceError) -> Self {
        FallbackReason::External(err)
    }
}

impl From<SchemaViolation> for FallbackReason {
    fn from(err: SchemaViolation) -> Self {
        FallbackReason::Schema(err)
    }
}

/// Either a value that passed validation or the stage's designated default.
///
/// Every failure cause (timeout, bad status, transport, schema) collapses
/// into the single `Fallback` branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<T> {
    Validated(T),
    Fallback { value: T, reason: FallbackReason },
}

impl<T> Verdict<T> {
    /// Collapses an attempt into a verdict, using `default` on any failure.
    pub fn collapse(outcome: Result<T, FallbackReason>, default: impl FnOnce() -> T) -> Self {
        match outcome {
            Ok(value) => Verdict::Validated(value),
            Err(reason) => Verdict::Fallback {
                value: default(),
                reason,
            },
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Verdict::Validated(value) | Verdict::Fallback { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Verdict::Validated(value) | Verdict::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Verdict::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Verdict::Validated(_) => None,
            Verdict::Fallback { reason, .. } => Some(reason),
        }
    }

    /// Transforms the carried value, keeping the branch.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Verdict<U> {
        match self {
            Verdict::Validated(value) => Verdict::Validated(f(value)),
            Verdict::Fallback { value, reason } => Verdict::Fallback {
                value: f(value),
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_success() {
        let verdict = Verdict::collapse(Ok(3), || 0);
        assert!(!verdict.is_fallback());
        assert_eq!(*verdict.value(), 3);
        assert!(verdict.fallback_reason().is_none());
    }

    #[test]
    fn test_collapse_failure_uses_default() {
        let verdict = Verdict::collapse(
            Err(ExternalServiceError::Timeout("slow".to_string()).into()),
            || 7,
        );
        assert!(verdict.is_fallback());
        assert!(matches!(
            verdict.fallback_reason(),
            Some(FallbackReason::External(ExternalServiceError::Timeout(_)))
        ));
        assert_eq!(verdict.into_inner(), 7);
    }

    #[test]
    fn test_map_keeps_branch() {
        let verdict: Verdict<i32> = Verdict::Fallback {
            value: 1,
            reason: SchemaViolation::MissingField("intent").into(),
        };
        let mapped = verdict.map(|v| v * 10);
        assert!(mapped.is_fallback());
        assert_eq!(*mapped.value(), 10);
    }
}
