//! # Brain Module
//!
//! The decision stages of the triage pipeline, in the order they run:
//!
//! ## Components
//! - `keywords`: lexical gate, no model call (fast path)
//! - `classifier`: model-backed intent classification with a fixed fallback
//! - `intent`: intent types and the precedence resolver
//! - `responder`: template selection and reply generation over the history
//! - `safety`: post-hoc review merged with the deterministic signals
//! - `memory`: formatting of the review into a tagged memory note
//!
//! `verdict` and `json_repair` are shared by the two stages that must never
//! fail their caller.

pub mod classifier;
pub mod intent;
pub mod json_repair;
pub mod keywords;
pub mod memory;
pub mod responder;
pub mod safety;
pub mod verdict;

// Re-export main types for convenience
pub use classifier::IntentClassifier;
pub use intent::{
    ClassificationResult, Intent, IntentResolver, ResolutionRule, ResolvedIntent,
    EMERGENCY_PATTERN_FLAG,
};
pub use keywords::{KeywordGate, KeywordSignals};
pub use memory::MemoryCompiler;
pub use responder::{GeneratedReply, ProfileContext, ResponseGenerator, ResponseTemplate};
pub use safety::{SafetyAssessment, SafetyReviewer};
pub use verdict::{FallbackReason, Verdict};
