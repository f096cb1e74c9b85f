//! Test Module
//!
//! Cross-module test suites for the triage pipeline.
//!
//! ## Test Categories
//! - `actor_tests`: scripted completion doubles, conversation store, supervisor handle
//! - `brain_tests`: gate, resolver, classifier, responder, safety and memory stages
//! - `supervisor_tests`: end-to-end pipeline scenarios
//! - `chaos_test`: concurrency, slow dependencies and failures

pub mod chaos_test;
