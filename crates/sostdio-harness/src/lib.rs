//! Conformance harness for sostdio.
//!
//! This crate provides:
//! - Fixture scenarios: JSON descriptions of a stream, a sequence of stream
//!   operations, and the transcript they must produce.
//! - A runner that executes scenarios against `sostdio-core` and reports
//!   per-case verification results.
//! - Structured JSONL logging, usable as the process-wide `log` backend, plus
//!   an artifact index with SHA-256 integrity.

#![forbid(unsafe_code)]

pub mod fixtures;
pub mod runner;
pub mod structured_log;
pub mod verify;

pub use fixtures::{FixtureCase, FixtureError, FixtureSet, Op, Target};
pub use runner::TestRunner;
pub use verify::VerificationResult;
