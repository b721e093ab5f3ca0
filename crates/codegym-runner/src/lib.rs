//! CodeGym Runner
//!
//! Validation engine for learner submissions:
//! - `dispatch`: single async entry point, outer deadline, fault containment
//! - `strategies`: compiled (wasm), interpreted (rhai), markup, stylesheet
//! - `config`: per-dispatcher resource limits
//! - `output`: capped capture of guest output
//! - `obs` / `telemetry`: structured tracing
//!
//! Every call owns its engine state. Nothing is shared between calls, so
//! any number of validations may run concurrently.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod obs;
pub mod output;
pub mod strategies;
pub mod telemetry;

pub use config::{CompiledLimits, EngineLimits, InterpreterLimits};
pub use dispatch::{validate, Dispatcher};
pub use error::{RunnerError, RunnerResult};
pub use obs::{
    emit_validation_finished, emit_validation_started, emit_validator_fault, validation_span,
};
pub use output::{LineSink, OutputBuffer, TRUNCATION_MARKER};
pub use telemetry::init_tracing;

/// CodeGym runner version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
