//! Structured observability hooks for validation calls.
//!
//! - `validation_span` tags everything a call logs with the exercise id
//! - `emit_*` functions record the call lifecycle
//!
//! Events are emitted at `info!` (faults at `warn!`); filter with `RUST_LOG`.

use codegym_domain::{EvaluationStrategy, Verdict};
use tracing::{info, Span};

/// Span covering one validation call. Attach with `Instrument::instrument`.
pub fn validation_span(exercise_id: &str, strategy: &EvaluationStrategy) -> Span {
    tracing::info_span!("codegym.validate", exercise_id = %exercise_id, strategy = %strategy)
}

/// Emit event: validation started.
pub fn emit_validation_started(exercise_id: &str, strategy: &EvaluationStrategy, code_len: usize) {
    info!(
        event = "validation.started",
        exercise_id = %exercise_id,
        strategy = %strategy,
        code_len = code_len,
    );
}

/// Emit event: validation finished with its outcome.
pub fn emit_validation_finished(exercise_id: &str, verdict: &Verdict) {
    info!(
        event = "validation.finished",
        exercise_id = %exercise_id,
        success = verdict.success,
        passed = verdict.passed_count(),
        total = verdict.total_count(),
        timed_out = verdict.timed_out,
        failure = ?verdict.failure,
        elapsed_ms = verdict.elapsed_ms,
    );
}

/// Emit event: a validator failed inside the engine (warning level).
pub fn emit_validator_fault(exercise_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "validation.fault", exercise_id = %exercise_id, error = %error);
}
