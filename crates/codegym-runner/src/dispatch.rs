//! Validation dispatcher.
//!
//! [`Dispatcher::validate`] is the engine's single entry point. It guards
//! empty input, selects the validator for the exercise's strategy, races it
//! against the outer deadline, and converts every error or panic into a
//! failed verdict. It never returns an error.

use std::time::Instant;

use codegym_domain::{EvaluationStrategy, ExerciseSpec, Verdict};
use tracing::Instrument;

use crate::config::EngineLimits;
use crate::error::RunnerResult;
use crate::obs;
use crate::strategies::{compiled, interpreted, markup, stylesheet};

/// Routes submissions to validators under a fixed set of limits.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    limits: EngineLimits,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with custom limits. Zero-valued limits are rejected.
    pub fn with_limits(limits: EngineLimits) -> RunnerResult<Self> {
        limits.validate()?;
        Ok(Self { limits })
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// Validate `code` against `spec`. Always yields a verdict.
    pub async fn validate(&self, code: &str, spec: &ExerciseSpec) -> Verdict {
        let started = Instant::now();
        obs::emit_validation_started(&spec.id, &spec.evaluation_strategy, code.len());

        let verdict = if code.trim().is_empty() {
            Verdict::empty_submission()
        } else {
            self.run_guarded(code, spec).await
        };

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let verdict = verdict.with_elapsed_ms(elapsed_ms);
        obs::emit_validation_finished(&spec.id, &verdict);
        verdict
    }

    async fn run_guarded(&self, code: &str, spec: &ExerciseSpec) -> Verdict {
        let span = obs::validation_span(&spec.id, &spec.evaluation_strategy);
        let code = code.to_string();
        let task_spec = spec.clone();
        let limits = self.limits.clone();

        let task = tokio::spawn(
            async move { run_strategy(&code, &task_spec, &limits).await }.instrument(span),
        );
        let abort = task.abort_handle();

        match tokio::time::timeout(self.limits.outer_timeout(), task).await {
            Ok(Ok(Ok(verdict))) => verdict,
            Ok(Ok(Err(err))) => {
                obs::emit_validator_fault(&spec.id, &err);
                Verdict::engine_error(err)
            }
            Ok(Err(join_err)) => {
                let detail = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    join_err.to_string()
                };
                obs::emit_validator_fault(&spec.id, &detail);
                Verdict::engine_error(detail)
            }
            Err(_) => {
                abort.abort();
                Verdict::timed_out(format!(
                    "Time limit exceeded ({} seconds). Check your code for infinite loops.",
                    self.limits.outer_timeout().as_secs_f64()
                ))
            }
        }
    }
}

/// Validate with the default limits.
pub async fn validate(code: &str, spec: &ExerciseSpec) -> Verdict {
    Dispatcher::default().validate(code, spec).await
}

async fn run_strategy(
    code: &str,
    spec: &ExerciseSpec,
    limits: &EngineLimits,
) -> RunnerResult<Verdict> {
    match &spec.evaluation_strategy {
        EvaluationStrategy::CompiledTests => compiled::validate(code, spec, &limits.compiled).await,
        EvaluationStrategy::InterpretedTests => {
            interpreted::validate(code, spec, &limits.interpreted).await
        }
        EvaluationStrategy::MarkupRules => Ok(markup::validate(code, spec)),
        EvaluationStrategy::StylesheetRules => Ok(stylesheet::validate(code, spec)),
        EvaluationStrategy::Unsupported(tag) => Ok(Verdict::unsupported_strategy(tag)),
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "validator panicked".to_string(),
        },
    }
}
