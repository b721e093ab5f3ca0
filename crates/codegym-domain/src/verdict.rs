//! Verdicts: the only artifact a validation call returns.
//!
//! A verdict is built fresh per call and owned by the caller afterwards.
//! `success` always equals "criteria non-empty and all passed"; the
//! constructors here are the only places that decide it.

use serde::{Deserialize, Serialize};

/// One evaluated test or rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

impl Criterion {
    pub fn new(name: impl Into<String>, passed: bool, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            message: message.into(),
        }
    }

    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, true, message)
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, false, message)
    }
}

/// Why a verdict failed, so callers can tell learner mistakes apart from
/// exercise-author mistakes and engine trouble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The submission is wrong: compile error, runtime error, failed criteria.
    Submission,
    /// The exercise is misconfigured: missing entry point, rules or tests.
    Configuration,
    /// A timeout, memory, operation or recursion ceiling was hit.
    ResourceLimit,
    /// The engine itself failed.
    Engine,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Submission => write!(f, "submission"),
            FailureKind::Configuration => write!(f, "configuration"),
            FailureKind::ResourceLimit => write!(f, "resource_limit"),
            FailureKind::Engine => write!(f, "engine"),
        }
    }
}

/// What the criteria of a verdict count, for the summary line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionUnit {
    Tests,
    Checks,
}

impl CriterionUnit {
    fn noun(self) -> &'static str {
        match self {
            CriterionUnit::Tests => "test(s)",
            CriterionUnit::Checks => "check(s)",
        }
    }
}

/// Complete result of one validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub success: bool,
    pub summary: String,
    pub criteria: Vec<Criterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_diagnostics: Option<String>,
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl Verdict {
    /// Verdict over evaluated criteria.
    pub fn from_criteria(criteria: Vec<Criterion>, unit: CriterionUnit) -> Self {
        let total = criteria.len();
        let passed = criteria.iter().filter(|c| c.passed).count();
        let success = total > 0 && passed == total;

        let summary = if total == 0 {
            match unit {
                CriterionUnit::Tests => "Tests returned no results.".to_string(),
                CriterionUnit::Checks => "No rules were evaluated.".to_string(),
            }
        } else if success {
            format!("All {total} {} passed!", unit.noun())
        } else {
            format!("{passed} of {total} {} passed.", unit.noun())
        };

        Self {
            success,
            summary,
            criteria,
            compile_diagnostics: None,
            timed_out: false,
            captured_output: None,
            failure: (!success).then_some(FailureKind::Submission),
            elapsed_ms: 0,
        }
    }

    /// Failed verdict with no criteria.
    pub fn failure(kind: FailureKind, summary: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: summary.into(),
            criteria: Vec::new(),
            compile_diagnostics: None,
            timed_out: false,
            captured_output: None,
            failure: Some(kind),
            elapsed_ms: 0,
        }
    }

    pub fn empty_submission() -> Self {
        Self::failure(
            FailureKind::Submission,
            "Empty submission. Write your solution before validating.",
        )
    }

    pub fn configuration_invalid(detail: impl std::fmt::Display) -> Self {
        Self::failure(
            FailureKind::Configuration,
            format!("Exercise configuration invalid: {detail}"),
        )
    }

    pub fn unsupported_strategy(tag: &str) -> Self {
        Self::failure(
            FailureKind::Configuration,
            format!("Evaluation strategy not supported: {tag}"),
        )
    }

    /// A time budget ran out.
    pub fn timed_out(summary: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::failure(FailureKind::ResourceLimit, summary)
        }
    }

    pub fn engine_error(detail: impl std::fmt::Display) -> Self {
        Self::failure(
            FailureKind::Engine,
            format!("Unexpected error during validation: {detail}"),
        )
    }

    /// Append a failing criterion that explains a failed verdict.
    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self.success = !self.criteria.is_empty() && self.criteria.iter().all(|c| c.passed);
        self
    }

    pub fn with_compile_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.compile_diagnostics = Some(diagnostics.into());
        self
    }

    /// Attach captured output; empty output is dropped.
    pub fn with_output(mut self, output: Option<String>) -> Self {
        self.captured_output = output.filter(|text| !text.is_empty());
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn passed_count(&self) -> usize {
        self.criteria.iter().filter(|c| c.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.criteria.len()
    }
}
