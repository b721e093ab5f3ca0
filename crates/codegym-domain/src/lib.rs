//! CodeGym Domain Model
//!
//! Passive data shared by the validation engine and its collaborators:
//! - ExerciseSpec: what an exercise expects (test source or ordered rules)
//! - Rule: one structural check for the markup/stylesheet strategies
//! - Verdict / Criterion: the result of one validation call
//! - ChallengeDocument: the exercise-package JSON shape, converted on import
//!
//! Nothing here executes code. The runner crate borrows these types
//! read-only for the duration of a call and hands back a fresh `Verdict`.

pub mod challenge;
pub mod error;
pub mod exercise;
pub mod rule;
pub mod verdict;

pub use challenge::{ChallengeDocument, ChallengeRule, ValidatorConfig};
pub use error::{DomainError, Result};
pub use exercise::{EvaluationStrategy, ExerciseSpec};
pub use rule::{Rule, RuleKind};
pub use verdict::{Criterion, CriterionUnit, FailureKind, Verdict};

/// CodeGym domain version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
