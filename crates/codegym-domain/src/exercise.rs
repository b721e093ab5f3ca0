//! Exercise definitions: which strategy evaluates a submission and with what.

use serde::{Deserialize, Serialize};

use crate::challenge::ChallengeDocument;
use crate::error::{DomainError, Result};
use crate::rule::Rule;

/// The evaluation mode selected per exercise.
///
/// Serialized as a kebab-case tag. Tags the engine does not know are kept in
/// `Unsupported` so the dispatcher can report them instead of failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EvaluationStrategy {
    /// WebAssembly text compiled in memory, tests invoked through `run_tests`.
    CompiledTests,
    /// Rhai script executed in a constrained interpreter.
    InterpretedTests,
    /// Selector rules evaluated against an HTML tree.
    MarkupRules,
    /// Selector/property rules evaluated against stylesheet blocks.
    StylesheetRules,
    Unsupported(String),
}

impl EvaluationStrategy {
    /// Canonical tag for this strategy.
    pub fn as_str(&self) -> &str {
        match self {
            EvaluationStrategy::CompiledTests => "compiled-tests",
            EvaluationStrategy::InterpretedTests => "interpreted-tests",
            EvaluationStrategy::MarkupRules => "markup-rules",
            EvaluationStrategy::StylesheetRules => "stylesheet-rules",
            EvaluationStrategy::Unsupported(tag) => tag,
        }
    }

    /// Whether this strategy is driven by test source (as opposed to rules).
    pub fn uses_test_source(&self) -> bool {
        matches!(
            self,
            EvaluationStrategy::CompiledTests | EvaluationStrategy::InterpretedTests
        )
    }

    /// Whether this strategy is driven by an ordered rule list.
    pub fn uses_rules(&self) -> bool {
        matches!(
            self,
            EvaluationStrategy::MarkupRules | EvaluationStrategy::StylesheetRules
        )
    }
}

impl From<String> for EvaluationStrategy {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "compiled-tests" | "wat-tests" => EvaluationStrategy::CompiledTests,
            "interpreted-tests" | "rhai-tests" => EvaluationStrategy::InterpretedTests,
            "markup-rules" | "html-rules" => EvaluationStrategy::MarkupRules,
            "stylesheet-rules" | "css-rules" => EvaluationStrategy::StylesheetRules,
            _ => EvaluationStrategy::Unsupported(tag),
        }
    }
}

impl From<&str> for EvaluationStrategy {
    fn from(tag: &str) -> Self {
        EvaluationStrategy::from(tag.to_string())
    }
}

impl From<EvaluationStrategy> for String {
    fn from(strategy: EvaluationStrategy) -> Self {
        strategy.as_str().to_string()
    }
}

impl std::fmt::Display for EvaluationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declarative validation configuration for one exercise.
///
/// Exactly one of `test_source` / `rules` is meaningful, chosen by
/// `evaluation_strategy`. The engine only ever borrows a spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSpec {
    pub id: String,

    pub evaluation_strategy: EvaluationStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
}

impl ExerciseSpec {
    /// Spec for a test-driven strategy.
    pub fn with_tests(
        id: impl Into<String>,
        strategy: EvaluationStrategy,
        test_source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            evaluation_strategy: strategy,
            test_source: Some(test_source.into()),
            rules: None,
        }
    }

    /// Spec for a rule-driven strategy.
    pub fn with_rules(id: impl Into<String>, strategy: EvaluationStrategy, rules: Vec<Rule>) -> Self {
        Self {
            id: id.into(),
            evaluation_strategy: strategy,
            test_source: None,
            rules: Some(rules),
        }
    }

    /// Parse an exercise from JSON.
    ///
    /// Accepts both the native shape (`evaluationStrategy`, `testSource`,
    /// `rules`) and the exercise-package challenge shape (`validatorType`,
    /// `validatorConfig`).
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("validatorType").is_some() {
            let doc: ChallengeDocument = serde_json::from_value(value)?;
            Ok(doc.into())
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    /// Non-blank test source, if any.
    pub fn test_source(&self) -> Option<&str> {
        self.test_source
            .as_deref()
            .filter(|source| !source.trim().is_empty())
    }

    /// Non-empty rule list, if any.
    pub fn rules(&self) -> Option<&[Rule]> {
        self.rules.as_deref().filter(|rules| !rules.is_empty())
    }

    /// Check that the exercise carries what its strategy needs.
    pub fn validate(&self) -> Result<()> {
        match &self.evaluation_strategy {
            EvaluationStrategy::Unsupported(tag) => {
                Err(DomainError::UnsupportedStrategy(tag.clone()))
            }
            strategy if strategy.uses_test_source() => match self.test_source() {
                Some(_) => Ok(()),
                None => Err(DomainError::InvalidConfiguration(format!(
                    "{strategy} exercise '{}' has no test source",
                    self.id
                ))),
            },
            strategy => match self.rules() {
                Some(rules) => {
                    if let Some(blank) = rules.iter().position(|r| r.kind.trim().is_empty()) {
                        return Err(DomainError::InvalidConfiguration(format!(
                            "rule #{} of exercise '{}' has no kind",
                            blank + 1,
                            self.id
                        )));
                    }
                    Ok(())
                }
                None => Err(DomainError::InvalidConfiguration(format!(
                    "{strategy} exercise '{}' has no rules",
                    self.id
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_tags_and_aliases() {
        assert_eq!(
            EvaluationStrategy::from("compiled-tests"),
            EvaluationStrategy::CompiledTests
        );
        assert_eq!(
            EvaluationStrategy::from("RHAI-TESTS"),
            EvaluationStrategy::InterpretedTests
        );
        assert_eq!(
            EvaluationStrategy::from("html-rules"),
            EvaluationStrategy::MarkupRules
        );
        assert_eq!(
            EvaluationStrategy::from(" css-rules "),
            EvaluationStrategy::StylesheetRules
        );
        assert_eq!(
            EvaluationStrategy::from("csharp-tests"),
            EvaluationStrategy::Unsupported("csharp-tests".into())
        );
    }

    #[test]
    fn test_strategy_serializes_canonical_tag() {
        let json = serde_json::to_string(&EvaluationStrategy::from("css-rules")).unwrap();
        assert_eq!(json, "\"stylesheet-rules\"");
    }

    #[test]
    fn test_native_json_shape() {
        let json = r#"{
            "id": "css-010",
            "evaluationStrategy": "stylesheet-rules",
            "rules": [
                { "kind": "css-property", "selector": ".box", "property": "display",
                  "expectedValue": "flex", "failureMessage": "use flex", "successMessage": "ok" }
            ]
        }"#;
        let spec = ExerciseSpec::from_json(json).unwrap();
        assert_eq!(spec.evaluation_strategy, EvaluationStrategy::StylesheetRules);
        assert_eq!(spec.rules().unwrap().len(), 1);
        assert!(spec.test_source().is_none());
        spec.validate().unwrap();
    }

    #[test]
    fn test_blank_test_source_is_missing() {
        let spec = ExerciseSpec::with_tests("x", EvaluationStrategy::InterpretedTests, "   \n");
        assert!(spec.test_source().is_none());
        match spec.validate() {
            Err(DomainError::InvalidConfiguration(msg)) => assert!(msg.contains("no test source")),
            other => panic!("expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_rules_strategy_requires_rules() {
        let spec = ExerciseSpec::with_rules("x", EvaluationStrategy::MarkupRules, vec![]);
        assert!(spec.rules().is_none());
        assert!(matches!(
            spec.validate(),
            Err(DomainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_wrong_payload_for_strategy_is_invalid() {
        // Test source supplied to a rules strategy does not count.
        let spec = ExerciseSpec::with_tests("x", EvaluationStrategy::MarkupRules, "fn run_tests() {}");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_unsupported_strategy_fails_validation() {
        let spec = ExerciseSpec::with_tests("x", EvaluationStrategy::from("js-tests"), "code");
        assert!(matches!(
            spec.validate(),
            Err(DomainError::UnsupportedStrategy(tag)) if tag == "js-tests"
        ));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            ExerciseSpec::from_json("{not json"),
            Err(DomainError::Serialization(_))
        ));
    }
}
