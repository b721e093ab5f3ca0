//! Exercise-package challenge documents.
//!
//! Packages ship challenges as `{ id, validatorType, validatorConfig }`.
//! Only the fields the engine needs are read; presentation fields (title,
//! description, starter code, tags) are ignored.

use serde::{Deserialize, Serialize};

use crate::exercise::{EvaluationStrategy, ExerciseSpec};
use crate::rule::Rule;

/// A challenge as stored in an exercise package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDocument {
    pub id: String,
    pub validator_type: String,
    #[serde(default)]
    pub validator_config: Option<ValidatorConfig>,
}

/// Tests or rules attached to a challenge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorConfig {
    #[serde(default)]
    pub test_code: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<ChallengeRule>>,
}

/// Package-side rule shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub expected_value: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub success_message: String,
}

impl From<ChallengeRule> for Rule {
    fn from(rule: ChallengeRule) -> Self {
        Rule {
            kind: rule.rule_type,
            selector: rule.selector,
            property: rule.property,
            attribute: rule.attribute,
            expected_value: rule.expected_value,
            failure_message: rule.error_message,
            success_message: rule.success_message,
        }
    }
}

impl From<ChallengeDocument> for ExerciseSpec {
    fn from(doc: ChallengeDocument) -> Self {
        let config = doc.validator_config.unwrap_or_default();
        ExerciseSpec {
            id: doc.id,
            evaluation_strategy: EvaluationStrategy::from(doc.validator_type),
            test_source: config.test_code,
            rules: config
                .rules
                .map(|rules| rules.into_iter().map(Rule::from).collect()),
        }
    }
}
