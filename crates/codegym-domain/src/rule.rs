//! Structural rules for the markup and stylesheet strategies.

use serde::{Deserialize, Serialize};

/// One declarative check. Field meaning depends on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(alias = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,

    /// Shown to the learner when the rule fails.
    #[serde(default, alias = "errorMessage")]
    pub failure_message: String,

    /// Shown to the learner when the rule passes.
    #[serde(default)]
    pub success_message: String,
}

impl Rule {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn expected(mut self, value: impl Into<String>) -> Self {
        self.expected_value = Some(value.into());
        self
    }

    pub fn messages(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_message = success.into();
        self.failure_message = failure.into();
        self
    }

    /// The parsed kind tag.
    pub fn rule_kind(&self) -> RuleKind {
        RuleKind::parse(&self.kind)
    }

    /// Pick the success or failure message for an outcome.
    pub fn message_for(&self, passed: bool) -> String {
        if passed {
            self.success_message.clone()
        } else {
            self.failure_message.clone()
        }
    }
}

/// Known rule kinds. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    ElementExists,
    ElementCount,
    AttributeExists,
    AttributeValue,
    TextContains,
    CssProperty,
    CssRuleExists,
    Unknown(String),
}

impl RuleKind {
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "element-exists" => RuleKind::ElementExists,
            "element-count" => RuleKind::ElementCount,
            "attribute-exists" => RuleKind::AttributeExists,
            "attribute-value" => RuleKind::AttributeValue,
            "text-contains" => RuleKind::TextContains,
            "css-property" => RuleKind::CssProperty,
            "css-rule-exists" => RuleKind::CssRuleExists,
            _ => RuleKind::Unknown(tag.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!(RuleKind::parse("Element-Exists"), RuleKind::ElementExists);
        assert_eq!(RuleKind::parse("CSS-PROPERTY"), RuleKind::CssProperty);
        assert_eq!(
            RuleKind::parse("element-order"),
            RuleKind::Unknown("element-order".into())
        );
    }

    #[test]
    fn test_package_field_aliases() {
        let json = r#"{ "type": "attribute-exists", "selector": "img", "attribute": "alt",
                        "errorMessage": "add alt", "successMessage": "nice" }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.rule_kind(), RuleKind::AttributeExists);
        assert_eq!(rule.failure_message, "add alt");
        assert_eq!(rule.message_for(true), "nice");
        assert_eq!(rule.message_for(false), "add alt");
    }

    #[test]
    fn test_missing_messages_default_to_empty() {
        let rule: Rule = serde_json::from_str(r#"{ "kind": "element-exists" }"#).unwrap();
        assert!(rule.selector.is_none());
        assert!(rule.failure_message.is_empty());
        assert!(rule.success_message.is_empty());
    }
}
