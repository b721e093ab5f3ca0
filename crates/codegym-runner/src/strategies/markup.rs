//! Markup structural validator.
//!
//! The submission is parsed into an HTML tree (html5ever via `scraper`) and
//! each rule runs a CSS selector query against it.

use std::panic::{self, AssertUnwindSafe};

use codegym_domain::{Criterion, CriterionUnit, ExerciseSpec, Rule, RuleKind, Verdict};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Validate a markup submission against the exercise's rules.
pub fn validate(code: &str, spec: &ExerciseSpec) -> Verdict {
    let Some(rules) = spec.rules() else {
        return Verdict::configuration_invalid("no markup rules found");
    };

    // html5ever recovers from malformed markup; only a parser panic is a failure.
    let document = match panic::catch_unwind(AssertUnwindSafe(|| Html::parse_document(code))) {
        Ok(document) => document,
        Err(_) => {
            return Verdict::from_criteria(
                vec![Criterion::fail(
                    "parsing",
                    "Your HTML could not be processed. Check the syntax.",
                )],
                CriterionUnit::Checks,
            );
        }
    };
    debug!(
        parse_errors = document.errors.len(),
        rules = rules.len(),
        "markup parsed"
    );

    let criteria = rules
        .iter()
        .map(|rule| {
            evaluate_rule(&document, rule).unwrap_or_else(|err| {
                Criterion::fail(rule.kind.clone(), format!("Error evaluating rule: {err}"))
            })
        })
        .collect();
    Verdict::from_criteria(criteria, CriterionUnit::Checks)
}

fn evaluate_rule(document: &Html, rule: &Rule) -> Result<Criterion, String> {
    let sel = rule.selector.as_deref().unwrap_or("");
    match rule.rule_kind() {
        RuleKind::ElementExists => {
            let exists = document.select(&selector(sel)?).next().is_some();
            Ok(Criterion::new(
                format!("Element '{sel}'"),
                exists,
                rule.message_for(exists),
            ))
        }
        RuleKind::ElementCount => {
            let found = document.select(&selector(sel)?).count();
            let expected = rule
                .expected_value
                .as_deref()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(1);
            let passed = found >= expected;
            let message = if passed || !rule.failure_message.is_empty() {
                rule.message_for(passed)
            } else {
                format!("Expected at least {expected} element(s) '{sel}', found {found}.")
            };
            Ok(Criterion::new(format!("Count of '{sel}'"), passed, message))
        }
        RuleKind::AttributeExists => {
            let attribute = rule.attribute.as_deref().unwrap_or("");
            let exists = first_match(document, sel)?
                .is_some_and(|el| el.value().attr(attribute).is_some());
            Ok(Criterion::new(
                format!("Attribute '{attribute}' on '{sel}'"),
                exists,
                rule.message_for(exists),
            ))
        }
        RuleKind::AttributeValue => {
            let attribute = rule.attribute.as_deref().unwrap_or("");
            let name = format!("Value of '{attribute}' on '{sel}'");
            let Some(element) = first_match(document, sel)? else {
                return Ok(Criterion::fail(name, format!("Element '{sel}' not found.")));
            };
            let actual = element.value().attr(attribute).map(|v| v.trim().to_lowercase());
            let expected = rule.expected_value.as_deref().map(|v| v.trim().to_lowercase());
            let passed = actual == expected;
            Ok(Criterion::new(name, passed, rule.message_for(passed)))
        }
        RuleKind::TextContains => {
            let name = format!("Text in '{sel}'");
            let Some(element) = first_match(document, sel)? else {
                return Ok(Criterion::fail(name, format!("Element '{sel}' not found.")));
            };
            let text = element.text().collect::<String>().to_lowercase();
            let needle = rule.expected_value.as_deref().unwrap_or("").to_lowercase();
            let contains = text.contains(&needle);
            Ok(Criterion::new(name, contains, rule.message_for(contains)))
        }
        _ => Ok(Criterion::fail(
            rule.kind.clone(),
            format!("Unsupported markup rule kind: {}", rule.kind),
        )),
    }
}

fn selector(raw: &str) -> Result<Selector, String> {
    Selector::parse(raw).map_err(|err| format!("invalid selector '{raw}': {err}"))
}

fn first_match<'a>(document: &'a Html, sel: &str) -> Result<Option<ElementRef<'a>>, String> {
    Ok(document.select(&selector(sel)?).next())
}
