//! Stylesheet structural validator.
//!
//! Submitted CSS is never parsed with a full grammar. A block scanner splits
//! it into `selector { property: value; ... }` blocks and rules are checked
//! against those blocks textually.

use codegym_domain::{Criterion, CriterionUnit, ExerciseSpec, Rule, RuleKind, Verdict};
use tracing::debug;

/// One `selector { declarations }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssBlock {
    pub selector: String,
    pub declarations: Vec<CssDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssDeclaration {
    pub property: String,
    pub value: String,
}

/// Validate a stylesheet submission against the exercise's rules.
pub fn validate(code: &str, spec: &ExerciseSpec) -> Verdict {
    let Some(rules) = spec.rules() else {
        return Verdict::configuration_invalid("no stylesheet rules found");
    };

    let blocks = scan_blocks(&normalize(code));
    debug!(blocks = blocks.len(), rules = rules.len(), "stylesheet scanned");

    let criteria = rules
        .iter()
        .map(|rule| evaluate_rule(&blocks, rule))
        .collect();
    Verdict::from_criteria(criteria, CriterionUnit::Checks)
}

/// Lowercase, unify line endings, drop `/* */` comments.
pub fn normalize(css: &str) -> String {
    let lowered = css.to_lowercase().replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(lowered.len());
    let mut rest = lowered.as_str();
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Split normalized CSS into blocks.
///
/// Nested blocks (inside at-rules) are flattened into the result. An
/// unterminated block ends the scan; blocks before it are kept.
///
/// Single pass with an explicit stack, so nesting depth is bounded only by
/// the input length.
pub fn scan_blocks(css: &str) -> Vec<CssBlock> {
    let mut blocks = Vec::new();
    let mut open: Vec<OpenBlock> = Vec::new();
    let mut segment_start = 0;

    for (idx, ch) in css.char_indices() {
        match ch {
            '{' => {
                if let Some(parent) = open.last_mut() {
                    parent.nested = true;
                }
                open.push(OpenBlock {
                    selector_start: segment_start,
                    brace: idx,
                    nested: false,
                    children: Vec::new(),
                });
                segment_start = idx + 1;
            }
            '}' => {
                // A stray `}` outside any block is skipped.
                let Some(block) = open.pop() else {
                    segment_start = idx + 1;
                    continue;
                };
                let finished = if block.nested {
                    block.children
                } else {
                    vec![CssBlock {
                        selector: css[block.selector_start..block.brace].trim().to_string(),
                        declarations: parse_declarations(&css[block.brace + 1..idx]),
                    }]
                };
                match open.last_mut() {
                    Some(parent) => parent.children.extend(finished),
                    None => blocks.extend(finished),
                }
                segment_start = idx + 1;
            }
            _ => {}
        }
    }
    // Whatever is still open here is unterminated and dropped with its children.
    blocks
}

/// A `{` whose matching `}` has not been seen yet.
struct OpenBlock {
    selector_start: usize,
    brace: usize,
    nested: bool,
    children: Vec<CssBlock>,
}

fn parse_declarations(body: &str) -> Vec<CssDeclaration> {
    body.split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim();
            if property.is_empty() {
                return None;
            }
            Some(CssDeclaration {
                property: property.to_string(),
                value: value.trim().to_string(),
            })
        })
        .collect()
}

fn selector_matches(block: &CssBlock, selector: &str) -> bool {
    block.selector == selector || block.selector.contains(selector)
}

fn squash(value: &str) -> String {
    value.chars().filter(|c| *c != ' ').collect()
}

fn lowered(field: Option<&String>) -> String {
    field.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

fn evaluate_rule(blocks: &[CssBlock], rule: &Rule) -> Criterion {
    match rule.rule_kind() {
        RuleKind::CssProperty => check_property(blocks, rule),
        RuleKind::CssRuleExists => check_rule_exists(blocks, rule),
        _ => Criterion::fail(
            rule.kind.clone(),
            format!("Unsupported stylesheet rule kind: {}", rule.kind),
        ),
    }
}

fn check_property(blocks: &[CssBlock], rule: &Rule) -> Criterion {
    let selector = lowered(rule.selector.as_ref());
    let property = lowered(rule.property.as_ref());
    let expected = squash(&lowered(rule.expected_value.as_ref()));
    let name = format!("CSS '{property}' in '{selector}'");

    let mut matching = blocks
        .iter()
        .filter(|block| selector_matches(block, &selector))
        .peekable();
    if matching.peek().is_none() {
        return Criterion::fail(name, format!("No CSS rule found for selector '{selector}'."));
    }

    let found = matching.any(|block| {
        block
            .declarations
            .iter()
            .any(|d| d.property == property && squash(&d.value) == expected)
    });

    let message = if found || !rule.failure_message.is_empty() {
        rule.message_for(found)
    } else {
        format!(
            "Property '{property}' with value '{}' not found for selector '{selector}'.",
            lowered(rule.expected_value.as_ref())
        )
    };
    Criterion::new(name, found, message)
}

fn check_rule_exists(blocks: &[CssBlock], rule: &Rule) -> Criterion {
    let selector = lowered(rule.selector.as_ref());
    let exists = blocks.iter().any(|block| selector_matches(block, &selector));
    Criterion::new(
        format!("CSS rule for '{selector}'"),
        exists,
        rule.message_for(exists),
    )
}
