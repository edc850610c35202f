use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::errors::EngineError;
use crate::rule::{Conjunction, DateWindow, FilterRule, Operator, SortDirection, SortRule};

static RULE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn rule_pattern() -> &'static Regex {
    RULE_PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:(and|or)\s+)?([\w.\-]+)\s+(\S+)(?:\s+([^@\s].*?))?(?:\s+@([\w\-]+))?\s*$",
        )
        .unwrap()
    })
}

/// Parses a typed rule such as `company contains acme`,
/// `or stage is qualified @g1` or `updated_at within 7d`.
///
/// Values may be quoted; a value starting with `@` must be. The rule id is
/// left empty, see [`parse_rules`].
pub fn parse_rule(input: &str) -> Result<FilterRule, EngineError> {
    let captures = rule_pattern().captures(input).ok_or_else(|| {
        EngineError::Parse(format!(
            "Expected `[and|or] field operator [value] [@group]`, found `{}`",
            input.trim()
        ))
    })?;

    let conjunction = match captures.get(1).map(|m| m.as_str().to_lowercase()) {
        Some(c) if c == "or" => Conjunction::Or,
        _ => Conjunction::And,
    };
    let field = captures[2].to_string();
    let operator = parse_operator(&captures[3])?;
    let value = captures
        .get(4)
        .map(|m| {
            m.as_str()
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string()
        })
        .unwrap_or_default();

    if operator.ignores_value() {
        if !value.is_empty() {
            return Err(EngineError::Parse(format!(
                "Operator `{}` takes no value, found `{}`",
                operator, value
            )));
        }
    } else if value.is_empty() {
        return Err(EngineError::Parse(format!(
            "Operator `{}` needs a value",
            operator
        )));
    }
    if operator == Operator::Within {
        DateWindow::from_str(&value)?;
    }

    let mut rule = FilterRule::new(String::new(), field, operator, value)
        .with_conjunction(conjunction);
    if let Some(group) = captures.get(5) {
        rule = rule.in_group(group.as_str());
    }
    Ok(rule)
}

/// Parses several rules, numbering them `r1`, `r2`, ... in input order.
pub fn parse_rules<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<FilterRule>, EngineError> {
    inputs
        .iter()
        .enumerate()
        .map(|(idx, input)| {
            let mut rule = parse_rule(input.as_ref())?;
            rule.id = format!("r{}", idx + 1);
            Ok(rule)
        })
        .collect()
}

/// Parses `field` or `field:asc` / `field:desc`.
pub fn parse_sort(input: &str) -> Result<SortRule, EngineError> {
    let (field, direction) = match input.trim().split_once(':') {
        Some((field, direction)) => (field.trim(), SortDirection::from_str(direction)?),
        None => (input.trim(), SortDirection::Asc),
    };
    if field.is_empty() {
        return Err(EngineError::Parse(format!(
            "Sort key is missing a field: `{}`",
            input
        )));
    }
    Ok(SortRule {
        field_key: field.to_string(),
        direction,
    })
}

fn parse_operator(token: &str) -> Result<Operator, EngineError> {
    let op = match token.to_lowercase().as_str() {
        "=" | "==" => Operator::Equals,
        "!=" => Operator::NotEquals,
        "~" => Operator::Contains,
        "!~" => Operator::NotContains,
        other => Operator::from(other),
    };
    match op {
        Operator::Unknown(name) => Err(EngineError::Parse(format!(
            "Invalid filter operator: {}",
            name
        ))),
        known => Ok(known),
    }
}
