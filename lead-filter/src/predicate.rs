use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::catalog::FieldCatalog;
use crate::rule::{DateWindow, FilterRule, Operator};
use crate::value::{coerce_string, is_empty_value, parse_timestamp};
use crate::Record;

/// Evaluates a single rule against a record.
///
/// Fallbacks, in order:
/// - an operator that needs a value but has none passes (the rule is still
///   being typed and must not narrow the view);
/// - an unknown field matches only `is_empty`, since a field that does not
///   exist is vacuously empty;
/// - an operator outside the field kind's set, an unknown operator or an
///   invalid date window never matches.
pub fn apply_filter(
    record: &Record,
    catalog: &FieldCatalog,
    rule: &FilterRule,
    now: DateTime<Utc>,
) -> bool {
    if rule.is_incomplete() {
        return true;
    }
    let Some(spec) = catalog.field(&rule.field) else {
        return rule.operator == Operator::IsEmpty;
    };
    if !spec.kind.supports(&rule.operator) {
        return false;
    }
    evaluate_operator(&rule.operator, record.get(&spec.key), &rule.value, now).unwrap_or(false)
}

/// Returns `None` when the rule cannot be evaluated at all.
fn evaluate_operator(
    op: &Operator,
    field: Option<&Value>,
    value: &str,
    now: DateTime<Utc>,
) -> Option<bool> {
    let matched = match op {
        Operator::IsEmpty => is_empty_value(field),
        Operator::IsNotEmpty => !is_empty_value(field),
        Operator::Contains => lowercase(field).contains(&value.to_lowercase()),
        Operator::NotContains => !lowercase(field).contains(&value.to_lowercase()),
        Operator::Equals => lowercase(field) == value.to_lowercase(),
        Operator::NotEquals => lowercase(field) != value.to_lowercase(),
        Operator::StartsWith => lowercase(field).starts_with(&value.to_lowercase()),
        Operator::EndsWith => lowercase(field).ends_with(&value.to_lowercase()),
        // Single-value selects: the value is compared as one option.
        Operator::HasAnyOf | Operator::Is => coerce_string(field) == value,
        Operator::HasNoneOf | Operator::IsNot => coerce_string(field) != value,
        Operator::Within => {
            let window = value.parse::<DateWindow>().ok()?;
            parse_timestamp(field).is_some_and(|ts| ts >= window.cutoff(now))
        }
        Operator::Unknown(_) => return None,
    };
    Some(matched)
}

fn lowercase(field: Option<&Value>) -> String {
    coerce_string(field).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldSpec;
    use chrono::TimeZone;
    use serde_json::json;

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(vec![
            FieldSpec::text("company"),
            FieldSpec::text("notes"),
            FieldSpec::select("stage", ["new", "closed"]),
            FieldSpec::date_bucket("updated_at"),
        ])
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn check(rec: &Record, field: &str, op: Operator, value: &str) -> bool {
        apply_filter(rec, &catalog(), &FilterRule::new("r", field, op, value), now())
    }

    #[test]
    fn test_text_operators_are_case_insensitive() {
        let rec = record(json!({"company": "Acme Inc"}));
        assert!(check(&rec, "company", Operator::Contains, "acme"));
        assert!(check(&rec, "company", Operator::Contains, "ME I"));
        assert!(!check(&rec, "company", Operator::NotContains, "INC"));
        assert!(check(&rec, "company", Operator::Equals, "acme inc"));
        assert!(!check(&rec, "company", Operator::Equals, "acme"));
        assert!(check(&rec, "company", Operator::NotEquals, "acme"));
        assert!(check(&rec, "company", Operator::StartsWith, "ACME"));
        assert!(check(&rec, "company", Operator::EndsWith, "inc"));
        assert!(!check(&rec, "company", Operator::EndsWith, "llc"));
    }

    #[test]
    fn test_text_operators_on_missing_value() {
        let rec = record(json!({"company": null}));
        assert!(!check(&rec, "company", Operator::Contains, "acme"));
        assert!(check(&rec, "company", Operator::NotContains, "acme"));
        assert!(check(&rec, "company", Operator::NotEquals, "acme"));
    }

    #[test]
    fn test_text_operators_coerce_numbers() {
        let rec = record(json!({"company": 3141}));
        assert!(check(&rec, "company", Operator::StartsWith, "31"));
    }

    #[test]
    fn test_empty_value_rule_is_noop() {
        let rec = record(json!({"company": "Acme"}));
        assert!(check(&rec, "company", Operator::Equals, ""));
        assert!(check(&rec, "company", Operator::NotContains, ""));
        assert!(check(&rec, "nonexistent", Operator::Contains, ""));
    }

    #[test]
    fn test_empty_checks() {
        for rec in [
            record(json!({"notes": null})),
            record(json!({})),
            record(json!({"notes": ""})),
        ] {
            assert!(check(&rec, "notes", Operator::IsEmpty, ""));
            assert!(!check(&rec, "notes", Operator::IsNotEmpty, ""));
        }
        for rec in [
            record(json!({"notes": "0"})),
            record(json!({"notes": false})),
            record(json!({"notes": "call back"})),
        ] {
            assert!(!check(&rec, "notes", Operator::IsEmpty, ""));
            assert!(check(&rec, "notes", Operator::IsNotEmpty, "ignored"));
        }
    }

    #[test]
    fn test_unknown_field() {
        let rec = record(json!({"company": "Acme"}));
        assert!(check(&rec, "nonexistent", Operator::IsEmpty, ""));
        assert!(!check(&rec, "nonexistent", Operator::IsNotEmpty, ""));
        assert!(!check(&rec, "nonexistent", Operator::Contains, "acme"));
        assert!(!check(&rec, "nonexistent", Operator::NotContains, "acme"));
    }

    #[test]
    fn test_unknown_or_mismatched_operator_never_matches() {
        let rec = record(json!({"company": "Acme", "stage": "new"}));
        assert!(!check(&rec, "company", Operator::Unknown("like".into()), "acme"));
        assert!(!check(&rec, "company", Operator::Is, "Acme"));
        assert!(!check(&rec, "stage", Operator::Contains, "ne"));
        assert!(check(&rec, "stage", Operator::IsNot, "closed"));
    }

    #[test]
    fn test_select_operators() {
        let rec = record(json!({"stage": "new"}));
        assert!(check(&rec, "stage", Operator::Is, "new"));
        assert!(check(&rec, "stage", Operator::HasAnyOf, "new"));
        assert!(!check(&rec, "stage", Operator::Is, "closed"));
        assert!(check(&rec, "stage", Operator::IsNot, "closed"));
        assert!(check(&rec, "stage", Operator::HasNoneOf, "closed"));
        assert!(!check(&rec, "stage", Operator::HasNoneOf, "new"));
        let missing = record(json!({}));
        assert!(!check(&missing, "stage", Operator::Is, "new"));
        assert!(check(&missing, "stage", Operator::IsNot, "new"));
    }

    #[test]
    fn test_date_windows() {
        let today = record(json!({"updated_at": "2024-06-15T01:00:00Z"}));
        let last_week = record(json!({"updated_at": "2024-06-10"}));
        let spring = record(json!({"updated_at": "2024-04-01"}));
        let never = record(json!({"updated_at": null}));

        assert!(check(&today, "updated_at", Operator::Within, "today"));
        assert!(!check(&last_week, "updated_at", Operator::Within, "today"));
        assert!(check(&last_week, "updated_at", Operator::Within, "7d"));
        assert!(!check(&spring, "updated_at", Operator::Within, "30d"));
        assert!(check(&spring, "updated_at", Operator::Within, "90d"));
        assert!(!check(&never, "updated_at", Operator::Within, "90d"));
        assert!(!check(&today, "updated_at", Operator::Within, "1y"));
    }

    #[test]
    fn test_date_window_boundary_is_inclusive() {
        let cutoff = record(json!({"updated_at": "2024-06-08T12:00:00Z"}));
        let just_before = record(json!({"updated_at": "2024-06-08T11:59:59Z"}));
        assert!(check(&cutoff, "updated_at", Operator::Within, "7d"));
        assert!(!check(&just_before, "updated_at", Operator::Within, "7d"));
    }
}
