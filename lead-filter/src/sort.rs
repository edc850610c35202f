use serde_json::Value;
use std::borrow::Cow;
use std::cmp::{Ordering, Reverse};

use crate::catalog::{FieldCatalog, FieldKind};
use crate::rule::{SortDirection, SortRule};
use crate::value::{coerce_string, timestamp_millis_or_epoch};
use crate::Record;

/// Multi-key comparator. The first rule is the primary key, later rules break
/// ties. Rules naming a field missing from the catalog compare equal.
pub fn compare_records(
    a: &Record,
    b: &Record,
    catalog: &FieldCatalog,
    sorts: &[SortRule],
) -> Ordering {
    for sort in sorts {
        let Some(spec) = catalog.field(&sort.field_key) else {
            continue;
        };
        let ordering = compare_field(spec.kind, a.get(&spec.key), b.get(&spec.key));
        let ordering = match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Stable sort of the matched records.
///
/// Without sort rules the records are ordered newest first by the catalog's
/// `last_modified` field (missing timestamps count as the epoch). Without
/// that field the input order is kept.
pub fn sort_records(records: &mut [&Record], catalog: &FieldCatalog, sorts: &[SortRule]) {
    if !sorts.is_empty() {
        records.sort_by(|a, b| compare_records(a, b, catalog, sorts));
    } else if let Some(key) = catalog.last_modified.as_deref() {
        records.sort_by_cached_key(|record| Reverse(timestamp_millis_or_epoch(record.get(key))));
    }
}

fn compare_field(kind: FieldKind, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match kind {
        FieldKind::DateBucket => timestamp_millis_or_epoch(a).cmp(&timestamp_millis_or_epoch(b)),
        FieldKind::Text | FieldKind::Select => compare_text_keys(&text_key(a), &text_key(b)),
    }
}

/// Sort key of a text or select value.
///
/// Numbers, numeric strings and null (as zero) form one class ordered by
/// value, then raw text. Everything else follows as text. The ordering stays
/// total when a column mixes `9`, `"10"` and `"abc"`.
enum TextKey<'a> {
    Numeric(f64, Cow<'a, str>),
    Text(Cow<'a, str>),
}

fn text_key(value: Option<&Value>) -> TextKey<'_> {
    let number = match value {
        None | Some(Value::Null) => Some(0.0),
        Some(Value::Number(num)) => num.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Some(_) => None,
    };
    let raw = coerce_string(value);
    match number {
        Some(n) => TextKey::Numeric(n, raw),
        None => TextKey::Text(raw),
    }
}

fn compare_text_keys(a: &TextKey<'_>, b: &TextKey<'_>) -> Ordering {
    match (a, b) {
        (TextKey::Numeric(x, raw_a), TextKey::Numeric(y, raw_b)) => {
            x.total_cmp(y).then_with(|| compare_text(raw_a, raw_b))
        }
        (TextKey::Numeric(..), TextKey::Text(_)) => Ordering::Less,
        (TextKey::Text(_), TextKey::Numeric(..)) => Ordering::Greater,
        (TextKey::Text(raw_a), TextKey::Text(raw_b)) => compare_text(raw_a, raw_b),
    }
}

/// Case-insensitive ordering with the raw strings as tie-break, close to a
/// default locale collation for the Latin data the CRM holds.
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldSpec;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn catalog() -> FieldCatalog {
        FieldCatalog::new(vec![
            FieldSpec::text("company"),
            FieldSpec::text("score"),
            FieldSpec::select("stage", ["new", "closed"]),
            FieldSpec::date_bucket("updated_at"),
        ])
    }

    fn companies(records: &[&Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| coerce_string(r.get("company")).into_owned())
            .collect()
    }

    #[test]
    fn test_text_sort_is_case_insensitive() {
        let rows = [
            record(json!({"company": "beta"})),
            record(json!({"company": "Alpha"})),
            record(json!({"company": "alpha"})),
            record(json!({"company": null})),
        ];
        let mut refs: Vec<&Record> = rows.iter().collect();
        sort_records(&mut refs, &catalog(), &[SortRule::asc("company")]);
        assert_eq!(companies(&refs), vec!["", "Alpha", "alpha", "beta"]);
    }

    #[test]
    fn test_numeric_sort() {
        let rows = [
            record(json!({"company": "a", "score": 10})),
            record(json!({"company": "b", "score": 9})),
            record(json!({"company": "c", "score": null})),
            record(json!({"company": "d", "score": 100})),
        ];
        let mut refs: Vec<&Record> = rows.iter().collect();
        sort_records(&mut refs, &catalog(), &[SortRule::desc("score")]);
        assert_eq!(companies(&refs), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_date_sort_treats_missing_as_epoch() {
        let rows = [
            record(json!({"company": "old", "updated_at": "2024-01-01"})),
            record(json!({"company": "none"})),
            record(json!({"company": "new", "updated_at": "2024-06-01T10:00:00Z"})),
        ];
        let mut refs: Vec<&Record> = rows.iter().collect();
        sort_records(&mut refs, &catalog(), &[SortRule::asc("updated_at")]);
        assert_eq!(companies(&refs), vec!["none", "old", "new"]);
    }

    #[test]
    fn test_default_sort_newest_first_and_stable() {
        let rows = [
            record(json!({"company": "a", "updated_at": "2024-01-01"})),
            record(json!({"company": "b", "updated_at": null})),
            record(json!({"company": "c", "updated_at": "2024-03-01"})),
            record(json!({"company": "d", "updated_at": "2024-01-01"})),
            record(json!({"company": "e"})),
        ];
        let catalog = catalog().with_last_modified("updated_at");
        let mut refs: Vec<&Record> = rows.iter().collect();
        sort_records(&mut refs, &catalog, &[]);
        assert_eq!(companies(&refs), vec!["c", "a", "d", "b", "e"]);
    }

    #[test]
    fn test_no_sorts_and_no_last_modified_keeps_order() {
        let rows = [
            record(json!({"company": "z"})),
            record(json!({"company": "a"})),
        ];
        let mut refs: Vec<&Record> = rows.iter().collect();
        sort_records(&mut refs, &catalog(), &[]);
        assert_eq!(companies(&refs), vec!["z", "a"]);
    }

    fn scores(records: &[&Record]) -> Vec<String> {
        records
            .iter()
            .map(|r| coerce_string(r.get("score")).into_owned())
            .collect()
    }

    #[test]
    fn test_mixed_type_column_sorts_totally() {
        let values = [
            json!(9),
            json!(10),
            json!("5"),
            json!("10"),
            json!("abc"),
            json!(true),
            json!(null),
            json!("Zeta"),
            json!("zeta"),
            json!(-3),
            json!("2.5"),
            json!(0),
            json!("007"),
            json!(7),
            json!(false),
            json!(""),
            json!("x1"),
            json!(100),
            json!("99"),
            json!(3.5),
            json!(["b", "a"]),
        ];
        let mut rows: Vec<Record> = values
            .iter()
            .map(|v| record(json!({"company": "c", "score": v})))
            .collect();
        rows.push(record(json!({"company": "missing"})));

        let expected = vec![
            "-3", "", "", "0", "2.5", "3.5", "5", "007", "7", "9", "10", "10", "99", "100", "",
            "abc", "b, a", "false", "true", "x1", "Zeta", "zeta",
        ];
        let sorts = [SortRule::asc("score")];
        let n = rows.len();
        for shift in 0..n {
            let mut refs: Vec<&Record> = (0..n).map(|i| &rows[(i * 7 + shift) % n]).collect();
            sort_records(&mut refs, &catalog(), &sorts);
            assert_eq!(scores(&refs), expected, "input rotation {}", shift);
            assert!(refs
                .windows(2)
                .all(|w| compare_records(w[0], w[1], &catalog(), &sorts) != Ordering::Greater));

            refs.reverse();
            sort_records(&mut refs, &catalog(), &sorts);
            assert_eq!(scores(&refs), expected, "reversed rotation {}", shift);
        }
    }

    #[test]
    fn test_numeric_strings_compare_as_numbers() {
        let catalog = catalog();
        let nine = record(json!({"score": 9}));
        let ten = record(json!({"score": "10"}));
        let five = record(json!({"score": "5"}));
        let sorts = [SortRule::asc("score")];
        assert_eq!(compare_records(&nine, &ten, &catalog, &sorts), Ordering::Less);
        assert_eq!(compare_records(&five, &nine, &catalog, &sorts), Ordering::Less);
        assert_eq!(compare_records(&five, &ten, &catalog, &sorts), Ordering::Less);
    }

    #[test]
    fn test_unknown_sort_field_is_ignored() {
        let rows = [
            record(json!({"company": "b"})),
            record(json!({"company": "a"})),
        ];
        let mut refs: Vec<&Record> = rows.iter().collect();
        sort_records(
            &mut refs,
            &catalog(),
            &[SortRule::asc("missing"), SortRule::asc("company")],
        );
        assert_eq!(companies(&refs), vec!["a", "b"]);
    }
}
