use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::FieldCatalog;
use crate::errors::EngineError;
use crate::page::{paginate, Page, PageRequest};
use crate::predicate::apply_filter;
use crate::rule::{Conjunction, FilterGroup, FilterRule, SortRule};
use crate::sort::sort_records;
use crate::value::coerce_string;
use crate::Record;

/// Everything the caller's view state contributes to one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    #[serde(default)]
    pub text_query: String,
    #[serde(default)]
    pub filters: Vec<FilterRule>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
    #[serde(default)]
    pub sorts: Vec<SortRule>,
    #[serde(default)]
    pub page: PageRequest,
    /// Reference instant for date windows.
    #[serde(default = "Utc::now")]
    pub now: DateTime<Utc>,
}

impl Default for EvaluationRequest {
    fn default() -> Self {
        Self {
            text_query: String::new(),
            filters: Vec::new(),
            groups: Vec::new(),
            sorts: Vec::new(),
            page: PageRequest::default(),
            now: Utc::now(),
        }
    }
}

impl EvaluationRequest {
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.text_query = query.into();
        self
    }

    pub fn with_filters(mut self, filters: Vec<FilterRule>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_groups(mut self, groups: Vec<FilterGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<SortRule>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn with_page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

pub type EvaluationResult<'a> = Page<&'a Record>;

/// Filters, sorts and paginates `records`.
///
/// Stages run in order: free-text search, the left-to-right fold over
/// ungrouped rules, OR-groups, sort, pagination. The input is never mutated
/// and the result borrows from it.
///
/// The ungrouped fold has no operator precedence: `A or B and C` is
/// `(A or B) and C`. Each rule's conjunction links it to everything before
/// it, and the first rule's conjunction is ignored.
///
/// An incomplete rule (no value for an operator that needs one) evaluates to
/// `true` inside the fold. After an `and` it is neutral, after an `or` it
/// makes the whole fold pass: `[stage is new, or company contains ""]`
/// keeps every record.
pub fn evaluate<'a>(
    records: &'a [Record],
    catalog: &FieldCatalog,
    request: &EvaluationRequest,
) -> Result<EvaluationResult<'a>, EngineError> {
    request.page.validate()?;
    report_unmatched_fields(catalog, request);

    let query = request.text_query.trim().to_lowercase();
    let (ungrouped, grouped): (Vec<&FilterRule>, Vec<&FilterRule>) = request
        .filters
        .iter()
        .partition(|rule| rule.group_id.is_none());
    let groups = group_members(&request.groups, &grouped);
    let now = request.now;

    let mut matched: Vec<&Record> = records
        .iter()
        .filter(|record| query.is_empty() || matches_text_query(record, catalog, &query))
        .filter(|record| fold_ungrouped(record, catalog, &ungrouped, now))
        .filter(|record| {
            groups
                .iter()
                .all(|members| matches_any(record, catalog, members, now))
        })
        .collect();

    debug!(
        target: "lead_filter",
        total = records.len(),
        matched = matched.len(),
        "Evaluated filters"
    );

    sort_records(&mut matched, catalog, &request.sorts);
    paginate(matched, &request.page)
}

/// Keeps a record if any searchable field contains the lowercased query.
fn matches_text_query(record: &Record, catalog: &FieldCatalog, query: &str) -> bool {
    catalog
        .searchable_keys()
        .any(|key| coerce_string(record.get(key)).to_lowercase().contains(query))
}

fn fold_ungrouped(
    record: &Record,
    catalog: &FieldCatalog,
    rules: &[&FilterRule],
    now: DateTime<Utc>,
) -> bool {
    let mut rules = rules.iter();
    let Some(first) = rules.next() else {
        return true;
    };
    rules.fold(apply_filter(record, catalog, first, now), |acc, rule| {
        let hit = apply_filter(record, catalog, rule, now);
        match rule.conjunction {
            Conjunction::And => acc && hit,
            Conjunction::Or => acc || hit,
        }
    })
}

/// A group without members does not narrow.
fn matches_any(
    record: &Record,
    catalog: &FieldCatalog,
    members: &[&FilterRule],
    now: DateTime<Utc>,
) -> bool {
    members.is_empty()
        || members
            .iter()
            .any(|rule| apply_filter(record, catalog, rule, now))
}

fn group_members<'r>(
    groups: &[FilterGroup],
    grouped: &[&'r FilterRule],
) -> Vec<Vec<&'r FilterRule>> {
    for rule in grouped {
        let declared = groups
            .iter()
            .any(|group| rule.group_id.as_deref() == Some(group.id.as_str()));
        if !declared {
            debug!(
                target: "lead_filter",
                rule = %rule.id,
                group = ?rule.group_id,
                "Ignoring rule that references an undeclared group"
            );
        }
    }
    groups
        .iter()
        .map(|group| {
            grouped
                .iter()
                .copied()
                .filter(|rule| rule.group_id.as_deref() == Some(group.id.as_str()))
                .collect()
        })
        .collect()
}

/// Logs each rule or sort key naming a field the catalog does not know, once
/// per evaluation.
fn report_unmatched_fields(catalog: &FieldCatalog, request: &EvaluationRequest) {
    for rule in &request.filters {
        if catalog.field(&rule.field).is_none() {
            warn!(
                target: "lead_filter",
                field = %rule.field,
                rule = %rule.id,
                "Unmatched filter field, only is_empty can match"
            );
        }
    }
    for sort in &request.sorts {
        if catalog.field(&sort.field_key).is_none() {
            warn!(
                target: "lead_filter",
                field = %sort.field_key,
                "Unmatched sort field, sort key ignored"
            );
        }
    }
}
