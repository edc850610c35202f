//! Filter, sort and pagination engine for CRM contact lists.
//!
//! The engine is a pure function over an in-memory snapshot of records: it
//! never mutates its inputs, performs no I/O and keeps no state between
//! calls. See [`evaluate`].

mod catalog;
mod engine;
mod errors;
mod page;
mod parse;
mod predicate;
mod rule;
mod sort;
mod value;

pub use catalog::{FieldCatalog, FieldKind, FieldSpec};
pub use engine::{evaluate, EvaluationRequest, EvaluationResult};
pub use errors::EngineError;
pub use page::{paginate, Page, PageRequest, DEFAULT_PAGE_SIZE};
pub use parse::{parse_rule, parse_rules, parse_sort};
pub use predicate::apply_filter;
pub use rule::{
    Combinator, Conjunction, DateWindow, FilterGroup, FilterRule, Operator, SortDirection,
    SortRule,
};
pub use sort::{compare_records, sort_records};
pub use value::{coerce_string, is_empty_value, parse_timestamp};

/// One filterable entity, e.g. a lead or contact: field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;
