use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::EngineError;

/// Comparison operator of a filter rule.
///
/// Operator names arrive from UI state, so anything unrecognised is kept as
/// `Unknown` instead of failing deserialization. An unknown operator never
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    HasAnyOf,
    HasNoneOf,
    Is,
    IsNot,
    /// Date-bucket window; the rule value names the window.
    Within,
    Unknown(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
            Operator::HasAnyOf => "has_any_of",
            Operator::HasNoneOf => "has_none_of",
            Operator::Is => "is",
            Operator::IsNot => "is_not",
            Operator::Within => "within",
            Operator::Unknown(name) => name,
        }
    }

    /// `is_empty` and `is_not_empty` never look at the rule value.
    pub fn ignores_value(&self) -> bool {
        matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }
}

impl From<&str> for Operator {
    fn from(s: &str) -> Self {
        match s {
            "contains" => Operator::Contains,
            "not_contains" => Operator::NotContains,
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            "starts_with" => Operator::StartsWith,
            "ends_with" => Operator::EndsWith,
            "is_empty" => Operator::IsEmpty,
            "is_not_empty" => Operator::IsNotEmpty,
            "has_any_of" => Operator::HasAnyOf,
            "has_none_of" => Operator::HasNoneOf,
            "is" => Operator::Is,
            "is_not" => Operator::IsNot,
            "within" => Operator::Within,
            other => Operator::Unknown(other.to_string()),
        }
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        Operator::from(s.as_str())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative window of the date-bucket `within` operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateWindow {
    Today,
    Last7Days,
    Last30Days,
    Last90Days,
}

impl DateWindow {
    /// Earliest instant still inside the window. `Today` starts at UTC
    /// midnight of `now`.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            DateWindow::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc())
                .unwrap_or(now),
            DateWindow::Last7Days => now - Duration::seconds(7 * 86_400),
            DateWindow::Last30Days => now - Duration::seconds(30 * 86_400),
            DateWindow::Last90Days => now - Duration::seconds(90 * 86_400),
        }
    }
}

impl FromStr for DateWindow {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(DateWindow::Today),
            "7d" => Ok(DateWindow::Last7Days),
            "30d" => Ok(DateWindow::Last30Days),
            "90d" => Ok(DateWindow::Last90Days),
            other => Err(EngineError::Parse(format!(
                "Invalid date window `{}`, expected today, 7d, 30d or 90d",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateWindow::Today => write!(f, "today"),
            DateWindow::Last7Days => write!(f, "7d"),
            DateWindow::Last30Days => write!(f, "30d"),
            DateWindow::Last90Days => write!(f, "90d"),
        }
    }
}

/// Connective linking a rule to the accumulated result of the rules before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl std::fmt::Display for Conjunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conjunction::And => write!(f, "and"),
            Conjunction::Or => write!(f, "or"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    pub id: String,
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub conjunction: Conjunction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl FilterRule {
    pub fn new(
        id: impl Into<String>,
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            field: field.into(),
            operator,
            value: value.into(),
            conjunction: Conjunction::And,
            group_id: None,
        }
    }

    pub fn with_conjunction(mut self, conjunction: Conjunction) -> Self {
        self.conjunction = conjunction;
        self
    }

    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// A rule whose operator needs a value but has none does not narrow.
    pub fn is_incomplete(&self) -> bool {
        !self.operator.ignores_value() && self.value.trim().is_empty()
    }
}

impl std::fmt::Display for FilterRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.conjunction, self.field, self.operator)?;
        if !self.operator.ignores_value() {
            write!(f, " {:?}", self.value)?;
        }
        if let Some(group_id) = &self.group_id {
            write!(f, " @{}", group_id)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    Or,
}

/// Rules sharing this group id are ORed together; the group result is ANDed
/// with everything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub id: String,
    #[serde(default)]
    pub combinator: Combinator,
}

impl FilterGroup {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            combinator: Combinator::Or,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(EngineError::Parse(format!(
                "Invalid sort direction `{}`, expected asc or desc",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortRule {
    pub field_key: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortRule {
    pub fn asc(field_key: impl Into<String>) -> Self {
        Self {
            field_key: field_key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field_key: impl Into<String>) -> Self {
        Self {
            field_key: field_key.into(),
            direction: SortDirection::Desc,
        }
    }
}
