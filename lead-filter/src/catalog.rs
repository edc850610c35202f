use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::EngineError;
use crate::rule::Operator;

/// Decides the operator set and comparison semantics of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Select,
    DateBucket,
}

impl FieldKind {
    /// Whether `op` belongs to this kind's operator set. Emptiness checks
    /// apply to every kind.
    pub fn supports(&self, op: &Operator) -> bool {
        match op {
            Operator::IsEmpty | Operator::IsNotEmpty => true,
            Operator::Contains
            | Operator::NotContains
            | Operator::Equals
            | Operator::NotEquals
            | Operator::StartsWith
            | Operator::EndsWith => *self == FieldKind::Text,
            Operator::HasAnyOf | Operator::HasNoneOf | Operator::Is | Operator::IsNot => {
                *self == FieldKind::Select
            }
            Operator::Within => *self == FieldKind::DateBucket,
            Operator::Unknown(_) => false,
        }
    }
}

impl FromStr for FieldKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(FieldKind::Text),
            "select" => Ok(FieldKind::Select),
            "date-bucket" | "date" => Ok(FieldKind::DateBucket),
            other => Err(EngineError::Parse(format!("Invalid field kind `{}`", other))),
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Select => write!(f, "select"),
            FieldKind::DateBucket => write!(f, "date-bucket"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub key: String,
    #[serde(rename = "valueKind")]
    pub kind: FieldKind,
    /// Valid values of a select field. Informational; the engine does not
    /// enforce them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Included in free-text search.
    #[serde(default)]
    pub searchable: bool,
}

impl FieldSpec {
    pub fn text(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FieldKind::Text,
            options: Vec::new(),
            searchable: false,
        }
    }

    pub fn select<I, S>(key: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            kind: FieldKind::Select,
            options: options.into_iter().map(Into::into).collect(),
            searchable: false,
        }
    }

    pub fn date_bucket(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FieldKind::DateBucket,
            options: Vec::new(),
            searchable: false,
        }
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }
}

/// Schema of the records handed to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCatalog {
    pub fields: Vec<FieldSpec>,
    /// Timestamp field used for the default newest-first order when no sort
    /// rules are given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, key: impl Into<String>) -> Self {
        self.last_modified = Some(key.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.key == key)
    }

    pub fn searchable_keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|spec| spec.searchable)
            .map(|spec| spec.key.as_str())
    }

    /// Catalog of the CRM contact list, the default record shape synced from
    /// the lead platform.
    pub fn crm_contacts() -> Self {
        Self::new(vec![
            FieldSpec::text("company").searchable(),
            FieldSpec::text("first_name").searchable(),
            FieldSpec::text("last_name").searchable(),
            FieldSpec::text("email").searchable(),
            FieldSpec::text("title").searchable(),
            FieldSpec::text("phone"),
            FieldSpec::text("notes"),
            FieldSpec::text("tags").searchable(),
            FieldSpec::text("workspace"),
            FieldSpec::select(
                "stage",
                ["new", "contacted", "qualified", "proposal", "closed", "lost"],
            ),
            FieldSpec::select(
                "status",
                ["active", "unsubscribed", "bounced", "replied", "interested"],
            ),
            FieldSpec::date_bucket("created_at"),
            FieldSpec::date_bucket("updated_at"),
            FieldSpec::date_bucket("last_contacted_at"),
        ])
        .with_last_modified("updated_at")
    }
}
