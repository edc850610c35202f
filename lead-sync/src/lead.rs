use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A lead as returned by the Bison leads endpoint. Only the fields the CRM
/// stores are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BisonLead {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Strings or `{ "name": ... }` objects, depending on the endpoint.
    #[serde(default)]
    pub tags: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Row upserted into the Supabase leads table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadRow {
    pub workspace: String,
    pub email: String,
    pub bison_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub synced_at: DateTime<Utc>,
}

impl LeadRow {
    /// Leads without an email cannot be keyed and are skipped (`None`).
    /// Emails are trimmed and lowercased so the conflict key is stable.
    pub fn from_bison(workspace: &str, lead: BisonLead, synced_at: DateTime<Utc>) -> Option<Self> {
        let email = lead
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())?
            .to_lowercase();

        Some(Self {
            workspace: workspace.to_string(),
            email,
            bison_id: lead.id.as_ref().and_then(id_to_string),
            first_name: non_blank(lead.first_name),
            last_name: non_blank(lead.last_name),
            company: non_blank(lead.company),
            title: non_blank(lead.title),
            status: non_blank(lead.status),
            tags: lead.tags.as_ref().map(tag_names).unwrap_or_default(),
            created_at: non_blank(lead.created_at),
            updated_at: non_blank(lead.updated_at),
            synced_at,
        })
    }
}

/// Collapses rows sharing an email into one, keeping the last one's data at
/// the first one's position. A single upsert statement must not touch the
/// same conflict key twice.
pub(crate) fn dedupe_by_email(rows: Vec<LeadRow>) -> Vec<LeadRow> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<LeadRow> = Vec::with_capacity(rows.len());
    for row in rows {
        match positions.get(&row.email) {
            Some(&idx) => unique[idx] = row,
            None => {
                positions.insert(row.email.clone(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn tag_names(tags: &Value) -> Vec<String> {
    let Value::Array(items) = tags else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|tag| match tag {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .filter(|name| !name.trim().is_empty())
        .collect()
}
