use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::Value;

use crate::config::BisonConfig;
use crate::lead::BisonLead;
use crate::retry::RetryPolicy;

/// Client for the Bison cold-email leads API. Each workspace authenticates
/// with its own key, so the key is passed per call.
pub struct BisonClient {
    client: Client,
    base_url: String,
    page_size: u32,
    retry: RetryPolicy,
}

impl std::fmt::Debug for BisonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BisonClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[derive(Debug)]
pub struct LeadPage {
    pub leads: Vec<BisonLead>,
    pub has_more: bool,
}

impl BisonClient {
    pub fn new(config: &BisonConfig, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.effective_page_size(),
            retry,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch one page (1-based) of leads for the workspace owning `api_key`.
    pub async fn fetch_page(&self, api_key: &str, page: u32) -> Result<LeadPage> {
        let url = format!("{}/api/leads", self.base_url);
        let label = format!("GET /api/leads page {}", page);
        let query = [
            ("page", page.to_string()),
            ("per_page", self.page_size.to_string()),
        ];

        let resp = self
            .retry
            .send(&label, || {
                self.client
                    .get(&url)
                    .bearer_auth(api_key)
                    .header("Accept", "application/json")
                    .query(&query)
            })
            .await?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .context("Failed to read Bison response body")?;
        if !status.is_success() {
            bail!("Bison API error {} for {}: {}", status, label, body);
        }

        parse_lead_page(&body, self.page_size)
    }
}

/// Accepts `{ "data": [...] }`, `{ "leads": [...] }` or a bare array.
///
/// More pages follow when `meta.current_page < meta.last_page`; without
/// `meta`, when `links.next` is set; without either, when the page came back
/// full.
pub(crate) fn parse_lead_page(body: &str, per_page: u32) -> Result<LeadPage> {
    let json: Value = serde_json::from_str(body).context("Failed to parse Bison leads response")?;

    let items = match &json {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match (map.get("data"), map.get("leads")) {
            (Some(Value::Array(items)), _) | (_, Some(Value::Array(items))) => items.clone(),
            _ => bail!("Bison leads response has neither `data` nor `leads` array"),
        },
        _ => bail!("Unexpected Bison leads response: {}", body),
    };
    let returned = items.len();

    let leads = items
        .into_iter()
        .map(serde_json::from_value::<BisonLead>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to parse Bison lead")?;

    let has_more = next_page_from_meta(&json)
        .or_else(|| next_page_from_links(&json))
        .unwrap_or(returned >= per_page as usize);

    Ok(LeadPage { leads, has_more })
}

fn next_page_from_meta(json: &Value) -> Option<bool> {
    let meta = json.get("meta")?;
    let current = meta.get("current_page")?.as_u64()?;
    let last = meta.get("last_page")?.as_u64()?;
    Some(current < last)
}

fn next_page_from_links(json: &Value) -> Option<bool> {
    let next = json.get("links")?.get("next")?;
    Some(match next {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}
