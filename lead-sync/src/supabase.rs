use anyhow::{bail, Context, Result};
use lead_filter::Record;
use reqwest::Client;

use crate::config::SupabaseConfig;
use crate::lead::LeadRow;
use crate::retry::RetryPolicy;

/// PostgREST client for the Supabase project holding the CRM tables.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_key: String,
    table: String,
    conflict_columns: String,
    chunk_size: usize,
    retry: RetryPolicy,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .field("conflict_columns", &self.conflict_columns)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig, retry: RetryPolicy) -> Result<Self> {
        let service_key = config.resolve_service_key()?;
        Ok(Self::with_key(config, service_key, retry))
    }

    pub fn with_key(config: &SupabaseConfig, service_key: String, retry: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key,
            table: config.table.clone(),
            conflict_columns: config.conflict_columns.clone(),
            chunk_size: config.upsert_chunk.max(1),
            retry,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Upsert rows into the leads table, merging on the conflict columns.
    /// Returns the number of rows sent.
    pub async fn upsert_leads(&self, rows: &[LeadRow]) -> Result<usize> {
        let url = self.table_url(&self.table);
        let label = format!("POST /rest/v1/{}", self.table);

        for chunk in rows.chunks(self.chunk_size) {
            let resp = self
                .retry
                .send(&label, || {
                    self.client
                        .post(&url)
                        .query(&[("on_conflict", self.conflict_columns.as_str())])
                        .header("apikey", &self.service_key)
                        .bearer_auth(&self.service_key)
                        .header("Prefer", "resolution=merge-duplicates,return=minimal")
                        .json(chunk)
                })
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                bail!("Supabase upsert failed with {}: {}", status, body);
            }
            tracing::debug!("Upserted {} rows into {}", chunk.len(), self.table);
        }

        Ok(rows.len())
    }

    /// Read every row of `table`, asking for `page_size` rows per request.
    ///
    /// PostgREST may return fewer rows than asked for (`max-rows`), so a short
    /// page does not mean the end; paging stops at the first empty page.
    pub async fn fetch_records(&self, table: &str, page_size: usize) -> Result<Vec<Record>> {
        let page_size = page_size.max(1);
        let url = self.table_url(table);
        let mut records = Vec::new();

        loop {
            let offset = records.len();
            let label = format!("GET /rest/v1/{} offset {}", table, offset);
            let query = [
                ("select", "*".to_string()),
                ("limit", page_size.to_string()),
                ("offset", offset.to_string()),
            ];

            let resp = self
                .retry
                .send(&label, || {
                    self.client
                        .get(&url)
                        .query(&query)
                        .header("apikey", &self.service_key)
                        .bearer_auth(&self.service_key)
                })
                .await?;

            let status = resp.status();
            let body = resp
                .text()
                .await
                .context("Failed to read Supabase response body")?;
            if !status.is_success() {
                bail!("Supabase read of {} failed with {}: {}", table, status, body);
            }

            let page: Vec<Record> = serde_json::from_str(&body)
                .with_context(|| format!("Failed to parse rows of {}", table))?;
            if page.is_empty() {
                break;
            }
            records.extend(page);
        }

        tracing::debug!("Fetched {} rows from {}", records.len(), table);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    fn test_config(url: &str, upsert_chunk: usize) -> SupabaseConfig {
        SupabaseConfig {
            url: url.to_string(),
            service_key: Some("service-key".to_string()),
            service_key_env: "UNUSED".to_string(),
            table: "leads".to_string(),
            conflict_columns: "workspace,email".to_string(),
            upsert_chunk,
        }
    }

    fn client(url: &str, upsert_chunk: usize) -> SupabaseClient {
        let retry = RetryPolicy::new(1, Duration::ZERO, Duration::ZERO);
        SupabaseClient::new(&test_config(url, upsert_chunk), retry).unwrap()
    }

    fn row(email: &str) -> LeadRow {
        LeadRow {
            workspace: "acme".to_string(),
            email: email.to_string(),
            bison_id: None,
            first_name: None,
            last_name: None,
            company: None,
            title: None,
            status: None,
            tags: Vec::new(),
            created_at: None,
            updated_at: None,
            synced_at: Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_debug_omits_service_key() {
        let client = client("https://xyz.supabase.co/", 10);
        let debug = format!("{:?}", client);
        assert!(debug.contains("https://xyz.supabase.co"));
        assert!(!debug.contains("service-key"));
    }

    #[tokio::test]
    async fn test_upsert_is_chunked() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/leads")
            .match_query(Matcher::UrlEncoded(
                "on_conflict".into(),
                "workspace,email".into(),
            ))
            .match_header("apikey", "service-key")
            .match_header("authorization", "Bearer service-key")
            .match_header("prefer", "resolution=merge-duplicates,return=minimal")
            .with_status(201)
            .expect(3)
            .create_async()
            .await;

        let rows: Vec<LeadRow> = (0..5).map(|i| row(&format!("u{}@acme.com", i))).collect();
        let sent = client(&server.url(), 2).upsert_leads(&rows).await.unwrap();

        assert_eq!(sent, 5);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upsert_failure_reports_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/v1/leads")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"message":"column \"title\" does not exist"}"#)
            .create_async()
            .await;

        let err = client(&server.url(), 10)
            .upsert_leads(&[row("a@acme.com")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("title"));
    }

    #[tokio::test]
    async fn test_upsert_nothing_sends_nothing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/leads")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let sent = client(&server.url(), 10).upsert_leads(&[]).await.unwrap();
        assert_eq!(sent, 0);
        mock.assert_async().await;
    }

    async fn mock_rows(
        server: &mut mockito::ServerGuard,
        offset: usize,
        body: serde_json::Value,
    ) -> mockito::Mock {
        server
            .mock("GET", "/rest/v1/contacts")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "*".into()),
                Matcher::UrlEncoded("offset".into(), offset.to_string()),
            ]))
            .match_header("apikey", "service-key")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_fetch_records_pages_until_empty_page() {
        let mut server = Server::new_async().await;
        let pages = [
            mock_rows(&mut server, 0, json!([{"id": 1}, {"id": 2}])).await,
            mock_rows(&mut server, 2, json!([{"id": 3}])).await,
            mock_rows(&mut server, 3, json!([])).await,
        ];

        let records = client(&server.url(), 10)
            .fetch_records("contacts", 2)
            .await
            .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
        for page in pages {
            page.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_fetch_records_survives_server_row_cap() {
        // The server returns at most 2 rows whatever limit is asked for.
        let mut server = Server::new_async().await;
        let _pages = [
            mock_rows(&mut server, 0, json!([{"id": 1}, {"id": 2}])).await,
            mock_rows(&mut server, 2, json!([{"id": 3}, {"id": 4}])).await,
            mock_rows(&mut server, 4, json!([{"id": 5}])).await,
            mock_rows(&mut server, 5, json!([])).await,
        ];

        let records = client(&server.url(), 10)
            .fetch_records("contacts", 1000)
            .await
            .unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(records[4]["id"], json!(5));
    }

    #[tokio::test]
    async fn test_fetch_records_rejects_non_object_rows() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/rest/v1/contacts")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[1, 2]")
            .create_async()
            .await;

        let err = client(&server.url(), 10)
            .fetch_records("contacts", 50)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("contacts"));
    }
}
