use anyhow::{bail, Result};
use chrono::Utc;
use std::fmt;
use std::time::Duration;

use crate::bison::BisonClient;
use crate::config::{Config, WorkspaceConfig};
use crate::lead::{dedupe_by_email, LeadRow};
use crate::supabase::SupabaseClient;

/// Copies leads from every configured Bison workspace into Supabase.
///
/// Workspaces are processed one at a time. A workspace that fails is recorded
/// in the report and the run moves on to the next one.
pub struct LeadSyncService {
    bison: BisonClient,
    supabase: SupabaseClient,
    workspaces: Vec<WorkspaceConfig>,
    page_delay: Duration,
    max_pages: u32,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub workspaces: Vec<WorkspaceReport>,
}

#[derive(Debug, Default)]
pub struct WorkspaceReport {
    pub name: String,
    pub pages: u32,
    pub fetched: usize,
    pub upserted: usize,
    pub skipped: usize,
    pub error: Option<String>,
}

impl SyncReport {
    pub fn total_upserted(&self) -> usize {
        self.workspaces.iter().map(|w| w.upserted).sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = &WorkspaceReport> {
        self.workspaces.iter().filter(|w| w.error.is_some())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

impl fmt::Display for WorkspaceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} pages, {} fetched, {} upserted, {} skipped",
            self.name, self.pages, self.fetched, self.upserted, self.skipped
        )?;
        if let Some(error) = &self.error {
            write!(f, " (failed: {})", error)?;
        }
        Ok(())
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for workspace in &self.workspaces {
            writeln!(f, "{}", workspace)?;
        }
        write!(
            f,
            "Total: {} upserted across {} workspaces, {} failed",
            self.total_upserted(),
            self.workspaces.len(),
            self.failed().count()
        )
    }
}

impl LeadSyncService {
    pub fn new(bison: BisonClient, supabase: SupabaseClient, config: Config) -> Self {
        Self {
            page_delay: config.bison.page_delay(),
            max_pages: config.bison.max_pages,
            workspaces: config.bison.workspaces,
            bison,
            supabase,
        }
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let retry = config.retry.policy();
        let bison = BisonClient::new(&config.bison, retry);
        let supabase = SupabaseClient::new(&config.supabase, retry)?;
        Ok(Self::new(bison, supabase, config))
    }

    /// Sync every workspace. Only returns `Err` for problems that stop the
    /// whole run; per-workspace failures land in the report.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for workspace in &self.workspaces {
            tracing::info!("Syncing Bison workspace {}", workspace.name);
            let mut ws_report = WorkspaceReport {
                name: workspace.name.clone(),
                ..Default::default()
            };

            if let Err(e) = self.sync_workspace(workspace, &mut ws_report).await {
                tracing::error!("Workspace {} failed: {:#}", workspace.name, e);
                ws_report.error = Some(format!("{:#}", e));
            } else {
                tracing::info!("{}", ws_report);
            }
            report.workspaces.push(ws_report);
        }

        Ok(report)
    }

    async fn sync_workspace(
        &self,
        workspace: &WorkspaceConfig,
        report: &mut WorkspaceReport,
    ) -> Result<()> {
        let api_key = workspace.resolve_api_key()?;
        let mut page = 1;

        loop {
            if page > self.max_pages {
                bail!(
                    "Stopped after {} pages; raise bison.max_pages if this workspace is that large",
                    self.max_pages
                );
            }

            let lead_page = self.bison.fetch_page(&api_key, page).await?;
            let fetched = lead_page.leads.len();
            report.pages += 1;
            report.fetched += fetched;

            let synced_at = Utc::now();
            let rows = dedupe_by_email(
                lead_page
                    .leads
                    .into_iter()
                    .filter_map(|lead| LeadRow::from_bison(&workspace.name, lead, synced_at))
                    .collect(),
            );
            // No email, or a repeat of an email earlier on the page.
            report.skipped += fetched - rows.len();

            report.upserted += self.supabase.upsert_leads(&rows).await?;
            tracing::debug!(
                "Workspace {} page {}: {} rows upserted",
                workspace.name,
                page,
                rows.len()
            );

            if !lead_page.has_more {
                return Ok(());
            }
            page += 1;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }
    }
}
