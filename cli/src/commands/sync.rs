use anyhow::{bail, Result};
use lead_sync::{Config, LeadSyncService};

use crate::argparse::SyncLeadsArgs;

pub async fn handle_sync_leads_command(args: SyncLeadsArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    tracing::info!(
        "Loaded {} with {} Bison workspaces",
        args.config.display(),
        config.bison.workspaces.len()
    );

    let service = LeadSyncService::from_config(config)?;
    let report = service.run_once().await?;
    println!("{}", report);

    if report.has_failures() {
        bail!(
            "{} of {} workspaces failed to sync",
            report.failed().count(),
            report.workspaces.len()
        );
    }
    Ok(())
}
