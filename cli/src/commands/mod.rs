mod filter;
mod sync;

use crate::argparse::Commands;
pub use filter::handle_filter_command;
pub use sync::handle_sync_leads_command;

pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Filter(args) => handle_filter_command(args).await,
        Commands::SyncLeads(args) => handle_sync_leads_command(args).await,
    }
}
