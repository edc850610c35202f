use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "revops",
    about = "Filter CRM contact lists and sync leads from Bison",
    version,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Pick which subcommand to use
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Filter, sort and page a contact list
    Filter(FilterArgs),
    /// Copy leads from every configured Bison workspace into Supabase
    SyncLeads(SyncLeadsArgs),
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    /// JSON file holding an array of records
    #[arg(long, conflicts_with = "table", required_unless_present = "table")]
    pub records: Option<PathBuf>,

    /// Read records from this Supabase table instead of a file
    #[arg(long)]
    pub table: Option<String>,

    /// Config file with the [supabase] section, used with --table
    #[arg(long, default_value = "revops.toml")]
    pub config: PathBuf,

    /// Rows per Supabase request when reading --table
    #[arg(long, default_value_t = 1000)]
    pub fetch_size: usize,

    /// Field catalog, JSON or TOML; defaults to the built-in CRM contacts catalog
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Free-text search across the searchable fields
    #[arg(long)]
    pub query: Option<String>,

    /// Filter rule, e.g. "company contains acme" or "or stage is won @g1"
    #[arg(long = "where", value_name = "RULE")]
    pub filters: Vec<String>,

    /// Declare an OR-group that rules can join with @<id>
    #[arg(long = "group", value_name = "ID")]
    pub groups: Vec<String>,

    /// Sort key, e.g. "last_name" or "updated_at:desc"; repeat for tie-breaks
    #[arg(long = "sort", value_name = "FIELD[:asc|desc]")]
    pub sorts: Vec<String>,

    /// Full evaluation request as JSON, instead of the flags above
    #[arg(long, conflicts_with_all = ["query", "filters", "groups", "sorts"])]
    pub rules: Option<PathBuf>,

    /// 1-based page number
    #[arg(long, allow_negative_numbers = true)]
    pub page: Option<i64>,

    /// Records per page
    #[arg(long, allow_negative_numbers = true)]
    pub page_size: Option<i64>,

    /// Print the page as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SyncLeadsArgs {
    /// Path to configuration file
    #[arg(long, default_value = "revops.toml")]
    pub config: PathBuf,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
