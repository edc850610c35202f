//! Copies leads from Bison cold-email workspaces into the Supabase CRM
//! tables, and reads those tables back as engine records.

pub mod bison;
pub mod config;
pub mod lead;
pub mod retry;
pub mod service;
pub mod supabase;

pub use bison::{BisonClient, LeadPage};
pub use config::{BisonConfig, Config, RetryConfig, SupabaseConfig, WorkspaceConfig};
pub use lead::{BisonLead, LeadRow};
pub use retry::RetryPolicy;
pub use service::{LeadSyncService, SyncReport, WorkspaceReport};
pub use supabase::SupabaseClient;
