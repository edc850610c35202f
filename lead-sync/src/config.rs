use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Bison caps `per_page` at 200.
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub bison: BisonConfig,
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
pub struct BisonConfig {
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceConfig {
    pub name: String,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_key: Option<String>,
    #[serde(default = "default_service_key_env")]
    pub service_key_env: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_conflict_columns")]
    pub conflict_columns: String,
    #[serde(default = "default_upsert_chunk")]
    pub upsert_chunk: usize,
}

#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

impl BisonConfig {
    /// Page size clamped to `1..=200`.
    pub fn effective_page_size(&self) -> u32 {
        if self.page_size > MAX_PAGE_SIZE {
            tracing::warn!(
                "Bison page_size {} exceeds the API limit, using {}",
                self.page_size,
                MAX_PAGE_SIZE
            );
        }
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

impl WorkspaceConfig {
    /// Inline key first, then the named environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_secret(
            self.api_key.as_deref(),
            self.api_key_env.as_deref(),
            &format!("Bison workspace `{}` API key", self.name),
        )
    }
}

impl SupabaseConfig {
    /// Reads only the `[supabase]` table of a config file, for commands that
    /// never talk to Bison.
    pub fn load(path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct SupabaseOnly {
            supabase: SupabaseConfig,
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let file: SupabaseOnly = toml::from_str(&content)
            .with_context(|| format!("Failed to parse [supabase] in {}", path.display()))?;
        Ok(file.supabase)
    }

    pub fn resolve_service_key(&self) -> Result<String> {
        resolve_secret(
            self.service_key.as_deref(),
            Some(self.service_key_env.as_str()),
            "Supabase service key",
        )
    }
}

fn resolve_secret(inline: Option<&str>, env_var: Option<&str>, what: &str) -> Result<String> {
    if let Some(value) = inline.filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }
    let Some(env_var) = env_var else {
        bail!("{} is not configured", what);
    };
    let value = std::env::var(env_var).with_context(|| format!("{} not set", env_var))?;
    if value.trim().is_empty() {
        bail!("{} is empty ({})", what, env_var);
    }
    Ok(value.trim().to_string())
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bison.workspaces.is_empty() {
            bail!("At least one [[bison.workspaces]] entry is required");
        }
        for workspace in &self.bison.workspaces {
            if workspace.name.trim().is_empty() {
                bail!("Bison workspace name must not be empty");
            }
        }
        if self.supabase.upsert_chunk == 0 {
            bail!("supabase.upsert_chunk must be positive");
        }
        if self.bison.max_pages == 0 {
            bail!("bison.max_pages must be positive");
        }
        Ok(())
    }
}

// Default functions
fn default_page_size() -> u32 {
    100
}

fn default_page_delay_ms() -> u64 {
    250
}

fn default_max_pages() -> u32 {
    10_000
}

fn default_service_key_env() -> String {
    "SUPABASE_SERVICE_ROLE_KEY".to_string()
}

fn default_table() -> String {
    "leads".to_string()
}

fn default_conflict_columns() -> String {
    "workspace,email".to_string()
}

fn default_upsert_chunk() -> usize {
    500
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}
