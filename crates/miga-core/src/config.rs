//! Server configuration.
//!
//! All runtime configuration is environment-backed: the database
//! connection string comes from `DATABASE_URL` and the SSE pre-shared
//! key from `MCP_API_KEY`. Nothing here touches the network.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the Postgres connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Environment variable holding the SSE pre-shared API key.
pub const API_KEY_ENV: &str = "MCP_API_KEY";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("missing configuration: environment variable '{0}' is not set")]
    MissingEnv(String),
}

/// MCP transport type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Standard input/output transport (single trusted local client).
    #[default]
    Stdio,
    /// Server-sent-events transport (multi-tenant, API-key gated).
    Sse,
}

/// Read a required environment variable, treating empty values as absent.
pub fn require_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnv(name.to_string())),
    }
}

/// Resolve the database connection string from the environment.
pub fn database_url() -> Result<String, ConfigError> {
    require_env(DATABASE_URL_ENV).map(|raw| normalize_database_url(&raw))
}

/// Resolve the SSE pre-shared API key from the environment.
pub fn api_key() -> Result<String, ConfigError> {
    require_env(API_KEY_ENV)
}

/// Prepend the Postgres scheme when the connection string lacks one.
///
/// Hosted providers sometimes hand out bare `user:pass@host/db` strings.
pub fn normalize_database_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("postgresql://{trimmed}")
    }
}
