//! Error types for the MCP crate.

use thiserror::Error;

/// Errors that can occur while serving MCP requests.
///
/// Everything reaching the dispatcher boundary is converted into a
/// flagged tool result; only transport-level failures (auth, session
/// lookup, startup) surface as rejected requests or process exit.
#[derive(Debug, Error)]
pub enum McpError {
    /// Missing or invalid connection configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The query gate rejected a statement.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// Tool not found in the registry.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Invalid arguments for a tool.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// SSE session identifier was never issued or already closed.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// API key missing or mismatched.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Database round-trip failure, including SQL the backend rejected.
    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),

    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<miga_adapter_pg::ProviderError> for McpError {
    fn from(err: miga_adapter_pg::ProviderError) -> Self {
        match err {
            miga_adapter_pg::ProviderError::MissingConfig(var) => {
                Self::Configuration(format!("environment variable '{var}' is not set"))
            }
            miga_adapter_pg::ProviderError::Connect(e) => Self::Backend(e),
        }
    }
}
