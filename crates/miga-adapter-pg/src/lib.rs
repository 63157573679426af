//! Postgres connection provider for the Miga MCP server.
//!
//! Two lifecycle policies are supported, selectable by deployment mode:
//!
//! - **Persistent**: one pool created at process start and reused for
//!   all tool invocations (stdio transport).
//! - **Per-request**: the connection string is resolved from the
//!   environment at invocation time and a fresh single-connection pool
//!   is created for that call and closed afterwards (SSE transport,
//!   mirroring a serverless deployment).
//!
//! Acquisition is scoped: [`ConnectionProvider::lease`] yields a
//! [`PoolLease`] that must be released on every exit path. Persistent
//! leases are cheap clones of the shared pool; per-request leases own
//! their pool and close it on release.

use miga_core::config::normalize_database_url;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod introspect;
pub mod rows;

/// Default pool size for the persistent lifecycle.
pub const PERSISTENT_POOL_SIZE: u32 = 5;

/// Errors raised while obtaining a connection.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No connection string could be resolved for this invocation.
    #[error("missing configuration: environment variable '{0}' is not set")]
    MissingConfig(String),

    /// The database rejected the connection attempt.
    #[error("failed to connect to database: {0}")]
    Connect(#[from] sqlx::Error),
}

/// Provides pooled database connections to tool handlers.
pub enum ConnectionProvider {
    /// One shared pool for the process lifetime.
    Persistent(PgPool),
    /// A fresh single-connection pool per invocation. The connection
    /// string is read from this environment variable at lease time.
    PerRequest { database_url_env: String },
}

impl ConnectionProvider {
    /// Create a persistent provider around an already-connected pool.
    pub fn persistent(pool: PgPool) -> Self {
        Self::Persistent(pool)
    }

    /// Create a per-request provider resolving the connection string
    /// from `database_url_env` on every lease.
    pub fn per_request(database_url_env: impl Into<String>) -> Self {
        Self::PerRequest {
            database_url_env: database_url_env.into(),
        }
    }

    /// Connect a persistent pool from a connection string.
    pub async fn connect_persistent(database_url: &str) -> Result<Self, ProviderError> {
        let pool = PgPoolOptions::new()
            .max_connections(PERSISTENT_POOL_SIZE)
            .connect(database_url)
            .await?;
        Ok(Self::Persistent(pool))
    }

    /// Lease a pool for one tool invocation.
    ///
    /// The caller must call [`PoolLease::release`] on every exit path,
    /// including failure, or a per-request pool is left open until the
    /// lease is dropped.
    pub async fn lease(&self) -> Result<PoolLease, ProviderError> {
        match self {
            Self::Persistent(pool) => Ok(PoolLease {
                pool: pool.clone(),
                owned: false,
            }),
            Self::PerRequest { database_url_env } => {
                let raw = std::env::var(database_url_env)
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| ProviderError::MissingConfig(database_url_env.clone()))?;
                let url = normalize_database_url(&raw);

                let pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect(&url)
                    .await?;

                tracing::debug!("opened per-request connection pool");
                Ok(PoolLease { pool, owned: true })
            }
        }
    }
}

/// A leased handle to the backend database, scoped to one invocation.
pub struct PoolLease {
    pool: PgPool,
    owned: bool,
}

impl PoolLease {
    /// The pool backing this lease.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether this lease owns its pool (per-request lifecycle).
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Release the lease. Per-request leases close their pool; shared
    /// leases are a no-op.
    pub async fn release(self) {
        if self.owned {
            self.pool.close().await;
            tracing::debug!("closed per-request connection pool");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_pool() -> PgPool {
        // connect_lazy never touches the network, which is all these
        // lifecycle tests need.
        PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy("postgres://u:p@localhost:5432/db")
            .unwrap()
    }

    #[tokio::test]
    async fn persistent_lease_does_not_close_shared_pool() {
        let pool = lazy_pool();
        let provider = ConnectionProvider::persistent(pool.clone());

        let lease = provider.lease().await.unwrap();
        assert!(!lease.is_owned());
        lease.release().await;

        assert!(!pool.is_closed());
    }

    #[tokio::test]
    async fn owned_lease_closes_its_pool_on_release() {
        let pool = lazy_pool();
        let lease = PoolLease {
            pool: pool.clone(),
            owned: true,
        };

        lease.release().await;
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn per_request_lease_without_config_is_an_error() {
        let provider = ConnectionProvider::per_request("MIGA_TEST_DB_URL_UNSET");

        match provider.lease().await {
            Err(ProviderError::MissingConfig(var)) => {
                assert_eq!(var, "MIGA_TEST_DB_URL_UNSET");
            }
            other => panic!("expected MissingConfig, got {:?}", other.map(|_| ())),
        }
    }
}
