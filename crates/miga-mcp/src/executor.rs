//! Tool dispatch and execution.
//!
//! `ToolExecutor` resolves a tool-call request to a handler, runs it
//! against the connection provider (through the query gate where
//! relevant) and maps every outcome — success, policy rejection,
//! backend failure — into a uniform response envelope. Callers never
//! receive a raised fault, only a flagged result.

use crate::error::McpError;
use crate::gate::QueryGate;
use crate::protocol::{CallToolParams, CallToolResponse};
use crate::tools::ToolRegistry;
use miga_adapter_pg::{ConnectionProvider, introspect, rows::rows_to_json};
use serde_json::{Value, json};

/// The tool executor. Owns its connection provider and gate; nothing
/// here reaches into ambient globals.
pub struct ToolExecutor {
    registry: ToolRegistry,
    provider: ConnectionProvider,
    gate: QueryGate,
}

impl ToolExecutor {
    /// Create an executor over the given catalog and provider.
    pub fn new(registry: ToolRegistry, provider: ConnectionProvider) -> Self {
        Self {
            registry,
            provider,
            gate: QueryGate::new(),
        }
    }

    /// The tool catalog served by this executor.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute a tool call. Never returns a fault: all failures are
    /// captured as an error-flagged response.
    pub async fn call_tool(&self, params: &CallToolParams) -> CallToolResponse {
        tracing::debug!(tool = %params.name, "dispatching tool call");

        match self.dispatch(params).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(tool = %params.name, error = %e, "tool call failed");
                CallToolResponse::error(e.to_string())
            }
        }
    }

    async fn dispatch(&self, params: &CallToolParams) -> Result<CallToolResponse, McpError> {
        if !self.registry.contains(&params.name) {
            return Err(McpError::UnknownTool(params.name.clone()));
        }

        match params.name.as_str() {
            "inspect_schema" => self.inspect_schema(params).await,
            "query_db" => self.query_db(params).await,
            "list_inventory" => self.list_inventory(params).await,
            "inspect_rpc" => self.inspect_rpc(params).await,
            other => Err(McpError::UnknownTool(other.to_string())),
        }
    }

    async fn inspect_schema(&self, params: &CallToolParams) -> Result<CallToolResponse, McpError> {
        let table_name = require_str(params, "table_name")?;

        let lease = self.provider.lease().await?;
        let result = introspect::table_columns(lease.pool(), &table_name).await;
        lease.release().await;

        // An unknown table is an empty column list, not an error.
        let columns = result?;
        Ok(CallToolResponse::text(serde_json::to_string(&columns)?))
    }

    async fn query_db(&self, params: &CallToolParams) -> Result<CallToolResponse, McpError> {
        let sql = require_str(params, "sql")?;

        // Gate before lease: rejected SQL never reaches the database
        // and never churns a per-request pool.
        let sql = self.gate.check(&sql)?.to_string();

        let lease = self.provider.lease().await?;
        let result = sqlx::query(&sql).fetch_all(lease.pool()).await;
        lease.release().await;

        let rows = result?;
        tracing::debug!(rows = rows.len(), "query returned");
        Ok(CallToolResponse::text(serde_json::to_string(
            &rows_to_json(&rows),
        )?))
    }

    async fn list_inventory(&self, params: &CallToolParams) -> Result<CallToolResponse, McpError> {
        let business_id = require_str(params, "business_id")?;

        let lease = self.provider.lease().await?;
        let result = introspect::inventory_for_business(lease.pool(), &business_id).await;
        lease.release().await;

        let items: Vec<Value> = result?
            .into_iter()
            .map(|row| {
                json!({
                    "name": row.name,
                    "current_stock": row.current_stock,
                    "unit": row.unit,
                    "weight_per_unit": row.weight_per_unit,
                    "commercial_units": commercial_units(row.current_stock, row.weight_per_unit),
                })
            })
            .collect();

        Ok(CallToolResponse::text(serde_json::to_string(&Value::Array(
            items,
        ))?))
    }

    async fn inspect_rpc(&self, params: &CallToolParams) -> Result<CallToolResponse, McpError> {
        let function_name = require_str(params, "function_name")?;

        let lease = self.provider.lease().await?;
        let result = introspect::function_definition(lease.pool(), &function_name).await;
        lease.release().await;

        match result? {
            Some(definition) => Ok(CallToolResponse::text(definition)),
            None => Ok(CallToolResponse::error(format!(
                "function '{function_name}' not found"
            ))),
        }
    }
}

/// Stock is tracked by weight but reported in sellable units. Rows
/// without a usable weight-per-unit report `"N/A"`.
pub fn commercial_units(current_stock: Option<f64>, weight_per_unit: Option<f64>) -> String {
    match (current_stock, weight_per_unit) {
        (Some(stock), Some(weight)) if weight > 0.0 => format!("{:.2}", stock / weight),
        _ => "N/A".to_string(),
    }
}

fn require_str(params: &CallToolParams, key: &str) -> Result<String, McpError> {
    params
        .arguments
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| McpError::InvalidArguments {
            tool: params.name.clone(),
            reason: format!("missing required string argument '{key}'"),
        })
}
