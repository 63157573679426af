//! Tool registry and the built-in tool catalog.
//!
//! The catalog is static: it is declared once per transport at process
//! start and never mutated afterwards. `inspect_rpc` is only exposed on
//! the stdio transport, where the caller is a trusted local process.

use crate::protocol::ToolDefinition;
use miga_core::Transport;
use serde_json::json;
use std::collections::HashMap;

/// Registry of available MCP tools.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build the catalog for the given transport.
    pub fn builtin(transport: Transport) -> Self {
        let mut registry = Self::new();

        registry.register(ToolDefinition {
            name: "inspect_schema".to_string(),
            description: Some(
                "List the columns of a table: name, data type, nullability and default."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": "Name of the table to inspect"
                    }
                },
                "required": ["table_name"]
            }),
        });

        registry.register(ToolDefinition {
            name: "query_db".to_string(),
            description: Some(
                "Run a read-only SELECT against the database. Destructive statements are rejected."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "A single SELECT statement"
                    }
                },
                "required": ["sql"]
            }),
        });

        registry.register(ToolDefinition {
            name: "list_inventory".to_string(),
            description: Some(
                "List inventory for a business, with stock converted to sellable commercial units."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "business_id": {
                        "type": "string",
                        "description": "Tenant identifier scoping the inventory rows"
                    }
                },
                "required": ["business_id"]
            }),
        });

        if transport == Transport::Stdio {
            registry.register(ToolDefinition {
                name: "inspect_rpc".to_string(),
                description: Some(
                    "Fetch the source text of a stored procedure by name.".to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "function_name": {
                            "type": "string",
                            "description": "Name of the stored procedure"
                        }
                    },
                    "required": ["function_name"]
                }),
            });
        }

        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tools.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        self.tools.values().collect()
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_catalog_includes_rpc_inspection() {
        let registry = ToolRegistry::builtin(Transport::Stdio);
        assert_eq!(registry.len(), 4);
        assert!(registry.contains("inspect_rpc"));
    }

    #[test]
    fn sse_catalog_excludes_rpc_inspection() {
        let registry = ToolRegistry::builtin(Transport::Sse);
        assert_eq!(registry.len(), 3);
        assert!(!registry.contains("inspect_rpc"));
        assert!(registry.contains("query_db"));
        assert!(registry.contains("inspect_schema"));
        assert!(registry.contains("list_inventory"));
    }

    #[test]
    fn definitions_declare_required_arguments() {
        let registry = ToolRegistry::builtin(Transport::Stdio);
        let tool = registry.get("query_db").unwrap();
        assert_eq!(tool.input_schema["required"][0], "sql");
    }
}
