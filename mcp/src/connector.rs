//! The connector registry is an external collaborator (§6): the engine only
//! ever reads it to resolve an MCP tool's `server_label` to a URL.

use async_trait::async_trait;

/// A configured MCP connector: `connector_id` doubles as the `server_label`
/// an incoming `mcp` tool descriptor names.
#[derive(Debug, Clone)]
pub struct Connector {
    pub connector_id: String,
    pub url: String,
    pub server_label: String,
}

#[async_trait]
pub trait ConnectorStore: Send + Sync {
    async fn get_connector(&self, connector_id: &str) -> Option<Connector>;
}

/// In-memory connector store, mostly useful for tests and single-tenant
/// deployments where connectors are configured statically at startup.
#[derive(Debug, Default)]
pub struct StaticConnectorStore {
    connectors: std::collections::HashMap<String, Connector>,
}

impl StaticConnectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connector(mut self, connector: Connector) -> Self {
        self.connectors.insert(connector.connector_id.clone(), connector);
        self
    }
}

#[async_trait]
impl ConnectorStore for StaticConnectorStore {
    async fn get_connector(&self, connector_id: &str) -> Option<Connector> {
        self.connectors.get(connector_id).cloned()
    }
}
