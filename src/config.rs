//! Gateway configuration (§6: "CLI surface"): a YAML file merged with a
//! handful of environment-variable overrides for secrets, in the style of
//! the MCP client's own `McpConfig::from_file`/`with_env_proxy`.

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Responses,
    Chat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub base_url: String,
    /// Read from the `GATEWAY_BACKEND_API_KEY` env var if omitted from the file.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub connector_id: String,
    pub url: String,
    pub server_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl GatewayConfig {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| ConfigError::Read(path.as_ref().display().to_string(), e.to_string()))?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.with_env_overrides())
    }

    /// Fill in secrets from the environment when the file leaves them unset.
    fn with_env_overrides(mut self) -> Self {
        if self.backend.api_key.is_none() {
            self.backend.api_key = std::env::var("GATEWAY_BACKEND_API_KEY").ok();
        }
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(String, String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults_to_0_0_0_0_8080() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn parses_a_minimal_yaml_document() {
        let yaml = r#"
backend:
  kind: responses
  base_url: "https://api.example.com"
"#;
        let config: GatewayConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.connectors.is_empty());
        assert_eq!(config.logging.level, "info");
    }

    #[tokio::test]
    async fn missing_file_surfaces_a_read_error() {
        let err = GatewayConfig::from_file("/nonexistent/gateway.yaml").await.unwrap_err();
        assert!(matches!(err, ConfigError::Read(_, _)));
    }
}
