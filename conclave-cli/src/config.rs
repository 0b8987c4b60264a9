//! YAML configuration for conclave nodes.
//!
//! One file can describe any role; each role reads the keys it needs and
//! command-line flags override the file.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Which seeded catalog a tool server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    User,
    Product,
    /// Both catalogs behind one server.
    #[default]
    All,
}

/// Node configuration, shared across roles.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    /// Bind address, e.g. `0.0.0.0:9200`.
    pub listen: Option<String>,
    /// Tool server endpoint for the agent role.
    pub tool_server: Option<String>,
    /// Seeded catalog for the tool-server role.
    pub catalog: CatalogKind,
    /// Agent display name for the agent role.
    pub agent_name: Option<String>,
    /// Delegate endpoints for the orchestrator role.
    pub agents: Vec<String>,
    /// Per-task timeout for delegate dispatch.
    pub task_timeout_secs: Option<u64>,
    /// Front-end bundle directory for the gateway.
    pub static_dir: Option<String>,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen: "0.0.0.0:9200"
agents:
  - "http://localhost:9101"
  - "http://localhost:9102"
taskTimeoutSecs: 20
staticDir: "resource/app"
"#;
        let config: NodeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.as_deref(), Some("0.0.0.0:9200"));
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.task_timeout_secs, Some(20));
        assert_eq!(config.catalog, CatalogKind::All);
    }

    #[test]
    fn test_parse_tool_server_config() {
        let yaml = r#"
listen: "0.0.0.0:9011"
catalog: user
"#;
        let config: NodeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.catalog, CatalogKind::User);
    }

    #[test]
    fn test_empty_config_defaults() {
        let config: NodeConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.listen.is_none());
        assert!(config.agents.is_empty());
    }
}
