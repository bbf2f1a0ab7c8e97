//! Pool configuration loading

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

/// Pool configuration corresponding to the host YAML config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolConfig {
    /// Whether mediated-device discovery runs at startup. With discovery
    /// disabled the pool starts (and stays) empty.
    pub enable_discovery: bool,
    /// Node name for log context, when the embedding daemon knows it.
    pub node_name: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enable_discovery: true,
            node_name: None,
        }
    }
}

/// load pool config from a YAML file
pub async fn load_pool_config(path: impl AsRef<Path>) -> anyhow::Result<PoolConfig> {
    let path = path.as_ref();
    tracing::info!("Loading pool configuration from {:?}", path);

    let yaml_content = tokio::fs::read_to_string(path).await?;
    let config: PoolConfig = serde_yaml::from_str(&yaml_content)?;

    tracing::info!(
        enable_discovery = config.enable_discovery,
        node_name = ?config.node_name,
        "Pool configuration loaded"
    );
    Ok(config)
}
