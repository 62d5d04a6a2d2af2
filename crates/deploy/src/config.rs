//! Deployment configuration.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DeployError, Selection, verify::ExplorerConfig};

/// The default name for the configuration file.
pub const CONFIG_FILENAME: &str = "FairSwap.toml";

/// The default registry file.
pub const DEFAULT_REGISTRY_PATH: &str = "deployment.json";

/// The default artifacts directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The default local node endpoint.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Everything a deployment run needs to know, serializable to/from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// JSON-RPC endpoint of the target network.
    pub rpc_url: Url,
    /// Registry key of the network. Derived from the chain id when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
    /// Path to the address registry.
    pub registry_path: PathBuf,
    /// Path to the compiled contract artifacts.
    pub artifacts_dir: PathBuf,
    /// Submitting account. The node's first account when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    /// Fee recipient set by step 2. The sender when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_to: Option<Address>,
    /// Step ids to run.
    pub steps: Vec<u8>,
    /// Skip deploy steps whose contract is already recorded.
    pub skip_deployed: bool,
    /// Maximum time to wait for a transaction receipt. Unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u64>,
    /// Block explorer used for source verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer: Option<ExplorerConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            network_name: None,
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            sender: None,
            fee_to: None,
            steps: Selection::DEFAULT_IDS.to_vec(),
            skip_deployed: false,
            confirmation_timeout_secs: None,
            explorer: None,
        }
    }
}

impl DeployConfig {
    /// The configured step selection.
    pub fn selection(&self) -> Result<Selection, DeployError> {
        Selection::from_ids(&self.steps)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deploy config to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `FairSwap.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }
}
