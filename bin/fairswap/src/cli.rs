use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use fairswap_deploy::CONFIG_FILENAME;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "fairswap")]
#[command(
    author,
    version,
    about = "Deploy and configure the FairSwap contracts, one step at a time"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "FAIRSWAP_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// Path to a FairSwap.toml configuration file, or to the directory holding it.
    ///
    /// A missing file is not an error; defaults and environment variables apply.
    #[arg(short, long, alias = "conf", env = "FAIRSWAP_CONFIG", default_value = CONFIG_FILENAME, global = true)]
    pub config: PathBuf,

    /// Overrides applied on top of the configuration file and the `FAIRSWAP_*` environment.
    #[clap(flatten)]
    pub overrides: ConfigOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the selected deployment steps against the configured network.
    Deploy(DeployArgs),

    /// Verify the recorded contracts of the configured network on its block explorer.
    Verify {
        /// The account that deployed the factory. The sender if not provided.
        #[arg(long)]
        fee_to_setter: Option<Address>,
    },

    /// Print the addresses recorded in the registry.
    Addresses {
        /// Only list this network.
        #[arg(long)]
        network: Option<String>,
    },

    /// Write the effective configuration to the configuration file.
    Init,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    /// Comma-separated step ids to run: 1 deploys the factory, 2 sets its fee recipient,
    /// 3 deploys the router.
    ///
    /// Defaults to the configured steps (1,2 unless configured otherwise).
    #[arg(short, long, value_delimiter = ',')]
    pub steps: Vec<u8>,

    /// Skip deploy steps whose contract is already recorded for the network.
    #[arg(long)]
    pub skip_deployed: bool,
}

/// Configuration values given on the command line.
///
/// Serialized as a figment layer; absent values leave lower layers untouched.
#[derive(Debug, Clone, Default, Args, Serialize)]
pub struct ConfigOverrides {
    /// The JSON-RPC endpoint of the target network.
    #[arg(long, alias = "rpc", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,

    /// Registry key of the network. Derived from the chain id if not provided.
    #[arg(long = "network-name", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,

    /// Path to the address registry.
    #[arg(long = "registry", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,

    /// Path to the compiled contract artifacts.
    #[arg(long = "artifacts", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,

    /// The account submitting transactions. The node's first account if not provided.
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,

    /// The fee recipient set on the factory. The sender if not provided.
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_to: Option<Address>,

    /// Maximum number of seconds to wait for a transaction receipt.
    #[arg(long = "confirmation-timeout", global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u64>,

    #[arg(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<u8>>,

    #[arg(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_deployed: Option<bool>,
}

impl ConfigOverrides {
    /// Fold the deploy subcommand's flags into the overrides.
    pub fn with_deploy_args(mut self, args: &DeployArgs) -> Self {
        if !args.steps.is_empty() {
            self.steps = Some(args.steps.clone());
        }
        if args.skip_deployed {
            self.skip_deployed = Some(true);
        }
        self
    }
}
