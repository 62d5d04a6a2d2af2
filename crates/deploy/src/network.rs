//! Network identity and per-network deployment constants.

use std::fmt;

use alloy_core::primitives::{Address, address};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// The network a run operates against.
///
/// `name` keys the address registry, `chain_id` selects the network parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
}

impl Network {
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            name: name.into(),
            chain_id,
        }
    }

    /// Build the network for a chain id, naming it after the supported chain when known.
    pub fn from_chain_id(chain_id: u64) -> Self {
        let name = SupportedChain::from_chain_id(chain_id)
            .map(|chain| chain.to_string())
            .unwrap_or_else(|| format!("chain-{chain_id}"));

        Self { name, chain_id }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// Chains with a known parameter set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum SupportedChain {
    Polygon,
    PolygonMumbai,
    PolygonAmoy,
}

impl SupportedChain {
    pub fn chain_id(&self) -> u64 {
        match self {
            SupportedChain::Polygon => 137,
            SupportedChain::PolygonMumbai => 80001,
            SupportedChain::PolygonAmoy => 80002,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            137 => Some(SupportedChain::Polygon),
            80001 => Some(SupportedChain::PolygonMumbai),
            80002 => Some(SupportedChain::PolygonAmoy),
            _ => None,
        }
    }

    /// The wrapped native token (WMATIC / WPOL) of the chain.
    fn wrapped_native(&self) -> Address {
        match self {
            SupportedChain::Polygon => address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
            SupportedChain::PolygonMumbai => address!("9c3c9283d3e44854697cd22d3faa240cfb032889"),
            SupportedChain::PolygonAmoy => address!("360ad4f9a9a8efe9a8dcb5f461c4cc1047e1dcf9"),
        }
    }
}

/// Per-network constants consumed by deployment steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkParams {
    pub chain: SupportedChain,
    /// Wrapped native token, passed to the router constructor.
    pub wrapped_native: Address,
}

/// Resolve the network parameters of a chain.
///
/// Fails with [`DeployError::UnsupportedChain`] for chains outside the supported set; there is
/// no fallback network.
pub fn resolve(chain_id: u64) -> Result<NetworkParams, DeployError> {
    let chain =
        SupportedChain::from_chain_id(chain_id).ok_or(DeployError::UnsupportedChain(chain_id))?;

    Ok(NetworkParams {
        chain,
        wrapped_native: chain.wrapped_native(),
    })
}
