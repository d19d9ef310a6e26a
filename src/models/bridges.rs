use crate::models::datasets::chains::{ChainDescriptor, ChainMapping};
use crate::models::errors::{ChainError, ConfigError};

/// Where a bridge network's chain list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainSet {
    /// Known up front; names double as external ids.
    Static(&'static [&'static str]),
    /// Fetched from the remote chain registry at the start of a run.
    Registry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeNetwork {
    pub id: u32,
    pub bridge_db_name: &'static str,
    pub display_name: &'static str,
    pub chains: ChainSet,
    pub destination_chain: Option<&'static str>,
}

pub const BRIDGE_NETWORKS: &[BridgeNetwork] = &[BridgeNetwork {
    id: 48,
    bridge_db_name: "ibc",
    display_name: "IBC",
    chains: ChainSet::Registry,
    destination_chain: None,
}];

pub fn find_bridge(bridge_db_name: &str) -> Result<&'static BridgeNetwork, ConfigError> {
    if bridge_db_name.trim().is_empty() {
        return Err(ConfigError::MissingParameter { name: "bridgeDbName" });
    }
    BRIDGE_NETWORKS
        .iter()
        .find(|bridge| bridge.bridge_db_name == bridge_db_name)
        .ok_or_else(|| ConfigError::UnknownBridge {
            bridge_id: bridge_db_name.to_string(),
        })
}

/// A bridge network together with the chain list and mapping in effect for one run.
#[derive(Debug, Clone)]
pub struct ResolvedBridge {
    pub network: BridgeNetwork,
    pub chains: Vec<String>,
    pub mapping: Option<ChainMapping>,
}

impl ResolvedBridge {
    pub fn from_registry(network: BridgeNetwork, zones: &[ChainDescriptor]) -> Self {
        Self {
            chains: zones.iter().map(ChainDescriptor::lowercase_name).collect(),
            mapping: Some(ChainMapping::from_descriptors(zones)),
            network,
        }
    }

    pub fn from_static(network: BridgeNetwork, chains: &[&str]) -> Self {
        Self {
            chains: chains.iter().map(|chain| chain.to_lowercase()).collect(),
            mapping: Some(ChainMapping::identity(chains)),
            network,
        }
    }

    /// A network whose chain list is known but whose mapping has not been built yet.
    pub fn unmapped(network: BridgeNetwork, chains: Vec<String>) -> Self {
        Self {
            network,
            chains,
            mapping: None,
        }
    }

    pub fn mapping(&self) -> Result<&ChainMapping, ChainError> {
        self.mapping.as_ref().ok_or_else(|| ChainError::MissingMapping {
            bridge: self.network.bridge_db_name.to_string(),
        })
    }

    /// True when `chain_id` is this bridge's destination chain, which is never backfilled.
    pub fn is_destination(&self, chain_id: &str) -> bool {
        let Some(destination) = self.network.destination_chain else {
            return false;
        };
        let destination = destination.to_lowercase();
        let resolved = self
            .mapping
            .as_ref()
            .and_then(|mapping| mapping.resolve(&destination))
            .unwrap_or(destination.as_str());
        resolved.eq_ignore_ascii_case(chain_id)
    }
}
