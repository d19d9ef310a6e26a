use anyhow::Result;
use serde_json::json;
use tracing::info;

use crate::indexer::rpc::IndexApi;
use crate::indexer::rpc::queries::{SUPPORTED_ZONES, SupportedZones};
use crate::models::bridges::{BridgeNetwork, ResolvedBridge};
use crate::models::datasets::chains::ChainDescriptor;
use crate::models::errors::{ChainError, RegistryError};

/// Full zone registry, unfiltered.
pub async fn get_supported_chains(api: IndexApi<'_>) -> Result<Vec<ChainDescriptor>> {
    let data: SupportedZones = api
        .query(
            "supported_chains",
            "fetching supported chains",
            SUPPORTED_ZONES,
            json!({}),
        )
        .await
        .map_err(|e| e.context(RegistryError::RegistryUnavailable))?;

    let zones = data
        .flat_blockchains
        .ok_or(RegistryError::RegistryUnavailable)?;

    Ok(zones
        .into_iter()
        .map(|zone| ChainDescriptor {
            display_name: zone.name,
            external_id: zone.network_id,
            logo_url: zone.logo_url,
        })
        .collect())
}

/// Supported zones minus any whose id or lowercase name is excluded.
pub async fn list_supported_chains(
    api: IndexApi<'_>,
    excluded_chains: &[String],
) -> Result<Vec<ChainDescriptor>> {
    let chains = get_supported_chains(api).await?;
    let total = chains.len();

    let chains: Vec<_> = chains
        .into_iter()
        .filter(|chain| {
            [chain.external_id.clone(), chain.lowercase_name()]
                .iter()
                .all(|key| !excluded_chains.contains(key))
        })
        .collect();

    info!(
        "Fetched {} supported chains ({} excluded)",
        chains.len(),
        total - chains.len()
    );
    Ok(chains)
}

/// Builds the chain list and mapping for a registry-backed bridge network.
pub async fn resolve_bridge(
    api: IndexApi<'_>,
    network: &BridgeNetwork,
    excluded_chains: &[String],
) -> Result<ResolvedBridge> {
    let chains = list_supported_chains(api, excluded_chains).await?;
    Ok(ResolvedBridge::from_registry(network.clone(), &chains))
}

/// `None` means the chain is unknown to this run, which callers treat as a skip.
pub fn resolve_chain_id<'b>(
    bridge: &'b ResolvedBridge,
    display_name_or_id: &str,
) -> Result<Option<&'b str>, ChainError> {
    Ok(bridge.mapping()?.resolve(display_name_or_id))
}
