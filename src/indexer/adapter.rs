use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::indexer::rpc::IndexApi;
use crate::indexer::rpc::transfers::fetch_range;
use crate::indexer::transformations::transfers::TransferTransformer;
use crate::models::bridges::ResolvedBridge;
use crate::models::datasets::transfers::{CanonicalEvent, RawTransferRecord};
use crate::models::errors::ChainError;

/// Volume source for a single zone: fetches a block range and normalizes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneVolumeAdapter {
    pub chain_id: String,
    /// Upstream row limit, if known. A response of exactly this size may be truncated.
    pub result_cap: Option<usize>,
}

impl ZoneVolumeAdapter {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            result_cap: None,
        }
    }

    pub fn with_result_cap(mut self, result_cap: Option<usize>) -> Self {
        self.result_cap = result_cap;
        self
    }

    pub async fn fetch(
        &self,
        api: IndexApi<'_>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawTransferRecord>> {
        let records = fetch_range(api, &self.chain_id, from_block, to_block).await?;
        debug!(
            "Fetched {} transfers for {} from block {} to {}",
            records.len(),
            self.chain_id,
            from_block,
            to_block
        );

        // TODO: paginate by height once the index exposes its row limit
        if self.result_cap.is_some_and(|cap| records.len() >= cap) {
            warn!(
                "{} transfers for {} from block {} to {} hit the result cap; the range may be truncated",
                records.len(),
                self.chain_id,
                from_block,
                to_block
            );
        }
        Ok(records)
    }

    pub fn normalize(&self, records: Vec<RawTransferRecord>) -> Vec<CanonicalEvent> {
        RawTransferRecord::transform_transfers(records)
    }

    pub async fn events(
        &self,
        api: IndexApi<'_>,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<CanonicalEvent>> {
        let records = self.fetch(api, from_block, to_block).await?;
        Ok(self.normalize(records))
    }
}

/// One adapter per resolvable chain of `bridge`, keyed by lowercase chain name.
/// Chains the mapping cannot resolve are left out.
pub fn chain_adapters(
    bridge: &ResolvedBridge,
    result_cap: Option<usize>,
) -> Result<BTreeMap<String, ZoneVolumeAdapter>, ChainError> {
    let mapping = bridge.mapping()?;
    Ok(bridge
        .chains
        .iter()
        .filter_map(|chain| {
            mapping.resolve(chain).map(|chain_id| {
                (
                    chain.to_lowercase(),
                    ZoneVolumeAdapter::new(chain_id).with_result_cap(result_cap),
                )
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::rpc::testing::{ScriptedClient, fast_retry};
    use crate::models::bridges::find_bridge;
    use crate::models::datasets::chains::ChainDescriptor;
    use serde_json::json;

    fn bridge() -> ResolvedBridge {
        let zones = [("Osmosis", "osmosis-1"), ("Juno", "juno-1")].map(|(name, id)| {
            ChainDescriptor {
                display_name: name.into(),
                external_id: id.into(),
                logo_url: None,
            }
        });
        let mut bridge = ResolvedBridge::from_registry(find_bridge("ibc").unwrap().clone(), &zones);
        bridge.chains.push("terra".into());
        bridge
    }

    #[test]
    fn builds_adapters_for_resolvable_chains() {
        let adapters = chain_adapters(&bridge(), Some(100)).unwrap();
        assert_eq!(adapters.len(), 2);
        assert_eq!(adapters["osmosis"].chain_id, "osmosis-1");
        assert_eq!(adapters["juno"].result_cap, Some(100));
        assert!(!adapters.contains_key("terra"));
    }

    #[test]
    fn adapters_need_a_mapping() {
        let unmapped = ResolvedBridge::unmapped(find_bridge("ibc").unwrap().clone(), vec![]);
        assert!(matches!(
            chain_adapters(&unmapped, None),
            Err(ChainError::MissingMapping { .. })
        ));
    }

    #[tokio::test]
    async fn events_are_fetched_and_normalized() {
        let client = ScriptedClient::new(vec![Ok(json!({
            "flat_defillama_txs": [
                {
                    "source_address": "osmo1a",
                    "destination_address": "cosmos1b",
                    "height": 100,
                    "timestamp": "2024-01-08T05:06:42",
                    "tx_hash": "AA",
                    "tx_type": "Deposit",
                    "usd_value": 10.0,
                    "token": { "denom": "uosmo", "symbol": "OSMO", "logo_url": null }
                },
                {
                    "source_address": "osmo1c",
                    "destination_address": "juno1d",
                    "height": 101,
                    "timestamp": "2024-01-08T05:07:00",
                    "tx_hash": "BB",
                    "tx_type": "Withdraw",
                    "usd_value": null,
                    "token": { "denom": "ibc/27394FB092D2ECCD", "symbol": null, "logo_url": null }
                }
            ]
        }))]);
        let retry = fast_retry();

        let events = ZoneVolumeAdapter::new("osmosis-1")
            .events(IndexApi::new(&client, &retry), 100, 101)
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].from, "cosmos1b");
        assert_eq!(events[0].token.as_deref(), Some("OSMO"));
        assert_eq!(events[1].from, "osmo1c");
        assert_eq!(events[1].token.as_deref(), Some("ibc/27394FB092D2ECCD"));
        assert_eq!(events[1].amount, None);
    }
}
