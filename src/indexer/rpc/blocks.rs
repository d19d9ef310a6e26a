use anyhow::{Result, anyhow};
use serde_json::json;

use crate::indexer::rpc::IndexApi;
use crate::indexer::rpc::chains::resolve_chain_id;
use crate::indexer::rpc::queries::{FIRST_BLOCK, LAST_BLOCK, LATEST_BLOCK_FOR_ZONE, TxsAggregate};
use crate::models::bridges::ResolvedBridge;
use crate::models::datasets::blocks::{BlockReference, Boundary};
use crate::models::errors::{BlockError, ChainError};
use crate::utils::{timestamp_to_unix, unix_to_iso};

/// Block nearest `timestamp` on `chain_id`.
///
/// `First` is the lowest height at or after the timestamp, `Last` the highest at or
/// before it. `None` means the index has no activity on that side of the timestamp.
pub async fn resolve_boundary_block(
    api: IndexApi<'_>,
    chain_id: &str,
    timestamp: i64,
    boundary: Boundary,
) -> Result<Option<BlockReference>> {
    let instant =
        unix_to_iso(timestamp).ok_or_else(|| anyhow!("timestamp {timestamp} is out of range"))?;
    let variables = json!({
        "blockchain": chain_id,
        "timestamp": instant,
    });
    let context = format!("{chain_id} at {boundary} block from {timestamp}");

    let block = match boundary {
        Boundary::First => api
            .query::<TxsAggregate>("first_block", &context, FIRST_BLOCK, variables)
            .await?
            .min(),
        Boundary::Last => api
            .query::<TxsAggregate>("last_block", &context, LAST_BLOCK, variables)
            .await?
            .max(),
    };

    Ok(block.and_then(|b| b.height).map(BlockReference::at))
}

/// Most recent block the index knows for `chain_id`, with its timestamp.
pub async fn resolve_latest_block(
    api: IndexApi<'_>,
    chain_id: &str,
) -> Result<Option<BlockReference>> {
    let context = format!("latest block for {chain_id}");
    let block = api
        .query::<TxsAggregate>(
            "latest_block",
            &context,
            LATEST_BLOCK_FOR_ZONE,
            json!({ "blockchain": chain_id }),
        )
        .await?
        .max();

    Ok(block.and_then(|b| {
        b.height.map(|height| BlockReference {
            height,
            timestamp_unix_seconds: b.timestamp.as_ref().and_then(timestamp_to_unix),
        })
    }))
}

pub async fn latest_block_or_err(api: IndexApi<'_>, chain_id: &str) -> Result<BlockReference> {
    resolve_latest_block(api, chain_id).await?.ok_or_else(|| {
        BlockError::LatestBlockNotFound {
            chain_id: chain_id.to_string(),
        }
        .into()
    })
}

pub async fn latest_block_height(api: IndexApi<'_>, chain_id: &str) -> Result<u64> {
    Ok(latest_block_or_err(api, chain_id).await?.height)
}

/// Same as [`resolve_boundary_block`], addressed by display name through the bridge mapping.
pub async fn block_for_chain_name(
    api: IndexApi<'_>,
    bridge: &ResolvedBridge,
    chain_name: &str,
    timestamp: i64,
    boundary: Boundary,
) -> Result<Option<BlockReference>> {
    let chain_id = resolve_chain_id(bridge, chain_name)?.ok_or_else(|| ChainError::Unresolvable {
        chain: chain_name.to_string(),
    })?;
    resolve_boundary_block(api, chain_id, timestamp, boundary).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::rpc::testing::{ScriptedClient, fast_retry};
    use crate::models::bridges::find_bridge;
    use crate::models::datasets::chains::ChainDescriptor;

    fn aggregate(side: &str, height: serde_json::Value) -> serde_json::Value {
        json!({ "flat_defillama_txs_aggregate": { "aggregate": { side: { "height": height } } } })
    }

    #[tokio::test]
    async fn first_boundary_uses_min_after_timestamp() {
        let client = ScriptedClient::new(vec![Ok(aggregate("min", json!(13071870)))]);
        let retry = fast_retry();

        let block = resolve_boundary_block(
            IndexApi::new(&client, &retry),
            "osmosis-1",
            1704690402,
            Boundary::First,
        )
        .await
        .unwrap();

        assert_eq!(block, Some(BlockReference::at(13071870)));
        assert!(client.document(0).contains("_gte"));
        assert_eq!(
            client.variables(0),
            json!({ "blockchain": "osmosis-1", "timestamp": "2024-01-08T05:06:42.000Z" })
        );
    }

    #[tokio::test]
    async fn last_boundary_uses_max_before_timestamp() {
        let client = ScriptedClient::new(vec![Ok(aggregate("max", json!("13110002")))]);
        let retry = fast_retry();

        let block = resolve_boundary_block(
            IndexApi::new(&client, &retry),
            "osmosis-1",
            1704949602,
            Boundary::Last,
        )
        .await
        .unwrap();

        assert_eq!(block, Some(BlockReference::at(13110002)));
        assert!(client.document(0).contains("_lte"));
    }

    #[tokio::test]
    async fn empty_window_is_absent_not_an_error() {
        let client = ScriptedClient::new(vec![Ok(aggregate("min", serde_json::Value::Null))]);
        let retry = fast_retry();

        let block = resolve_boundary_block(
            IndexApi::new(&client, &retry),
            "juno-1",
            1704690402,
            Boundary::First,
        )
        .await
        .unwrap();

        assert_eq!(block, None);
    }

    #[tokio::test]
    async fn latest_block_carries_its_timestamp() {
        let client = ScriptedClient::new(vec![Ok(json!({
            "flat_defillama_txs_aggregate": {
                "aggregate": { "max": { "height": 15000000, "timestamp": "2024-01-08T05:06:42" } }
            }
        }))]);
        let retry = fast_retry();

        let block = resolve_latest_block(IndexApi::new(&client, &retry), "osmosis-1")
            .await
            .unwrap();

        assert_eq!(
            block,
            Some(BlockReference {
                height: 15000000,
                timestamp_unix_seconds: Some(1704690402),
            })
        );
        assert_eq!(client.variables(0), json!({ "blockchain": "osmosis-1" }));
    }

    #[tokio::test]
    async fn missing_latest_block_is_an_error_for_strict_callers() {
        let client = ScriptedClient::new(vec![
            Ok(json!({ "flat_defillama_txs_aggregate": { "aggregate": null } })),
            Ok(json!({ "flat_defillama_txs_aggregate": { "aggregate": { "max": { "height": 7 } } } })),
        ]);
        let retry = fast_retry();
        let api = IndexApi::new(&client, &retry);

        let err = latest_block_or_err(api, "juno-1").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BlockError>(),
            Some(&BlockError::LatestBlockNotFound {
                chain_id: "juno-1".into()
            })
        );
        assert_eq!(latest_block_height(api, "juno-1").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn chain_names_resolve_through_the_mapping() {
        let client = ScriptedClient::new(vec![Ok(aggregate("max", json!(99)))]);
        let retry = fast_retry();
        let network = find_bridge("ibc").unwrap().clone();
        let bridge = ResolvedBridge::from_registry(
            network,
            &[ChainDescriptor {
                display_name: "Osmosis".into(),
                external_id: "osmosis-1".into(),
                logo_url: None,
            }],
        );
        let api = IndexApi::new(&client, &retry);

        let block = block_for_chain_name(api, &bridge, "osmosis", 1704949602, Boundary::Last)
            .await
            .unwrap();
        assert_eq!(block, Some(BlockReference::at(99)));
        assert_eq!(client.variables(0)["blockchain"], json!("osmosis-1"));

        let err = block_for_chain_name(api, &bridge, "terra", 1704949602, Boundary::Last)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChainError>(),
            Some(&ChainError::Unresolvable {
                chain: "terra".into()
            })
        );
        assert_eq!(client.request_count(), 1);
    }
}
