use anyhow::Result;
use serde_json::{Value, json};
use tracing::warn;

use crate::indexer::rpc::IndexApi;
use crate::indexer::rpc::queries::{TXS_BY_BLOCK, TxsByBlock};
use crate::models::datasets::transfers::RawTransferRecord;
use crate::models::errors::RangeError;

/// Raw transfers on `chain_id` with `from_block <= height <= to_block`, in one query.
/// A zero-width range is a single block; an inverted one is rejected before querying.
/// Rows that do not decode are logged and dropped; the rest of the page is kept.
pub async fn fetch_range(
    api: IndexApi<'_>,
    chain_id: &str,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<RawTransferRecord>> {
    if from_block > to_block {
        return Err(RangeError::InvertedRange {
            from: from_block,
            to: to_block,
        }
        .into());
    }

    let context = format!("{chain_id} from block {from_block} to {to_block}");
    let data: TxsByBlock = api
        .query(
            "range",
            &context,
            TXS_BY_BLOCK,
            json!({
                "blockchain": chain_id,
                "from": from_block,
                "to": to_block,
            }),
        )
        .await?;

    Ok(decode_rows(chain_id, data.flat_defillama_txs.unwrap_or_default()))
}

fn decode_rows(chain_id: &str, rows: Vec<Value>) -> Vec<RawTransferRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let tx_hash = row["tx_hash"].as_str().unwrap_or("<unknown>").to_string();
            match serde_json::from_value::<RawTransferRecord>(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Dropping malformed transfer {} on {}: {}", tx_hash, chain_id, e);
                    None
                }
            }
        })
        .collect()
}
