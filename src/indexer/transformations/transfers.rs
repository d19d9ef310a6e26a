use tracing::warn;

use crate::models::datasets::transfers::{CanonicalEvent, RawTransferRecord};
use crate::models::errors::TransferError;
use crate::utils::timestamp_to_millis;

const DEPOSIT_TX_TYPE: &str = "Deposit";

pub trait TransferTransformer {
    fn normalize(&self) -> Result<CanonicalEvent, TransferError>;

    /// Normalizes a batch, logging and dropping records whose timestamp is unusable.
    fn transform_transfers(records: Vec<Self>) -> Vec<CanonicalEvent>
    where
        Self: Sized;
}

impl TransferTransformer for RawTransferRecord {
    fn normalize(&self) -> Result<CanonicalEvent, TransferError> {
        let is_deposit = self.tx_type == DEPOSIT_TX_TYPE;

        // Deposits flow into the bridge, so the ledger's source is the economic receiver
        let (from, to) = if is_deposit {
            (&self.destination_address, &self.source_address)
        } else {
            (&self.source_address, &self.destination_address)
        };

        let timestamp_millis =
            timestamp_to_millis(&self.timestamp).ok_or_else(|| TransferError::InvalidTimestamp {
                tx_hash: self.tx_hash.clone(),
                value: self.timestamp.to_string(),
            })?;

        let token = self.token.as_ref().and_then(|token| {
            token
                .symbol
                .clone()
                .filter(|symbol| !symbol.is_empty())
                .or_else(|| token.denom.clone().filter(|denom| !denom.is_empty()))
        });

        Ok(CanonicalEvent {
            block_number: self.height,
            tx_hash: self.tx_hash.clone(),
            from: from.clone(),
            to: to.clone(),
            token,
            amount: self.usd_value,
            is_deposit,
            is_usd_volume: true,
            txs_counted_as: 1,
            timestamp_millis,
        })
    }

    fn transform_transfers(records: Vec<Self>) -> Vec<CanonicalEvent> {
        records
            .iter()
            .filter_map(|record| match record.normalize() {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Dropping transfer: {}", e);
                    None
                }
            })
            .collect()
    }
}
