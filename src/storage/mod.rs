pub mod json;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::bridges::BridgeNetwork;
use crate::models::datasets::transfers::CanonicalEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Insert or replace by natural key. Re-running an overlapping range never duplicates.
    #[default]
    Upsert,
    /// Insert as-is.
    Append,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Upsert => write!(f, "upsert"),
            WriteMode::Append => write!(f, "append"),
        }
    }
}

/// Normalized events for one chain and block range, plus how to persist them.
#[derive(Debug, Clone)]
pub struct SinkBatch {
    pub start_block: u64,
    pub end_block: u64,
    pub bridge: BridgeNetwork,
    pub chain_name: String,
    pub is_historical_run: bool,
    pub is_allowed_chain: bool,
    pub write_mode: WriteMode,
    pub events: Vec<CanonicalEvent>,
}

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Persists `batch`, returning how many events were written.
    async fn write(&self, batch: SinkBatch) -> Result<usize>;
}
