//! GraphQL documents for the zones index and the response shapes they decode into.

use serde::Deserialize;
use serde::de::{self, Deserializer};
use serde_json::Value;

use crate::models::datasets::transfers::RawTimestamp;

pub const SUPPORTED_ZONES: &str = r#"query SupportedZones {
  flat_blockchains {
    name
    network_id
    logo_url
  }
}"#;

pub const LATEST_BLOCK_FOR_ZONE: &str = r#"query LatestBlockForZone($blockchain: String!) {
  flat_defillama_txs_aggregate(where: { blockchain: { _eq: $blockchain } }) {
    aggregate {
      max {
        height
        timestamp
      }
    }
  }
}"#;

pub const FIRST_BLOCK: &str = r#"query FirstBlock($blockchain: String!, $timestamp: timestamp!) {
  flat_defillama_txs_aggregate(
    where: { blockchain: { _eq: $blockchain }, timestamp: { _gte: $timestamp } }
  ) {
    aggregate {
      min {
        height
      }
    }
  }
}"#;

pub const LAST_BLOCK: &str = r#"query LastBlock($blockchain: String!, $timestamp: timestamp!) {
  flat_defillama_txs_aggregate(
    where: { blockchain: { _eq: $blockchain }, timestamp: { _lte: $timestamp } }
  ) {
    aggregate {
      max {
        height
      }
    }
  }
}"#;

pub const TXS_BY_BLOCK: &str = r#"query TxsByBlock($blockchain: String!, $from: Int!, $to: Int!) {
  flat_defillama_txs(
    where: { blockchain: { _eq: $blockchain }, height: { _gte: $from, _lte: $to } }
  ) {
    source_address
    destination_address
    height
    timestamp
    tx_hash
    tx_type
    usd_value
    token {
      denom
      logo_url
      symbol
    }
  }
}"#;

#[derive(Debug, Deserialize)]
pub struct SupportedZones {
    #[serde(default)]
    pub flat_blockchains: Option<Vec<Zone>>,
}

#[derive(Debug, Deserialize)]
pub struct Zone {
    pub name: String,
    pub network_id: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TxsAggregate {
    pub flat_defillama_txs_aggregate: AggregateWrapper,
}

#[derive(Debug, Deserialize)]
pub struct AggregateWrapper {
    pub aggregate: Option<Aggregate>,
}

#[derive(Debug, Deserialize)]
pub struct Aggregate {
    #[serde(default)]
    pub min: Option<AggregateBlock>,
    #[serde(default)]
    pub max: Option<AggregateBlock>,
}

#[derive(Debug, Deserialize)]
pub struct AggregateBlock {
    #[serde(default, deserialize_with = "optional_height")]
    pub height: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
}

impl TxsAggregate {
    pub fn min(self) -> Option<AggregateBlock> {
        self.flat_defillama_txs_aggregate.aggregate.and_then(|a| a.min)
    }

    pub fn max(self) -> Option<AggregateBlock> {
        self.flat_defillama_txs_aggregate.aggregate.and_then(|a| a.max)
    }
}

/// Rows stay untyped here so one malformed row cannot fail the whole page.
#[derive(Debug, Deserialize)]
pub struct TxsByBlock {
    pub flat_defillama_txs: Option<Vec<Value>>,
}

fn optional_height<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("height out of range: {n}"))),
        Value::String(s) => s.trim().parse().map(Some).map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("unexpected height: {other}"))),
    }
}
