use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

////////////////////////////////////// Raw Data ////////////////////////////////////////
// Shapes returned by the remote index. Nullable upstream fields are `Option`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawToken {
    pub denom: Option<String>,
    pub symbol: Option<String>,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    UnixSeconds(i64),
    Text(String),
}

impl std::fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawTimestamp::UnixSeconds(seconds) => write!(f, "{seconds}"),
            RawTimestamp::Text(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTransferRecord {
    pub source_address: String,
    pub destination_address: String,
    #[serde(deserialize_with = "height_from_any")]
    pub height: u64,
    pub timestamp: RawTimestamp,
    pub tx_hash: String,
    pub tx_type: String,
    #[serde(default, deserialize_with = "usd_from_any")]
    pub usd_value: Option<f64>,
    #[serde(default)]
    pub token: Option<RawToken>,
}

// Heights come back as JSON numbers or numeric strings depending on the column type.
fn height_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("height out of range: {n}"))),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("unexpected height: {other}"))),
    }
}

// Unpriced transfers carry null. Unparseable prices are treated the same way.
fn usd_from_any<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/////////////////////////////////// Transformed Data ///////////////////////////////////
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    pub block_number: u64,
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub token: Option<String>,
    pub amount: Option<f64>,
    pub is_deposit: bool,
    #[serde(rename = "isUSDVolume")]
    pub is_usd_volume: bool,
    pub txs_counted_as: u32,
    #[serde(rename = "timestamp")]
    pub timestamp_millis: i64,
}

impl CanonicalEvent {
    /// Identity used by the upsert sink. A single tx may carry several transfers,
    /// so the hash alone is not enough.
    pub fn natural_key(&self) -> (String, String, String, Option<String>) {
        (
            self.tx_hash.clone(),
            self.from.clone(),
            self.to.clone(),
            self.token.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_record_with_all_fields() {
        let record: RawTransferRecord = serde_json::from_value(json!({
            "source_address": "osmo1src",
            "destination_address": "cosmos1dst",
            "height": 13071870,
            "timestamp": "2024-01-08T05:06:42",
            "tx_hash": "ABCDEF",
            "tx_type": "Deposit",
            "usd_value": 12.5,
            "token": { "denom": "uatom", "symbol": "ATOM", "logo_url": null }
        }))
        .unwrap();

        assert_eq!(record.height, 13071870);
        assert_eq!(record.usd_value, Some(12.5));
        assert_eq!(record.timestamp, RawTimestamp::Text("2024-01-08T05:06:42".into()));
        assert_eq!(record.token.unwrap().symbol.as_deref(), Some("ATOM"));
    }

    #[test]
    fn decodes_record_with_missing_optionals() {
        let record: RawTransferRecord = serde_json::from_value(json!({
            "source_address": "a",
            "destination_address": "b",
            "height": "42",
            "timestamp": 1704690402,
            "tx_hash": "h",
            "tx_type": "Withdraw"
        }))
        .unwrap();

        assert_eq!(record.height, 42);
        assert_eq!(record.usd_value, None);
        assert_eq!(record.token, None);
        assert_eq!(record.timestamp, RawTimestamp::UnixSeconds(1704690402));
    }

    #[test]
    fn string_prices_are_parsed_and_garbage_is_dropped() {
        let base = json!({
            "source_address": "a",
            "destination_address": "b",
            "height": 1,
            "timestamp": "2024-01-08T05:06:42Z",
            "tx_hash": "h",
            "tx_type": "Transfer",
        });

        let mut priced = base.clone();
        priced["usd_value"] = json!("3.25");
        let record: RawTransferRecord = serde_json::from_value(priced).unwrap();
        assert_eq!(record.usd_value, Some(3.25));

        let mut garbage = base;
        garbage["usd_value"] = json!("n/a");
        let record: RawTransferRecord = serde_json::from_value(garbage).unwrap();
        assert_eq!(record.usd_value, None);
    }

    #[test]
    fn rejects_non_numeric_height() {
        let result = serde_json::from_value::<RawTransferRecord>(json!({
            "source_address": "a",
            "destination_address": "b",
            "height": "tip",
            "timestamp": "2024-01-08T05:06:42Z",
            "tx_hash": "h",
            "tx_type": "Transfer",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn canonical_event_uses_pipeline_field_names() {
        let event = CanonicalEvent {
            block_number: 7,
            tx_hash: "h".into(),
            from: "a".into(),
            to: "b".into(),
            token: None,
            amount: None,
            is_deposit: false,
            is_usd_volume: true,
            txs_counted_as: 1,
            timestamp_millis: 1_704_690_402_000,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["blockNumber"], json!(7));
        assert_eq!(value["isUSDVolume"], json!(true));
        assert_eq!(value["txsCountedAs"], json!(1));
        assert_eq!(value["timestamp"], json!(1_704_690_402_000i64));
        assert_eq!(value["token"], Value::Null);
    }
}
