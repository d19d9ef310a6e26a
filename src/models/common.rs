use serde::{Deserialize, Serialize};

use crate::models::errors::ConfigError;
use crate::utils::retry::RetryConfig;

pub const DEFAULT_GRAPHQL_URL: &str = "https://api2.mapofzones.com/v1/graphql";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0".to_string(),
            port: 9100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graphql_url: String,
    pub excluded_chains: Vec<String>,
    pub batch_size: usize,
    pub stagger_ms: u64,
    pub retry: RetryConfig,
    pub range_result_cap: Option<usize>,
    pub output_dir: String,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            excluded_chains: Vec::new(),
            batch_size: 20,
            stagger_ms: 500,
            retry: RetryConfig::default(),
            range_result_cap: None,
            output_dir: "output".to_string(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Positional run parameters as they arrive from the command line, before validation.
#[derive(Debug, Clone, Default)]
pub struct RunParameters {
    pub start_timestamp: Option<String>,
    pub end_timestamp: Option<String>,
    pub bridge_id: Option<String>,
    pub restrict_to_chain: Option<String>,
}

impl RunParameters {
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        // Blank arguments keep their position and count as absent
        let mut args = args
            .into_iter()
            .map(|arg| Some(arg).filter(|arg| !arg.trim().is_empty()));
        let mut next = || args.next().flatten();
        Self {
            start_timestamp: next(),
            end_timestamp: next(),
            bridge_id: next(),
            restrict_to_chain: next(),
        }
    }

    pub fn validate(self) -> Result<BackfillRequest, ConfigError> {
        let start_timestamp = parse_timestamp("startTimestamp", self.start_timestamp)?;
        let end_timestamp = parse_timestamp("endTimestamp", self.end_timestamp)?;
        let bridge_id = self
            .bridge_id
            .ok_or(ConfigError::MissingParameter { name: "bridgeDbName" })?;

        if start_timestamp > end_timestamp {
            return Err(ConfigError::InvertedWindow {
                start: start_timestamp,
                end: end_timestamp,
            });
        }

        Ok(BackfillRequest {
            start_timestamp,
            end_timestamp,
            bridge_id,
            restrict_to_chain: self.restrict_to_chain,
        })
    }
}

// Zero counts as missing, same as an absent argument.
fn parse_timestamp(name: &'static str, raw: Option<String>) -> Result<i64, ConfigError> {
    let raw = raw.ok_or(ConfigError::MissingParameter { name })?;
    match raw.trim().parse::<i64>() {
        Ok(0) => Err(ConfigError::MissingParameter { name }),
        Ok(ts) if ts > 0 => Ok(ts),
        _ => Err(ConfigError::InvalidTimestamp { name, value: raw }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillRequest {
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub bridge_id: String,
    pub restrict_to_chain: Option<String>,
}

impl BackfillRequest {
    /// Rejects requests that would have failed [`RunParameters::validate`].
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.start_timestamp <= 0 {
            return Err(ConfigError::MissingParameter { name: "startTimestamp" });
        }
        if self.end_timestamp <= 0 {
            return Err(ConfigError::MissingParameter { name: "endTimestamp" });
        }
        if self.bridge_id.trim().is_empty() {
            return Err(ConfigError::MissingParameter { name: "bridgeDbName" });
        }
        if self.start_timestamp > self.end_timestamp {
            return Err(ConfigError::InvertedWindow {
                start: self.start_timestamp,
                end: self.end_timestamp,
            });
        }
        Ok(())
    }
}
