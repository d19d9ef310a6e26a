pub mod retry;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use config::{Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::common::Config;
use crate::models::datasets::transfers::RawTimestamp;

pub const CONFIG_ENV_PREFIX: &str = "BACKFILL";

/// Loads `file_name` if it exists, then applies `BACKFILL__*` environment overrides.
/// `BACKFILL__CONFIG` replaces the file path.
pub fn load_config<P: AsRef<Path>>(file_name: P) -> Result<Config> {
    let config_path = std::env::var(format!("{CONFIG_ENV_PREFIX}__CONFIG"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| file_name.as_ref().to_path_buf());
    info!("Config path: {}", config_path.to_string_lossy());

    let config = config::Config::builder()
        .add_source(
            File::from(config_path.as_path())
                .format(FileFormat::Yaml)
                .required(false),
        )
        .add_source(
            Environment::with_prefix(CONFIG_ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("excluded_chains")
                .try_parsing(true),
        )
        .build()
        .context("failed to build config")?
        .try_deserialize::<Config>()
        .context("failed to parse config")?;

    Ok(config)
}

/// Unix seconds -> the ISO-8601 instant the index filters on.
pub fn unix_to_iso(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0)
        .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Index timestamps -> unix seconds.
/// Zone-less text timestamps are UTC.
pub fn timestamp_to_unix(raw: &RawTimestamp) -> Option<i64> {
    match raw {
        RawTimestamp::UnixSeconds(seconds) => Some(*seconds),
        RawTimestamp::Text(text) => parse_text_timestamp(text).map(|time| time.timestamp()),
    }
}

pub fn timestamp_to_millis(raw: &RawTimestamp) -> Option<i64> {
    timestamp_to_unix(raw).and_then(|seconds| seconds.checked_mul(1000))
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

pub(crate) fn strip_html(error: &str) -> String {
    // Gateways in front of the index answer outages with an HTML page
    if error.contains("<!doctype html>") || error.contains("<html>") {
        error
            .lines()
            .map(|line| line.trim())
            .find(|line| {
                !line.starts_with('<')
                    && !line.ends_with('>')
                    && !line.is_empty()
                    && *line != "html"
                    && *line != "body"
            })
            .unwrap_or(error)
            .to_string()
    } else {
        error.to_string()
    }
}
