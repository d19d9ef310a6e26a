use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

use crate::models::datasets::transfers::CanonicalEvent;
use crate::storage::{EventSink, SinkBatch, WriteMode};

/// Keeps one JSON array per `(bridge, chain)` under `root`.
pub struct JsonFileSink {
    root: PathBuf,
    // Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path_for(&self, bridge_db_name: &str, chain_name: &str) -> PathBuf {
        let file_name = chain_name.replace(['/', '\\', ' '], "_");
        self.root
            .join(bridge_db_name)
            .join(format!("{file_name}.json"))
    }

    pub async fn read_events(&self, bridge_db_name: &str, chain_name: &str) -> Result<Vec<CanonicalEvent>> {
        read_events(&self.path_for(bridge_db_name, chain_name)).await
    }
}

async fn read_events(path: &Path) -> Result<Vec<CanonicalEvent>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn upsert(existing: Vec<CanonicalEvent>, incoming: Vec<CanonicalEvent>) -> Vec<CanonicalEvent> {
    let mut merged: BTreeMap<_, _> = existing
        .into_iter()
        .map(|event| (event.natural_key(), event))
        .collect();
    for event in incoming {
        merged.insert(event.natural_key(), event);
    }
    let mut events: Vec<_> = merged.into_values().collect();
    events.sort_by(|a, b| {
        (a.block_number, &a.tx_hash).cmp(&(b.block_number, &b.tx_hash))
    });
    events
}

#[async_trait]
impl EventSink for JsonFileSink {
    async fn write(&self, batch: SinkBatch) -> Result<usize> {
        let path = self.path_for(batch.bridge.bridge_db_name, &batch.chain_name);
        let written = batch.events.len();

        let _guard = self.lock.lock().await;
        let existing = read_events(&path).await?;
        let events = match batch.write_mode {
            WriteMode::Upsert => upsert(existing, batch.events),
            WriteMode::Append => existing.into_iter().chain(batch.events).collect(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(&events)?;
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!(
            "Wrote {} events ({} total) for {} blocks {}-{} to {} [{}]",
            written,
            events.len(),
            batch.chain_name,
            batch.start_block,
            batch.end_block,
            path.display(),
            batch.write_mode
        );
        Ok(written)
    }
}
