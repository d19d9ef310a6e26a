use anyhow::{Context, Result};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::indexer::adapter::{ZoneVolumeAdapter, chain_adapters};
use crate::indexer::rpc::IndexApi;
use crate::indexer::rpc::blocks::resolve_boundary_block;
use crate::indexer::rpc::chains::resolve_bridge;
use crate::models::bridges::{BridgeNetwork, ChainSet, ResolvedBridge, find_bridge};
use crate::models::common::{BackfillRequest, Config};
use crate::models::datasets::blocks::Boundary;
use crate::storage::{EventSink, SinkBatch, WriteMode};

#[derive(Debug, Clone)]
pub struct BackfillSettings {
    /// Chains processed concurrently; batches run one after another.
    pub batch_size: usize,
    /// Delay per position inside a batch, so a batch does not hit the index all at once.
    pub stagger: Duration,
    pub excluded_chains: Vec<String>,
    pub range_result_cap: Option<usize>,
    pub write_mode: WriteMode,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for BackfillSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            stagger: Duration::from_millis(config.stagger_ms),
            excluded_chains: config.excluded_chains.clone(),
            range_result_cap: config.range_result_cap,
            write_mode: WriteMode::Upsert,
        }
    }
}

/// Non-terminal stages of a chain's backfill, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStage {
    Pending,
    ResolvingStart,
    ResolvingEnd,
    Fetching,
    Normalizing,
    Sinking,
}

impl fmt::Display for ChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            ChainStage::Pending => "pending",
            ChainStage::ResolvingStart => "resolving start block",
            ChainStage::ResolvingEnd => "resolving end block",
            ChainStage::Fetching => "fetching transfers",
            ChainStage::Normalizing => "normalizing transfers",
            ChainStage::Sinking => "writing events",
        };
        write!(f, "{stage}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotRequested,
    DestinationChain,
    Unresolvable,
    NoStartBlock,
    NoEndBlock,
    /// Start block resolved above the end block: nothing happened inside the window.
    EmptyWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOutcome {
    Done { events: usize },
    Skipped(SkipReason),
    Failed { stage: ChainStage, error: String },
}

impl ChainOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ChainOutcome::Done { .. } => "done",
            ChainOutcome::Skipped(_) => "skipped",
            ChainOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub chain: String,
    pub batch: usize,
    pub outcome: ChainOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct BackfillSummary {
    pub batches: usize,
    pub reports: Vec<ChainReport>,
}

impl BackfillSummary {
    fn count(&self, label: &str) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.label() == label)
            .count()
    }

    pub fn done(&self) -> usize {
        self.count("done")
    }

    pub fn skipped(&self) -> usize {
        self.count("skipped")
    }

    pub fn failed(&self) -> usize {
        self.count("failed")
    }

    pub fn events(&self) -> usize {
        self.reports
            .iter()
            .map(|report| match report.outcome {
                ChainOutcome::Done { events } => events,
                _ => 0,
            })
            .sum()
    }

    pub fn outcome(&self, chain: &str) -> Option<&ChainOutcome> {
        self.reports
            .iter()
            .find(|report| report.chain == chain)
            .map(|report| &report.outcome)
    }
}

pub fn chain_batches<T>(chains: &[T], batch_size: usize) -> Vec<&[T]> {
    chains.chunks(batch_size.max(1)).collect()
}

/// Per-run values shared by every chain task.
struct RunContext<'r> {
    request: &'r BackfillRequest,
    bridge: &'r ResolvedBridge,
    adapters: &'r BTreeMap<String, ZoneVolumeAdapter>,
    restrict_to: Option<&'r str>,
}

pub struct Backfill<'a> {
    api: IndexApi<'a>,
    sink: &'a dyn EventSink,
    settings: BackfillSettings,
}

impl<'a> Backfill<'a> {
    pub fn new(api: IndexApi<'a>, sink: &'a dyn EventSink, settings: BackfillSettings) -> Self {
        Self {
            api,
            sink,
            settings,
        }
    }

    /// Backfills every chain of `request.bridge_id` over the request window.
    ///
    /// Configuration problems abort before any remote call. Once chains are resolved,
    /// a chain that fails is logged and reported in the summary; it never stops the others.
    pub async fn run(&self, request: &BackfillRequest) -> Result<BackfillSummary> {
        let network = find_bridge(&request.bridge_id)?;
        self.run_for(network, request).await
    }

    pub async fn run_for(
        &self,
        network: &BridgeNetwork,
        request: &BackfillRequest,
    ) -> Result<BackfillSummary> {
        request.check()?;
        let bridge_name = network.bridge_db_name;

        let bridge = self
            .resolve(network)
            .await
            .with_context(|| format!("failed to resolve chains for {bridge_name}"))?;
        let adapters = chain_adapters(&bridge, self.settings.range_result_cap)?;

        let restrict_to = match &request.restrict_to_chain {
            Some(chain) => match bridge.mapping()?.resolve(chain) {
                Some(chain_id) => Some(chain_id.to_string()),
                None => {
                    warn!("Chain {} is not part of {}; nothing to backfill", chain, bridge_name);
                    Some(chain.clone())
                }
            },
            None => None,
        };

        let run = RunContext {
            request,
            bridge: &bridge,
            adapters: &adapters,
            restrict_to: restrict_to.as_deref(),
        };

        let batches = chain_batches(&bridge.chains, self.settings.batch_size);
        info!(
            "Backfilling {} chains of {} from {} to {} in {} batches",
            bridge.chains.len(),
            bridge_name,
            request.start_timestamp,
            request.end_timestamp,
            batches.len()
        );

        let mut summary = BackfillSummary {
            batches: batches.len(),
            reports: Vec::with_capacity(bridge.chains.len()),
        };

        for (index, batch) in batches.iter().enumerate() {
            debug!("Starting batch {}/{} ({} chains)", index + 1, batches.len(), batch.len());
            let tasks = batch
                .iter()
                .enumerate()
                .map(|(position, chain)| self.process_chain(&run, chain, position, index));
            summary.reports.extend(join_all(tasks).await);
        }

        info!(
            "Finished running adapter from {} to {} for {}: {} done, {} skipped, {} failed, {} events",
            request.start_timestamp,
            request.end_timestamp,
            bridge_name,
            summary.done(),
            summary.skipped(),
            summary.failed(),
            summary.events()
        );

        Ok(summary)
    }

    /// Chain list and mapping for `network`, built once per run.
    pub async fn resolve(&self, network: &BridgeNetwork) -> Result<ResolvedBridge> {
        match network.chains {
            ChainSet::Static(chains) => Ok(ResolvedBridge::from_static(network.clone(), chains)),
            ChainSet::Registry => {
                resolve_bridge(self.api, network, &self.settings.excluded_chains).await
            }
        }
    }

    async fn process_chain(
        &self,
        run: &RunContext<'_>,
        chain: &str,
        position: usize,
        batch: usize,
    ) -> ChainReport {
        let outcome = self.chain_outcome(run, chain, position).await;
        if let Some(metrics) = self.api.metrics {
            metrics.record_chain(outcome.label());
        }
        ChainReport {
            chain: chain.to_string(),
            batch,
            outcome,
        }
    }

    async fn chain_outcome(&self, run: &RunContext<'_>, chain: &str, position: usize) -> ChainOutcome {
        let bridge_name = run.bridge.network.bridge_db_name;

        let Some(adapter) = run.adapters.get(chain) else {
            warn!("Could not find chain id for {} on {}", chain, bridge_name);
            return ChainOutcome::Skipped(SkipReason::Unresolvable);
        };
        if run.restrict_to.is_some_and(|only| only != adapter.chain_id) {
            return ChainOutcome::Skipped(SkipReason::NotRequested);
        }
        if run.bridge.is_destination(&adapter.chain_id) {
            debug!("Skipping destination chain {} on {}", chain, bridge_name);
            return ChainOutcome::Skipped(SkipReason::DestinationChain);
        }

        sleep(self.settings.stagger * position as u32).await;

        let mut stage = ChainStage::Pending;
        match self.backfill_chain(run, chain, adapter, &mut stage).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "Failed to backfill {} on {} while {}: {:#}",
                    chain, bridge_name, stage, e
                );
                ChainOutcome::Failed {
                    stage,
                    error: format!("{e:#}"),
                }
            }
        }
    }

    async fn backfill_chain(
        &self,
        run: &RunContext<'_>,
        chain: &str,
        adapter: &ZoneVolumeAdapter,
        stage: &mut ChainStage,
    ) -> Result<ChainOutcome> {
        let bridge_name = run.bridge.network.bridge_db_name;
        let chain_id = adapter.chain_id.as_str();

        *stage = ChainStage::ResolvingStart;
        let start = resolve_boundary_block(
            self.api,
            chain_id,
            run.request.start_timestamp,
            Boundary::First,
        )
        .await?;
        let Some(start) = start else {
            error!("Could not find start block for {} on {}", chain, bridge_name);
            return Ok(ChainOutcome::Skipped(SkipReason::NoStartBlock));
        };

        *stage = ChainStage::ResolvingEnd;
        let end =
            resolve_boundary_block(self.api, chain_id, run.request.end_timestamp, Boundary::Last)
                .await?;
        let Some(end) = end else {
            error!("Could not find end block for {} on {}", chain, bridge_name);
            return Ok(ChainOutcome::Skipped(SkipReason::NoEndBlock));
        };

        if start.height > end.height {
            warn!(
                "No activity for {} on {} inside the window (start block {} > end block {})",
                chain, bridge_name, start.height, end.height
            );
            return Ok(ChainOutcome::Skipped(SkipReason::EmptyWindow));
        }

        *stage = ChainStage::Fetching;
        let records = adapter.fetch(self.api, start.height, end.height).await?;

        *stage = ChainStage::Normalizing;
        let events = adapter.normalize(records);

        *stage = ChainStage::Sinking;
        let written = self
            .sink
            .write(SinkBatch {
                start_block: start.height,
                end_block: end.height,
                bridge: run.bridge.network.clone(),
                chain_name: chain.to_lowercase(),
                is_historical_run: true,
                is_allowed_chain: false,
                write_mode: self.settings.write_mode,
                events,
            })
            .await?;

        if let Some(metrics) = self.api.metrics {
            metrics.record_events(chain, written);
        }
        info!(
            "Backfilled {} events for {} on {} (blocks {}-{})",
            written, chain, bridge_name, start.height, end.height
        );
        Ok(ChainOutcome::Done { events: written })
    }
}
