use anyhow::{Result, anyhow};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{self, EnvFilter};

use bridge_backfill::indexer::backfill::{Backfill, BackfillSettings};
use bridge_backfill::indexer::rpc::IndexApi;
use bridge_backfill::indexer::rpc::graphql::GraphqlClient;
use bridge_backfill::metrics::Metrics;
use bridge_backfill::models::common::RunParameters;
use bridge_backfill::storage::json::JsonFileSink;
use bridge_backfill::utils::load_config;

const USAGE: &str = "usage: bridge-backfill <startTimestamp> <endTimestamp> <bridgeDbName> [chain]\n\
                     example: bridge-backfill 1704690402 1704949602 ibc";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    println!();
    info!("=========================== INITIALIZING ===========================");

    // Load config
    let config = match load_config("config.yml") {
        Ok(config) => {
            info!("Config loaded successfully");
            config
        }
        Err(e) => {
            error!("Failed to load config: {:#}", e);
            return Err(anyhow!(e));
        }
    };

    // Parse and validate run parameters before touching the network
    let request = match RunParameters::from_args(std::env::args().skip(1)).validate() {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    // Initialize optional metrics
    let metrics = if config.metrics.enabled {
        Some(Metrics::new(request.bridge_id.clone())?)
    } else {
        info!("Metrics are disabled");
        None
    };

    if let Some(metrics_instance) = &metrics {
        metrics_instance
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
    }

    let client = GraphqlClient::new(&config.graphql_url)?;
    info!("GraphQL endpoint: {}", client.endpoint());

    let sink = JsonFileSink::new(&config.output_dir);
    let api = IndexApi::new(&client, &config.retry).with_metrics(metrics.as_ref());
    let backfill = Backfill::new(api, &sink, BackfillSettings::from(&config));

    println!();
    info!("========================= STARTING BACKFILL ========================");

    let summary = tokio::select! {
        summary = backfill.run(&request) => summary?,
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C signal, stopping backfill");
            return Ok(());
        }
    };

    if summary.failed() > 0 {
        error!(
            "{} of {} chains failed; re-run with the chain name to retry one",
            summary.failed(),
            summary.reports.len()
        );
    }

    Ok(())
}
