use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use axum::{routing::get, Router};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
use opentelemetry_sdk::metrics::{MetricError, SdkMeterProvider};
use prometheus::{Encoder, TextEncoder};

pub struct Metrics {
    registry: Arc<prometheus::Registry>,
    _provider: SdkMeterProvider,
    pub bridge_name: String,

    // Remote index queries
    pub queries: Counter<u64>,
    pub query_errors: Counter<u64>,
    pub query_retries: Counter<u64>,
    pub query_latency: Histogram<f64>,

    // Backfill progress
    pub chains: Counter<u64>,
    pub events_written: Counter<u64>,
}

impl Metrics {
    pub fn new(bridge_name: String) -> Result<Self, MetricError> {
        let registry = prometheus::Registry::new();

        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("backfill_metrics");

        let queries = meter
            .u64_counter("backfill_queries")
            .with_description("Number of queries sent to the remote index")
            .build();

        let query_errors = meter
            .u64_counter("backfill_query_errors")
            .with_description("Number of failed query attempts")
            .build();

        let query_retries = meter
            .u64_counter("backfill_query_retries")
            .with_description("Number of query retries")
            .build();

        let query_latency = meter
            .f64_histogram("backfill_query_latency")
            .with_description("Remote index query latency")
            .with_boundaries(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])
            .with_unit("s")
            .build();

        let chains = meter
            .u64_counter("backfill_chains")
            .with_description("Chains finished, by outcome")
            .build();

        let events_written = meter
            .u64_counter("backfill_events_written")
            .with_description("Normalized events handed to the sink")
            .build();

        Ok(Self {
            registry: Arc::new(registry),
            _provider: provider,
            bridge_name,
            queries,
            query_errors,
            query_retries,
            query_latency,
            chains,
            events_written,
        })
    }

    fn labels(&self, key: &'static str, value: &str) -> [KeyValue; 2] {
        [
            KeyValue::new("bridge", self.bridge_name.clone()),
            KeyValue::new(key, value.to_string()),
        ]
    }

    pub fn record_query(&self, operation: &str, seconds: f64, failed: bool) {
        let labels = self.labels("operation", operation);
        self.queries.add(1, &labels);
        self.query_latency.record(seconds, &labels);
        if failed {
            self.query_errors.add(1, &labels);
        }
    }

    pub fn record_retry(&self, operation: &str) {
        self.query_retries.add(1, &self.labels("operation", operation));
    }

    pub fn record_chain(&self, outcome: &str) {
        self.chains.add(1, &self.labels("outcome", outcome));
    }

    pub fn record_events(&self, chain: &str, count: usize) {
        self.events_written
            .add(count as u64, &self.labels("chain", chain));
    }

    pub fn render(&self) -> Result<String> {
        encode(&self.registry)
    }

    pub async fn start_metrics_server(&self, addr: &str, port: u16) -> Result<()> {
        let addr = format!("{addr}:{port}")
            .parse::<SocketAddr>()
            .context("invalid metrics address")?;
        let registry = self.registry.clone();

        let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

        let access_url = if addr.ip().is_unspecified() {
            format!("http://localhost:{port}/metrics")
        } else {
            format!("http://{}:{port}/metrics", addr.ip())
        };

        info!(
            "Starting metrics server - binding to {} (accessible at {})",
            addr, access_url
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind metrics server")?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server stopped: {}", e);
            }
        });

        Ok(())
    }
}

fn encode(registry: &prometheus::Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

async fn metrics_handler(registry: Arc<prometheus::Registry>) -> String {
    encode(&registry).unwrap_or_else(|e| {
        error!("Failed to encode metrics: {}", e);
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_exported_in_prometheus_format() {
        let metrics = Metrics::new("ibc".into()).unwrap();
        metrics.record_query("supported_chains", 0.2, false);
        metrics.record_query("range", 0.4, true);
        metrics.record_retry("range");
        metrics.record_chain("done");
        metrics.record_events("osmosis", 3);

        let text = metrics.render().unwrap();
        assert!(text.contains("backfill_queries"), "{text}");
        assert!(text.contains("backfill_query_errors"), "{text}");
        assert!(text.contains("backfill_chains"), "{text}");
        assert!(text.contains("outcome=\"done\""), "{text}");
    }
}
