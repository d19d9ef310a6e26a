pub mod blocks;
pub mod chains;
pub mod graphql;
pub mod queries;
pub mod transfers;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

use crate::metrics::Metrics;
use crate::models::errors::QueryError;
use crate::utils::retry::{RetryConfig, retry_observed};

/// One remote query: a GraphQL document plus variables in, the `data` object out.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn request(&self, document: &str, variables: Value) -> Result<Value, QueryError>;
}

/// Everything a remote lookup needs: the transport, the retry policy and optional metrics.
#[derive(Clone, Copy)]
pub struct IndexApi<'a> {
    pub client: &'a dyn QueryClient,
    pub retry: &'a RetryConfig,
    pub metrics: Option<&'a Metrics>,
}

impl<'a> IndexApi<'a> {
    pub fn new(client: &'a dyn QueryClient, retry: &'a RetryConfig) -> Self {
        Self {
            client,
            retry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<&'a Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs `document` through the retry policy and decodes the `data` object into `T`.
    /// A response that does not decode counts as a failed attempt.
    pub(crate) async fn query<T>(
        &self,
        operation: &'static str,
        context: &str,
        document: &str,
        variables: Value,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let metrics = self.metrics;
        retry_observed(
            || async {
                let start = Instant::now();
                let result = self.client.request(document, variables.clone()).await;

                let decoded = result
                    .map_err(|e| anyhow!(e))
                    .and_then(|data| {
                        serde_json::from_value::<T>(data)
                            .with_context(|| format!("malformed {operation} response"))
                    });

                if let Some(metrics) = metrics {
                    metrics.record_query(operation, start.elapsed().as_secs_f64(), decoded.is_err());
                }
                if let Err(e) = &decoded {
                    debug!("Error fetching {}: {:#}", context, e);
                }
                decoded
            },
            self.retry,
            context,
            |_| {
                if let Some(metrics) = metrics {
                    metrics.record_retry(operation);
                }
            },
        )
        .await
    }
}
