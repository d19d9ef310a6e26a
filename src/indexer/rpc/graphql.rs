use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::indexer::rpc::QueryClient;
use crate::models::errors::QueryError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct GraphqlClient {
    http_client: Client,
    endpoint: Url,
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: &'a Value,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

impl GraphqlClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        Self::with_http_client(endpoint, http_client)
    }

    pub fn with_http_client(endpoint: &str, http_client: Client) -> Result<Self> {
        let endpoint = endpoint
            .parse::<Url>()
            .with_context(|| format!("invalid GraphQL endpoint {endpoint}"))?;
        Ok(Self {
            http_client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl QueryClient for GraphqlClient {
    async fn request(&self, document: &str, variables: Value) -> Result<Value, QueryError> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&GraphqlRequest {
                query: document,
                variables: &variables,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response: GraphqlResponse = response.json().await?;
        if !response.errors.is_empty() {
            return Err(QueryError::Graphql {
                messages: response.errors.into_iter().map(|e| e.message).collect(),
            });
        }

        match response.data {
            Some(Value::Null) | None => Err(QueryError::MissingData),
            Some(data) => Ok(data),
        }
    }
}
