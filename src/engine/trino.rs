//! Trino HTTP client.
//!
//! Submits a statement with `POST /v1/statement`, then follows `nextUri`
//! until the query finishes. Only the first value of the first row is kept.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{AnalyticEngine, EngineError, EngineResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    id: String,
    next_uri: Option<String>,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
    error: Option<QueryError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryError {
    message: String,
    #[serde(default)]
    error_name: String,
}

pub struct TrinoClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
}

impl TrinoClient {
    pub fn new(base_url: &str, user: &str, timeout: Duration) -> EngineResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
        })
    }

    async fn read(response: reqwest::Response) -> EngineResult<QueryResults> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Status { status, body });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| EngineError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl AnalyticEngine for TrinoClient {
    async fn query_scalar(&self, sql: &str) -> EngineResult<Value> {
        let url = format!("{}/v1/statement", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("X-Trino-User", &self.user)
            .header("X-Trino-Source", "dynq")
            .body(sql.to_string())
            .send()
            .await?;

        let mut page = Self::read(response).await?;
        debug!(trino_query_id = %page.id, "statement submitted");
        let mut scalar: Option<Value> = None;

        loop {
            if let Some(error) = page.error {
                return Err(EngineError::Query {
                    name: error.error_name,
                    message: error.message,
                });
            }
            if scalar.is_none() {
                scalar = page
                    .data
                    .and_then(|rows| rows.into_iter().next())
                    .and_then(|row| row.into_iter().next());
            }
            let Some(next) = page.next_uri else {
                break;
            };
            let response = self
                .http
                .get(&next)
                .header("X-Trino-User", &self.user)
                .send()
                .await?;
            page = Self::read(response).await?;
        }

        scalar.ok_or(EngineError::NoRows)
    }
}
