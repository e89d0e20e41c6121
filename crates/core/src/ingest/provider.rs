use crate::config::Settings;
use crate::ingest::error::FetchError;
use crate::ingest::retry::RetryPolicy;
use crate::ingest::types::{records_from_json, Record};
use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A provider that answers named table endpoints with rows of loosely typed columns.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_records(&self, endpoint: &str, params: &[(String, String)])
        -> Result<Vec<Record>>;
}

/// One table from `endpoint` under `retry`, or `None` when every attempt failed.
pub async fn fetch_table(
    source: &dyn RecordSource,
    retry: &RetryPolicy,
    endpoint: &str,
    params: &[(String, String)],
) -> Option<Vec<Record>> {
    retry
        .run(endpoint, |_| async move {
            let records = source.fetch_records(endpoint, params).await?;
            anyhow::ensure!(
                !records.is_empty(),
                FetchError::Empty {
                    endpoint: endpoint.to_string()
                }
            );
            Ok(records)
        })
        .await
}

/// JSON-over-HTTP gateway that exposes provider functions as `GET {base_url}/{endpoint}`.
#[derive(Debug, Clone)]
pub struct HttpJsonProvider {
    http: reqwest::Client,
    base_url: String,
}

impl HttpJsonProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout_secs = std::env::var("DATA_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url: settings.data_provider_base_url().to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl RecordSource for HttpJsonProvider {
    fn provider_name(&self) -> &'static str {
        "http_json_gateway"
    }

    async fn fetch_records(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Record>> {
        let res = self
            .http
            .get(self.url(endpoint))
            .query(params)
            .send()
            .await
            .map_err(|err| FetchError::Transport {
                endpoint: endpoint.to_string(),
                detail: err.to_string(),
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read {endpoint} response"))?;
        let body = serde_json::from_str::<Value>(&text).map_err(|err| FetchError::Decode {
            endpoint: endpoint.to_string(),
            detail: err.to_string(),
        })?;

        let records = records_from_json(endpoint, body)?;
        if records.is_empty() {
            return Err(FetchError::Empty {
                endpoint: endpoint.to_string(),
            }
            .into());
        }

        tracing::debug!(endpoint, rows = records.len(), "provider rows received");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_endpoint() {
        let settings = Settings {
            data_provider_base_url: Some("http://gateway:8080/api/public/".to_string()),
            sentry_dsn: None,
            output_dir: None,
        };
        let provider = HttpJsonProvider::from_settings(&settings).unwrap();
        assert_eq!(
            provider.url("/stock_zh_a_hist"),
            "http://gateway:8080/api/public/stock_zh_a_hist"
        );
    }
}
