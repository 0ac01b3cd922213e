//! REST adapter for the chart backend: candle history, latest candle and the
//! trade endpoints.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::domain::candle::{Candle, SubscriptionKey, parse_tick};
use crate::domain::error::ChartdeskError;
use crate::domain::feed_config::FeedConfig;
use crate::domain::trade::{Trade, TradeId, TradeRequest};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::trade_port::TradePort;

#[derive(Deserialize)]
struct TradeEnvelope {
    data: Trade,
}

#[derive(Debug, Clone)]
pub struct HttpApiAdapter {
    client: Client,
    api_base: Url,
}

impl HttpApiAdapter {
    pub fn new(api_base: Url, timeout: Duration) -> Result<Self, ChartdeskError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChartdeskError::transport(format!("building http client: {e}")))?;
        Ok(Self { client, api_base })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self, ChartdeskError> {
        Self::new(config.api_base.clone(), config.request_timeout)
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// `{base}/{segments..}`; the base path is kept whether or not it ends in `/`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ChartdeskError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ChartdeskError::transport(format!("{} cannot be a base", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn series_url(&self, key: &SubscriptionKey, segments: &[&str]) -> Result<Url, ChartdeskError> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut()
            .append_pair("ticker_symbol", key.ticker())
            .append_pair("interval", key.interval().as_str());
        Ok(url)
    }

    async fn get_text(&self, url: Url) -> Result<String, ChartdeskError> {
        tracing::debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ChartdeskError::transport(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChartdeskError::transport(format!(
                "GET {url} returned {status}"
            )));
        }
        response
            .text()
            .await
            .map_err(|e| ChartdeskError::transport(format!("reading {url}: {e}")))
    }
}

/// Human-readable reason from a failed trade response. The backend reports
/// FastAPI-style `{"detail": ...}` bodies.
async fn failure_reason(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    detail_from_body(status, &body)
}

fn detail_from_body(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").cloned());
    match detail {
        Some(serde_json::Value::String(s)) => format!("{status}: {s}"),
        Some(other) => format!("{status}: {other}"),
        None if body.trim().is_empty() => status.to_string(),
        None => format!("{status}: {}", body.trim()),
    }
}

impl MarketDataPort for HttpApiAdapter {
    async fn fetch_series(&self, key: &SubscriptionKey) -> Result<Vec<Candle>, ChartdeskError> {
        let url = self.series_url(key, &["stockdata"])?;
        let body = self.get_text(url).await?;
        serde_json::from_str(&body)
            .map_err(|e| ChartdeskError::parse(format!("{key} history: {e}")))
    }

    async fn fetch_latest(&self, key: &SubscriptionKey) -> Result<Candle, ChartdeskError> {
        let url = self.series_url(key, &["stockdata", "latest"])?;
        let body = self.get_text(url).await?;
        parse_tick(&body)
    }
}

impl TradePort for HttpApiAdapter {
    async fn open_trade(&self, request: &TradeRequest) -> Result<Trade, ChartdeskError> {
        let url = self.endpoint(&["trade"])?;
        tracing::debug!("POST {url} {} {}", request.action, request.ticker);
        let response = self
            .client
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| ChartdeskError::trade_api(format!("POST {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(ChartdeskError::trade_api(failure_reason(response).await));
        }
        let envelope: TradeEnvelope = response
            .json()
            .await
            .map_err(|e| ChartdeskError::trade_api(format!("unexpected trade response: {e}")))?;
        Ok(envelope.data)
    }

    async fn close_trade(&self, id: TradeId) -> Result<(), ChartdeskError> {
        let url = self.endpoint(&["trade", &id.to_string()])?;
        tracing::debug!("DELETE {url}");
        let response = self
            .client
            .delete(url.clone())
            .send()
            .await
            .map_err(|e| ChartdeskError::trade_api(format!("DELETE {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(ChartdeskError::trade_api(failure_reason(response).await));
        }
        Ok(())
    }
}
