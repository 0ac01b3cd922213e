//! WebSocket adapter for the live candle stream.

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::domain::candle::SubscriptionKey;
use crate::domain::error::ChartdeskError;
use crate::domain::feed_config::FeedConfig;
use crate::ports::tick_stream_port::{TickStream, TickStreamPort};

#[derive(Debug, Clone)]
pub struct WsTickAdapter {
    ws_base: Url,
}

impl WsTickAdapter {
    pub fn new(ws_base: Url) -> Self {
        Self { ws_base }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.ws_base.clone())
    }

    pub fn stream_url(&self, key: &SubscriptionKey) -> Result<Url, ChartdeskError> {
        let mut url = self.ws_base.clone();
        url.path_segments_mut()
            .map_err(|_| ChartdeskError::transport(format!("{} cannot be a base", self.ws_base)))?
            .pop_if_empty()
            .extend(["ws", "stockdata"]);
        url.query_pairs_mut()
            .append_pair("ticker_symbol", key.ticker())
            .append_pair("interval", key.interval().as_str());
        Ok(url)
    }
}

/// Text payload of a frame. Control frames carry none, and a binary frame
/// that is not UTF-8 is dropped here so stream errors stay transport-only.
fn frame_payload(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.as_str().to_owned()),
        Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(text),
            Err(_) => {
                tracing::warn!("dropped binary frame of {} bytes: not utf-8", bytes.len());
                None
            }
        },
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}

impl TickStreamPort for WsTickAdapter {
    async fn connect(&self, key: &SubscriptionKey) -> Result<TickStream, ChartdeskError> {
        let url = self.stream_url(key)?;
        let (socket, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChartdeskError::transport(format!("ws connect {url}: {e}")))?;
        tracing::info!("{key}: push channel open ({})", response.status());

        let stream = socket.filter_map(|frame| async move {
            match frame {
                Ok(message) => frame_payload(message).map(Ok),
                Err(e) => Some(Err(ChartdeskError::transport(format!("ws read: {e}")))),
            }
        });
        Ok(Box::pin(stream))
    }
}
