//! Persistent push channel: one connection per subscription, no reconnect.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{DeliverySender, Subscription};
use crate::domain::candle::{SubscriptionKey, parse_tick};
use crate::domain::session::{Delivery, Epoch};
use crate::ports::tick_stream_port::TickStreamPort;

#[derive(Debug)]
pub struct PushSource<S> {
    port: Arc<S>,
}

impl<S> PushSource<S>
where
    S: TickStreamPort + Send + Sync + 'static,
{
    pub fn new(port: Arc<S>) -> Self {
        PushSource { port }
    }

    pub fn subscribe(&self, key: SubscriptionKey, epoch: Epoch, tx: DeliverySender) -> Subscription {
        let port = Arc::clone(&self.port);
        Subscription::spawn(key.clone(), epoch, move |cancel| {
            push_loop(port, key, epoch, tx, cancel)
        })
    }
}

/// Bad frames are dropped and the connection stays up. A transport error or
/// peer close ends delivery with `Stopped`; cancellation ends it silently.
async fn push_loop<S: TickStreamPort>(
    port: Arc<S>,
    key: SubscriptionKey,
    epoch: Epoch,
    tx: DeliverySender,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        r = port.connect(&key) => r,
    };
    let mut stream = match connected {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!("{key}: push connect failed: {e}");
            let _ = tx.send(Delivery::stopped(epoch, e.to_string()));
            return;
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = stream.next() => item,
        };
        match next {
            Some(Ok(payload)) => match parse_tick(&payload) {
                Ok(candle) => {
                    if tx.send(Delivery::tick(epoch, candle)).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("{key}: dropped frame: {e}"),
            },
            Some(Err(e)) => {
                tracing::warn!("{key}: push channel failed: {e}");
                let _ = tx.send(Delivery::stopped(epoch, e.to_string()));
                break;
            }
            None => {
                tracing::info!("{key}: push channel closed by peer");
                let _ = tx.send(Delivery::stopped(epoch, "connection closed by peer"));
                break;
            }
        }
    }
    drop(stream);
    tracing::debug!("{key}: push stopped ({epoch})");
}
