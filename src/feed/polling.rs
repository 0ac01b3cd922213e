//! Fixed-period polling of the latest-candle endpoint.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{DeliverySender, Subscription};
use crate::domain::candle::SubscriptionKey;
use crate::domain::session::{Delivery, Epoch};
use crate::ports::market_data_port::MarketDataPort;

const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct PollingSource<M> {
    port: Arc<M>,
    period: Duration,
}

impl<M> PollingSource<M>
where
    M: MarketDataPort + Send + Sync + 'static,
{
    pub fn new(port: Arc<M>, period: Duration) -> Self {
        PollingSource {
            port,
            period: period.max(MIN_PERIOD),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn subscribe(&self, key: SubscriptionKey, epoch: Epoch, tx: DeliverySender) -> Subscription {
        let port = Arc::clone(&self.port);
        let period = self.period;
        Subscription::spawn(key.clone(), epoch, move |cancel| {
            poll_loop(port, key, epoch, period, tx, cancel)
        })
    }
}

/// First fetch fires immediately. Each fetch completes before the next tick
/// is awaited, and ticks missed while it ran are skipped.
async fn poll_loop<M: MarketDataPort>(
    port: Arc<M>,
    key: SubscriptionKey,
    epoch: Epoch,
    period: Duration,
    tx: DeliverySender,
    cancel: CancellationToken,
) {
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = port.fetch_latest(&key) => r,
        };
        match fetched {
            Ok(candle) => {
                if tx.send(Delivery::tick(epoch, candle)).is_err() {
                    break;
                }
            }
            Err(e) => tracing::warn!("{key}: poll skipped: {e}"),
        }
    }
    tracing::debug!("{key}: polling stopped ({epoch})");
}
