//! Live update sources and the subscription handles that own their tasks.
//!
//! A source is started for one [`SubscriptionKey`] under one [`Epoch`] and
//! reports through an unbounded channel of [`Delivery`] values. The returned
//! [`Subscription`] is the only way to stop it: `unsubscribe` cancels the
//! task and waits for it, so the timer or connection is gone once it
//! returns. Dropping the handle cancels without waiting.

pub mod polling;
pub mod push;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::candle::SubscriptionKey;
use crate::domain::session::{Delivery, Epoch};
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::tick_stream_port::TickStreamPort;

pub use crate::domain::feed_config::FeedMode;
pub use polling::PollingSource;
pub use push::PushSource;

pub type DeliverySender = mpsc::UnboundedSender<Delivery>;
pub type DeliveryReceiver = mpsc::UnboundedReceiver<Delivery>;

#[derive(Debug)]
pub struct Subscription {
    key: SubscriptionKey,
    epoch: Epoch,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Spawn `task` on the current runtime with a fresh cancellation token.
    pub fn spawn<F, Fut>(key: SubscriptionKey, epoch: Epoch, task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(task(cancel.clone()));
        Subscription {
            key,
            epoch,
            cancel,
            task: Some(handle),
        }
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Cancel and wait for the task to release its resources.
    pub async fn unsubscribe(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!("{}: feed task panicked", self.key);
                }
            }
        }
        tracing::debug!("{}: unsubscribed ({})", self.key, self.epoch);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Fetch the full series once and deliver it as `History`. A failed load is
/// logged and leaves the series to the live source.
pub fn load_history<M>(
    market: Arc<M>,
    key: SubscriptionKey,
    epoch: Epoch,
    tx: DeliverySender,
) -> Subscription
where
    M: MarketDataPort + Send + Sync + 'static,
{
    Subscription::spawn(key.clone(), epoch, move |cancel| async move {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            r = market.fetch_series(&key) => r,
        };
        match fetched {
            Ok(candles) => {
                let _ = tx.send(Delivery::history(epoch, candles));
            }
            Err(e) => tracing::warn!("{key}: history load failed: {e}"),
        }
    })
}

/// Either live source, chosen by [`FeedMode`].
#[derive(Debug)]
pub enum UpdateSource<M, S> {
    Polling(PollingSource<M>),
    Push(PushSource<S>),
}

impl<M, S> UpdateSource<M, S>
where
    M: MarketDataPort + Send + Sync + 'static,
    S: TickStreamPort + Send + Sync + 'static,
{
    pub fn new(mode: FeedMode, market: Arc<M>, stream: Arc<S>, poll_interval: Duration) -> Self {
        match mode {
            FeedMode::Polling => UpdateSource::Polling(PollingSource::new(market, poll_interval)),
            FeedMode::Push => UpdateSource::Push(PushSource::new(stream)),
        }
    }

    pub fn mode(&self) -> FeedMode {
        match self {
            UpdateSource::Polling(_) => FeedMode::Polling,
            UpdateSource::Push(_) => FeedMode::Push,
        }
    }

    pub fn subscribe(&self, key: SubscriptionKey, epoch: Epoch, tx: DeliverySender) -> Subscription {
        tracing::info!("{key}: subscribing ({} mode, {epoch})", self.mode());
        match self {
            UpdateSource::Polling(source) => source.subscribe(key, epoch, tx),
            UpdateSource::Push(source) => source.subscribe(key, epoch, tx),
        }
    }
}
