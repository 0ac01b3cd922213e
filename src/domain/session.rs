//! State owned by the event loop: the current subscription, its series, the
//! position ledger and the drawn overlays.
//!
//! Every async completion arrives as a [`Delivery`] tagged with the epoch it
//! was started under. Switching keys bumps the epoch, so completions from an
//! abandoned subscription are recognized and dropped here.

use std::fmt;

use super::candle::{Candle, SubscriptionKey};
use super::ledger::{PositionLedger, PositionView};
use super::overlay::{OverlayDiff, PriceOverlayManager};
use super::series::{MergeOutcome, SeriesStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Full series from the history endpoint.
    History(Vec<Candle>),
    /// One live update.
    Tick(Candle),
    /// The source will deliver nothing more.
    Stopped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub epoch: Epoch,
    pub event: FeedEvent,
}

impl Delivery {
    pub fn tick(epoch: Epoch, candle: Candle) -> Self {
        Delivery {
            epoch,
            event: FeedEvent::Tick(candle),
        }
    }

    pub fn history(epoch: Epoch, candles: Vec<Candle>) -> Self {
        Delivery {
            epoch,
            event: FeedEvent::History(candles),
        }
    }

    pub fn stopped(epoch: Epoch, reason: impl Into<String>) -> Self {
        Delivery {
            epoch,
            event: FeedEvent::Stopped {
                reason: reason.into(),
            },
        }
    }
}

/// What applying a delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Wrong epoch or no subscription.
    Discarded,
    Loaded,
    Merged(MergeOutcome),
    Stopped,
}

impl Applied {
    pub fn series_changed(self) -> bool {
        match self {
            Applied::Loaded => true,
            Applied::Merged(outcome) => outcome.changed(),
            Applied::Discarded | Applied::Stopped => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct ChartSession {
    epoch: Epoch,
    store: Option<SeriesStore>,
    ledger: PositionLedger,
    overlays: PriceOverlayManager,
    delivering: bool,
}

impl ChartSession {
    pub fn new() -> Self {
        ChartSession::default()
    }

    /// Start a new subscription and return its epoch. The series starts
    /// empty and the mark is cleared; open trades survive an interval change
    /// but not a change of instrument.
    pub fn begin(&mut self, key: SubscriptionKey) -> Epoch {
        let same_ticker = self
            .store
            .as_ref()
            .is_some_and(|s| s.key().ticker() == key.ticker());
        if !same_ticker && !self.ledger.is_empty() {
            tracing::info!(
                "leaving instrument, dropping {} local position(s)",
                self.ledger.len()
            );
            self.ledger.clear();
        }
        self.ledger.reset_mark();
        self.epoch = self.epoch.next();
        self.store = Some(SeriesStore::new(key));
        self.delivering = true;
        self.epoch
    }

    /// Stop accepting deliveries without starting a new subscription.
    pub fn end(&mut self) {
        self.epoch = self.epoch.next();
        self.delivering = false;
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn key(&self) -> Option<&SubscriptionKey> {
        self.store.as_ref().map(SeriesStore::key)
    }

    pub fn store(&self) -> Option<&SeriesStore> {
        self.store.as_ref()
    }

    pub fn candles(&self) -> &[Candle] {
        self.store.as_ref().map(SeriesStore::candles).unwrap_or(&[])
    }

    pub fn latest_candle(&self) -> Option<&Candle> {
        self.store.as_ref().and_then(SeriesStore::tail)
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut PositionLedger {
        &mut self.ledger
    }

    pub fn overlays(&self) -> &PriceOverlayManager {
        &self.overlays
    }

    pub fn positions(&self) -> Vec<PositionView> {
        self.ledger.positions()
    }

    /// Whether the current subscription is still expected to deliver.
    pub fn is_delivering(&self) -> bool {
        self.delivering
    }

    pub fn apply(&mut self, delivery: Delivery) -> Applied {
        if delivery.epoch != self.epoch {
            tracing::debug!(
                "discarding delivery from {} (current {})",
                delivery.epoch,
                self.epoch
            );
            return Applied::Discarded;
        }
        let Some(store) = self.store.as_mut() else {
            return Applied::Discarded;
        };

        let applied = match delivery.event {
            FeedEvent::History(candles) => {
                tracing::debug!("{}: loaded {} candles", store.key(), candles.len());
                store.replace(candles);
                Applied::Loaded
            }
            FeedEvent::Tick(candle) => Applied::Merged(store.merge_tick(candle)),
            FeedEvent::Stopped { reason } => {
                tracing::warn!("{}: live delivery stopped: {reason}", store.key());
                self.delivering = false;
                Applied::Stopped
            }
        };

        if applied.series_changed() {
            self.refresh_mark();
        }
        applied
    }

    /// Bring the drawn overlays in line with the ledger.
    pub fn sync_overlays(&mut self) -> OverlayDiff {
        self.overlays.reconcile(self.ledger.trades())
    }

    fn refresh_mark(&mut self) {
        match self.store.as_ref().and_then(SeriesStore::last_close) {
            Some(close) => self.ledger.mark(close),
            None => self.ledger.reset_mark(),
        }
    }
}
