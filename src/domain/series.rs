//! Ordered candle series and the tail-only merge policy.
//!
//! The live feed only ever advances the series or restates the bucket that
//! is still forming, so only the tail is eligible for revision. Anything
//! older than the tail is dropped, never inserted in the middle.

use std::cmp::Ordering;

use super::candle::{Candle, SubscriptionKey};

/// What a single merge did to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The series was empty and now holds the incoming candle.
    Started,
    /// Same bucket as the tail; the tail was replaced wholesale.
    ReplacedTail,
    /// A new bucket opened.
    Appended,
    /// Older than the tail; discarded.
    Stale,
}

impl MergeOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, MergeOutcome::Stale)
    }
}

/// Decide how `incoming` merges into `series` without touching it.
pub fn reconcile(series: &[Candle], incoming: &Candle) -> MergeOutcome {
    let Some(tail) = series.last() else {
        return MergeOutcome::Started;
    };
    match incoming.time.cmp(&tail.time) {
        Ordering::Equal => MergeOutcome::ReplacedTail,
        Ordering::Greater => MergeOutcome::Appended,
        Ordering::Less => MergeOutcome::Stale,
    }
}

/// The candles of one subscription key.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStore {
    key: SubscriptionKey,
    candles: Vec<Candle>,
    stale_drops: u64,
}

impl SeriesStore {
    pub fn new(key: SubscriptionKey) -> Self {
        SeriesStore {
            key,
            candles: Vec::new(),
            stale_drops: 0,
        }
    }

    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn tail(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.tail().and_then(Candle::usable_close)
    }

    /// Stale ticks discarded since the last `replace`.
    pub fn stale_drops(&self) -> u64 {
        self.stale_drops
    }

    /// Set the full series. Ordering is the upstream's responsibility; a
    /// history that is not strictly increasing is kept as delivered.
    ///
    /// Live candles already merged past the end of `candles` are re-merged
    /// on top, so a history that lands after a newer tick never rewinds the
    /// tail.
    pub fn replace(&mut self, candles: Vec<Candle>) {
        let disorder = candles
            .windows(2)
            .filter(|pair| pair[0].time >= pair[1].time)
            .count();
        if disorder > 0 {
            tracing::warn!(
                "history for {} is not strictly increasing ({disorder} out-of-order rows)",
                self.key
            );
        }
        let newer: Vec<Candle> = match candles.last() {
            Some(last) => self
                .candles
                .iter()
                .filter(|c| c.time > last.time)
                .copied()
                .collect(),
            None => std::mem::take(&mut self.candles),
        };
        self.candles = candles;
        self.stale_drops = 0;
        if !newer.is_empty() {
            tracing::debug!(
                "{}: kept {} live candle(s) newer than history",
                self.key,
                newer.len()
            );
        }
        for candle in newer {
            self.merge_tick(candle);
        }
    }

    pub fn merge_tick(&mut self, candle: Candle) -> MergeOutcome {
        let outcome = reconcile(&self.candles, &candle);
        match outcome {
            MergeOutcome::Started | MergeOutcome::Appended => self.candles.push(candle),
            MergeOutcome::ReplacedTail => {
                if let Some(tail) = self.candles.last_mut() {
                    *tail = candle;
                }
            }
            MergeOutcome::Stale => {
                self.stale_drops += 1;
                tracing::debug!(
                    "{}: dropped stale tick at {} (tail at {:?})",
                    self.key,
                    candle.time,
                    self.tail().map(|c| c.time)
                );
            }
        }
        outcome
    }
}
