//! Candle retrieval port.

use std::future::Future;

use crate::domain::candle::{Candle, SubscriptionKey};
use crate::domain::error::ChartdeskError;

pub trait MarketDataPort {
    /// Full series for the key, oldest first.
    fn fetch_series(
        &self,
        key: &SubscriptionKey,
    ) -> impl Future<Output = Result<Vec<Candle>, ChartdeskError>> + Send;

    /// The most recent, possibly still forming, candle.
    fn fetch_latest(
        &self,
        key: &SubscriptionKey,
    ) -> impl Future<Output = Result<Candle, ChartdeskError>> + Send;
}
