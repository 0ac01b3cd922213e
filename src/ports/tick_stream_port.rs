//! Persistent push-channel port.

use futures_util::stream::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::domain::candle::SubscriptionKey;
use crate::domain::error::ChartdeskError;

/// Raw inbound payloads, one per message. Dropping the stream closes the
/// underlying connection. An `Err` item means the transport failed and no
/// further items follow.
pub type TickStream = Pin<Box<dyn Stream<Item = Result<String, ChartdeskError>> + Send>>;

pub trait TickStreamPort {
    fn connect(
        &self,
        key: &SubscriptionKey,
    ) -> impl Future<Output = Result<TickStream, ChartdeskError>> + Send;
}
