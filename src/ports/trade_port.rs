//! Trade execution port.

use std::future::Future;

use crate::domain::error::ChartdeskError;
use crate::domain::trade::{Trade, TradeId, TradeRequest};

pub trait TradePort {
    /// Open a position; the returned trade carries the server-assigned id.
    fn open_trade(
        &self,
        request: &TradeRequest,
    ) -> impl Future<Output = Result<Trade, ChartdeskError>> + Send;

    fn close_trade(&self, id: TradeId) -> impl Future<Output = Result<(), ChartdeskError>> + Send;
}
