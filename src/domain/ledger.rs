//! Open positions for the current instrument and their live PnL.

use std::collections::HashMap;
use std::fmt;

use super::candle::Candle;
use super::error::ChartdeskError;
use super::trade::{Action, Trade, TradeId, TradeRequest};
use crate::ports::trade_port::TradePort;

/// One open trade priced against the current mark.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionView {
    pub id: TradeId,
    pub ticker: String,
    pub action: Action,
    pub entry_price: f64,
    pub current: f64,
    pub pnl: f64,
}

impl fmt::Display for PositionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {}  entry {:.2} | current {:.2} | pnl {:.2}",
            self.id,
            self.action.label(),
            self.ticker,
            self.entry_price,
            self.current,
            self.pnl
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionLedger {
    trades: HashMap<TradeId, Trade>,
    last_close: Option<f64>,
}

impl PositionLedger {
    pub fn new() -> Self {
        PositionLedger::default()
    }

    pub fn insert(&mut self, trade: Trade) -> Option<Trade> {
        self.trades.insert(trade.id, trade)
    }

    pub fn remove(&mut self, id: TradeId) -> Option<Trade> {
        self.trades.remove(&id)
    }

    pub fn get(&self, id: TradeId) -> Option<&Trade> {
        self.trades.get(&id)
    }

    pub fn contains(&self, id: TradeId) -> bool {
        self.trades.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.values()
    }

    /// Drop every trade and the mark.
    pub fn clear(&mut self) {
        self.trades.clear();
        self.last_close = None;
    }

    /// Record the latest close. Non-finite prices clear the mark rather than
    /// poisoning every PnL.
    pub fn mark(&mut self, close: f64) {
        self.last_close = close.is_finite().then_some(close);
    }

    pub fn reset_mark(&mut self) {
        self.last_close = None;
    }

    pub fn last_close(&self) -> Option<f64> {
        self.last_close
    }

    pub fn pnl(&self, id: TradeId) -> Option<f64> {
        let close = self.last_close?;
        self.trades.get(&id).map(|t| t.unrealized_pnl(close))
    }

    pub fn total_unrealized(&self) -> Option<f64> {
        let close = self.last_close?;
        Some(self.trades.values().map(|t| t.unrealized_pnl(close)).sum())
    }

    /// Positions sorted by id. Empty while there is no mark.
    pub fn positions(&self) -> Vec<PositionView> {
        let Some(close) = self.last_close else {
            return Vec::new();
        };
        let mut views: Vec<PositionView> = self
            .trades
            .values()
            .map(|t| PositionView {
                id: t.id,
                ticker: t.ticker.clone(),
                action: t.action,
                entry_price: t.entry_price,
                current: close,
                pnl: t.unrealized_pnl(close),
            })
            .collect();
        views.sort_by_key(|v| v.id);
        views
    }

    /// Open a position priced from `candle`. Price validation happens before
    /// the request goes out; the ledger only changes once the server confirms.
    pub async fn open<P: TradePort>(
        &mut self,
        port: &P,
        ticker: &str,
        action: Action,
        candle: &Candle,
    ) -> Result<Trade, ChartdeskError> {
        let request = TradeRequest::from_candle(ticker, action, candle)?;
        let trade = port.open_trade(&request).await?;
        tracing::info!(
            "opened #{} {} {} at {:.2}",
            trade.id,
            trade.action.label(),
            trade.ticker,
            trade.entry_price
        );
        self.trades.insert(trade.id, trade.clone());
        Ok(trade)
    }

    /// Close a locally known position. Unknown ids fail without a request.
    pub async fn close<P: TradePort>(
        &mut self,
        port: &P,
        id: TradeId,
    ) -> Result<Trade, ChartdeskError> {
        if !self.trades.contains_key(&id) {
            return Err(ChartdeskError::UnknownTrade { id });
        }
        port.close_trade(id).await?;
        let trade = self
            .trades
            .remove(&id)
            .ok_or(ChartdeskError::UnknownTrade { id })?;
        tracing::info!("closed #{id} {} {}", trade.action.label(), trade.ticker);
        Ok(trade)
    }
}
