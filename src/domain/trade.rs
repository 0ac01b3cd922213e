//! Trades and the open-position request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::candle::{Candle, Timestamp};
use super::error::ChartdeskError;

/// Server-assigned trade identifier.
pub type TradeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    /// +1 for buy, -1 for sell.
    pub fn direction(self) -> f64 {
        match self {
            Action::Buy => 1.0,
            Action::Sell => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Ok(Action::Buy),
            "sell" | "short" => Ok(Action::Sell),
            other => Err(format!("unknown action {other:?}")),
        }
    }
}

/// An open position as confirmed by the trade API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(rename = "trade_id")]
    pub id: TradeId,
    pub ticker: String,
    pub action: Action,
    pub entry_price: f64,
    #[serde(rename = "time", default)]
    pub opened_at: Timestamp,
    /// PnL the server computed at open time (spread cost).
    #[serde(default)]
    pub pnl: Option<f64>,
    #[serde(default)]
    pub spread: Option<f64>,
}

impl Trade {
    pub fn unrealized_pnl(&self, close: f64) -> f64 {
        unrealized_pnl(self, close)
    }
}

/// (close - entry) in the trade's direction.
pub fn unrealized_pnl(trade: &Trade, close: f64) -> f64 {
    (close - trade.entry_price) * trade.action.direction()
}

/// Body of an open-position request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRequest {
    pub ticker: String,
    pub action: Action,
    pub price: f64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub time: Timestamp,
}

impl TradeRequest {
    /// Buys fill at the candle's `buy_price`, sells at its close. Fails with
    /// `InvalidPrice` when that side is missing or not finite; the other
    /// side falls back to the fill price.
    pub fn from_candle(
        ticker: &str,
        action: Action,
        candle: &Candle,
    ) -> Result<Self, ChartdeskError> {
        let buy_price = candle.usable_buy_price();
        let sell_price = candle.usable_close();
        let price = match action {
            Action::Buy => buy_price,
            Action::Sell => sell_price,
        }
        .ok_or(ChartdeskError::InvalidPrice { action })?;

        Ok(TradeRequest {
            ticker: ticker.to_string(),
            action,
            price,
            buy_price: buy_price.unwrap_or(price),
            sell_price: sell_price.unwrap_or(price),
            time: candle.time,
        })
    }
}
