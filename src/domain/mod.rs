//! Core domain types and logic.

pub mod candle;
pub mod series;
pub mod trade;
pub mod ledger;
pub mod overlay;
pub mod session;
pub mod feed_config;
pub mod error;
