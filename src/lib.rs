//! chartdesk: a live candle chart session with paper positions.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. Live update sources live in
//! [`feed`]; [`controller`] owns the session and drives everything.

pub mod adapters;
pub mod cli;
pub mod controller;
pub mod domain;
pub mod feed;
pub mod ports;
