//! Port traits: the boundaries between the domain and the outside world.

pub mod chart_surface;
pub mod config_port;
pub mod market_data_port;
pub mod tick_stream_port;
pub mod trade_port;
