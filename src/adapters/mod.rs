//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod http_adapter;
pub mod log_surface;
pub mod ws_adapter;
