//! Port traits the domain depends on.

pub mod cache_port;
pub mod config_port;
pub mod export_port;
pub mod store_port;
