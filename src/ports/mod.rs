//! Port traits for hexagonal architecture.

pub mod config_port;
pub mod exchange_port;
pub mod storage_port;
