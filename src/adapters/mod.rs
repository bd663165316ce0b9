//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod local_storage;
pub mod memory_storage;
pub mod simulated_exchange;
