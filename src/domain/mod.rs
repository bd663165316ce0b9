//! Core domain types and logic.

pub mod account;
pub mod asset;
pub mod assets;
pub mod config_validation;
pub mod error;
pub mod kline;
pub mod kline_store;
pub mod order;
pub mod simulation;
pub mod strategy;
pub mod universe;
