//! Core domain types and logic.

pub mod attribution;
pub mod config_validation;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod ohlcv;
pub mod pipeline;
pub mod portfolio;
pub mod rule;
pub mod scoring;
pub mod sector;
pub mod selection;
pub mod series;
pub mod signal;
pub mod stability;
pub mod summary;
pub mod trade;
pub mod universe;
