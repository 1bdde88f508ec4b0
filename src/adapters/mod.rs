//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_research_adapter;
pub mod file_config_adapter;
