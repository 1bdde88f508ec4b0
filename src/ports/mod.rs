//! Port traits at the I/O seams of the pipeline.

pub mod config_port;
pub mod price_port;
pub mod research_port;
