//! Lab Stock Tools module
//!
//! MCP tool implementations for stock reporting.

pub mod status;
pub mod stock;
