//! Lab Stock Library
//!
//! Stock aggregation for a laboratory chemical inventory: how much of a
//! product sits at every store location and in every sub-tree beneath it.

pub mod build_info;
pub mod config;
pub mod db;
pub mod mcp;
pub mod models;
pub mod stock;
pub mod tools;
