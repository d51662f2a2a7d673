//! Lab Stock Status Tool
//!
//! Provides runtime status information about the Lab Stock service.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::config::Config;

/// Stock reporting instructions for AI assistants
pub const STOCK_INSTRUCTIONS: &str = r#"
# Lab Stock Instructions

This guide explains how to read product stock with the Lab Stock tools.

## Overview

Stock is reported per store location, for one product, as seen by one person:
1. **Store locations** form trees (room > cabinet > shelf). Only the roots of
   entities the person may read are returned, each with its full sub-tree.
2. **Reference units** are the parentless quantity units (L, g, m). Every
   measured storage is converted into the reference unit of its family.
3. **Unitless** stock counts storages recorded with a quantity but no unit.
4. **Consumable** stock counts discrete items: units + bags x items per bag
   + cartons x items per carton.

Each location carries one entry per reference unit, then unitless, then
consumable. Every entry has:
- `current` - held directly at that location
- `total` - held at that location and anywhere beneath it

## Workflow

1. `list_visible_roots(person_id)` - check what the person can see
2. `compute_product_stock(product_id, person_id)` - get the stock tree
3. `list_reference_units` / `list_units` - interpret the unit columns

## Notes

- Temperature and concentration units are never totalled
- Archived storages and history rows are ignored
- A person without read permission gets an empty list, not an error
"#;

/// Runtime status of the Lab Stock service
#[derive(Debug, Clone, Serialize)]
pub struct LabStockStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Database information
    pub database_path: String,
    pub database_size_bytes: Option<u64>,

    /// Stock computation limits
    pub max_depth: usize,
    pub timeout_seconds: Option<u64>,
    pub reference_units: Vec<String>,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    database_path: PathBuf,
    max_depth: usize,
    timeout_seconds: Option<u64>,
    reference_units: Vec<String>,
}

impl StatusTracker {
    pub fn new(config: &Config, reference_units: Vec<String>) -> Self {
        Self {
            start_time: Instant::now(),
            database_path: config.database_path.clone(),
            max_depth: config.max_depth,
            timeout_seconds: config.timeout.map(|t| t.as_secs()),
            reference_units,
        }
    }

    /// Get the current status
    pub fn get_status(&self) -> LabStockStatus {
        let build_info = BuildInfo::current();

        // Get database size if it exists
        let database_size_bytes = std::fs::metadata(&self.database_path)
            .ok()
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        LabStockStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            database_path: self.database_path.display().to_string(),
            database_size_bytes,
            max_depth: self.max_depth,
            timeout_seconds: self.timeout_seconds,
            reference_units: self.reference_units.clone(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
