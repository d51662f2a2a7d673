//! Runtime configuration
//!
//! Settings come from environment variables so the MCP server and the CLI
//! binaries resolve the same database.

use std::path::PathBuf;
use std::time::Duration;

/// Default bound on store location tree depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    /// Deepest store location level a walk may reach before it is treated as a cycle
    pub max_depth: usize,
    /// Optional wall-clock limit for one stock computation
    pub timeout: Option<Duration>,
}

impl Config {
    /// Read configuration from `LABSTOCK_*` environment variables
    pub fn from_env() -> Self {
        let max_depth = std::env::var("LABSTOCK_MAX_DEPTH")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_MAX_DEPTH);

        let timeout = std::env::var("LABSTOCK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        Self {
            database_path: database_path(),
            max_depth,
            timeout,
        }
    }
}

/// Get the database path from environment or use default
fn database_path() -> PathBuf {
    std::env::var("LABSTOCK_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut path = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));

            // Go up from target/release or target/debug to project root
            if path.ends_with("release") || path.ends_with("debug") {
                if let Some(parent) = path.parent() {
                    if let Some(grandparent) = parent.parent() {
                        path = grandparent.to_path_buf();
                    }
                }
            }

            path.push("data");
            path.push("labstock.db");
            path
        })
}
