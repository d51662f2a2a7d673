//! Lab Stock
//!
//! MCP server exposing product stock aggregation over store location trees.

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use labstock::build_info;
use labstock::config::Config;
use labstock::db;
use labstock::mcp::LabStockService;
use labstock::models::Unit;
use labstock::stock::UnitFamilies;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("labstock=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let config = Config::from_env();
    eprintln!("Database path: {}", config.database_path.display());

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    eprintln!("Initializing database...");
    let database = db::Database::new(&config.database_path)?;

    let families = database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(UnitFamilies::build(&Unit::list(conn)?))
    })?;

    // Unit definitions are validated once here rather than on every request
    let families = families?;
    families.validate()?;
    eprintln!(
        "Reference units: {}",
        families
            .reference_axes()
            .iter()
            .map(|u| u.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let service = LabStockService::new(config, database, families);

    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
