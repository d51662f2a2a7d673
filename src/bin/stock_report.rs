//! Print the stock tree of a product as seen by one person
//! Usage: cargo run --bin stock_report -- <product_id> <person_id> [--json]

use tracing_subscriber::EnvFilter;

use labstock::config::Config;
use labstock::db::{migrations, Database};
use labstock::stock::{compute_stock, SqliteStockStore, StockOptions, StoreLocationStock};

fn print_node(node: &StoreLocationStock, depth: usize) {
    let columns: Vec<String> = node
        .stocks
        .iter()
        .filter(|s| s.total != 0.0)
        .map(|s| {
            let label = s
                .unit
                .as_ref()
                .map(|u| u.label.clone())
                .unwrap_or_else(|| format!("{:?}", s.kind).to_lowercase());
            format!("{} {:.3}/{:.3}", label, s.current, s.total)
        })
        .collect();

    println!(
        "{}{} [{}]",
        "  ".repeat(depth),
        node.location.name,
        if columns.is_empty() { "-".to_string() } else { columns.join(", ") }
    );
    for child in &node.children {
        print_node(child, depth + 1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("labstock=warn".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let (Some(product_id), Some(person_id)) = (
        args.get(1).and_then(|s| s.parse::<i64>().ok()),
        args.get(2).and_then(|s| s.parse::<i64>().ok()),
    ) else {
        eprintln!("Usage: stock_report <product_id> <person_id> [--json]");
        std::process::exit(2);
    };
    let as_json = args.iter().any(|a| a == "--json");

    let config = Config::from_env();
    eprintln!("Database: {}", config.database_path.display());

    let database = Database::new(&config.database_path)?;
    database.with_conn(|conn| {
        migrations::run_migrations(conn)?;
        Ok(())
    })?;

    let store = SqliteStockStore::load(database)?;
    let roots = compute_stock(store, product_id, person_id, StockOptions::from(&config)).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&roots)?);
        return Ok(());
    }

    println!("Stock of product {} (current/total)", product_id);
    if roots.is_empty() {
        println!("No store location visible to person {}", person_id);
    }
    for root in &roots {
        print_node(root, 0);
    }

    Ok(())
}
