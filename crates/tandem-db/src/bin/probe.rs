//! # Endpoint Probe
//!
//! Connects to a configured endpoint set, pings it, and shows how reads are
//! spread across replicas.
//!
//! ## Usage
//! ```bash
//! # Config file from TANDEM_DB_CONFIG, endpoints possibly from TANDEM_DATABASE_URLS
//! cargo run -p tandem-db --bin tandem-probe
//!
//! # Explicit config file and read count
//! cargo run -p tandem-db --bin tandem-probe -- --config ./database.toml --reads 20
//!
//! # More logging
//! RUST_LOG=tandem_db=debug cargo run -p tandem-db --bin tandem-probe
//! ```

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use tandem_db::connection::Connection;
use tandem_db::{Database, DbConfig, RequestScope};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = DbConfig::path_from_env();
    let mut reads: usize = 10;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--reads" | "-r" => {
                if i + 1 < args.len() {
                    reads = args[i + 1].parse().unwrap_or(10);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tandem Endpoint Probe");
                println!();
                println!("Usage: tandem-probe [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Database config file (default: $TANDEM_DB_CONFIG)");
                println!("  -r, --reads <N>      Replica reads to issue (default: 10)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = DbConfig::load(config_path.as_deref())?;
    let db = Database::connect(&config).await?;

    println!("Endpoints: {} (1 primary, {} replicas)", db.len(), db.replica_count());

    let scope = RequestScope::new();
    db.ping(&scope).await?;
    println!("✓ Every endpoint answered ping");

    // Same path a routed read takes on an unmarked scope
    let mut served: BTreeMap<String, usize> = BTreeMap::new();
    for _ in 0..reads {
        let endpoint = db.read_replica();
        endpoint.query("SELECT 1", &[]).await?;
        *served.entry(endpoint.url().to_string()).or_default() += 1;
    }

    println!();
    println!("Reads served ({} total):", reads);
    for (url, count) in &served {
        println!("  {:>5}  {}", count, url);
    }

    let row = db.query_row(&scope, "SELECT sqlite_version() AS version", &[]).await?;
    if let Some(row) = row {
        info!(version = %row.get::<String>("version")?, "SQLite version");
    }

    db.close().await?;
    println!();
    println!("✓ Closed");
    Ok(())
}
