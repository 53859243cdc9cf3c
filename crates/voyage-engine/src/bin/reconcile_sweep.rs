//! # Reconciliation Sweep Runner
//!
//! Retries commission reconciliation for bookings whose post-commit call
//! never finished.
//!
//! ## Usage
//! ```bash
//! # Poll until Ctrl-C
//! cargo run -p voyage-engine --bin reconcile-sweep
//!
//! # One pass, then exit
//! cargo run -p voyage-engine --bin reconcile-sweep -- --once
//!
//! # Explicit config file
//! cargo run -p voyage-engine --bin reconcile-sweep -- --config ./engine.toml
//! ```
//!
//! `RUST_LOG` overrides the default filter `info,voyage=debug,sqlx=warn`.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use voyage_db::Database;
use voyage_engine::{EngineConfig, ReconciliationSweep};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,voyage=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}

fn print_help() {
    println!("Voyage Reconciliation Sweep");
    println!();
    println!("Usage: reconcile-sweep [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>  Config file (default: platform config dir/engine.toml)");
    println!("      --once           Run a single pass and exit");
    println!("  -h, --help           Show this help message");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;
    let mut once = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--once" => once = true,
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(2);
            }
        }
        i += 1;
    }

    init_tracing();

    let config = EngineConfig::load(config_path)?;
    info!(db = ?config.database.path, "Opening database");
    let db = Arc::new(Database::new(config.db_config()).await?);

    let (sweep, handle) = ReconciliationSweep::new(db.clone(), config.sweep.clone());

    if once {
        let report = sweep.run_once().await?;
        let deleted = sweep.cleanup_processed().await?;
        info!(
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            deleted,
            "Sweep pass complete"
        );
        db.close().await;
        return Ok(());
    }

    if let Err(e) = sweep.cleanup_processed().await {
        error!(?e, "Failed to clean up processed markers");
    }

    let task = tokio::spawn(sweep.run());

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, stopping sweep");
    handle.shutdown().await;
    task.await?;

    db.close().await;
    Ok(())
}
