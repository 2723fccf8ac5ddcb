use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::sync::Arc;
use tracing::info;

use audit_ledger::ledger::IntegrityVerifier;
use audit_ledger::storage::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("verify-chain")
        .version("1.0.0")
        .about("Verify audit ledger chain integrity")
        .arg(
            Arg::new("database-url")
                .short('d')
                .long("database-url")
                .value_name("URL")
                .help("Database URL of the ledger (e.g. sqlite://audit_ledger.db)")
                .required(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print per-finding details")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let database_url = matches.get_one::<String>("database-url").unwrap();
    let verbose = matches.get_flag("verbose");

    info!("Verifying audit chain at {}", database_url);

    let store = SqliteStore::connect(database_url)
        .await
        .map_err(|e| anyhow!("Failed to open ledger database: {}", e))?;

    let verifier = IntegrityVerifier::new(Arc::new(store));
    let result = verifier
        .verify_integrity()
        .await
        .map_err(|e| anyhow!("Verification could not run: {}", e))?;

    println!(
        "Blocks: {} total, {} verified ({} ms)",
        result.total_blocks, result.verified_blocks, result.verification_time_ms
    );

    if verbose {
        for block_number in &result.broken_chains {
            println!("  broken chain at block {}", block_number);
        }
        for event_id in &result.tampered_events {
            println!("  tampered event {}", event_id);
        }
    }

    if result.is_valid {
        println!("✓ Audit chain is valid");
        Ok(())
    } else {
        println!(
            "✗ Audit chain is INVALID: {} broken chain(s), {} tampered event(s)",
            result.broken_chains.len(),
            result.tampered_events.len()
        );
        std::process::exit(1);
    }
}
