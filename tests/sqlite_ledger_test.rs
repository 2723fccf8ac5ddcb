//! Full-service tests over the durable SQLite store.

use std::sync::Arc;
use tempfile::tempdir;

use audit_ledger::config::AppConfig;
use audit_ledger::ledger::event::RawEvent;
use audit_ledger::ledger::AuditLedger;
use audit_ledger::storage::{PersistenceStore, SqliteStore};

fn raw_event(action: &str) -> RawEvent {
    RawEvent {
        event_type: Some("CRYPTOGRAPHIC_OPERATION".to_string()),
        service_name: Some("signing-svc".to_string()),
        action: Some(action.to_string()),
        resource_type: Some("key".to_string()),
        description: Some("sqlite integration".to_string()),
        severity: Some("LOW".to_string()),
        ..Default::default()
    }
}

async fn open_store(dir: &std::path::Path) -> Arc<SqliteStore> {
    let url = format!("sqlite://{}", dir.join("ledger.db").display());
    let store = SqliteStore::connect(&url).await.unwrap();
    store.run_migrations().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_sqlite_seal_and_verify() {
    let dir = tempdir().unwrap();
    let store = open_store(dir.path()).await;
    let config = AppConfig {
        batch_size: 2,
        ..AppConfig::default()
    };
    let ledger = AuditLedger::new(store.clone(), &config);
    ledger.ensure_genesis().await.unwrap();

    ledger.submit_event(raw_event("sign-1")).await.unwrap();
    ledger.submit_event(raw_event("sign-2")).await.unwrap();

    assert_eq!(store.count_blocks().await.unwrap(), 2);
    let result = ledger.verify().await.unwrap();
    assert!(result.is_valid);
    assert_eq!(result.total_blocks, 2);

    let stats = ledger.get_stats().await.unwrap();
    assert_eq!(stats.total_events, 2);
    assert_eq!(stats.latest_block_number, Some(1));
}

#[tokio::test]
async fn test_sqlite_survives_restart() {
    let dir = tempdir().unwrap();
    let config = AppConfig {
        batch_size: 10,
        ..AppConfig::default()
    };

    // First process: genesis plus one pending (unsealed) event.
    {
        let store = open_store(dir.path()).await;
        let ledger = AuditLedger::new(store, &config);
        ledger.ensure_genesis().await.unwrap();
        ledger.submit_event(raw_event("pending-op")).await.unwrap();
    }

    // Second process over the same database file.
    let store = open_store(dir.path()).await;
    let ledger = AuditLedger::new(store.clone(), &config);
    ledger.ensure_genesis().await.unwrap();

    // Still exactly one genesis, and the pending event was not lost.
    assert_eq!(store.count_blocks().await.unwrap(), 1);
    assert_eq!(ledger.recover_pending().await.unwrap(), 1);

    ledger.seal_now().await.unwrap();
    assert_eq!(store.count_blocks().await.unwrap(), 2);
    assert!(ledger.verify().await.unwrap().is_valid);
}
