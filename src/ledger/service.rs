//! Audit Ledger Service
//!
//! The external interface of the ledger: event ingestion, on-demand
//! verification, stats, and bootstrap. Wires the validator, pending
//! queue, chain builder, emergency seal, verifier, and stats reporter
//! over a shared persistence store.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::LedgerError;
use crate::ledger::builder::{ChainBuilder, EmergencySeal, SealPolicy};
use crate::ledger::event::RawEvent;
use crate::ledger::queue::PendingQueue;
use crate::ledger::stats::{StatsReporter, StatsSnapshot};
use crate::ledger::validator::EventValidator;
use crate::ledger::verify::{IntegrityVerifier, VerificationResult};
use crate::storage::PersistenceStore;

pub struct AuditLedger {
    validator: EventValidator,
    queue: Arc<PendingQueue>,
    builder: Arc<ChainBuilder>,
    emergency: EmergencySeal,
    verifier: IntegrityVerifier,
    stats: StatsReporter,
    store: Arc<dyn PersistenceStore>,
    batch_size: usize,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn PersistenceStore>, config: &AppConfig) -> Self {
        let queue = Arc::new(PendingQueue::new());
        let policy = SealPolicy {
            max_retries: config.max_persist_retries,
            base_delay: std::time::Duration::from_millis(config.retry_base_delay_ms),
        };
        let builder = Arc::new(ChainBuilder::new(
            Arc::clone(&store),
            Arc::clone(&queue),
            policy,
        ));

        Self {
            validator: EventValidator::new(),
            queue,
            emergency: EmergencySeal::new(Arc::clone(&builder)),
            builder,
            verifier: IntegrityVerifier::new(Arc::clone(&store)),
            stats: StatsReporter::new(Arc::clone(&store)),
            store,
            batch_size: config.batch_size,
        }
    }

    /// Create the genesis block if none exists. Safe to call on every
    /// process start.
    pub async fn ensure_genesis(&self) -> Result<(), LedgerError> {
        self.builder.ensure_genesis().await
    }

    /// Reload events that were persisted as pending before a restart.
    pub async fn recover_pending(&self) -> Result<usize, LedgerError> {
        let pending = self.store.load_pending_events().await?;
        let count = pending.len();
        for event in pending {
            if !self.queue.contains(&event.id) {
                self.queue.enqueue(event);
            }
        }
        if count > 0 {
            info!(count, "Recovered pending events from storage");
        }
        Ok(count)
    }

    /// Validate and ingest one event, returning its id.
    ///
    /// At-least-once safe: re-submitting a caller-supplied id that the
    /// ledger already holds is a no-op returning the same id. A CRITICAL
    /// or EMERGENCY_ACTION event forces an immediate seal; otherwise a
    /// full batch triggers one.
    pub async fn submit_event(&self, raw: RawEvent) -> Result<String, LedgerError> {
        let event = self.validator.validate(raw)?;
        let event_id = event.id.clone();

        // Durable before visible: the pending row survives a crash, the
        // queue entry feeds the next seal. The store's insert-if-absent on
        // the event id is the single dedupe authority, so concurrent
        // replays of the same id cannot both reach the queue.
        if !self.store.put_event(&event).await? {
            debug!(event_id = %event_id, "Duplicate submission; already ingested");
            return Ok(event_id);
        }
        let is_emergency = EmergencySeal::is_emergency(&event);
        self.queue.enqueue(event);

        if is_emergency {
            self.emergency.force_seal().await?;
        } else if self.queue.len() >= self.batch_size {
            self.builder.seal_block(self.batch_size).await?;
        }

        Ok(event_id)
    }

    /// Seal a block from whatever is pending. Invoked by the periodic
    /// timer; a no-op when the queue is empty.
    pub async fn seal_now(&self) -> Result<(), LedgerError> {
        self.builder.seal_block(self.batch_size).await?;
        Ok(())
    }

    /// Walk the chain and report integrity findings. Never mutates.
    pub async fn verify(&self) -> Result<VerificationResult, LedgerError> {
        self.verifier.verify_integrity().await
    }

    pub async fn get_stats(&self) -> Result<StatsSnapshot, LedgerError> {
        self.stats.get_stats().await
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn test_config() -> AppConfig {
        AppConfig {
            batch_size: 3,
            retry_base_delay_ms: 1,
            ..Default::default()
        }
    }

    fn raw(event_type: &str, severity: Option<&str>) -> RawEvent {
        RawEvent {
            event_type: Some(event_type.to_string()),
            service_name: Some("compliance-svc".to_string()),
            action: Some("record".to_string()),
            resource_type: Some("decision".to_string()),
            description: Some("test".to_string()),
            severity: severity.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_batch_threshold_seals_one_block() {
        let store = Arc::new(MemoryStore::new());
        let ledger = AuditLedger::new(store.clone(), &test_config());
        ledger.ensure_genesis().await.unwrap();

        let a = ledger.submit_event(raw("GOVERNANCE_DECISION", Some("LOW"))).await.unwrap();
        let b = ledger.submit_event(raw("GOVERNANCE_DECISION", Some("MEDIUM"))).await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 1); // genesis only

        let c = ledger.submit_event(raw("GOVERNANCE_DECISION", Some("LOW"))).await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 2);

        let block = store.get_block(1).await.unwrap().unwrap();
        let ids: Vec<&str> = block.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![a.as_str(), b.as_str(), c.as_str()]);
        assert_eq!(ledger.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_critical_event_seals_immediately() {
        let store = Arc::new(MemoryStore::new());
        let ledger = AuditLedger::new(store.clone(), &test_config());
        ledger.ensure_genesis().await.unwrap();

        ledger.submit_event(raw("ACCESS_CONTROL", Some("LOW"))).await.unwrap();
        ledger.submit_event(raw("ACCESS_CONTROL", Some("LOW"))).await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 1);

        let crit = ledger
            .submit_event(raw("GOVERNANCE_DECISION", Some("CRITICAL")))
            .await
            .unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 2);

        let block = store.get_block(1).await.unwrap().unwrap();
        assert!(block.events.iter().any(|e| e.id == crit));
    }

    #[tokio::test]
    async fn test_resubmission_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let ledger = AuditLedger::new(store.clone(), &test_config());
        ledger.ensure_genesis().await.unwrap();

        let mut r = raw("ACCESS_CONTROL", Some("LOW"));
        r.id = Some("client-supplied-7".to_string());
        let first = ledger.submit_event(r.clone()).await.unwrap();
        let second = ledger.submit_event(r).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_recover_pending_after_restart() {
        let store = Arc::new(MemoryStore::new());
        {
            let ledger = AuditLedger::new(store.clone(), &test_config());
            ledger.ensure_genesis().await.unwrap();
            ledger.submit_event(raw("ACCESS_CONTROL", Some("LOW"))).await.unwrap();
        }

        // A fresh service over the same store simulates a restart.
        let ledger = AuditLedger::new(store.clone(), &test_config());
        ledger.ensure_genesis().await.unwrap();
        let recovered = ledger.recover_pending().await.unwrap();
        assert_eq!(recovered, 1);

        ledger.seal_now().await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_timer_seal_noop_on_empty_queue() {
        let store = Arc::new(MemoryStore::new());
        let ledger = AuditLedger::new(store.clone(), &test_config());
        ledger.ensure_genesis().await.unwrap();
        ledger.seal_now().await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 1);
    }
}
