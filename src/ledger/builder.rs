//! Chain Builder
//!
//! Drains the pending queue, assembles immutable blocks, links each to its
//! predecessor via hash, and persists atomically. The chain tip lives in an
//! explicit `ChainState` behind an exclusive async lock: there is exactly
//! one writer at a time, so two sealers can never race on the same
//! `previous_hash` and fork the chain.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::LedgerError;
use crate::ledger::block::AuditBlock;
use crate::ledger::event::{AuditEvent, EventType, Severity};
use crate::ledger::queue::PendingQueue;
use crate::storage::PersistenceStore;

/// Retry bounds for block persistence.
#[derive(Debug, Clone)]
pub struct SealPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for SealPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// The current chain tip. `None` until the tip has been loaded from
/// storage (or genesis created).
struct ChainState {
    tip: Option<(u64, String)>,
}

pub struct ChainBuilder {
    store: Arc<dyn PersistenceStore>,
    queue: Arc<PendingQueue>,
    state: Mutex<ChainState>,
    policy: SealPolicy,
}

impl ChainBuilder {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        queue: Arc<PendingQueue>,
        policy: SealPolicy,
    ) -> Self {
        Self {
            store,
            queue,
            state: Mutex::new(ChainState { tip: None }),
            policy,
        }
    }

    /// Create the genesis block iff none exists. Idempotent and safe to
    /// call on every process start; also loads the tip after a restart.
    pub async fn ensure_genesis(&self) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        self.init_tip(&mut state).await
    }

    /// Seal up to `limit` pending events into a new block.
    ///
    /// Reads the tip, drains the queue, hashes, persists with bounded
    /// retries, and only then advances the tip. An empty queue is an
    /// idempotent no-op. On persistence failure the drained events go back
    /// to the front of the queue and the failure surfaces as
    /// `LedgerError::Ingestion`.
    pub async fn seal_block(&self, limit: usize) -> Result<Option<AuditBlock>, LedgerError> {
        let mut state = self.state.lock().await;
        self.init_tip(&mut state).await?;

        let events = self.queue.drain(limit);
        if events.is_empty() {
            return Ok(None);
        }

        let (tip_number, tip_hash) = state
            .tip
            .clone()
            .ok_or_else(|| LedgerError::ChainConflict("chain tip unavailable".to_string()))?;

        let block = AuditBlock::seal(tip_number + 1, tip_hash, events);

        if let Err(e) = self.persist_with_retry(&block).await {
            // Events must never be lost: put them back where they were so a
            // later seal retries them in the original order.
            let event_count = block.events.len();
            self.queue.requeue_front(block.events);
            error!(
                block_number = block.block_number,
                event_count,
                "Block persistence failed after bounded retries; events requeued"
            );
            return Err(e);
        }

        state.tip = Some((block.block_number, block.block_hash.clone()));
        info!(
            block_number = block.block_number,
            event_count = block.events.len(),
            block_hash = %block.block_hash,
            "Audit block sealed"
        );
        Ok(Some(block))
    }

    /// Load the tip from storage, creating genesis when the chain is empty.
    /// Caller must hold the state lock.
    async fn init_tip(&self, state: &mut ChainState) -> Result<(), LedgerError> {
        if state.tip.is_some() {
            return Ok(());
        }

        if let Some(tip_number) = self.store.latest_block_number().await? {
            let tip = self.store.get_block(tip_number).await?.ok_or_else(|| {
                LedgerError::Storage(format!("tip block {} missing", tip_number))
            })?;
            state.tip = Some((tip.block_number, tip.block_hash));
            return Ok(());
        }

        let genesis = AuditBlock::genesis();
        match self.store.put_block(&genesis).await {
            Ok(()) => {
                info!(block_hash = %genesis.block_hash, "Genesis block created");
                state.tip = Some((0, genesis.block_hash));
                Ok(())
            }
            Err(e) => {
                // Another process may have won the race on the unique
                // block_number key; accept its genesis as ours.
                if let Some(existing) = self.store.get_block(0).await? {
                    state.tip = Some((0, existing.block_hash));
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn persist_with_retry(&self, block: &AuditBlock) -> Result<(), LedgerError> {
        let mut attempt = 0u32;
        loop {
            match self.store.put_block(block).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.policy.max_retries => {
                    let delay = self.policy.base_delay * 2u32.saturating_pow(attempt);
                    warn!(
                        block_number = block.block_number,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Block persistence failed; retrying with backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(LedgerError::Ingestion(format!(
                        "could not persist block {} after {} retries: {}",
                        block.block_number, self.policy.max_retries, e
                    )))
                }
            }
        }
    }
}

/// Forces immediate block closure for critical events, bypassing the
/// normal batching thresholds.
pub struct EmergencySeal {
    builder: Arc<ChainBuilder>,
}

impl EmergencySeal {
    pub fn new(builder: Arc<ChainBuilder>) -> Self {
        Self { builder }
    }

    /// Both CRITICAL severity and the explicit EMERGENCY_ACTION type
    /// trigger an emergency seal. No other condition does.
    pub fn is_emergency(event: &AuditEvent) -> bool {
        event.severity == Severity::Critical || event.event_type == EventType::EmergencyAction
    }

    /// Seal every currently pending event into a block immediately.
    ///
    /// The triggering event must already be enqueued; draining the whole
    /// queue guarantees it lands in the block produced here. Mutual
    /// exclusion with normal sealing comes from the shared chain state
    /// lock inside `ChainBuilder`.
    pub async fn force_seal(&self) -> Result<Option<AuditBlock>, LedgerError> {
        warn!("Emergency seal triggered; bypassing batching thresholds");
        self.builder.seal_block(usize::MAX).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::GENESIS_PREVIOUS_HASH;
    use crate::storage::MemoryStore;
    use std::collections::BTreeMap;

    fn make_event(id: &str, severity: Severity) -> AuditEvent {
        let mut event = AuditEvent {
            id: id.to_string(),
            event_type: EventType::GovernanceDecision,
            service_name: "svc".to_string(),
            action: "decide".to_string(),
            resource_type: "proposal".to_string(),
            description: String::new(),
            severity,
            metadata: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
            content_hash: String::new(),
        };
        event.content_hash = event.calculate_hash();
        event
    }

    fn builder_with(store: Arc<MemoryStore>) -> (Arc<ChainBuilder>, Arc<PendingQueue>) {
        let queue = Arc::new(PendingQueue::new());
        let policy = SealPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
        };
        let builder = Arc::new(ChainBuilder::new(store, Arc::clone(&queue), policy));
        (builder, queue)
    }

    #[tokio::test]
    async fn test_ensure_genesis_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let (builder, _queue) = builder_with(Arc::clone(&store));

        builder.ensure_genesis().await.unwrap();
        builder.ensure_genesis().await.unwrap();

        assert_eq!(store.count_blocks().await.unwrap(), 1);
        let genesis = store.get_block(0).await.unwrap().unwrap();
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
    }

    #[tokio::test]
    async fn test_seal_links_to_tip() {
        let store = Arc::new(MemoryStore::new());
        let (builder, queue) = builder_with(Arc::clone(&store));
        builder.ensure_genesis().await.unwrap();

        queue.enqueue(make_event("a", Severity::Low));
        let first = builder.seal_block(10).await.unwrap().unwrap();

        queue.enqueue(make_event("b", Severity::Low));
        let second = builder.seal_block(10).await.unwrap().unwrap();

        let genesis = store.get_block(0).await.unwrap().unwrap();
        assert_eq!(first.block_number, 1);
        assert_eq!(first.previous_hash, genesis.block_hash);
        assert_eq!(second.block_number, 2);
        assert_eq!(second.previous_hash, first.block_hash);
    }

    #[tokio::test]
    async fn test_empty_queue_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let (builder, _queue) = builder_with(Arc::clone(&store));
        builder.ensure_genesis().await.unwrap();

        assert!(builder.seal_block(10).await.unwrap().is_none());
        assert_eq!(store.count_blocks().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_seal_respects_batch_limit() {
        let store = Arc::new(MemoryStore::new());
        let (builder, queue) = builder_with(store);
        builder.ensure_genesis().await.unwrap();

        for i in 0..5 {
            queue.enqueue(make_event(&format!("e{}", i), Severity::Low));
        }
        let block = builder.seal_block(3).await.unwrap().unwrap();
        assert_eq!(block.events.len(), 3);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_emergency_trigger_conditions() {
        assert!(EmergencySeal::is_emergency(&make_event(
            "c",
            Severity::Critical
        )));

        let mut emergency_typed = make_event("t", Severity::Low);
        emergency_typed.event_type = EventType::EmergencyAction;
        emergency_typed.content_hash = emergency_typed.calculate_hash();
        assert!(EmergencySeal::is_emergency(&emergency_typed));

        assert!(!EmergencySeal::is_emergency(&make_event(
            "h",
            Severity::High
        )));
    }

    #[tokio::test]
    async fn test_force_seal_drains_everything() {
        let store = Arc::new(MemoryStore::new());
        let (builder, queue) = builder_with(store);
        builder.ensure_genesis().await.unwrap();

        queue.enqueue(make_event("low-1", Severity::Low));
        queue.enqueue(make_event("low-2", Severity::Low));
        queue.enqueue(make_event("crit", Severity::Critical));

        let seal = EmergencySeal::new(Arc::clone(&builder));
        let block = seal.force_seal().await.unwrap().unwrap();
        assert_eq!(block.events.len(), 3);
        assert!(block.events.iter().any(|e| e.id == "crit"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_recovers_tip_from_store() {
        let store = Arc::new(MemoryStore::new());
        {
            let (builder, queue) = builder_with(Arc::clone(&store));
            builder.ensure_genesis().await.unwrap();
            queue.enqueue(make_event("persisted", Severity::Low));
            builder.seal_block(10).await.unwrap().unwrap();
        }

        // Fresh builder over the same store, as after a restart.
        let (builder, queue) = builder_with(Arc::clone(&store));
        queue.enqueue(make_event("after-restart", Severity::Low));
        let block = builder.seal_block(10).await.unwrap().unwrap();

        assert_eq!(block.block_number, 2);
        let prior = store.get_block(1).await.unwrap().unwrap();
        assert_eq!(block.previous_hash, prior.block_hash);
    }
}
