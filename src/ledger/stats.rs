//! Ledger Statistics
//!
//! Read-only aggregation over the persistence store. Counts are
//! eventually consistent under concurrent sealing but are unsigned and
//! can never go negative.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::LedgerError;
use crate::ledger::CONSTITUTIONAL_HASH;
use crate::storage::PersistenceStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_blocks: u64,
    pub total_events: u64,
    pub pending_events: u64,
    pub recent_events_24h: u64,
    pub latest_block_number: Option<u64>,
    /// Compliance ruleset tag callers use to confirm they are talking to
    /// a ledger running the expected ruleset version.
    pub constitutional_hash: String,
    pub generated_at: DateTime<Utc>,
}

pub struct StatsReporter {
    store: Arc<dyn PersistenceStore>,
}

impl StatsReporter {
    pub fn new(store: Arc<dyn PersistenceStore>) -> Self {
        Self { store }
    }

    pub async fn get_stats(&self) -> Result<StatsSnapshot, LedgerError> {
        let total_blocks = self.store.count_blocks().await?;
        let total_events = self.store.count_events().await?;
        let pending_events = self.store.load_pending_events().await?.len() as u64;
        let recent_events_24h = self
            .store
            .count_events_since(Utc::now() - Duration::hours(24))
            .await?;
        let latest_block_number = self.store.latest_block_number().await?;

        Ok(StatsSnapshot {
            total_blocks,
            total_events,
            pending_events,
            recent_events_24h,
            latest_block_number,
            constitutional_hash: CONSTITUTIONAL_HASH.to_string(),
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::block::AuditBlock;
    use crate::ledger::event::{AuditEvent, EventType, Severity};
    use crate::storage::MemoryStore;
    use std::collections::BTreeMap;

    fn make_event(id: &str) -> AuditEvent {
        let mut event = AuditEvent {
            id: id.to_string(),
            event_type: EventType::AccessControl,
            service_name: "svc".to_string(),
            action: "read".to_string(),
            resource_type: "record".to_string(),
            description: String::new(),
            severity: Severity::Low,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
            content_hash: String::new(),
        };
        event.content_hash = event.calculate_hash();
        event
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let store = Arc::new(MemoryStore::new());
        let genesis = AuditBlock::genesis();
        store.put_block(&genesis).await.unwrap();

        let block = AuditBlock::seal(
            1,
            genesis.block_hash.clone(),
            vec![make_event("a"), make_event("b")],
        );
        store.put_block(&block).await.unwrap();
        store.put_event(&make_event("pending")).await.unwrap();

        let reporter = StatsReporter::new(store);
        let stats = reporter.get_stats().await.unwrap();
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.pending_events, 1);
        assert_eq!(stats.recent_events_24h, 2);
        assert_eq!(stats.latest_block_number, Some(1));
        assert_eq!(stats.constitutional_hash, CONSTITUTIONAL_HASH);
    }

    #[tokio::test]
    async fn test_stats_on_empty_ledger() {
        let store = Arc::new(MemoryStore::new());
        let reporter = StatsReporter::new(store);
        let stats = reporter.get_stats().await.unwrap();
        assert_eq!(stats.total_blocks, 0);
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.latest_block_number, None);
    }
}
