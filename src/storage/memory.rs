//! In-memory store, used by tests and embedded deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::error::LedgerError;
use crate::ledger::block::AuditBlock;
use crate::ledger::event::AuditEvent;
use crate::storage::PersistenceStore;

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<u64, AuditBlock>,
    /// Event id -> (event, owning block number if sealed).
    events: HashMap<String, (AuditEvent, Option<u64>)>,
    /// Pending event ids in arrival order.
    pending_order: Vec<String>,
}

/// Reference implementation of `PersistenceStore` backed by a mutex-guarded
/// map. A single lock makes every operation atomic, matching the
/// all-or-nothing contract of `put_block`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored block verbatim. Test hook for simulating
    /// out-of-band tampering with persisted data.
    pub fn overwrite_block(&self, block: AuditBlock) {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        for event in &block.events {
            inner
                .events
                .insert(event.id.clone(), (event.clone(), Some(block.block_number)));
        }
        inner.blocks.insert(block.block_number, block);
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    async fn put_event(&self, event: &AuditEvent) -> Result<bool, LedgerError> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        if inner.events.contains_key(&event.id) {
            return Ok(false);
        }
        inner.pending_order.push(event.id.clone());
        inner.events.insert(event.id.clone(), (event.clone(), None));
        Ok(true)
    }

    async fn put_block(&self, block: &AuditBlock) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().expect("memory store lock poisoned");
        if inner.blocks.contains_key(&block.block_number) {
            return Err(LedgerError::Storage(format!(
                "block {} already exists",
                block.block_number
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for event in &block.events {
            if !seen.insert(event.id.as_str()) {
                return Err(LedgerError::Storage(format!(
                    "duplicate event id '{}' in block {}",
                    event.id, block.block_number
                )));
            }
            if let Some((_, Some(owner))) = inner.events.get(&event.id) {
                return Err(LedgerError::Storage(format!(
                    "event '{}' already sealed in block {}",
                    event.id, owner
                )));
            }
        }
        for event in &block.events {
            inner
                .events
                .insert(event.id.clone(), (event.clone(), Some(block.block_number)));
            inner.pending_order.retain(|id| id != &event.id);
        }
        inner.blocks.insert(block.block_number, block.clone());
        Ok(())
    }

    async fn get_block(&self, block_number: u64) -> Result<Option<AuditBlock>, LedgerError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.blocks.get(&block_number).cloned())
    }

    async fn get_event(&self, id: &str) -> Result<Option<AuditEvent>, LedgerError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.events.get(id).map(|(event, _)| event.clone()))
    }

    async fn load_pending_events(&self) -> Result<Vec<AuditEvent>, LedgerError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .pending_order
            .iter()
            .filter_map(|id| inner.events.get(id))
            .filter(|(_, owner)| owner.is_none())
            .map(|(event, _)| event.clone())
            .collect())
    }

    async fn latest_block_number(&self) -> Result<Option<u64>, LedgerError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.blocks.keys().next_back().copied())
    }

    async fn count_blocks(&self) -> Result<u64, LedgerError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner.blocks.len() as u64)
    }

    async fn count_events(&self) -> Result<u64, LedgerError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .events
            .values()
            .filter(|(_, owner)| owner.is_some())
            .count() as u64)
    }

    async fn count_events_since(&self, since: DateTime<Utc>) -> Result<u64, LedgerError> {
        let inner = self.inner.lock().expect("memory store lock poisoned");
        Ok(inner
            .events
            .values()
            .filter(|(event, owner)| owner.is_some() && event.timestamp >= since)
            .count() as u64)
    }
}
