//! Persistence Store
//!
//! The ledger's storage boundary. Chain logic only ever talks to this
//! trait, so any engine with atomic single-record writes and consistent
//! reads can be substituted without touching the chain code.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::ledger::block::AuditBlock;
use crate::ledger::event::AuditEvent;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Durable storage for blocks and events.
///
/// `put_block` must persist the block and its events all-or-nothing; a
/// partially written block is a correctness violation. Reads must be
/// consistent: a reader never observes a half-written block.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Persist a validated event that is not yet owned by any block.
    ///
    /// Insert-if-absent on the event id: returns `true` when the event was
    /// newly stored, `false` when an event with that id already exists (the
    /// stored record is left untouched). The check and the insert are one
    /// atomic operation, so concurrent at-least-once retries of the same id
    /// can never both insert.
    async fn put_event(&self, event: &AuditEvent) -> Result<bool, LedgerError>;

    /// Atomically persist a sealed block together with its events,
    /// assigning each event to the block. A duplicate event id, or an
    /// event already owned by another block, is an error: the stored
    /// event set must match the sealed block exactly.
    async fn put_block(&self, block: &AuditBlock) -> Result<(), LedgerError>;

    /// Fetch a block with its events in insertion order.
    async fn get_block(&self, block_number: u64) -> Result<Option<AuditBlock>, LedgerError>;

    /// Fetch a single event by id, whether pending or sealed.
    async fn get_event(&self, id: &str) -> Result<Option<AuditEvent>, LedgerError>;

    /// Events persisted but not yet sealed into a block, oldest first.
    async fn load_pending_events(&self) -> Result<Vec<AuditEvent>, LedgerError>;

    /// Highest block number, or `None` before genesis.
    async fn latest_block_number(&self) -> Result<Option<u64>, LedgerError>;

    async fn count_blocks(&self) -> Result<u64, LedgerError>;

    /// Events sealed into blocks (pending events are not counted).
    async fn count_events(&self) -> Result<u64, LedgerError>;

    async fn count_events_since(&self, since: DateTime<Utc>) -> Result<u64, LedgerError>;
}
