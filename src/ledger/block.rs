//! Audit Block
//!
//! An immutable, sealed batch of audit events plus the hash linkage that
//! chains it to its predecessor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::event::{sha256_hex, AuditEvent};
use crate::ledger::GENESIS_PREVIOUS_HASH;

/// One block in the audit chain.
///
/// `previous_hash` links to the prior block's `block_hash`; the genesis
/// block (number 0) uses the fixed sentinel instead. Once `sealed` is set
/// the block is never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditBlock {
    pub block_number: u64,
    pub previous_hash: String,
    pub events: Vec<AuditEvent>,
    pub block_hash: String,
    pub created_at: DateTime<Utc>,
    pub sealed: bool,
}

impl AuditBlock {
    /// Assemble and seal a block over the given events.
    pub fn seal(block_number: u64, previous_hash: String, events: Vec<AuditEvent>) -> Self {
        let mut block = Self {
            block_number,
            previous_hash,
            events,
            block_hash: String::new(),
            created_at: Utc::now(),
            sealed: true,
        };
        block.block_hash = block.calculate_hash();
        debug!(
            block_number = block.block_number,
            event_count = block.events.len(),
            block_hash = %block.block_hash,
            "Sealed audit block"
        );
        block
    }

    /// The genesis block: number 0, no events, sentinel previous hash.
    pub fn genesis() -> Self {
        Self::seal(0, GENESIS_PREVIOUS_HASH.to_string(), Vec::new())
    }

    /// Canonical string representation for hashing.
    ///
    /// Commits to the block number, the link to the predecessor, and the
    /// full canonical serialization of every contained event in order.
    pub fn canonical_string(&self) -> String {
        let events = self
            .events
            .iter()
            .map(|e| e.canonical_string())
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "block_number:{}|previous_hash:{}|events:[{}]",
            self.block_number, self.previous_hash, events
        )
    }

    /// Compute the SHA-256 hash of this block.
    pub fn calculate_hash(&self) -> String {
        sha256_hex(self.canonical_string().as_bytes())
    }

    /// True when the stored block hash matches recomputation.
    pub fn verify_hash(&self) -> bool {
        self.block_hash == self.calculate_hash()
    }
}
