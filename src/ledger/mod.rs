//! Cryptographically-chained audit trail.
//!
//! Append-only, block-structured ledger for compliance and governance
//! events: validated events wait in a pending queue, the chain builder
//! seals them into hash-linked blocks, and the integrity verifier detects
//! any after-the-fact tampering.

pub mod block;
pub mod builder;
pub mod event;
pub mod queue;
pub mod service;
pub mod stats;
pub mod validator;
pub mod verify;

pub use block::AuditBlock;
pub use builder::{ChainBuilder, EmergencySeal, SealPolicy};
pub use event::{AuditEvent, EventType, MetadataValue, RawEvent, Severity};
pub use queue::PendingQueue;
pub use service::AuditLedger;
pub use stats::{StatsReporter, StatsSnapshot};
pub use validator::EventValidator;
pub use verify::{IntegrityVerifier, VerificationResult};

/// Sentinel `previous_hash` of the genesis block. 64 hex zeros can never
/// be the SHA-256 of real data, so genesis detection is unambiguous.
pub const GENESIS_PREVIOUS_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// Compliance ruleset tag embedded in event metadata and stats payloads.
/// Not a chain hash: callers compare it to confirm the ledger runs the
/// ruleset version they expect.
pub const CONSTITUTIONAL_HASH: &str = "cdd01ef066bc6cf2";
