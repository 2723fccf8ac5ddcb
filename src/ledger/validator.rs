//! Event Validation
//!
//! Validates raw ingestion payloads and canonicalizes them into
//! `AuditEvent` records with an id, a monotonic timestamp, and a
//! content hash.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::ledger::event::{AuditEvent, EventType, MetadataValue, RawEvent, Severity};
use crate::ledger::CONSTITUTIONAL_HASH;

/// Validates and canonicalizes incoming audit events.
///
/// Timestamps assigned here are monotonically non-decreasing within the
/// process, even if the wall clock steps backwards.
pub struct EventValidator {
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl EventValidator {
    pub fn new() -> Self {
        Self {
            last_timestamp: Mutex::new(None),
        }
    }

    /// Validate a raw event, rejecting incomplete or unknown input.
    ///
    /// Required: `event_type` (from the known set), non-empty
    /// `service_name` and `action`, and `resource_type`. `severity`
    /// defaults to MEDIUM. Errors name the offending field; nothing is
    /// silently dropped or silently accepted.
    pub fn validate(&self, raw: RawEvent) -> Result<AuditEvent, LedgerError> {
        let event_type_str = raw
            .event_type
            .ok_or_else(|| LedgerError::validation("event_type", "missing"))?;
        let event_type = EventType::parse(&event_type_str).ok_or_else(|| {
            LedgerError::validation(
                "event_type",
                format!("unknown event type '{}'", event_type_str),
            )
        })?;

        let service_name = non_empty("service_name", raw.service_name)?;
        let action = non_empty("action", raw.action)?;
        let resource_type = raw
            .resource_type
            .ok_or_else(|| LedgerError::validation("resource_type", "missing"))?;

        let severity = match raw.severity {
            Some(s) => Severity::parse(&s).ok_or_else(|| {
                LedgerError::validation("severity", format!("unknown severity '{}'", s))
            })?,
            None => Severity::Medium,
        };

        let id = match raw.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };

        // Stamp the compliance ruleset tag so callers can confirm which
        // ruleset version recorded the event.
        let mut metadata = raw.metadata;
        metadata
            .entry("constitutional_hash".to_string())
            .or_insert_with(|| MetadataValue::from(CONSTITUTIONAL_HASH));

        let mut event = AuditEvent {
            id,
            event_type,
            service_name,
            action,
            resource_type,
            description: raw.description.unwrap_or_default(),
            severity,
            metadata,
            timestamp: self.next_timestamp(),
            content_hash: String::new(),
        };
        event.content_hash = event.calculate_hash();

        debug!(event_id = %event.id, event_type = %event.event_type, "Validated audit event");
        Ok(event)
    }

    /// Return `now`, clamped so it never moves before the previously
    /// assigned timestamp.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self
            .last_timestamp
            .lock()
            .expect("validator clock lock poisoned");
        let now = Utc::now();
        let ts = match *last {
            Some(prev) if now < prev => prev,
            _ => now,
        };
        *last = Some(ts);
        ts
    }
}

impl Default for EventValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(field: &str, value: Option<String>) -> Result<String, LedgerError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(LedgerError::validation(field, "must not be empty")),
        None => Err(LedgerError::validation(field, "missing")),
    }
}
