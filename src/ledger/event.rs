//! Audit Event Types
//!
//! Defines the audit event record, its closed metadata value set, and the
//! canonical serialization used for content hashing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Category of a recorded audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ConstitutionalValidation,
    CryptographicOperation,
    GovernanceDecision,
    PolicyEnforcement,
    EmergencyAction,
    AccessControl,
}

impl EventType {
    /// Parse a wire-format event type string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONSTITUTIONAL_VALIDATION" => Some(Self::ConstitutionalValidation),
            "CRYPTOGRAPHIC_OPERATION" => Some(Self::CryptographicOperation),
            "GOVERNANCE_DECISION" => Some(Self::GovernanceDecision),
            "POLICY_ENFORCEMENT" => Some(Self::PolicyEnforcement),
            "EMERGENCY_ACTION" => Some(Self::EmergencyAction),
            "ACCESS_CONTROL" => Some(Self::AccessControl),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConstitutionalValidation => "CONSTITUTIONAL_VALIDATION",
            Self::CryptographicOperation => "CRYPTOGRAPHIC_OPERATION",
            Self::GovernanceDecision => "GOVERNANCE_DECISION",
            Self::PolicyEnforcement => "POLICY_ENFORCEMENT",
            Self::EmergencyAction => "EMERGENCY_ACTION",
            Self::AccessControl => "ACCESS_CONTROL",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an audit event. CRITICAL triggers an emergency seal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of metadata values. Maps use `BTreeMap` so keys are always
/// sorted, which the canonical serialization relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Map(BTreeMap<String, MetadataValue>),
}

impl MetadataValue {
    /// Deterministic encoding of a single value for hashing.
    fn canonical(&self) -> String {
        match self {
            Self::String(s) => format!("s:{}", s),
            Self::Integer(i) => format!("i:{}", i),
            Self::Float(x) => format!("f:{}", x),
            Self::Bool(b) => format!("b:{}", b),
            Self::Map(m) => format!("m:{{{}}}", canonical_metadata(m)),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Serialize a metadata map to its canonical string form.
///
/// Keys come out sorted (BTreeMap iteration order) and values use a fixed
/// per-type encoding, so two semantically identical maps always serialize
/// identically. Changing this format is a breaking change to the ledger
/// format: every stored content hash depends on it.
pub fn canonical_metadata(metadata: &BTreeMap<String, MetadataValue>) -> String {
    metadata
        .iter()
        .map(|(k, v)| format!("{}={}", k, v.canonical()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Raw, unvalidated ingestion payload as submitted by calling services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    /// Optional caller-supplied id; the validator assigns one when absent.
    pub id: Option<String>,
    pub event_type: Option<String>,
    pub service_name: Option<String>,
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub description: Option<String>,
    pub severity: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, MetadataValue>,
}

/// A validated audit event with a content hash over its canonical form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub event_type: EventType,
    pub service_name: String,
    pub action: String,
    pub resource_type: String,
    pub description: String,
    pub severity: Severity,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub timestamp: DateTime<Utc>,
    pub content_hash: String,
}

impl AuditEvent {
    /// Canonical string representation for hashing.
    ///
    /// Fields appear in a fixed, documented order; `content_hash` itself is
    /// never part of the canonical form. Any change to this layout is a
    /// versioned change to the ledger format.
    pub fn canonical_string(&self) -> String {
        format!(
            "id:{}|event_type:{}|service_name:{}|action:{}|resource_type:{}|description:{}|severity:{}|metadata:{}|timestamp:{}",
            self.id,
            self.event_type,
            self.service_name,
            self.action,
            self.resource_type,
            self.description,
            self.severity,
            canonical_metadata(&self.metadata),
            self.timestamp.to_rfc3339(),
        )
    }

    /// Compute the SHA-256 content hash of this event.
    pub fn calculate_hash(&self) -> String {
        sha256_hex(self.canonical_string().as_bytes())
    }

    /// True when the stored content hash matches recomputation.
    pub fn verify_hash(&self) -> bool {
        self.content_hash == self.calculate_hash()
    }
}

/// SHA-256 digest rendered as `sha256:<64 hex chars>`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
