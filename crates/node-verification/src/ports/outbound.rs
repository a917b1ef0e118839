//! # Outbound Ports (Driven Ports / SPI)
//!
//! Traits for the external collaborators the engine depends on: challenge
//! persistence, the node registry, DNS, crawler observations and the clock.

use crate::domain::entities::{NodeRecord, Transition, VerificationChallenge};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

// =============================================================================
// Challenge persistence
// =============================================================================

/// Error from challenge persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with this id already exists.
    #[error("Challenge already exists: {0}")]
    Duplicate(String),

    /// No record with this id.
    #[error("Challenge not found: {0}")]
    NotFound(String),

    /// The conditional update lost: the record is no longer pending.
    #[error("Challenge {id} is no longer pending")]
    NotPending {
        id: String,
        current: Box<VerificationChallenge>,
    },

    /// Backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Storage for challenge records.
///
/// `transition_from_pending` must be atomic: of several concurrent calls for
/// the same id, exactly one may succeed.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    /// Persist a freshly created challenge.
    async fn insert(&self, challenge: VerificationChallenge) -> Result<(), StoreError>;

    /// Fetch a challenge by id.
    async fn get(&self, id: &str) -> Result<Option<VerificationChallenge>, StoreError>;

    /// Apply `transition` only if the record is still `pending`.
    ///
    /// # Errors
    /// * `StoreError::NotFound` - no record with this id
    /// * `StoreError::NotPending` - another writer completed it first
    async fn transition_from_pending(
        &self,
        id: &str,
        transition: Transition,
    ) -> Result<VerificationChallenge, StoreError>;
}

// =============================================================================
// Node registry
// =============================================================================

/// Error from the node registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Node registry unavailable: {0}")]
    Unavailable(String),
}

/// Lookup of crawler-discovered nodes.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// Find a node by id.
    async fn lookup_node(&self, node_id: &str) -> Result<Option<NodeRecord>, RegistryError>;
}

// =============================================================================
// DNS
// =============================================================================

/// DNS record types the engine queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Txt,
}

impl RecordType {
    /// Numeric RR type (RFC 1035 / RFC 3596).
    pub fn code(&self) -> u16 {
        match self {
            Self::A => 1,
            Self::Txt => 16,
            Self::Aaaa => 28,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Txt => "TXT",
        };
        f.write_str(s)
    }
}

/// Error from a DNS query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DnsError {
    /// The query did not complete before its deadline.
    #[error("DNS query timed out")]
    Timeout,

    /// Transport or protocol failure.
    #[error("DNS query failed: {0}")]
    Failed(String),
}

/// DNS resolution. An empty answer set is `Ok(vec![])`, not an error.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Return the record data of every answer of `record_type` for `name`.
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, DnsError>;
}

// =============================================================================
// Crawler observations
// =============================================================================

/// Error from the observation source.
#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("Observation source unavailable: {0}")]
    Unavailable(String),
}

/// User agents the P2P crawler observed per node IP.
#[async_trait]
pub trait PeerObservationSource: Send + Sync {
    /// User agents seen from `ip`, most recent first.
    async fn observed_user_agents(&self, ip: IpAddr) -> Result<Vec<String>, ObservationError>;
}

// =============================================================================
// Clock
// =============================================================================

/// Abstract time source so expiry can be tested deterministically.
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}
