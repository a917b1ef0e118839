//! In-memory implementations of the persistence-side ports.
//!
//! Suitable for tests, the CLI and single-process deployments. The challenge
//! store performs its conditional update under the map's shard lock, which
//! makes `transition_from_pending` atomic per id.

use crate::domain::entities::{ChallengeStatus, NodeRecord, Transition, VerificationChallenge};
use crate::ports::outbound::{
    ChallengeStore, NodeRegistry, ObservationError, PeerObservationSource, RegistryError,
    StoreError,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::IpAddr;

// ============================================================================
// Challenge store
// ============================================================================

/// DashMap-backed [`ChallengeStore`].
#[derive(Debug, Default)]
pub struct InMemoryChallengeStore {
    challenges: DashMap<String, VerificationChallenge>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored challenges.
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn insert(&self, challenge: VerificationChallenge) -> Result<(), StoreError> {
        match self.challenges.entry(challenge.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(challenge.id)),
            Entry::Vacant(slot) => {
                slot.insert(challenge);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<VerificationChallenge>, StoreError> {
        Ok(self.challenges.get(id).map(|entry| entry.value().clone()))
    }

    async fn transition_from_pending(
        &self,
        id: &str,
        transition: Transition,
    ) -> Result<VerificationChallenge, StoreError> {
        let mut entry = self
            .challenges
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.status != ChallengeStatus::Pending {
            return Err(StoreError::NotPending {
                id: id.to_string(),
                current: Box::new(entry.clone()),
            });
        }

        entry.status = transition.status;
        entry.proof = transition.proof;
        entry.error_reason = transition.error_reason;
        Ok(entry.clone())
    }
}

// ============================================================================
// Node registry
// ============================================================================

/// Fixed set of known nodes.
#[derive(Debug, Default)]
pub struct InMemoryNodeRegistry {
    nodes: DashMap<String, NodeRecord>,
}

impl InMemoryNodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node.
    pub fn register(&self, node: NodeRecord) {
        self.nodes.insert(node.node_id.clone(), node);
    }
}

#[async_trait]
impl NodeRegistry for InMemoryNodeRegistry {
    async fn lookup_node(&self, node_id: &str) -> Result<Option<NodeRecord>, RegistryError> {
        Ok(self.nodes.get(node_id).map(|entry| entry.value().clone()))
    }
}

// ============================================================================
// Crawler observations
// ============================================================================

/// User agents recorded per IP, newest first.
#[derive(Debug, Default)]
pub struct StaticPeerObservations {
    agents: DashMap<IpAddr, Vec<String>>,
}

impl StaticPeerObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user agent seen at `ip`.
    pub fn observe(&self, ip: IpAddr, user_agent: impl Into<String>) {
        self.agents
            .entry(ip.to_canonical())
            .or_default()
            .insert(0, user_agent.into());
    }
}

#[async_trait]
impl PeerObservationSource for StaticPeerObservations {
    async fn observed_user_agents(&self, ip: IpAddr) -> Result<Vec<String>, ObservationError> {
        Ok(self
            .agents
            .get(&ip.to_canonical())
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}
