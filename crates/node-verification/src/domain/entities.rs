//! # Domain Entities
//!
//! Core data structures for node-ownership verification.

use super::errors::VerificationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

// =============================================================================
// Methods and statuses
// =============================================================================

/// Out-of-band challenge kinds an operator can complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    /// Sign the challenge token with the node's payout address key.
    MessageSign,
    /// Advertise the token in the node's P2P user agent.
    UserAgent,
    /// Serve the token on the port-check port.
    PortCheck,
    /// Publish the token as a DNS TXT record on a domain resolving to the node.
    DnsTxt,
    /// Serve a challenge file over HTTP from the node itself.
    HttpFile,
}

impl VerificationMethod {
    /// All supported methods.
    pub const ALL: [VerificationMethod; 5] = [
        Self::MessageSign,
        Self::UserAgent,
        Self::PortCheck,
        Self::DnsTxt,
        Self::HttpFile,
    ];

    /// Wire name (`message_sign`, `dns_txt`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageSign => "message_sign",
            Self::UserAgent => "user_agent",
            Self::PortCheck => "port_check",
            Self::DnsTxt => "dns_txt",
            Self::HttpFile => "http_file",
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown verification method: {s}"))
    }
}

/// Challenge status. Transitions only move forward out of `Pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Verified,
    Failed,
    Expired,
    /// Set by an external moderation gate; never written by this engine.
    PendingApproval,
}

impl ChallengeStatus {
    /// Whether the challenge can no longer be completed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::PendingApproval => "pending_approval",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Challenge record
// =============================================================================

/// Persisted challenge record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationChallenge {
    pub id: String,
    pub node_id: String,
    pub user_id: String,
    pub method: VerificationMethod,
    pub token: String,
    pub status: ChallengeStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub proof: Option<String>,
    pub error_reason: Option<String>,
}

impl VerificationChallenge {
    /// Whether `now` is past the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Terminal write applied to a pending challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    pub status: ChallengeStatus,
    pub proof: Option<String>,
    pub error_reason: Option<String>,
}

impl Transition {
    pub fn verified(proof: Option<String>) -> Self {
        Self {
            status: ChallengeStatus::Verified,
            proof,
            error_reason: None,
        }
    }

    pub fn failed(proof: Option<String>, error: &VerificationError) -> Self {
        Self {
            status: ChallengeStatus::Failed,
            proof,
            error_reason: Some(error.to_string()),
        }
    }

    pub fn expired(proof: Option<String>) -> Self {
        Self {
            status: ChallengeStatus::Expired,
            proof,
            error_reason: Some("challenge expired before completion".to_string()),
        }
    }
}

/// Result returned to the request layer by `complete_verification`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    pub status: ChallengeStatus,
    pub error: Option<String>,
}

impl From<&VerificationChallenge> for CompletionOutcome {
    fn from(challenge: &VerificationChallenge) -> Self {
        Self {
            status: challenge.status,
            error: challenge.error_reason.clone(),
        }
    }
}

// =============================================================================
// Proofs and node records
// =============================================================================

/// `address:signature` proof for message_sign challenges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofEnvelope {
    pub address: String,
    pub signature: String,
}

impl ProofEnvelope {
    /// Split at the first colon. Both halves must be non-empty.
    pub fn parse(proof: &str) -> Result<Self, VerificationError> {
        let (address, signature) = proof
            .trim()
            .split_once(':')
            .ok_or(VerificationError::MissingProofFormat)?;

        if address.is_empty() || signature.is_empty() {
            return Err(VerificationError::MissingProofFormat);
        }

        Ok(Self {
            address: address.to_string(),
            signature: signature.to_string(),
        })
    }
}

/// Node as known to the external registry (crawler data).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub ip: IpAddr,
    /// Payout/identity address the node advertises, if any.
    pub claimed_address: Option<String>,
    /// Chain the node belongs to; `None` means the configured chain.
    pub chain: Option<String>,
}

// =============================================================================
// Verifier results
// =============================================================================

/// Tagged result every verifier returns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub valid: bool,
    pub error: Option<VerificationError>,
}

impl VerificationOutcome {
    /// Create a successful outcome.
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// Create a failed outcome.
    pub fn invalid(error: VerificationError) -> Self {
        Self {
            valid: false,
            error: Some(error),
        }
    }

    /// Error code, if the outcome failed.
    pub fn code(&self) -> Option<&'static str> {
        self.error.as_ref().map(VerificationError::code)
    }
}

impl From<Result<(), VerificationError>> for VerificationOutcome {
    fn from(result: Result<(), VerificationError>) -> Self {
        match result {
            Ok(()) => Self::valid(),
            Err(e) => Self::invalid(e),
        }
    }
}
