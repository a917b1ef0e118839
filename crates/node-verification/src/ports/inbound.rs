//! # Inbound Ports (Driving Ports / API)
//!
//! The operations the request-handling layer calls.

use crate::domain::entities::{CompletionOutcome, VerificationChallenge, VerificationMethod};
use crate::domain::errors::LifecycleError;
use async_trait::async_trait;

/// Primary node-verification API.
///
/// Implementations must be safe to call concurrently from request handlers
/// without additional locking.
#[async_trait]
pub trait NodeVerificationApi: Send + Sync {
    /// Create a pending challenge for `node_id` on behalf of `user_id`.
    async fn initiate_verification(
        &self,
        node_id: &str,
        user_id: &str,
        method: VerificationMethod,
    ) -> Result<VerificationChallenge, LifecycleError>;

    /// Submit a proof and record the terminal result.
    ///
    /// A verifier rejection is reported as `Ok` with `status = failed`;
    /// `Err` is reserved for lifecycle errors (missing, terminal, expired,
    /// malformed proof envelope).
    async fn complete_verification(
        &self,
        challenge_id: &str,
        proof: &str,
    ) -> Result<CompletionOutcome, LifecycleError>;

    /// Current view of a challenge.
    async fn get_challenge(&self, challenge_id: &str)
        -> Result<VerificationChallenge, LifecycleError>;
}
