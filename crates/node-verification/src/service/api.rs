use super::core::NodeVerificationService;
use crate::domain::entities::{
    ChallengeStatus, CompletionOutcome, Transition, VerificationChallenge, VerificationMethod,
    VerificationOutcome,
};
use crate::domain::errors::LifecycleError;
use crate::domain::token;
use crate::ports::inbound::NodeVerificationApi;
use crate::ports::outbound::StoreError;
use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[async_trait]
impl NodeVerificationApi for NodeVerificationService {
    async fn initiate_verification(
        &self,
        node_id: &str,
        user_id: &str,
        method: VerificationMethod,
    ) -> Result<VerificationChallenge, LifecycleError> {
        let node = self.node(node_id).await?;
        let now = self.now();

        let challenge = VerificationChallenge {
            id: Uuid::new_v4().to_string(),
            node_id: node.node_id.clone(),
            user_id: user_id.to_string(),
            method,
            token: token::generate(method, &node.node_id, now.timestamp()),
            status: ChallengeStatus::Pending,
            created_at: now,
            expires_at: now + self.ttl,
            proof: None,
            error_reason: None,
        };
        self.store.insert(challenge.clone()).await?;

        info!(
            challenge_id = %challenge.id,
            node_id = %challenge.node_id,
            %method,
            expires_at = %challenge.expires_at,
            "Verification challenge created"
        );
        Ok(challenge)
    }

    async fn complete_verification(
        &self,
        challenge_id: &str,
        proof: &str,
    ) -> Result<CompletionOutcome, LifecycleError> {
        let challenge = self
            .store
            .get(challenge_id)
            .await?
            .ok_or_else(|| LifecycleError::VerificationNotFound(challenge_id.to_string()))?;

        if let Some(terminal) = LifecycleError::for_terminal(challenge.status) {
            debug!(challenge_id, status = %challenge.status, "Challenge already completed");
            return Err(terminal);
        }

        let recorded_proof = Some(proof.trim().to_string()).filter(|p| !p.is_empty());

        if challenge.is_expired_at(self.now()) {
            info!(challenge_id, node_id = %challenge.node_id, "Challenge expired before completion");
            self.write(challenge_id, Transition::expired(recorded_proof)).await?;
            return Err(LifecycleError::VerificationExpired);
        }

        let parsed = Self::parse_proof(challenge.method, proof)?;
        let node = self.node(&challenge.node_id).await?;

        let outcome = match token::validate(challenge.method, &challenge.token) {
            Ok(()) => self.dispatch(&challenge, &node, parsed).await,
            Err(e) => {
                warn!(challenge_id, method = %challenge.method, error = %e, "Stored token is malformed");
                VerificationOutcome::invalid(e)
            }
        };

        let transition = match &outcome.error {
            None => Transition::verified(recorded_proof),
            Some(error) => Transition::failed(recorded_proof, error),
        };
        let updated = self.write(challenge_id, transition).await?;

        match &outcome.error {
            None => info!(
                challenge_id,
                node_id = %updated.node_id,
                method = %updated.method,
                "Node ownership verified"
            ),
            Some(error) => info!(
                challenge_id,
                node_id = %updated.node_id,
                method = %updated.method,
                code = error.code(),
                error = %error,
                "Node ownership verification failed"
            ),
        }

        Ok(CompletionOutcome::from(&updated))
    }

    async fn get_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<VerificationChallenge, LifecycleError> {
        let mut challenge = self
            .store
            .get(challenge_id)
            .await?
            .ok_or_else(|| LifecycleError::VerificationNotFound(challenge_id.to_string()))?;

        // Expiry is applied to the view only; the next completion persists it
        if challenge.status == ChallengeStatus::Pending && challenge.is_expired_at(self.now()) {
            challenge.status = ChallengeStatus::Expired;
        }
        Ok(challenge)
    }
}

impl NodeVerificationService {
    /// Conditionally apply `transition`; a lost race surfaces the winner's
    /// terminal state.
    async fn write(
        &self,
        challenge_id: &str,
        transition: Transition,
    ) -> Result<VerificationChallenge, LifecycleError> {
        match self
            .store
            .transition_from_pending(challenge_id, transition)
            .await
        {
            Ok(updated) => Ok(updated),
            Err(StoreError::NotPending { current, .. }) => {
                debug!(challenge_id, status = %current.status, "Lost completion race");
                Err(LifecycleError::for_terminal(current.status)
                    .unwrap_or(LifecycleError::VerificationFailed))
            }
            Err(StoreError::NotFound(id)) => Err(LifecycleError::VerificationNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }
}
