//! # User Agent Verification
//!
//! The operator sets the `NodeVerify:` token in the node's P2P user agent;
//! the crawler records what it sees and this verifier looks it up.

use crate::domain::entities::VerificationOutcome;
use crate::domain::errors::VerificationError;
use crate::ports::outbound::PeerObservationSource;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

/// Crawler-observation verifier.
#[derive(Clone)]
pub struct UserAgentVerifier {
    observations: Arc<dyn PeerObservationSource>,
}

impl UserAgentVerifier {
    pub fn new(observations: Arc<dyn PeerObservationSource>) -> Self {
        Self { observations }
    }

    /// Valid when any user agent observed at `node_ip` contains the token.
    pub async fn verify(&self, node_ip: &str, challenge_token: &str) -> VerificationOutcome {
        self.check(node_ip, challenge_token).await.into()
    }

    async fn check(&self, node_ip: &str, token: &str) -> Result<(), VerificationError> {
        if token.is_empty() {
            return Err(VerificationError::MissingParameter("challenge token"));
        }
        let ip: IpAddr = node_ip
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| VerificationError::InvalidNodeIp(node_ip.to_string()))?
            .to_canonical();

        let agents = self
            .observations
            .observed_user_agents(ip)
            .await
            .map_err(|e| VerificationError::ObservationUnavailable(e.to_string()))?;

        if agents.is_empty() {
            return Err(VerificationError::NoPeerObservation(ip));
        }
        if agents.iter().any(|agent| agent.contains(token)) {
            debug!(node_ip = %ip, "Token found in observed user agent");
            Ok(())
        } else {
            debug!(node_ip = %ip, observed = agents.len(), "Token absent from observed user agents");
            Err(VerificationError::UserAgentMismatch(ip))
        }
    }
}
