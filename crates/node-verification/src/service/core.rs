use crate::config::VerificationConfig;
use crate::domain::chain_params::ChainParameterResolver;
use crate::domain::entities::{
    NodeRecord, ProofEnvelope, VerificationChallenge, VerificationMethod, VerificationOutcome,
};
use crate::domain::errors::{ChainParamsError, LifecycleError, VerificationError};
use crate::domain::message_sign::MessageSignatureVerifier;
use crate::ports::outbound::{
    ChallengeStore, DnsResolver, NodeRegistry, PeerObservationSource, TimeSource,
};
use crate::verifiers::{
    DirectChallengeVerifier, DomainOwnershipVerifier, PortCheckVerifier, UserAgentVerifier,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Outbound collaborators the service is wired to.
#[derive(Clone)]
pub struct ServicePorts {
    pub store: Arc<dyn ChallengeStore>,
    pub registry: Arc<dyn NodeRegistry>,
    pub dns: Arc<dyn DnsResolver>,
    pub observations: Arc<dyn PeerObservationSource>,
    pub clock: Arc<dyn TimeSource>,
}

/// Errors raised while assembling the service.
#[derive(Debug, Error)]
pub enum ServiceBuildError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid chain parameters: {0}")]
    ChainParameters(#[from] ChainParamsError),

    #[error("Challenge TTL out of range")]
    TtlOutOfRange,
}

/// Node verification service implementing the driving port.
///
/// Owns one verifier per method and drives the challenge state machine
/// through the [`ChallengeStore`]. All state lives behind the ports, so the
/// service can be shared across request handlers in an `Arc`.
pub struct NodeVerificationService {
    pub(crate) store: Arc<dyn ChallengeStore>,
    pub(crate) registry: Arc<dyn NodeRegistry>,
    pub(crate) clock: Arc<dyn TimeSource>,
    pub(crate) message_sign: MessageSignatureVerifier,
    pub(crate) dns: DomainOwnershipVerifier,
    pub(crate) http_file: DirectChallengeVerifier,
    pub(crate) port_check: PortCheckVerifier,
    pub(crate) user_agent: UserAgentVerifier,
    pub(crate) ttl: chrono::Duration,
}

/// Proof after method-specific parsing.
pub(crate) enum ParsedProof {
    Signature(ProofEnvelope),
    Domain(String),
    /// Methods whose proof is ignored.
    Unused,
}

impl NodeVerificationService {
    /// Create the service.
    ///
    /// Resolves the active chain's signing parameters up front so a broken
    /// chain configuration fails here rather than on the first proof.
    pub fn new(config: &VerificationConfig, ports: ServicePorts) -> Result<Self, ServiceBuildError> {
        let resolver = Arc::new(ChainParameterResolver::new(config.chain.clone()));
        resolver.resolve(None, None)?;

        let ttl = chrono::Duration::from_std(config.challenge.ttl)
            .map_err(|_| ServiceBuildError::TtlOutOfRange)?;

        Ok(Self {
            store: ports.store,
            registry: ports.registry,
            clock: ports.clock,
            message_sign: MessageSignatureVerifier::new(resolver),
            dns: DomainOwnershipVerifier::new(ports.dns, config.dns.timeout),
            http_file: DirectChallengeVerifier::new(&config.http_file)?,
            port_check: PortCheckVerifier::new(&config.port_check),
            user_agent: UserAgentVerifier::new(ports.observations),
            ttl,
        })
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) async fn node(&self, node_id: &str) -> Result<NodeRecord, LifecycleError> {
        self.registry
            .lookup_node(node_id)
            .await?
            .ok_or_else(|| LifecycleError::NodeNotFound(node_id.to_string()))
    }

    /// Parse `proof` into the shape `method` expects.
    pub(crate) fn parse_proof(
        method: VerificationMethod,
        proof: &str,
    ) -> Result<ParsedProof, LifecycleError> {
        match method {
            VerificationMethod::MessageSign => ProofEnvelope::parse(proof)
                .map(ParsedProof::Signature)
                .map_err(|_| LifecycleError::MissingProofFormat),
            VerificationMethod::DnsTxt => {
                let domain = proof.trim();
                if domain.is_empty() {
                    Err(LifecycleError::MissingDomain)
                } else {
                    Ok(ParsedProof::Domain(domain.to_string()))
                }
            }
            VerificationMethod::HttpFile
            | VerificationMethod::PortCheck
            | VerificationMethod::UserAgent => Ok(ParsedProof::Unused),
        }
    }

    /// Run the verifier matching the challenge's method.
    pub(crate) async fn dispatch(
        &self,
        challenge: &VerificationChallenge,
        node: &NodeRecord,
        proof: ParsedProof,
    ) -> VerificationOutcome {
        let token = challenge.token.as_str();
        let node_ip = node.ip.to_string();

        match (challenge.method, proof) {
            (VerificationMethod::MessageSign, ParsedProof::Signature(envelope)) => {
                self.verify_signature(token, node, &envelope)
            }
            (VerificationMethod::DnsTxt, ParsedProof::Domain(domain)) => {
                self.dns.verify(&domain, token, &node_ip).await
            }
            (VerificationMethod::HttpFile, _) => self.http_file.verify(&node_ip, token).await,
            (VerificationMethod::PortCheck, _) => self.port_check.verify(&node_ip, token).await,
            (VerificationMethod::UserAgent, _) => self.user_agent.verify(&node_ip, token).await,
            // parse_proof always yields the matching shape
            (VerificationMethod::MessageSign, _) | (VerificationMethod::DnsTxt, _) => {
                VerificationOutcome::invalid(VerificationError::MissingProofFormat)
            }
        }
    }

    /// The token is the signed message; the signer must be the node's
    /// registered address when the registry knows one.
    fn verify_signature(
        &self,
        token: &str,
        node: &NodeRecord,
        envelope: &ProofEnvelope,
    ) -> VerificationOutcome {
        let outcome = self.message_sign.verify_for_chain(
            token,
            &envelope.address,
            &envelope.signature,
            node.chain.as_deref(),
        );
        if !outcome.valid {
            return outcome;
        }

        match &node.claimed_address {
            // A valid signature means the envelope address is the recovered one
            Some(claimed) if claimed != &envelope.address => {
                VerificationOutcome::invalid(VerificationError::AddressMismatch {
                    claimed: claimed.clone(),
                    recovered: envelope.address.clone(),
                })
            }
            _ => outcome,
        }
    }
}
