use super::*;
use crate::adapters::memory::{
    InMemoryChallengeStore, InMemoryNodeRegistry, StaticPeerObservations,
};
use crate::adapters::time::ManualTimeSource;
use crate::config::VerificationConfig;
use crate::domain::chain_params::ChainSigningParameters;
use crate::domain::entities::{
    ChallengeStatus, NodeRecord, VerificationChallenge, VerificationMethod,
};
use crate::domain::errors::LifecycleError;
use crate::domain::message_sign::signing::{address_of, sign_message};
use crate::ports::inbound::NodeVerificationApi;
use crate::ports::outbound::{ChallengeStore, DnsError, DnsResolver, RecordType, TimeSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use k256::ecdsa::SigningKey;
use std::sync::Arc;

const NODE_ID: &str = "node-1";
const NODE_IP: &str = "203.0.113.7";

/// Resolver whose answers can be filled in after a challenge is issued.
#[derive(Default)]
struct TestResolver {
    answers: DashMap<RecordType, Vec<String>>,
}

#[async_trait]
impl DnsResolver for TestResolver {
    async fn lookup(&self, _name: &str, record_type: RecordType) -> Result<Vec<String>, DnsError> {
        Ok(self
            .answers
            .get(&record_type)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

struct Harness {
    service: NodeVerificationService,
    store: Arc<InMemoryChallengeStore>,
    registry: Arc<InMemoryNodeRegistry>,
    resolver: Arc<TestResolver>,
    observations: Arc<StaticPeerObservations>,
    clock: Arc<ManualTimeSource>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryChallengeStore::new());
    let registry = Arc::new(InMemoryNodeRegistry::new());
    let resolver = Arc::new(TestResolver::default());
    let observations = Arc::new(StaticPeerObservations::new());
    let clock = Arc::new(ManualTimeSource::new(start()));

    registry.register(NodeRecord {
        node_id: NODE_ID.into(),
        ip: NODE_IP.parse().unwrap(),
        claimed_address: None,
        chain: None,
    });

    let ports = ServicePorts {
        store: store.clone(),
        registry: registry.clone(),
        dns: resolver.clone(),
        observations: observations.clone(),
        clock: clock.clone(),
    };
    let service = NodeVerificationService::new(&VerificationConfig::default(), ports).unwrap();

    Harness {
        service,
        store,
        registry,
        resolver,
        observations,
        clock,
    }
}

fn key(byte: u8) -> SigningKey {
    SigningKey::from_bytes((&[byte; 32][..]).into()).unwrap()
}

fn signed_proof(key: &SigningKey, token: &str) -> String {
    let params = ChainSigningParameters::bitcoin();
    let signature = sign_message(key, token, &params).unwrap();
    format!("{}:{}", address_of(key, &params), signature)
}

#[tokio::test]
async fn test_initiate_creates_pending_challenge() {
    let h = harness();
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::DnsTxt)
        .await
        .unwrap();

    assert_eq!(challenge.status, ChallengeStatus::Pending);
    assert_eq!(challenge.node_id, NODE_ID);
    assert!(challenge.token.starts_with("node-verify="));
    assert_eq!(challenge.created_at, start());
    assert_eq!(challenge.expires_at, start() + Duration::minutes(30));
    assert_eq!(h.store.get(&challenge.id).await.unwrap(), Some(challenge));
}

#[tokio::test]
async fn test_initiate_unknown_node() {
    let h = harness();
    let result = h
        .service
        .initiate_verification("node-404", "user-1", VerificationMethod::HttpFile)
        .await;
    assert!(matches!(result, Err(LifecycleError::NodeNotFound(id)) if id == "node-404"));
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_message_sign_lifecycle() {
    let h = harness();
    let key = key(7);
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::MessageSign)
        .await
        .unwrap();

    let outcome = h
        .service
        .complete_verification(&challenge.id, &signed_proof(&key, &challenge.token))
        .await
        .unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Verified);
    assert_eq!(outcome.error, None);

    let again = h
        .service
        .complete_verification(&challenge.id, &signed_proof(&key, &challenge.token))
        .await;
    assert!(matches!(again, Err(LifecycleError::AlreadyVerified)));
}

#[tokio::test]
async fn test_message_sign_requires_envelope() {
    let h = harness();
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::MessageSign)
        .await
        .unwrap();

    let result = h.service.complete_verification(&challenge.id, "no-colon-here").await;
    assert!(matches!(result, Err(LifecycleError::MissingProofFormat)));

    // A malformed envelope does not consume the challenge
    let stored = h.store.get(&challenge.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ChallengeStatus::Pending);
}

#[tokio::test]
async fn test_message_sign_must_match_registered_address() {
    let h = harness();
    let registered = key(1);
    let other = key(2);
    h.registry.register(NodeRecord {
        node_id: NODE_ID.into(),
        ip: NODE_IP.parse().unwrap(),
        claimed_address: Some(address_of(&registered, &ChainSigningParameters::bitcoin())),
        chain: Some("bitcoin".into()),
    });

    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::MessageSign)
        .await
        .unwrap();

    let outcome = h
        .service
        .complete_verification(&challenge.id, &signed_proof(&other, &challenge.token))
        .await
        .unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Failed);
    assert!(outcome.error.unwrap().starts_with("Address mismatch"));

    let again = h.service.complete_verification(&challenge.id, "x:y").await;
    assert!(matches!(again, Err(LifecycleError::VerificationFailed)));
}

#[tokio::test]
async fn test_signature_over_other_message_fails() {
    let h = harness();
    let key = key(3);
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::MessageSign)
        .await
        .unwrap();

    let outcome = h
        .service
        .complete_verification(&challenge.id, &signed_proof(&key, "node-verify:something-else"))
        .await
        .unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Failed);

    let stored = h.store.get(&challenge.id).await.unwrap().unwrap();
    assert!(stored.proof.is_some());
    assert!(stored.error_reason.is_some());
}

#[tokio::test]
async fn test_expired_challenge() {
    let h = harness();
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::UserAgent)
        .await
        .unwrap();
    h.observations
        .observe(NODE_IP.parse().unwrap(), format!("/Satoshi:26.0.0({})/", challenge.token));

    h.clock.advance(Duration::minutes(31));

    // Reads apply expiry without writing it
    let view = h.service.get_challenge(&challenge.id).await.unwrap();
    assert_eq!(view.status, ChallengeStatus::Expired);
    let stored = h.store.get(&challenge.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ChallengeStatus::Pending);

    let result = h.service.complete_verification(&challenge.id, "").await;
    assert!(matches!(result, Err(LifecycleError::VerificationExpired)));
    let stored = h.store.get(&challenge.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ChallengeStatus::Expired);

    let again = h.service.complete_verification(&challenge.id, "").await;
    assert!(matches!(again, Err(LifecycleError::VerificationExpired)));
}

#[tokio::test]
async fn test_exactly_at_expiry_is_still_pending() {
    let h = harness();
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::UserAgent)
        .await
        .unwrap();
    h.observations
        .observe(NODE_IP.parse().unwrap(), format!("/Satoshi:26.0.0({})/", challenge.token));

    h.clock.set(challenge.expires_at);
    let outcome = h.service.complete_verification(&challenge.id, "").await.unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Verified);
}

#[tokio::test]
async fn test_dns_txt_lifecycle() {
    let h = harness();
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::DnsTxt)
        .await
        .unwrap();

    let missing = h.service.complete_verification(&challenge.id, "  ").await;
    assert!(matches!(missing, Err(LifecycleError::MissingDomain)));

    h.resolver
        .answers
        .insert(RecordType::Txt, vec![format!("\"{}\"", challenge.token)]);
    h.resolver.answers.insert(RecordType::A, vec![NODE_IP.into()]);

    let outcome = h
        .service
        .complete_verification(&challenge.id, "node.example.com")
        .await
        .unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Verified);

    let stored = h.store.get(&challenge.id).await.unwrap().unwrap();
    assert_eq!(stored.proof.as_deref(), Some("node.example.com"));
}

#[tokio::test]
async fn test_dns_txt_wrong_ip_fails() {
    let h = harness();
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::DnsTxt)
        .await
        .unwrap();

    h.resolver.answers.insert(RecordType::Txt, vec![challenge.token.clone()]);
    h.resolver.answers.insert(RecordType::A, vec!["198.51.100.1".into()]);

    let outcome = h
        .service
        .complete_verification(&challenge.id, "node.example.com")
        .await
        .unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Failed);
    assert!(outcome.error.unwrap().contains("198.51.100.1"));
}

#[tokio::test]
async fn test_user_agent_not_observed_fails() {
    let h = harness();
    let challenge = h
        .service
        .initiate_verification(NODE_ID, "user-1", VerificationMethod::UserAgent)
        .await
        .unwrap();

    let outcome = h.service.complete_verification(&challenge.id, "").await.unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Failed);
}

#[tokio::test]
async fn test_malformed_stored_token_records_failure() {
    let h = harness();
    let now = h.clock.now();
    let challenge = VerificationChallenge {
        id: "corrupt".into(),
        node_id: NODE_ID.into(),
        user_id: "user-1".into(),
        method: VerificationMethod::PortCheck,
        token: "not-hex".into(),
        status: ChallengeStatus::Pending,
        created_at: now,
        expires_at: now + Duration::minutes(30),
        proof: None,
        error_reason: None,
    };
    h.store.insert(challenge).await.unwrap();

    let outcome = h.service.complete_verification("corrupt", "").await.unwrap();
    assert_eq!(outcome.status, ChallengeStatus::Failed);
    assert!(outcome.error.unwrap().starts_with("Malformed port_check challenge token"));
}

#[tokio::test]
async fn test_unknown_challenge() {
    let h = harness();
    assert!(matches!(
        h.service.complete_verification("missing", "x:y").await,
        Err(LifecycleError::VerificationNotFound(_))
    ));
    assert!(matches!(
        h.service.get_challenge("missing").await,
        Err(LifecycleError::VerificationNotFound(_))
    ));
}

#[test]
fn test_rejects_unusable_chain_config() {
    let mut config = VerificationConfig::default();
    config.chain.message_prefix = Some("x".repeat(300));

    let ports = ServicePorts {
        store: Arc::new(InMemoryChallengeStore::new()),
        registry: Arc::new(InMemoryNodeRegistry::new()),
        dns: Arc::new(TestResolver::default()),
        observations: Arc::new(StaticPeerObservations::new()),
        clock: Arc::new(ManualTimeSource::new(start())),
    };
    let result = NodeVerificationService::new(&config, ports);
    assert!(matches!(result, Err(ServiceBuildError::ChainParameters(_))));
}
