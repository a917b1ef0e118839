//! # Node Ownership Verification Engine
//!
//! Lets an operator prove control of a blockchain P2P node by completing an
//! out-of-band challenge:
//!
//! | method | proof |
//! |---|---|
//! | `message_sign` | compact secp256k1 signature over the token (`address:signature`) |
//! | `dns_txt` | TXT record carrying the token on a domain that resolves to the node |
//! | `http_file` | `/.well-known/node-verify/{token}` served by the node |
//! | `port_check` | token served as the first line on the port-check port |
//! | `user_agent` | token advertised in the node's P2P user agent |
//!
//! ## Architecture
//!
//! Hexagonal, like the rest of the workspace:
//! - **Domain Layer:** binary primitives, chain parameters, signature recovery,
//!   tokens and the challenge model (no I/O)
//! - **Verifiers:** network checks (DNS, HTTP, TCP, crawler observations)
//! - **Ports Layer:** `NodeVerificationApi` inbound; store, registry, DNS,
//!   observations and clock outbound
//! - **Service Layer:** challenge lifecycle wiring verifiers to ports
//! - **Adapters Layer:** DNS-over-HTTPS, in-memory persistence, clocks
//!
//! ## Example
//!
//! ```rust
//! use node_verification::config::ChainConfig;
//! use node_verification::domain::chain_params::ChainParameterResolver;
//! use node_verification::domain::message_sign::MessageSignatureVerifier;
//! use std::sync::Arc;
//!
//! let resolver = Arc::new(ChainParameterResolver::new(ChainConfig::default()));
//! let verifier = MessageSignatureVerifier::new(resolver);
//!
//! let outcome = verifier.verify("node-verify:abc", "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH", "", None);
//! assert!(!outcome.valid);
//! assert_eq!(outcome.code(), Some("MISSING_PARAMETER"));
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod verifiers;

// Re-export main types
pub use config::{ConfigError, VerificationConfig};
pub use domain::chain_params::{ChainParameterResolver, ChainSigningParameters};
pub use domain::entities::{
    ChallengeStatus, CompletionOutcome, NodeRecord, VerificationChallenge, VerificationMethod,
    VerificationOutcome,
};
pub use domain::errors::{LifecycleError, VerificationError};
pub use domain::message_sign::MessageSignatureVerifier;
pub use ports::inbound::NodeVerificationApi;
pub use service::{NodeVerificationService, ServiceBuildError, ServicePorts};
