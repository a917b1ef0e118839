//! # Ownership Verifiers
//!
//! One verifier per verification method. Each returns a
//! [`VerificationOutcome`](crate::domain::entities::VerificationOutcome)
//! instead of an error; rejections are data, not failures.
//!
//! Message signatures live in [`crate::domain::message_sign`] since they do no I/O.

pub mod dns;
pub mod http_file;
pub mod port_check;
pub mod user_agent;

pub use dns::DomainOwnershipVerifier;
pub use http_file::DirectChallengeVerifier;
pub use port_check::PortCheckVerifier;
pub use user_agent::UserAgentVerifier;
