//! # Verification Errors
//!
//! Error types for every layer of the verification engine.
//!
//! Verifier failures are never raised as panics or propagated errors across a
//! verifier boundary: they are carried inside a [`VerificationOutcome`] so the
//! caller can show them to the operator.
//!
//! [`VerificationOutcome`]: super::entities::VerificationOutcome

use super::entities::{ChallengeStatus, VerificationMethod};
use std::net::IpAddr;
use thiserror::Error;

/// Errors from the binary primitives (varint, Base58Check).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Value does not fit in a 32-bit compact size.
    #[error("Value too large for varint encoding: {0}")]
    ValueTooLarge(u64),

    /// Input ended before the encoded value was complete.
    #[error("Truncated input: needed {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    /// Base58 text contained a character outside the Bitcoin alphabet.
    #[error("Invalid base58 encoding: {0}")]
    InvalidBase58(String),

    /// Base58Check payload shorter than version + checksum.
    #[error("Base58Check payload too short: {0} bytes")]
    PayloadTooShort(usize),

    /// Base58Check checksum did not match.
    #[error("Base58Check checksum mismatch")]
    ChecksumMismatch,
}

/// Errors from chain signing-parameter resolution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainParamsError {
    /// A plain-text prefix must fit behind a single length byte.
    #[error("Message prefix is {0} bytes; a single length byte holds at most 255")]
    PrefixTooLong(usize),

    /// The address prefix must not be empty.
    #[error("Address prefix must not be empty")]
    EmptyAddressPrefix,
}

/// Verifier failure taxonomy.
///
/// Every variant maps to a stable code via [`VerificationError::code`] so the
/// request layer can localise messages without parsing text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    // =========================================================================
    // Input errors
    // =========================================================================
    /// A required argument was empty.
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// The challenge token does not have the shape its method requires.
    #[error("Malformed {method} challenge token: {reason}")]
    MalformedToken {
        method: VerificationMethod,
        reason: String,
    },

    /// The node IP could not be parsed.
    #[error("Invalid node IP address: {0}")]
    InvalidNodeIp(String),

    /// The proof envelope could not be parsed.
    #[error("Proof must have the form address:signature")]
    MissingProofFormat,

    /// The claimed address does not carry the chain's address prefix.
    #[error("Address {address} does not start with expected prefix {expected}")]
    AddressPrefixMismatch { address: String, expected: String },

    /// Signing parameters could not be resolved.
    #[error("Chain parameters unavailable: {0}")]
    ChainParameters(#[from] ChainParamsError),

    // =========================================================================
    // Cryptographic errors
    // =========================================================================
    /// Signature is not valid base64.
    #[error("Signature is not valid base64: {0}")]
    InvalidSignatureEncoding(String),

    /// Compact signatures are exactly 65 bytes.
    #[error("Invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),

    /// Header byte outside 27..=42.
    #[error("Invalid signature parameter: header byte {0}")]
    InvalidSignatureParameter(u8),

    /// Header declares a segwit address, which is not derived from P2PKH params.
    #[error("Segwit signature header {0} is not supported; sign with a legacy address")]
    SegwitSignatureUnsupported(u8),

    /// No public key could be recovered from the signature.
    #[error("Public key recovery failed")]
    PublicKeyRecoveryFailed,

    /// The recovered address differs from the claimed one.
    #[error("Address mismatch: claimed {claimed}, recovered {recovered}")]
    AddressMismatch { claimed: String, recovered: String },

    /// Message hashing failed (message longer than a 32-bit varint).
    #[error("Message encoding failed: {0}")]
    Encoding(#[from] CodecError),

    // =========================================================================
    // Network errors
    // =========================================================================
    /// A DNS query did not answer within its deadline.
    #[error("DNS {record_type} query for {domain} timed out")]
    DnsQueryTimedOut { domain: String, record_type: String },

    /// A DNS query failed for a reason other than a timeout.
    #[error("DNS query for {domain} failed: {reason}")]
    DnsQueryFailed { domain: String, reason: String },

    /// The domain has no TXT records.
    #[error("No TXT records found for {0}")]
    NoTxtRecords(String),

    /// TXT records exist but none equals the challenge token.
    #[error("Challenge token not found in TXT records for {0}")]
    ChallengeNotFoundInTxt(String),

    /// Neither A nor AAAA resolved to any address.
    #[error("Domain {0} did not resolve to any IP address")]
    NoIpResolved(String),

    /// The domain resolves, but not to the node.
    #[error("Domain resolves to [{}], expected node IP {expected}", format_ips(.resolved))]
    IpMismatch {
        resolved: Vec<IpAddr>,
        expected: IpAddr,
    },

    /// The challenge endpoint answered with a non-2xx status.
    #[error("Challenge endpoint returned HTTP {0}")]
    HttpStatus(u16),

    /// The served content is not the expected challenge response.
    #[error("Challenge content mismatch: expected {expected:?}")]
    ContentMismatch { expected: String },

    /// The node could not be reached in time.
    #[error("Could not reach {target} within the timeout; the node must be listening on port {port}")]
    ConnectionTimeout { target: String, port: u16 },

    /// The crawler has not observed the node.
    #[error("No peer observations recorded for {0}")]
    NoPeerObservation(IpAddr),

    /// The node was observed, but without the challenge token.
    #[error("Observed user agents for {0} do not contain the challenge token")]
    UserAgentMismatch(IpAddr),

    /// The observation source could not be queried.
    #[error("Peer observations unavailable: {0}")]
    ObservationUnavailable(String),
}

impl VerificationError {
    /// Stable enumerated code for the request layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameter(_) => "MISSING_PARAMETER",
            Self::MalformedToken { .. } => "MALFORMED_TOKEN",
            Self::InvalidNodeIp(_) => "INVALID_NODE_IP",
            Self::MissingProofFormat => "MISSING_PROOF_FORMAT",
            Self::AddressPrefixMismatch { .. } => "ADDRESS_PREFIX_MISMATCH",
            Self::ChainParameters(_) => "CHAIN_PARAMETERS",
            Self::InvalidSignatureEncoding(_) => "INVALID_SIGNATURE_ENCODING",
            Self::InvalidSignatureLength(_) => "INVALID_SIGNATURE_LENGTH",
            Self::InvalidSignatureParameter(_) => "INVALID_SIGNATURE_PARAMETER",
            Self::SegwitSignatureUnsupported(_) => "SEGWIT_SIGNATURE_UNSUPPORTED",
            Self::PublicKeyRecoveryFailed => "PUBLIC_KEY_RECOVERY_FAILED",
            Self::AddressMismatch { .. } => "ADDRESS_MISMATCH",
            Self::Encoding(_) => "ENCODING",
            Self::DnsQueryTimedOut { .. } => "DNS_QUERY_TIMED_OUT",
            Self::DnsQueryFailed { .. } => "DNS_QUERY_FAILED",
            Self::NoTxtRecords(_) => "NO_TXT_RECORDS",
            Self::ChallengeNotFoundInTxt(_) => "CHALLENGE_NOT_FOUND_IN_TXT",
            Self::NoIpResolved(_) => "NO_IP_RESOLVED",
            Self::IpMismatch { .. } => "IP_MISMATCH",
            Self::HttpStatus(_) => "HTTP_STATUS",
            Self::ContentMismatch { .. } => "CONTENT_MISMATCH",
            Self::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            Self::NoPeerObservation(_) => "NO_PEER_OBSERVATION",
            Self::UserAgentMismatch(_) => "USER_AGENT_MISMATCH",
            Self::ObservationUnavailable(_) => "OBSERVATION_UNAVAILABLE",
        }
    }

    /// Whether the failure came from a deadline rather than a negative answer.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::DnsQueryTimedOut { .. } | Self::ConnectionTimeout { .. }
        )
    }
}

fn format_ips(ips: &[IpAddr]) -> String {
    ips.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from the challenge lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// No challenge with this id.
    #[error("Verification challenge not found: {0}")]
    VerificationNotFound(String),

    /// The node registry does not know the node.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The challenge already completed successfully.
    #[error("Challenge has already been verified")]
    AlreadyVerified,

    /// The challenge already completed unsuccessfully.
    #[error("Challenge verification already failed")]
    VerificationFailed,

    /// The challenge passed its expiry.
    #[error("Challenge has expired")]
    VerificationExpired,

    /// The proof for a message_sign challenge is not `address:signature`.
    #[error("Proof must have the form address:signature")]
    MissingProofFormat,

    /// The proof for a dns_txt challenge must name the domain.
    #[error("Proof must name the domain carrying the TXT record")]
    MissingDomain,

    /// Persistence failure.
    #[error("Challenge store error: {0}")]
    Store(#[from] crate::ports::outbound::StoreError),

    /// Registry failure.
    #[error("Node registry error: {0}")]
    Registry(#[from] crate::ports::outbound::RegistryError),
}

impl LifecycleError {
    /// Error observed by a caller that finds the challenge in `status`.
    ///
    /// Returns `None` for `Pending`, which is not terminal.
    pub fn for_terminal(status: ChallengeStatus) -> Option<Self> {
        match status {
            ChallengeStatus::Verified | ChallengeStatus::PendingApproval => {
                Some(Self::AlreadyVerified)
            }
            ChallengeStatus::Failed => Some(Self::VerificationFailed),
            ChallengeStatus::Expired => Some(Self::VerificationExpired),
            ChallengeStatus::Pending => None,
        }
    }
}
