//! # Challenge Tokens
//!
//! Method-specific token shapes. Tokens are validated before any verifier
//! runs so a corrupted record can never reach the network checks.

use super::entities::VerificationMethod;
use super::errors::VerificationError;
use rand::RngCore;

/// Prefix of tokens signed for message_sign.
pub const MESSAGE_SIGN_PREFIX: &str = "node-verify:";
/// Prefix of tokens advertised in the P2P user agent.
pub const USER_AGENT_PREFIX: &str = "NodeVerify:";
/// Prefix of tokens published as TXT records.
pub const DNS_TXT_PREFIX: &str = "node-verify=";
/// port_check tokens are exactly this many hex characters.
pub const PORT_CHECK_TOKEN_LEN: usize = 32;

/// Generate a fresh token for `method`.
pub fn generate(method: VerificationMethod, node_id: &str, unix_seconds: i64) -> String {
    match method {
        VerificationMethod::MessageSign => {
            format!("{MESSAGE_SIGN_PREFIX}{node_id}:{unix_seconds}:{}", random_hex(8))
        }
        VerificationMethod::UserAgent => format!("{USER_AGENT_PREFIX}{}", random_hex(8)),
        VerificationMethod::DnsTxt => format!("{DNS_TXT_PREFIX}{}", random_hex(16)),
        VerificationMethod::PortCheck | VerificationMethod::HttpFile => random_hex(16),
    }
}

/// Check that `token` has the shape `method` requires.
pub fn validate(method: VerificationMethod, token: &str) -> Result<(), VerificationError> {
    let malformed = |reason: &str| VerificationError::MalformedToken {
        method,
        reason: reason.to_string(),
    };

    match method {
        VerificationMethod::MessageSign if !token.starts_with(MESSAGE_SIGN_PREFIX) => {
            Err(malformed("must start with node-verify:"))
        }
        VerificationMethod::UserAgent if !token.starts_with(USER_AGENT_PREFIX) => {
            Err(malformed("must start with NodeVerify:"))
        }
        VerificationMethod::DnsTxt if !token.starts_with(DNS_TXT_PREFIX) => {
            Err(malformed("must start with node-verify="))
        }
        VerificationMethod::PortCheck
            if token.len() != PORT_CHECK_TOKEN_LEN
                || !token.bytes().all(|b| b.is_ascii_hexdigit()) =>
        {
            Err(malformed("must be exactly 32 hex characters"))
        }
        VerificationMethod::HttpFile if token.is_empty() => Err(malformed("must not be empty")),
        VerificationMethod::HttpFile
            if !token
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') =>
        {
            Err(malformed("must be URL-path safe"))
        }
        _ => Ok(()),
    }
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
