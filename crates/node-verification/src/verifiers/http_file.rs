//! # Direct Challenge Verification
//!
//! Fetches `http://{node_ip}:{port}/.well-known/node-verify/{token}` from the
//! node itself. A correct response proves the operator can reach the node,
//! write to its filesystem and run a process bound to the port.

use crate::config::HttpFileConfig;
use crate::domain::entities::VerificationOutcome;
use crate::domain::errors::VerificationError;
use reqwest::{redirect, Client, Response};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

/// Path under which nodes serve challenge files.
pub const CHALLENGE_PATH: &str = "/.well-known/node-verify/";

/// Served bodies are `node-verify:{token}`.
const BODY_PREFIX: &str = "node-verify:";

/// HTTP challenge-file verifier.
#[derive(Debug, Clone)]
pub struct DirectChallengeVerifier {
    client: Client,
    port: u16,
    timeout: Duration,
    max_body_bytes: usize,
}

impl DirectChallengeVerifier {
    /// Create a verifier with its own HTTP client.
    pub fn new(config: &HttpFileConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            // The file must come from the node itself
            .redirect(redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            port: config.port,
            timeout: config.timeout,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// Challenge URL for `node_ip` and `token`.
    pub fn challenge_url(&self, node_ip: IpAddr, token: &str) -> String {
        format!(
            "http://{}{CHALLENGE_PATH}{token}",
            SocketAddr::new(node_ip, self.port)
        )
    }

    /// Body the node must serve for `token`.
    pub fn expected_body(token: &str) -> String {
        format!("{BODY_PREFIX}{token}")
    }

    /// Fetch the challenge file and compare its content.
    pub async fn verify(&self, node_ip: &str, challenge_token: &str) -> VerificationOutcome {
        self.check(node_ip, challenge_token).await.into()
    }

    async fn check(&self, node_ip: &str, token: &str) -> Result<(), VerificationError> {
        if token.is_empty() {
            return Err(VerificationError::MissingParameter("challenge token"));
        }
        let ip: IpAddr = node_ip
            .trim()
            .parse()
            .map_err(|_| VerificationError::InvalidNodeIp(node_ip.to_string()))?;

        let url = self.challenge_url(ip, token);
        let connection_failed = || VerificationError::ConnectionTimeout {
            target: SocketAddr::new(ip, self.port).to_string(),
            port: self.port,
        };

        debug!(url = %url, "Fetching challenge file");

        // Dropping the future on timeout abandons the connection
        let body = tokio::time::timeout(self.timeout, async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                debug!(url = %url, error = %e, "Challenge request failed");
                connection_failed()
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(VerificationError::HttpStatus(status.as_u16()));
            }

            self.read_body(response, token).await.map_err(|e| match e {
                BodyError::TooLarge => VerificationError::ContentMismatch {
                    expected: Self::expected_body(token),
                },
                BodyError::Transport(e) => {
                    debug!(url = %url, error = %e, "Challenge body read failed");
                    connection_failed()
                }
            })
        })
        .await
        .map_err(|_| connection_failed())??;

        let expected = Self::expected_body(token);
        if String::from_utf8_lossy(&body).trim() == expected {
            debug!(node_ip = %ip, "Challenge file verified");
            Ok(())
        } else {
            Err(VerificationError::ContentMismatch { expected })
        }
    }

    async fn read_body(&self, mut response: Response, token: &str) -> Result<Vec<u8>, BodyError> {
        // Expected body plus room for surrounding whitespace
        let limit = self
            .max_body_bytes
            .max(Self::expected_body(token).len() + 2);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(BodyError::Transport)? {
            if body.len() + chunk.len() > limit {
                return Err(BodyError::TooLarge);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

enum BodyError {
    TooLarge,
    Transport(reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_challenge_url_brackets_ipv6() {
        let verifier = DirectChallengeVerifier::new(&HttpFileConfig::default()).unwrap();
        assert_eq!(
            verifier.challenge_url("203.0.113.7".parse().unwrap(), "abc"),
            "http://203.0.113.7:8080/.well-known/node-verify/abc"
        );
        assert_eq!(
            verifier.challenge_url("2001:db8::1".parse().unwrap(), "abc"),
            "http://[2001:db8::1]:8080/.well-known/node-verify/abc"
        );
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let verifier = DirectChallengeVerifier::new(&HttpFileConfig::default()).unwrap();
        assert_eq!(
            verifier.verify("203.0.113.7", "").await.code(),
            Some("MISSING_PARAMETER")
        );
        assert_eq!(
            verifier.verify("not-an-ip", "abc").await.code(),
            Some("INVALID_NODE_IP")
        );
    }
}
