//! # Port Check Verification
//!
//! Connects to the node's port-check port and expects the challenge token as
//! the first line of whatever the listener writes.

use crate::config::PortCheckConfig;
use crate::domain::entities::VerificationOutcome;
use crate::domain::errors::VerificationError;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Longest first line read from the node.
pub const MAX_LINE_BYTES: u64 = 256;

/// TCP token verifier.
#[derive(Debug, Clone)]
pub struct PortCheckVerifier {
    port: u16,
    timeout: Duration,
}

impl PortCheckVerifier {
    pub fn new(config: &PortCheckConfig) -> Self {
        Self {
            port: config.port,
            timeout: config.timeout,
        }
    }

    /// Connect to the node and compare the first served line with the token.
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
        let addr = SocketAddr::new(ip, self.port);
        let connection_failed = || VerificationError::ConnectionTimeout {
            target: addr.to_string(),
            port: self.port,
        };

        let line = tokio::time::timeout(self.timeout, read_first_line(addr))
            .await
            .map_err(|_| connection_failed())?
            .map_err(|e| {
                debug!(%addr, error = %e, "Port check connection failed");
                connection_failed()
            })?;

        if line.trim() == token {
            debug!(%addr, "Port check token verified");
            Ok(())
        } else {
            Err(VerificationError::ContentMismatch {
                expected: token.to_string(),
            })
        }
    }
}

async fn read_first_line(addr: SocketAddr) -> std::io::Result<String> {
    let stream = TcpStream::connect(addr).await?;
    let mut reader = BufReader::new(stream.take(MAX_LINE_BYTES));
    let mut raw = Vec::new();
    reader.read_until(b'\n', &mut raw).await?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
