//! # Domain Ownership Verification
//!
//! Proves both domain control (a TXT record carrying the challenge token) and
//! node control (the domain's A/AAAA records include the node IP). TXT
//! success alone is never accepted.

use crate::domain::entities::VerificationOutcome;
use crate::domain::errors::VerificationError;
use crate::ports::outbound::{DnsError, DnsResolver, RecordType};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// TXT + A/AAAA verifier.
#[derive(Clone)]
pub struct DomainOwnershipVerifier {
    resolver: Arc<dyn DnsResolver>,
    timeout: Duration,
}

impl DomainOwnershipVerifier {
    /// Create a verifier; every query is bounded by `timeout`.
    pub fn new(resolver: Arc<dyn DnsResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// Verify that `domain` publishes `challenge_token` and resolves to `node_ip`.
    pub async fn verify(
        &self,
        domain: &str,
        challenge_token: &str,
        node_ip: &str,
    ) -> VerificationOutcome {
        self.check(domain, challenge_token, node_ip).await.into()
    }

    async fn check(
        &self,
        domain: &str,
        challenge_token: &str,
        node_ip: &str,
    ) -> Result<(), VerificationError> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Err(VerificationError::MissingParameter("domain"));
        }
        if challenge_token.is_empty() {
            return Err(VerificationError::MissingParameter("challenge token"));
        }
        let expected: IpAddr = node_ip
            .trim()
            .parse()
            .map_err(|_| VerificationError::InvalidNodeIp(node_ip.to_string()))?;

        self.check_txt(&domain, challenge_token).await?;
        self.check_resolution(&domain, expected.to_canonical()).await
    }

    async fn check_txt(&self, domain: &str, token: &str) -> Result<(), VerificationError> {
        let records = self.query(domain, RecordType::Txt).await?;
        if records.is_empty() {
            return Err(VerificationError::NoTxtRecords(domain.to_string()));
        }

        if records.iter().any(|record| unquote_txt(record) == token) {
            debug!(domain, "Challenge token found in TXT records");
            Ok(())
        } else {
            debug!(domain, records = records.len(), "Challenge token absent from TXT records");
            Err(VerificationError::ChallengeNotFoundInTxt(domain.to_string()))
        }
    }

    async fn check_resolution(&self, domain: &str, expected: IpAddr) -> Result<(), VerificationError> {
        let (v4, v6) = tokio::join!(
            self.query(domain, RecordType::A),
            self.query(domain, RecordType::Aaaa)
        );

        let mut resolved = Vec::new();
        let mut failures = Vec::new();
        for (record_type, result) in [(RecordType::A, v4), (RecordType::Aaaa, v6)] {
            match result {
                Ok(records) => resolved.extend(parse_addresses(domain, record_type, &records)),
                Err(e) => {
                    warn!(domain, %record_type, error = %e, "Address query failed");
                    failures.push(e);
                }
            }
        }

        // Both queries failed: report the failure, preferring a timeout
        if failures.len() == 2 {
            let timed_out = failures.iter().position(VerificationError::is_timeout);
            return Err(failures.swap_remove(timed_out.unwrap_or(0)));
        }

        if resolved.is_empty() {
            return Err(VerificationError::NoIpResolved(domain.to_string()));
        }

        resolved.sort();
        resolved.dedup();

        if resolved.contains(&expected) {
            debug!(domain, node_ip = %expected, "Domain resolves to node");
            Ok(())
        } else {
            Err(VerificationError::IpMismatch {
                resolved,
                expected,
            })
        }
    }

    async fn query(
        &self,
        domain: &str,
        record_type: RecordType,
    ) -> Result<Vec<String>, VerificationError> {
        let timed_out = || VerificationError::DnsQueryTimedOut {
            domain: domain.to_string(),
            record_type: record_type.to_string(),
        };

        match tokio::time::timeout(self.timeout, self.resolver.lookup(domain, record_type)).await {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(DnsError::Timeout)) | Err(_) => Err(timed_out()),
            Ok(Err(DnsError::Failed(reason))) => Err(VerificationError::DnsQueryFailed {
                domain: domain.to_string(),
                reason,
            }),
        }
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Strip the surrounding quotes of TXT data, joining multi-string records.
fn unquote_txt(record: &str) -> String {
    let record = record.trim();
    match record
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.split("\" \"").collect(),
        None => record.to_string(),
    }
}

fn parse_addresses(domain: &str, record_type: RecordType, records: &[String]) -> Vec<IpAddr> {
    records
        .iter()
        .filter_map(|record| match record.trim().parse::<IpAddr>() {
            Ok(ip) => Some(ip.to_canonical()),
            Err(_) => {
                // CNAME targets show up in the answer section too
                debug!(domain, %record_type, record = %record, "Skipping non-address answer");
                None
            }
        })
        .collect()
}
