//! DNS-over-HTTPS resolver speaking the JSON wire format
//! (`Accept: application/dns-json`), as served by Cloudflare and Google.

use crate::config::DnsConfig;
use crate::ports::outbound::{DnsError, DnsResolver, RecordType};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const DNS_JSON: &str = "application/dns-json";

/// RCODE 0.
const NOERROR: u32 = 0;
/// RCODE 3: the name does not exist, an empty answer rather than a failure.
const NXDOMAIN: u32 = 3;

/// Response body of a JSON DoH query.
#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// [`DnsResolver`] backed by a DoH JSON endpoint.
#[derive(Debug, Clone)]
pub struct DohResolver {
    client: Client,
    endpoint: String,
}

impl DohResolver {
    pub fn new(config: &DnsConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl DnsResolver for DohResolver {
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<Vec<String>, DnsError> {
        let type_name = record_type.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("name", name), ("type", type_name.as_str())])
            .header(ACCEPT, DNS_JSON)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DnsError::Failed(format!("resolver returned HTTP {status}")));
        }

        let body: DohResponse = response.json().await.map_err(map_transport)?;
        match body.status {
            NOERROR => {}
            NXDOMAIN => {
                debug!(name, %record_type, "NXDOMAIN");
                return Ok(Vec::new());
            }
            rcode => return Err(DnsError::Failed(format!("DNS RCODE {rcode}"))),
        }

        // The answer section also carries CNAME hops; keep only the requested type
        let records: Vec<String> = body
            .answer
            .into_iter()
            .filter(|answer| answer.record_type == record_type.code())
            .map(|answer| answer.data)
            .collect();

        debug!(name, %record_type, answers = records.len(), "DoH query answered");
        Ok(records)
    }
}

fn map_transport(error: reqwest::Error) -> DnsError {
    if error.is_timeout() {
        DnsError::Timeout
    } else {
        DnsError::Failed(error.to_string())
    }
}
