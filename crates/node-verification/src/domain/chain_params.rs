//! # Chain Signing Parameters
//!
//! Resolves the `(message prefix, pubkey-hash version, address prefix)` triple
//! a chain uses for signed messages. The same triple must be used by the
//! signer and the verifier, so resolved values are cached for the lifetime of
//! the resolver and never mutated.

use super::errors::ChainParamsError;
use crate::config::ChainConfig;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

const BITCOIN: &str = "bitcoin";
const DOGECOIN: &str = "dogecoin";
const LITECOIN: &str = "litecoin";

/// Canonical name of a built-in chain given its name or ticker.
fn canonical_chain(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "bitcoin" | "btc" => Some(BITCOIN),
        "dogecoin" | "doge" => Some(DOGECOIN),
        "litecoin" | "ltc" => Some(LITECOIN),
        _ => None,
    }
}

/// Parameters needed to rebuild the magic hash and re-derive an address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChainSigningParameters {
    /// Domain-separation prefix, already length-prefixed.
    pub message_prefix: Vec<u8>,
    /// Version byte of P2PKH addresses.
    pub pub_key_hash_version: u8,
    /// Leading characters every valid address starts with.
    pub address_prefix: String,
}

impl ChainSigningParameters {
    fn builtin(prefix: &[u8], version: u8, address_prefix: &str) -> Self {
        Self {
            message_prefix: prefix.to_vec(),
            pub_key_hash_version: version,
            address_prefix: address_prefix.to_string(),
        }
    }

    /// Bitcoin mainnet.
    pub fn bitcoin() -> Self {
        Self::builtin(b"\x18Bitcoin Signed Message:\n", 0x00, "1")
    }

    /// Dogecoin mainnet.
    pub fn dogecoin() -> Self {
        Self::builtin(b"\x19Dogecoin Signed Message:\n", 0x1e, "D")
    }

    /// Litecoin mainnet.
    pub fn litecoin() -> Self {
        Self::builtin(b"\x19Litecoin Signed Message:\n", 0x30, "L")
    }

    /// Look up a built-in chain by name or ticker.
    pub fn for_known_chain(name: &str) -> Option<Self> {
        Self::builtin_by_canonical(canonical_chain(name)?)
    }

    fn builtin_by_canonical(canonical: &str) -> Option<Self> {
        match canonical {
            BITCOIN => Some(Self::bitcoin()),
            DOGECOIN => Some(Self::dogecoin()),
            LITECOIN => Some(Self::litecoin()),
            _ => None,
        }
    }

    fn apply(mut self, overrides: &ParameterOverrides) -> Self {
        if let Some(prefix) = &overrides.message_prefix {
            self.message_prefix = prefix.clone();
        }
        if let Some(version) = overrides.pub_key_hash_version {
            self.pub_key_hash_version = version;
        }
        if let Some(address_prefix) = &overrides.address_prefix {
            self.address_prefix = address_prefix.clone();
        }
        self
    }
}

/// Caller-supplied replacements for any subset of the triple.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ParameterOverrides {
    /// Used verbatim; must already carry its length byte.
    pub message_prefix: Option<Vec<u8>>,
    pub pub_key_hash_version: Option<u8>,
    pub address_prefix: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    /// Canonical built-in name, `None` for the active chain.
    chain: Option<&'static str>,
    overrides: Option<ParameterOverrides>,
}

/// Resolves and memoizes signing parameters per `(chain, overrides)`.
///
/// Construct once at startup and share by reference; lookups are lock-free
/// reads after the first resolution of each key.
#[derive(Debug)]
pub struct ChainParameterResolver {
    active: ChainConfig,
    cache: DashMap<CacheKey, Arc<ChainSigningParameters>>,
}

impl ChainParameterResolver {
    /// Create a resolver for the actively configured chain.
    pub fn new(active: ChainConfig) -> Self {
        Self {
            active,
            cache: DashMap::new(),
        }
    }

    /// The configured chain name.
    pub fn active_chain(&self) -> &str {
        &self.active.name
    }

    /// Resolve parameters for `target_chain` (the active chain when `None`).
    ///
    /// Unknown chains fall back to Bitcoin.
    pub fn resolve(
        &self,
        target_chain: Option<&str>,
        overrides: Option<&ParameterOverrides>,
    ) -> Result<Arc<ChainSigningParameters>, ChainParamsError> {
        // Keyed by canonical chain so arbitrary registry names share one entry
        let chain = match target_chain.map(str::trim) {
            None => None,
            Some(chain) if self.is_active(chain) => None,
            Some(chain) => Some(canonical_chain(chain).unwrap_or_else(|| {
                debug!(chain, "Unknown chain, falling back to Bitcoin parameters");
                BITCOIN
            })),
        };
        let key = CacheKey {
            chain,
            overrides: overrides.cloned(),
        };

        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let mut params = match key.chain.and_then(ChainSigningParameters::builtin_by_canonical) {
            Some(builtin) => builtin,
            None => self.from_active_config()?,
        };

        if let Some(overrides) = overrides {
            params = params.apply(overrides);
        }

        if params.address_prefix.is_empty() {
            return Err(ChainParamsError::EmptyAddressPrefix);
        }

        let entry = self.cache.entry(key).or_insert_with(|| Arc::new(params));
        Ok(Arc::clone(entry.value()))
    }

    fn is_active(&self, chain: &str) -> bool {
        self.active.name.trim().eq_ignore_ascii_case(chain)
    }

    fn from_active_config(&self) -> Result<ChainSigningParameters, ChainParamsError> {
        let prefix = match &self.active.message_prefix {
            Some(prefix) if self.active.message_prefix_length_prefixed => {
                prefix.as_bytes().to_vec()
            }
            Some(prefix) => length_prefixed(prefix.as_bytes())?,
            None => length_prefixed(format!("{} Signed Message:\n", self.active.name).as_bytes())?,
        };

        Ok(ChainSigningParameters {
            message_prefix: prefix,
            pub_key_hash_version: self.active.pub_key_hash_version,
            address_prefix: self.active.address_prefix.clone(),
        })
    }
}

fn length_prefixed(text: &[u8]) -> Result<Vec<u8>, ChainParamsError> {
    let len = u8::try_from(text.len()).map_err(|_| ChainParamsError::PrefixTooLong(text.len()))?;
    let mut out = Vec::with_capacity(text.len() + 1);
    out.push(len);
    out.extend_from_slice(text);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flux_config() -> ChainConfig {
        ChainConfig {
            name: "Flux".to_string(),
            message_prefix: None,
            message_prefix_length_prefixed: false,
            pub_key_hash_version: 0x1c,
            address_prefix: "t1".to_string(),
        }
    }

    #[test]
    fn test_active_chain_builds_length_prefixed_default() {
        let resolver = ChainParameterResolver::new(flux_config());
        let params = resolver.resolve(None, None).unwrap();

        let text = b"Flux Signed Message:\n";
        assert_eq!(params.message_prefix[0] as usize, text.len());
        assert_eq!(&params.message_prefix[1..], text);
        assert_eq!(params.pub_key_hash_version, 0x1c);
        assert_eq!(params.address_prefix, "t1");

        // Naming the active chain explicitly resolves the same triple
        let named = resolver.resolve(Some("flux"), None).unwrap();
        assert_eq!(*named, *params);
    }

    #[test]
    fn test_configured_prefix_flag() {
        let mut config = flux_config();
        config.message_prefix = Some("\u{0018}Bitcoin Signed Message:\n".to_string());
        config.message_prefix_length_prefixed = true;
        let resolver = ChainParameterResolver::new(config);
        let params = resolver.resolve(None, None).unwrap();
        assert_eq!(params.message_prefix, ChainSigningParameters::bitcoin().message_prefix);

        let mut plain = flux_config();
        plain.message_prefix = Some("Custom Signed Message:\n".to_string());
        let params = ChainParameterResolver::new(plain).resolve(None, None).unwrap();
        assert_eq!(params.message_prefix[0], 23);
    }

    #[test]
    fn test_builtin_fallbacks() {
        let resolver = ChainParameterResolver::new(flux_config());

        let doge = resolver.resolve(Some("Dogecoin"), None).unwrap();
        assert_eq!(*doge, ChainSigningParameters::dogecoin());

        let ltc = resolver.resolve(Some("ltc"), None).unwrap();
        assert_eq!(*ltc, ChainSigningParameters::litecoin());

        let unknown = resolver.resolve(Some("not-a-chain"), None).unwrap();
        assert_eq!(*unknown, ChainSigningParameters::bitcoin());
    }

    #[test]
    fn test_overrides_replace_subset() {
        let resolver = ChainParameterResolver::new(flux_config());
        let overrides = ParameterOverrides {
            address_prefix: Some("X".to_string()),
            ..Default::default()
        };
        let params = resolver.resolve(Some("bitcoin"), Some(&overrides)).unwrap();
        assert_eq!(params.address_prefix, "X");
        assert_eq!(params.pub_key_hash_version, 0x00);
        assert_eq!(params.message_prefix, ChainSigningParameters::bitcoin().message_prefix);
    }

    #[test]
    fn test_resolution_is_memoized() {
        let resolver = ChainParameterResolver::new(flux_config());
        let a = resolver.resolve(Some("bitcoin"), None).unwrap();
        let b = resolver.resolve(Some("BITCOIN"), None).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unknown_chains_share_the_bitcoin_entry() {
        let resolver = ChainParameterResolver::new(flux_config());
        let bitcoin = resolver.resolve(Some("btc"), None).unwrap();

        for i in 0..100 {
            let junk = resolver.resolve(Some(&format!("junk-{i}")), None).unwrap();
            assert!(Arc::ptr_eq(&junk, &bitcoin));
        }
        assert_eq!(resolver.cache.len(), 1);

        // Active chain by name and by default are one entry
        resolver.resolve(None, None).unwrap();
        resolver.resolve(Some(" FLUX "), None).unwrap();
        assert_eq!(resolver.cache.len(), 2);
    }

    #[test]
    fn test_prefix_too_long() {
        let mut config = flux_config();
        config.name = "x".repeat(300);
        let resolver = ChainParameterResolver::new(config);
        assert!(matches!(
            resolver.resolve(None, None),
            Err(ChainParamsError::PrefixTooLong(_))
        ));
    }
}
