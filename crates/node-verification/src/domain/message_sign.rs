//! # Signed-Message Verification (secp256k1)
//!
//! Verifies Bitcoin-style compact signatures over a challenge string:
//!
//! 1. Rebuild the chain's magic hash of the message
//! 2. Recover the signer's public key from the 65-byte signature
//! 3. Re-derive a P2PKH address and compare it with the claimed one
//!
//! Header flags follow the wallet convention: `0..=3` uncompressed key,
//! `4..=7` compressed key, `8..=15` segwit addresses (not derivable here).
//!
//! All failures (bad base64, library errors, mismatches) are folded into the
//! returned [`VerificationOutcome`]; nothing is propagated to the caller.

use super::chain_params::{ChainParameterResolver, ChainSigningParameters};
use super::codec::{base58_check_encode, double_hash, encode_var_int, hash160, Hash256};
use super::entities::VerificationOutcome;
use super::errors::VerificationError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use std::sync::Arc;
use tracing::debug;

/// Compact signature length: header byte + r + s.
pub const COMPACT_SIGNATURE_LEN: usize = 65;

/// Header bytes start at 27; values above 27 + 15 are never produced.
const HEADER_BASE: u8 = 27;
const MAX_FLAG: u8 = 15;

/// Flags 4..=7 mark a compressed key, 8..=15 a segwit address type.
const FLAG_COMPRESSED: u8 = 4;
const FLAG_SEGWIT: u8 = 8;

// =============================================================================
// MESSAGE SIGNATURE VERIFIER
// =============================================================================

/// Verifies `address:signature` proofs against a chain's signing parameters.
#[derive(Debug, Clone)]
pub struct MessageSignatureVerifier {
    resolver: Arc<ChainParameterResolver>,
}

impl MessageSignatureVerifier {
    /// Create a verifier backed by a shared parameter resolver.
    pub fn new(resolver: Arc<ChainParameterResolver>) -> Self {
        Self { resolver }
    }

    /// Verify a signature, resolving parameters for the active chain when
    /// `params` is `None`.
    pub fn verify(
        &self,
        message: &str,
        claimed_address: &str,
        signature_base64: &str,
        params: Option<&ChainSigningParameters>,
    ) -> VerificationOutcome {
        match params {
            Some(params) => verify_message(message, claimed_address, signature_base64, params),
            None => self.verify_for_chain(message, claimed_address, signature_base64, None),
        }
    }

    /// Verify a signature using the parameters of `chain`.
    pub fn verify_for_chain(
        &self,
        message: &str,
        claimed_address: &str,
        signature_base64: &str,
        chain: Option<&str>,
    ) -> VerificationOutcome {
        if let Err(e) = check_inputs(message, claimed_address, signature_base64) {
            return VerificationOutcome::invalid(e);
        }

        match self.resolver.resolve(chain, None) {
            Ok(params) => verify_message(message, claimed_address, signature_base64, &params),
            Err(e) => VerificationOutcome::invalid(e.into()),
        }
    }
}

// =============================================================================
// CORE VERIFICATION FUNCTIONS
// =============================================================================

/// Verify `signature_base64` over `message` against `claimed_address`.
pub fn verify_message(
    message: &str,
    claimed_address: &str,
    signature_base64: &str,
    params: &ChainSigningParameters,
) -> VerificationOutcome {
    let result = check_inputs(message, claimed_address, signature_base64).and_then(|()| {
        if !claimed_address.starts_with(&params.address_prefix) {
            return Err(VerificationError::AddressPrefixMismatch {
                address: claimed_address.to_string(),
                expected: params.address_prefix.clone(),
            });
        }

        let recovered = recover_address(message, signature_base64, params)?;
        if recovered != claimed_address {
            debug!(claimed = claimed_address, recovered = %recovered, "Recovered address mismatch");
            return Err(VerificationError::AddressMismatch {
                claimed: claimed_address.to_string(),
                recovered,
            });
        }
        Ok(())
    });

    result.into()
}

/// Recover the P2PKH address that produced `signature_base64` over `message`.
pub fn recover_address(
    message: &str,
    signature_base64: &str,
    params: &ChainSigningParameters,
) -> Result<String, VerificationError> {
    let bytes = BASE64
        .decode(signature_base64.trim())
        .map_err(|e| VerificationError::InvalidSignatureEncoding(e.to_string()))?;

    if bytes.len() != COMPACT_SIGNATURE_LEN {
        return Err(VerificationError::InvalidSignatureLength(bytes.len()));
    }

    let flag = bytes[0]
        .checked_sub(HEADER_BASE)
        .filter(|flag| *flag <= MAX_FLAG)
        .ok_or(VerificationError::InvalidSignatureParameter(bytes[0]))?;

    if flag >= FLAG_SEGWIT {
        return Err(VerificationError::SegwitSignatureUnsupported(bytes[0]));
    }
    let compressed = flag >= FLAG_COMPRESSED;

    let recovery_id =
        RecoveryId::from_byte(flag & 3).ok_or(VerificationError::InvalidSignatureParameter(bytes[0]))?;

    let signature =
        Signature::from_slice(&bytes[1..]).map_err(|_| VerificationError::PublicKeyRecoveryFailed)?;

    let digest = magic_hash(message, params)?;

    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|_| VerificationError::PublicKeyRecoveryFailed)?;

    Ok(address_from_public_key(&key, compressed, params))
}

/// doubleHash(prefix || varint(len(message)) || message).
pub fn magic_hash(message: &str, params: &ChainSigningParameters) -> Result<Hash256, VerificationError> {
    let body = message.as_bytes();
    let len = encode_var_int(body.len() as u64)?;

    let mut preimage = Vec::with_capacity(params.message_prefix.len() + len.len() + body.len());
    preimage.extend_from_slice(&params.message_prefix);
    preimage.extend_from_slice(&len);
    preimage.extend_from_slice(body);

    Ok(double_hash(&preimage))
}

/// P2PKH address for `key` under `params`.
pub fn address_from_public_key(
    key: &VerifyingKey,
    compressed: bool,
    params: &ChainSigningParameters,
) -> String {
    let point = key.to_encoded_point(compressed);
    base58_check_encode(params.pub_key_hash_version, &hash160(point.as_bytes()))
}

fn check_inputs(
    message: &str,
    claimed_address: &str,
    signature_base64: &str,
) -> Result<(), VerificationError> {
    if message.is_empty() {
        return Err(VerificationError::MissingParameter("message"));
    }
    if claimed_address.is_empty() {
        return Err(VerificationError::MissingParameter("address"));
    }
    if signature_base64.trim().is_empty() {
        return Err(VerificationError::MissingParameter("signature"));
    }
    Ok(())
}

// =============================================================================
// TEST HELPERS
// =============================================================================

/// Signing side of the protocol, for producing proofs in tests and tooling.
pub mod signing {
    use super::*;
    use k256::ecdsa::SigningKey;

    /// Sign `message` the way wallets do for a compressed key.
    pub fn sign_message(
        key: &SigningKey,
        message: &str,
        params: &ChainSigningParameters,
    ) -> Result<String, VerificationError> {
        let digest = magic_hash(message, params)?;
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&digest)
            .map_err(|_| VerificationError::PublicKeyRecoveryFailed)?;

        let mut out = Vec::with_capacity(COMPACT_SIGNATURE_LEN);
        out.push(HEADER_BASE + FLAG_COMPRESSED + recovery_id.to_byte());
        out.extend_from_slice(&signature.to_bytes());
        Ok(BASE64.encode(out))
    }

    /// Address of the compressed public key of `key`.
    pub fn address_of(key: &SigningKey, params: &ChainSigningParameters) -> String {
        address_from_public_key(key.verifying_key(), true, params)
    }
}

#[cfg(test)]
mod tests {
    use super::signing::*;
    use super::*;
    use crate::config::ChainConfig;
    use k256::ecdsa::SigningKey;
    use proptest::prelude::*;

    const MESSAGE: &str = "node-verify:node-1:1700000000:0011223344556677";

    fn key(byte: u8) -> SigningKey {
        SigningKey::from_bytes((&[byte; 32][..]).into()).unwrap()
    }

    fn verifier() -> MessageSignatureVerifier {
        MessageSignatureVerifier::new(Arc::new(ChainParameterResolver::new(
            ChainConfig::default(),
        )))
    }

    #[test]
    fn test_generator_key_address() {
        // Private key 1 -> well-known compressed address
        let mut secret = [0u8; 32];
        secret[31] = 1;
        let key = SigningKey::from_bytes((&secret[..]).into()).unwrap();
        assert_eq!(
            address_of(&key, &ChainSigningParameters::bitcoin()),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn test_sign_then_verify_bitcoin() {
        let params = ChainSigningParameters::bitcoin();
        let key = key(0x11);
        let signature = sign_message(&key, MESSAGE, &params).unwrap();
        let address = address_of(&key, &params);

        let outcome = verify_message(MESSAGE, &address, &signature, &params);
        assert!(outcome.valid, "{:?}", outcome.error);
    }

    #[test]
    fn test_sign_then_verify_each_builtin_chain() {
        for params in [
            ChainSigningParameters::bitcoin(),
            ChainSigningParameters::dogecoin(),
            ChainSigningParameters::litecoin(),
        ] {
            let key = key(0x42);
            let signature = sign_message(&key, MESSAGE, &params).unwrap();
            let address = address_of(&key, &params);
            assert!(address.starts_with(&params.address_prefix));
            assert!(verify_message(MESSAGE, &address, &signature, &params).valid);
        }
    }

    #[test]
    fn test_verifier_resolves_active_chain() {
        let params = ChainSigningParameters::bitcoin();
        let key = key(0x07);
        let signature = sign_message(&key, MESSAGE, &params).unwrap();
        let address = address_of(&key, &params);

        let outcome = verifier().verify(MESSAGE, &address, &signature, None);
        assert!(outcome.valid, "{:?}", outcome.error);
    }

    #[test]
    fn test_parameters_must_match_signer() {
        // Signed under Dogecoin's prefix, checked under Bitcoin's
        let key = key(0x21);
        let signature = sign_message(&key, MESSAGE, &ChainSigningParameters::dogecoin()).unwrap();
        let params = ChainSigningParameters::bitcoin();
        let address = address_of(&key, &params);

        let outcome = verify_message(MESSAGE, &address, &signature, &params);
        assert!(!outcome.valid);
        assert_eq!(outcome.code(), Some("ADDRESS_MISMATCH"));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let params = ChainSigningParameters::bitcoin();
        let outcome = verify_message("", "1abc", "sig", &params);
        assert_eq!(
            outcome.error,
            Some(VerificationError::MissingParameter("message"))
        );
        let outcome = verify_message("m", "", "sig", &params);
        assert_eq!(
            outcome.error,
            Some(VerificationError::MissingParameter("address"))
        );
        let outcome = verify_message("m", "1abc", "", &params);
        assert_eq!(
            outcome.error,
            Some(VerificationError::MissingParameter("signature"))
        );
    }

    #[test]
    fn test_address_prefix_checked_before_decoding() {
        let outcome = verify_message(MESSAGE, "Dxyz", "!!!", &ChainSigningParameters::bitcoin());
        assert_eq!(outcome.code(), Some("ADDRESS_PREFIX_MISMATCH"));
    }

    #[test]
    fn test_malformed_signatures() {
        let params = ChainSigningParameters::bitcoin();

        let outcome = verify_message(MESSAGE, "1abc", "not base64!", &params);
        assert_eq!(outcome.code(), Some("INVALID_SIGNATURE_ENCODING"));

        let short = BASE64.encode([31u8; 64]);
        let outcome = verify_message(MESSAGE, "1abc", &short, &params);
        assert_eq!(
            outcome.error,
            Some(VerificationError::InvalidSignatureLength(64))
        );

        let mut bad_header = [1u8; 65];
        bad_header[0] = 26;
        let outcome = verify_message(MESSAGE, "1abc", &BASE64.encode(bad_header), &params);
        assert_eq!(
            outcome.error,
            Some(VerificationError::InvalidSignatureParameter(26))
        );

        bad_header[0] = 43;
        let outcome = verify_message(MESSAGE, "1abc", &BASE64.encode(bad_header), &params);
        assert_eq!(
            outcome.error,
            Some(VerificationError::InvalidSignatureParameter(43))
        );
    }

    #[test]
    fn test_header_selects_key_encoding() {
        let params = ChainSigningParameters::bitcoin();
        let key = key(0x33);
        let signature = sign_message(&key, MESSAGE, &params).unwrap();
        let mut raw = BASE64.decode(&signature).unwrap();

        // Same recovery id, uncompressed header: derives the uncompressed address
        raw[0] -= FLAG_COMPRESSED;
        let uncompressed = recover_address(MESSAGE, &BASE64.encode(&raw), &params).unwrap();
        assert_eq!(
            uncompressed,
            address_from_public_key(key.verifying_key(), false, &params)
        );
        assert_ne!(uncompressed, address_of(&key, &params));

        // Segwit header
        raw[0] += FLAG_SEGWIT;
        let outcome = verify_message(MESSAGE, &address_of(&key, &params), &BASE64.encode(&raw), &params);
        assert_eq!(outcome.code(), Some("SEGWIT_SIGNATURE_UNSUPPORTED"));
    }

    #[test]
    fn test_zero_signature_does_not_recover() {
        let mut sig = [0u8; 65];
        sig[0] = 31;
        let outcome = verify_message(
            MESSAGE,
            "1abc",
            &BASE64.encode(sig),
            &ChainSigningParameters::bitcoin(),
        );
        assert_eq!(
            outcome.error,
            Some(VerificationError::PublicKeyRecoveryFailed)
        );
    }

    #[test]
    fn test_magic_hash_uses_varint_length() {
        let params = ChainSigningParameters::bitcoin();
        let long = "a".repeat(300);
        let mut preimage = params.message_prefix.clone();
        preimage.extend_from_slice(&[0xfd, 0x2c, 0x01]);
        preimage.extend_from_slice(long.as_bytes());
        assert_eq!(magic_hash(&long, &params).unwrap(), double_hash(&preimage));
    }

    fn signing_key() -> impl Strategy<Value = SigningKey> {
        any::<[u8; 32]>().prop_filter_map("scalar out of range", |bytes| {
            SigningKey::from_bytes((&bytes[..]).into()).ok()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_signed_messages_verify(key in signing_key(), message in "[ -~]{1,200}") {
            let params = ChainSigningParameters::bitcoin();
            let signature = sign_message(&key, &message, &params).unwrap();
            let address = address_of(&key, &params);
            let outcome = verify_message(&message, &address, &signature, &params);
            prop_assert!(outcome.valid, "{:?}", outcome.error);
        }

        #[test]
        fn prop_single_byte_mutation_fails(
            key in signing_key(),
            index in 0usize..COMPACT_SIGNATURE_LEN,
            delta in 1u8..=255,
        ) {
            let params = ChainSigningParameters::bitcoin();
            let signature = sign_message(&key, MESSAGE, &params).unwrap();
            let mut raw = BASE64.decode(&signature).unwrap();
            raw[index] = raw[index].wrapping_add(delta);

            let address = address_of(&key, &params);
            let outcome = verify_message(MESSAGE, &address, &BASE64.encode(&raw), &params);
            prop_assert!(!outcome.valid);
            prop_assert!(outcome.error.is_some());
        }
    }
}
