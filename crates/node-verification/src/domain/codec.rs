//! # Binary Primitives
//!
//! Compact-size varints, double SHA-256, Hash160 and Base58Check as used by
//! Bitcoin-family signed messages and addresses.

use super::errors::CodecError;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// 32-byte digest.
pub type Hash256 = [u8; 32];

/// 20-byte RIPEMD-160 digest.
pub type Hash160 = [u8; 20];

const MARKER_U16: u8 = 0xfd;
const MARKER_U32: u8 = 0xfe;
const MARKER_U64: u8 = 0xff;

const CHECKSUM_LEN: usize = 4;

// =============================================================================
// VARINT
// =============================================================================

/// Encode `n` as a Bitcoin compact size.
///
/// Values above `u32::MAX` are rejected; message lengths never need them.
pub fn encode_var_int(n: u64) -> Result<Vec<u8>, CodecError> {
    if n < MARKER_U16 as u64 {
        Ok(vec![n as u8])
    } else if n <= u16::MAX as u64 {
        let mut out = Vec::with_capacity(3);
        out.push(MARKER_U16);
        out.extend_from_slice(&(n as u16).to_le_bytes());
        Ok(out)
    } else if n <= u32::MAX as u64 {
        let mut out = Vec::with_capacity(5);
        out.push(MARKER_U32);
        out.extend_from_slice(&(n as u32).to_le_bytes());
        Ok(out)
    } else {
        Err(CodecError::ValueTooLarge(n))
    }
}

/// Decode a compact size, returning the value and the bytes consumed.
pub fn decode_var_int(bytes: &[u8]) -> Result<(u64, usize), CodecError> {
    let first = *bytes.first().ok_or(CodecError::Truncated {
        needed: 1,
        actual: 0,
    })?;

    let width = match first {
        MARKER_U16 => 2,
        MARKER_U32 => 4,
        MARKER_U64 => return Err(CodecError::ValueTooLarge(u64::MAX)),
        n => return Ok((n as u64, 1)),
    };

    let body = bytes
        .get(1..1 + width)
        .ok_or(CodecError::Truncated {
            needed: 1 + width,
            actual: bytes.len(),
        })?;

    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(body);
    Ok((u64::from_le_bytes(buf), 1 + width))
}

// =============================================================================
// HASHING
// =============================================================================

/// SHA-256(SHA-256(data)).
pub fn double_hash(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// RIPEMD-160(SHA-256(data)).
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

// =============================================================================
// BASE58CHECK
// =============================================================================

/// Base58Check-encode `version || payload || checksum`.
///
/// Leading zero bytes (including a zero version) come out as leading `'1'`s.
pub fn base58_check_encode(version: u8, payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
    buf.push(version);
    buf.extend_from_slice(payload);
    let checksum = double_hash(&buf);
    buf.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(buf).into_string()
}

/// Decode Base58Check text into `(version, payload)`, verifying the checksum.
pub fn base58_check_decode(text: &str) -> Result<(u8, Vec<u8>), CodecError> {
    let buf = bs58::decode(text)
        .into_vec()
        .map_err(|e| CodecError::InvalidBase58(e.to_string()))?;

    if buf.len() < 1 + CHECKSUM_LEN {
        return Err(CodecError::PayloadTooShort(buf.len()));
    }

    let (body, checksum) = buf.split_at(buf.len() - CHECKSUM_LEN);
    if double_hash(body)[..CHECKSUM_LEN] != *checksum {
        return Err(CodecError::ChecksumMismatch);
    }

    Ok((body[0], body[1..].to_vec()))
}
