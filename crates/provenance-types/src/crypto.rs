//! secp256k1 byte extraction helpers.

use alloy_primitives::{keccak256, Address};

use crate::CodecError;

/// Length of an `r ‖ s ‖ v` signature.
pub const SIGNATURE_LEN: usize = 65;

/// Split a 65-byte signature into `r ‖ s` and a recovery id in `0..=1`.
/// Accepts `v` as 0/1 or 27/28.
pub fn signature_parts(signature: &[u8]) -> Result<([u8; 64], u8), CodecError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(CodecError::InvalidSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }
    let (rs, v) = signature.split_at(64);
    let recid = match v[0] {
        0 | 27 => 0,
        1 | 28 => 1,
        other => {
            return Err(CodecError::InvalidSignature(format!(
                "invalid recovery byte {other}"
            )))
        }
    };
    let rs: [u8; 64] = rs
        .try_into()
        .map_err(|_| CodecError::InvalidSignature("invalid r/s bytes".into()))?;
    Ok((rs, recid))
}

/// Join `r ‖ s` and a recovery id into the on-wire form (`v = 27 + recid`).
pub fn signature_bytes(rs: &[u8; 64], recid: u8) -> [u8; SIGNATURE_LEN] {
    let mut out = [0u8; SIGNATURE_LEN];
    out[..64].copy_from_slice(rs);
    out[64] = 27 + (recid & 1);
    out
}

/// Extract 64 raw public key bytes (`x ‖ y`).
/// Accepts 64-byte (raw) or 65-byte (`0x04` prefix + key) input.
pub fn uncompressed_key_bytes(pk_raw: &[u8]) -> Result<[u8; 64], CodecError> {
    let raw = match pk_raw {
        [0x04, rest @ ..] if rest.len() == 64 => rest,
        raw if raw.len() == 64 => raw,
        _ => {
            return Err(CodecError::InvalidSignature(
                "invalid uncompressed public key bytes".into(),
            ))
        }
    };
    raw.try_into()
        .map_err(|_| CodecError::InvalidSignature("invalid uncompressed public key bytes".into()))
}

/// Account address: low 20 bytes of `keccak256(x ‖ y)`.
pub fn address_from_key_bytes(key: &[u8; 64]) -> Address {
    Address::from_slice(&keccak256(key)[12..])
}
