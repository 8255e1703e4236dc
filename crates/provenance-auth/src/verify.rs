//! secp256k1 signer recovery over request digests.

use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use provenance_types::{address_from_key_bytes, signature_parts, uncompressed_key_bytes};

use crate::AuthError;

/// Recover the signing address of a 65-byte signature over `digest`.
pub fn recover_signer(digest: B256, signature: &[u8]) -> Result<Address, AuthError> {
    let (rs, recid) = signature_parts(signature)?;
    let sig = Signature::from_slice(&rs).map_err(|_| AuthError::SignatureInvalid)?;
    let recid = RecoveryId::from_byte(recid).ok_or(AuthError::SignatureInvalid)?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recid)
        .map_err(|_| AuthError::SignatureInvalid)?;
    let raw = uncompressed_key_bytes(key.to_encoded_point(false).as_bytes())?;
    Ok(address_from_key_bytes(&raw))
}

/// Check that `signature` over `digest` was made by `expected`.
pub fn verify_signature(
    digest: B256,
    signature: &[u8],
    expected: Address,
) -> Result<(), AuthError> {
    let recovered = recover_signer(digest, signature)?;
    if recovered != expected {
        return Err(AuthError::UnexpectedSigner {
            expected,
            recovered,
        });
    }
    Ok(())
}
