//! Signature collection: signs an encoded request with local keys.

use alloy_primitives::Bytes;
use provenance_types::{Domain, EncodedRequest};

use crate::auth_types::{SignatureEntry, SignatureSet};
use crate::{AuthError, LocalSigner};

/// Sign `request`'s digest under `domain` with every key in `signers`.
///
/// The set comes back in ascending signer order, the order threshold
/// verification expects. Signing is deterministic (RFC 6979), so re-signing
/// the same request with the same key yields the same bytes.
pub fn sign_request(
    request: &EncodedRequest,
    domain: &Domain,
    signers: &[LocalSigner],
) -> Result<SignatureSet, AuthError> {
    if signers.is_empty() {
        return Err(AuthError::NoSignersProvided);
    }
    let digest = request.digest(domain);
    let entries = signers
        .iter()
        .map(|signer| {
            Ok(SignatureEntry {
                signer: signer.address(),
                signature: Bytes::copy_from_slice(&signer.sign_digest(digest)?),
            })
        })
        .collect::<Result<Vec<_>, AuthError>>()?;
    Ok(SignatureSet::new(entries))
}
