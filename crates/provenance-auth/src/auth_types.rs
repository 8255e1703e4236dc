//! Shared signing types for the provenance relay protocol.

use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::AuthError;

/// Who must sign a request for an account.
///
/// - `SingleKey`: one externally-owned key; relayed via `executeEOA`.
/// - `Threshold`: multi-owner account; relayed via `executeLUW` with at
///   least `threshold` owner signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountPolicy {
    SingleKey,
    Threshold { owners: Vec<Address>, threshold: u64 },
}

/// Relay entry point chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPath {
    /// `executeEOA(request, signature)`.
    SingleKey,
    /// `executeLUW(request, signatures[])`.
    Threshold,
}

impl AccountPolicy {
    /// Pick the relay path, rejecting sets that cannot satisfy the policy.
    pub fn select_path(&self, signatures: &SignatureSet) -> Result<RelayPath, AuthError> {
        // A zero threshold never waives the signature requirement.
        if signatures.is_empty() {
            return Err(AuthError::NoSignersProvided);
        }
        match self {
            Self::SingleKey => {
                if signatures.len() != 1 {
                    return Err(AuthError::InvalidPath(format!(
                        "single-key account needs exactly 1 signature, got {}",
                        signatures.len()
                    )));
                }
                Ok(RelayPath::SingleKey)
            }
            Self::Threshold { owners, threshold } => {
                if (signatures.len() as u64) < *threshold {
                    return Err(AuthError::InvalidPath(format!(
                        "threshold account needs {threshold} signatures, got {}",
                        signatures.len()
                    )));
                }
                if let Some(stranger) = signatures
                    .signers()
                    .find(|signer| !owners.contains(signer))
                {
                    return Err(AuthError::InvalidPath(format!(
                        "{stranger} is not an owner"
                    )));
                }
                if !signatures.is_sorted() {
                    return Err(AuthError::InvalidPath(
                        "signatures must be in ascending signer order".into(),
                    ));
                }
                Ok(RelayPath::Threshold)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signer: Address,
    /// 65-byte `r ‖ s ‖ v`.
    pub signature: Bytes,
}

/// Ordered signatures over one request digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    entries: Vec<SignatureEntry>,
}

impl SignatureSet {
    /// Sorts ascending by signer address.
    pub fn new(mut entries: Vec<SignatureEntry>) -> Self {
        entries.sort_by_key(|e| e.signer);
        Self { entries }
    }

    pub fn entries(&self) -> &[SignatureEntry] {
        &self.entries
    }

    pub fn signers(&self) -> impl Iterator<Item = Address> + '_ {
        self.entries.iter().map(|e| e.signer)
    }

    pub fn signature_bytes(&self) -> Vec<Vec<u8>> {
        self.entries.iter().map(|e| e.signature.to_vec()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strictly ascending, so a signer never appears twice.
    pub fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].signer < w[1].signer)
    }
}
