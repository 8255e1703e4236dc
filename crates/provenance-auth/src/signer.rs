//! Local secp256k1 signing keys.

use alloy_primitives::{Address, B256};
use k256::ecdsa::SigningKey;
use provenance_types::{address_from_key_bytes, signature_bytes, uncompressed_key_bytes};

use crate::AuthError;

/// An in-process signing key and the account address it controls.
#[derive(Clone)]
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    pub fn from_bytes(secret: &[u8]) -> Result<Self, AuthError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Self::from_signing_key(key)
    }

    /// Accepts `0x`-prefixed or bare hex.
    pub fn from_hex(secret: &str) -> Result<Self, AuthError> {
        let raw = secret.strip_prefix("0x").unwrap_or(secret);
        let bytes = hex::decode(raw).map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    pub fn random() -> Result<Self, AuthError> {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    fn from_signing_key(key: SigningKey) -> Result<Self, AuthError> {
        let point = key.verifying_key().to_encoded_point(false);
        let raw = uncompressed_key_bytes(point.as_bytes())?;
        Ok(Self {
            address: address_from_key_bytes(&raw),
            key,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Raw 32-byte secret, for the key store.
    pub fn secret_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.key.to_bytes());
        out
    }

    /// Sign a 32-byte digest; returns `r ‖ s ‖ v` with `v = 27 + recid`.
    pub fn sign_digest(&self, digest: B256) -> Result<[u8; 65], AuthError> {
        let (signature, recid) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|_| AuthError::SignatureInvalid)?;
        let rs: [u8; 64] = signature
            .to_bytes()
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::SignatureInvalid)?;
        Ok(signature_bytes(&rs, recid.to_byte()))
    }
}
