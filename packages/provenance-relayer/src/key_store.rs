//! Signing-key persistence for relayer-held owner keys. AES-256-GCM sealed
//! in production, plaintext JSON for local development.

use alloy_primitives::Address;
use provenance_auth::LocalSigner;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Config, Error};

const NONCE_LEN: usize = 12;

enum Sealing {
    Plain,
    Aes256Gcm([u8; 32]),
}

pub struct KeyStore {
    path: PathBuf,
    sealing: Sealing,
}

#[derive(Serialize, Deserialize)]
struct StoredKeys {
    keys: Vec<StoredKey>,
}

#[derive(Serialize, Deserialize)]
struct StoredKey {
    address: Address,
    /// Hex secp256k1 scalar.
    secret_key: String,
}

impl KeyStore {
    pub fn new_plaintext(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sealing: Sealing::Plain,
        }
    }

    /// `key_b64` is a base64 32-byte AES key.
    pub fn new_encrypted(path: impl Into<PathBuf>, key_b64: &str) -> Result<Self, Error> {
        use base64::Engine;
        let raw = base64::engine::general_purpose::STANDARD
            .decode(key_b64.trim())
            .map_err(|e| Error::Config(format!("keys_encryption_key is not base64: {e}")))?;
        let key: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
            Error::Config(format!("keys_encryption_key must be 32 bytes, got {}", raw.len()))
        })?;
        Ok(Self {
            path: path.into(),
            sealing: Sealing::Aes256Gcm(key),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        match &config.keys_encryption_key {
            Some(key) => Self::new_encrypted(&config.keys_path, key),
            None => {
                warn!(path = %config.keys_path, "Key store is not encrypted");
                Ok(Self::new_plaintext(&config.keys_path))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, signers: &[LocalSigner]) -> Result<(), Error> {
        let stored = StoredKeys {
            keys: signers
                .iter()
                .map(|s| StoredKey {
                    address: s.address(),
                    secret_key: hex::encode(s.secret_bytes()),
                })
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| Error::Config(format!("key store serialization: {e}")))?;
        let bytes = self.seal(&json)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Config(format!("key store directory: {e}")))?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| Error::Config(format!("key store write: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Config(format!("key store rename: {e}")))?;

        info!(path = %self.path.display(), count = signers.len(), "Key store saved");
        Ok(())
    }

    /// Stored signers; empty when the file does not exist yet.
    pub fn load(&self) -> Result<Vec<LocalSigner>, Error> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No key store found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::Config(format!("key store read: {e}"))),
        };
        let json = self.open(&bytes)?;
        let stored: StoredKeys = serde_json::from_slice(&json)
            .map_err(|e| Error::Config(format!("key store parse: {e}")))?;

        let signers = stored
            .keys
            .into_iter()
            .map(|k| {
                let signer = LocalSigner::from_hex(&k.secret_key)?;
                if signer.address() != k.address {
                    return Err(Error::Config(format!(
                        "stored key for {} derives {}",
                        k.address,
                        signer.address()
                    )));
                }
                Ok(signer)
            })
            .collect::<Result<Vec<_>, Error>>()?;
        info!(path = %self.path.display(), count = signers.len(), "Key store loaded");
        Ok(signers)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.sealing {
            Sealing::Plain => Ok(plaintext.to_vec()),
            Sealing::Aes256Gcm(key) => encrypt(key, plaintext),
        }
    }

    fn open(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match &self.sealing {
            Sealing::Plain => Ok(data.to_vec()),
            Sealing::Aes256Gcm(key) => decrypt(key, data),
        }
    }
}

/// `nonce || ciphertext`, fresh random nonce per write.
fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};
    use rand::RngCore;

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Config(format!("cipher init: {e}")))?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| Error::Config(format!("key store encryption: {e}")))?;

    let mut out = nonce.to_vec();
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn decrypt(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};

    if data.len() < NONCE_LEN {
        return Err(Error::Config("sealed key store shorter than its nonce".into()));
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::Config(format!("cipher init: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|e| Error::Config(format!("key store decryption (wrong key?): {e}")))
}
