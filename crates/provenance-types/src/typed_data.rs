//! Structured-message (typed data) hashing: domain separator, per-field
//! encoding, and the final signing digest.

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::AbiValue;

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// The verifier's domain. Must match its configuration exactly or every
/// signature is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Domain {
    pub fn separator(&self) -> B256 {
        let mut buf = Vec::with_capacity(32 * 5);
        buf.extend_from_slice(keccak256(DOMAIN_TYPE.as_bytes()).as_slice());
        buf.extend_from_slice(keccak256(self.name.as_bytes()).as_slice());
        buf.extend_from_slice(keccak256(self.version.as_bytes()).as_slice());
        buf.extend_from_slice(&U256::from(self.chain_id).to_be_bytes::<32>());
        buf.extend_from_slice(self.verifying_contract.into_word().as_slice());
        keccak256(&buf)
    }
}

/// Encode one field value for the struct hash.
///
/// Scalars are their ABI word; `string`/`bytes` are hashed; arrays hash the
/// concatenation of their encoded elements.
pub fn encode_field(value: &AbiValue) -> B256 {
    if let Some(word) = value.word() {
        return word;
    }
    match value {
        AbiValue::Bytes(raw) => keccak256(raw),
        AbiValue::String(s) => keccak256(s.as_bytes()),
        AbiValue::Array(items) | AbiValue::FixedArray(items) | AbiValue::Tuple(items) => {
            let mut buf = Vec::with_capacity(items.len() * 32);
            for item in items {
                buf.extend_from_slice(encode_field(item).as_slice());
            }
            keccak256(&buf)
        }
        _ => B256::ZERO,
    }
}

/// `keccak256(typeHash ‖ encode_field(v1) ‖ ...)`.
pub fn struct_hash(type_hash: B256, values: &[AbiValue]) -> B256 {
    let mut buf = Vec::with_capacity(32 * (values.len() + 1));
    buf.extend_from_slice(type_hash.as_slice());
    for value in values {
        buf.extend_from_slice(encode_field(value).as_slice());
    }
    keccak256(&buf)
}

/// Format: `keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)`.
pub fn signing_digest(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut message = Vec::with_capacity(2 + 64);
    message.extend_from_slice(&[0x19, 0x01]);
    message.extend_from_slice(domain_separator.as_slice());
    message.extend_from_slice(struct_hash.as_slice());
    keccak256(&message)
}
