//! Relay requests: payload resolution, struct hashing and the wire form the
//! relay contract receives.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::OperationType;
use crate::typed_data::{self, Domain};
use crate::{abi, AbiValue, CodecError, PrimitiveType};

/// Wire tuple `(bytes32 typeHash, address sender, uint256 nonce, bytes data)`.
pub const REQUEST_TUPLE: &str = "(bytes32,address,uint256,bytes)";

/// Single-key path: `executeEOA(request, signature)`.
pub fn execute_eoa_signature() -> String {
    format!("executeEOA({REQUEST_TUPLE},bytes)")
}

/// Threshold path: `executeLUW(request, signatures[])`.
pub fn execute_luw_signature() -> String {
    format!("executeLUW({REQUEST_TUPLE},bytes[])")
}

/// An unsigned relay request. Built per attempt; consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub operation_key: String,
    pub sender: Address,
    pub sequence_number: u64,
    pub payload: Map<String, Value>,
}

impl Request {
    /// Resolve payload values in field-list order. Rejects missing and extra keys.
    pub fn body_values(&self, op: &OperationType) -> Result<Vec<AbiValue>, CodecError> {
        let body = op.body_fields();
        if let Some(extra) = self
            .payload
            .keys()
            .find(|k| !body.iter().any(|f| &f.name == *k))
        {
            return Err(CodecError::UnexpectedField(extra.clone()));
        }
        body.iter()
            .map(|field| {
                let value = self
                    .payload
                    .get(&field.name)
                    .ok_or_else(|| CodecError::MissingField(field.name.clone()))?;
                AbiValue::from_json(&field.name, &field.ty, value)
            })
            .collect()
    }

    /// Encode against `op`, producing the opaque blob and the struct hash.
    pub fn encode(&self, op: &OperationType) -> Result<EncodedRequest, CodecError> {
        if op.key != self.operation_key {
            return Err(CodecError::value(
                "operationKey",
                format!("request is for '{}', not '{}'", self.operation_key, op.key),
            ));
        }
        let body = self.body_values(op)?;
        let data = abi::encode(&body);
        let type_hash = op.type_hash();
        let struct_hash = message_struct_hash(op, self.sender, self.sequence_number, &data, body);
        Ok(EncodedRequest {
            type_hash,
            sender: self.sender,
            nonce: self.sequence_number,
            data,
            struct_hash,
        })
    }
}

fn message_struct_hash(
    op: &OperationType,
    sender: Address,
    nonce: u64,
    data: &[u8],
    body: Vec<AbiValue>,
) -> B256 {
    let mut values = Vec::with_capacity(op.fields.len());
    values.push(AbiValue::Address(sender));
    values.push(AbiValue::uint(nonce));
    if op.has_opaque_payload() {
        values.push(AbiValue::Bytes(data.to_vec()));
    }
    values.extend(body);
    typed_data::struct_hash(op.type_hash(), &values)
}

/// A request encoded against its catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub type_hash: B256,
    pub sender: Address,
    pub nonce: u64,
    /// `abi.encode` of every non-header field in field-list order.
    pub data: Vec<u8>,
    pub struct_hash: B256,
}

impl EncodedRequest {
    pub fn digest(&self, domain: &Domain) -> B256 {
        typed_data::signing_digest(domain.separator(), self.struct_hash)
    }

    pub fn to_abi(&self) -> AbiValue {
        AbiValue::Tuple(vec![
            AbiValue::FixedBytes(self.type_hash),
            AbiValue::Address(self.sender),
            AbiValue::uint(self.nonce),
            AbiValue::Bytes(self.data.clone()),
        ])
    }
}

/// The request portion of a relay call as the verifier receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub type_hash: B256,
    pub sender: Address,
    pub nonce: U256,
    pub data: Vec<u8>,
}

impl WireRequest {
    /// Rebuild the struct hash the way the verifier does: decode the opaque
    /// blob with the entry's body types and hash every field.
    pub fn struct_hash(&self, op: &OperationType) -> Result<B256, CodecError> {
        if op.type_hash() != self.type_hash {
            return Err(CodecError::InvalidAbi("type hash does not match entry".into()));
        }
        let nonce = u64::try_from(self.nonce)
            .map_err(|_| CodecError::InvalidAbi("nonce exceeds u64".into()))?;
        let types: Vec<PrimitiveType> = op.body_fields().iter().map(|f| f.ty.clone()).collect();
        let body = abi::decode(&types, &self.data)?;
        Ok(message_struct_hash(op, self.sender, nonce, &self.data, body))
    }
}

/// Decoded `executeEOA` / `executeLUW` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCall {
    pub request: WireRequest,
    pub signatures: Vec<Vec<u8>>,
    pub threshold_path: bool,
}

impl RelayCall {
    pub fn decode(calldata: &[u8]) -> Result<Self, CodecError> {
        if calldata.len() < 4 {
            return Err(CodecError::InvalidAbi("calldata shorter than a selector".into()));
        }
        let (selector, args) = calldata.split_at(4);
        let threshold_path = if selector == abi::function_selector(&execute_eoa_signature()).as_slice()
        {
            false
        } else if selector == abi::function_selector(&execute_luw_signature()).as_slice() {
            true
        } else {
            return Err(CodecError::InvalidAbi("not a relay execution call".into()));
        };

        let base = abi::read_offset(args, 0)?;
        let head = [
            PrimitiveType::FixedBytes(32),
            PrimitiveType::Address,
            PrimitiveType::Uint(256),
        ];
        let mut fields = Vec::with_capacity(3);
        for (i, ty) in head.iter().enumerate() {
            fields.push(abi::decode_at(ty, args, offset_from(base, i * 32)?)?);
        }
        let data_offset = abi::read_offset(args, offset_from(base, 96)?)?;
        let data_at = offset_from(base, data_offset)?;
        let AbiValue::Bytes(data) = abi::decode_at(&PrimitiveType::Bytes, args, data_at)? else {
            return Err(CodecError::InvalidAbi("malformed request data".into()));
        };

        let request = match fields.as_slice() {
            [AbiValue::FixedBytes(type_hash), AbiValue::Address(sender), AbiValue::Uint(nonce)] => {
                WireRequest {
                    type_hash: *type_hash,
                    sender: *sender,
                    nonce: *nonce,
                    data,
                }
            }
            _ => return Err(CodecError::InvalidAbi("malformed request tuple".into())),
        };

        let sig_ty = if threshold_path {
            PrimitiveType::Array(Box::new(PrimitiveType::Bytes))
        } else {
            PrimitiveType::Bytes
        };
        let sig_offset = abi::read_offset(args, 32)?;
        let signatures = match abi::decode_at(&sig_ty, args, sig_offset)? {
            AbiValue::Bytes(b) => vec![b],
            AbiValue::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    AbiValue::Bytes(b) => Some(b),
                    _ => None,
                })
                .collect(),
            _ => return Err(CodecError::InvalidAbi("malformed signature argument".into())),
        };

        Ok(Self {
            request,
            signatures,
            threshold_path,
        })
    }
}

/// `base + relative` for offsets read out of calldata.
fn offset_from(base: usize, relative: usize) -> Result<usize, CodecError> {
    base.checked_add(relative)
        .ok_or_else(|| CodecError::InvalidAbi(format!("offset {relative} past {base} overflows")))
}
