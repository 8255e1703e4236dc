//! Contract ABI encoding (head/tail layout) plus the few decoders the relayer
//! needs for view-call results and revert data.

use alloy_primitives::{keccak256, Address, Selector, B256, I256, U256};
use serde_json::Value;
use std::str::FromStr;

use crate::{CodecError, PrimitiveType};

/// `Error(string)` revert payload selector.
const REVERT_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// A typed ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    /// Left-aligned in a 32-byte word.
    FixedBytes(B256),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    FixedArray(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn uint(v: u64) -> Self {
        Self::Uint(U256::from(v))
    }

    pub fn selector(selector: Selector) -> Self {
        let mut word = B256::ZERO;
        word.0[..4].copy_from_slice(selector.as_slice());
        Self::FixedBytes(word)
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            Self::Bytes(_) | Self::String(_) | Self::Array(_) => true,
            Self::FixedArray(items) | Self::Tuple(items) => items.iter().any(Self::is_dynamic),
            _ => false,
        }
    }

    /// Bytes a static value occupies in the head.
    fn head_size(&self) -> usize {
        match self {
            Self::FixedArray(items) | Self::Tuple(items) if !self.is_dynamic() => {
                items.iter().map(Self::head_size).sum()
            }
            _ => 32,
        }
    }

    /// Coerce a JSON payload value into the given primitive type.
    ///
    /// Integers accept JSON numbers or decimal / `0x` strings; byte types
    /// accept `0x`-prefixed hex.
    pub fn from_json(field: &str, ty: &PrimitiveType, value: &Value) -> Result<Self, CodecError> {
        match ty {
            PrimitiveType::Address => {
                let s = value
                    .as_str()
                    .ok_or_else(|| CodecError::value(field, "expected hex address string"))?;
                Address::from_str(s)
                    .map(Self::Address)
                    .map_err(|e| CodecError::value(field, e.to_string()))
            }
            PrimitiveType::Bool => match value {
                Value::Bool(b) => Ok(Self::Bool(*b)),
                Value::String(s) if s == "true" || s == "false" => Ok(Self::Bool(s == "true")),
                _ => Err(CodecError::value(field, "expected boolean")),
            },
            PrimitiveType::Uint(bits) => {
                let v = match value {
                    Value::Number(n) => n
                        .as_u64()
                        .map(U256::from)
                        .ok_or_else(|| CodecError::value(field, "expected unsigned integer"))?,
                    Value::String(s) => {
                        U256::from_str(s).map_err(|e| CodecError::value(field, e.to_string()))?
                    }
                    _ => return Err(CodecError::value(field, "expected unsigned integer")),
                };
                if v.bit_len() > *bits {
                    return Err(CodecError::value(field, format!("does not fit in uint{bits}")));
                }
                Ok(Self::Uint(v))
            }
            PrimitiveType::Int(bits) => {
                let text = match value {
                    Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
                    Value::String(s) => s.clone(),
                    _ => return Err(CodecError::value(field, "expected signed integer")),
                };
                let v = I256::from_dec_str(&text)
                    .map_err(|e| CodecError::value(field, e.to_string()))?;
                if *bits < 256 {
                    let limit = U256::from(1u8) << (*bits - 1);
                    let abs = v.unsigned_abs();
                    let fits = if v.is_negative() { abs <= limit } else { abs < limit };
                    if !fits {
                        return Err(CodecError::value(field, format!("does not fit in int{bits}")));
                    }
                }
                Ok(Self::Int(v))
            }
            PrimitiveType::FixedBytes(size) => {
                let raw = json_hex(field, value)?;
                if raw.len() != *size {
                    return Err(CodecError::value(
                        field,
                        format!("expected {size} bytes, got {}", raw.len()),
                    ));
                }
                let mut word = B256::ZERO;
                word.0[..*size].copy_from_slice(&raw);
                Ok(Self::FixedBytes(word))
            }
            PrimitiveType::Bytes => json_hex(field, value).map(Self::Bytes),
            PrimitiveType::String => value
                .as_str()
                .map(|s| Self::String(s.to_string()))
                .ok_or_else(|| CodecError::value(field, "expected string")),
            PrimitiveType::Array(inner) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| CodecError::value(field, "expected array"))?;
                items
                    .iter()
                    .map(|item| Self::from_json(field, inner, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::Array)
            }
            PrimitiveType::FixedArray(inner, len) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| CodecError::value(field, "expected array"))?;
                if items.len() != *len {
                    return Err(CodecError::value(
                        field,
                        format!("expected {len} elements, got {}", items.len()),
                    ));
                }
                items
                    .iter()
                    .map(|item| Self::from_json(field, inner, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::FixedArray)
            }
        }
    }

    /// Single-word encoding of a static scalar. `None` for composite or dynamic values.
    pub fn word(&self) -> Option<B256> {
        match self {
            Self::Address(a) => Some(a.into_word()),
            Self::Bool(b) => Some(B256::from(U256::from(*b as u8).to_be_bytes::<32>())),
            Self::Uint(v) => Some(B256::from(v.to_be_bytes::<32>())),
            Self::Int(v) => Some(B256::from(v.into_raw().to_be_bytes::<32>())),
            Self::FixedBytes(w) => Some(*w),
            _ => None,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        if let Some(word) = self.word() {
            out.extend_from_slice(word.as_slice());
            return;
        }
        match self {
            Self::Bytes(raw) => encode_packed_bytes(raw, out),
            Self::String(s) => encode_packed_bytes(s.as_bytes(), out),
            Self::Array(items) => {
                out.extend_from_slice(&U256::from(items.len()).to_be_bytes::<32>());
                encode_tuple_into(items, out);
            }
            Self::FixedArray(items) | Self::Tuple(items) => encode_tuple_into(items, out),
            _ => unreachable!("scalars are handled by word()"),
        }
    }
}

fn json_hex(field: &str, value: &Value) -> Result<Vec<u8>, CodecError> {
    let s = value
        .as_str()
        .ok_or_else(|| CodecError::value(field, "expected 0x-prefixed hex string"))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| CodecError::value(field, "expected 0x-prefixed hex string"))?;
    hex::decode(digits).map_err(|e| CodecError::value(field, e.to_string()))
}

fn encode_packed_bytes(raw: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&U256::from(raw.len()).to_be_bytes::<32>());
    out.extend_from_slice(raw);
    let pad = (32 - raw.len() % 32) % 32;
    out.resize(out.len() + pad, 0);
}

fn encode_tuple_into(items: &[AbiValue], out: &mut Vec<u8>) {
    let head_len: usize = items
        .iter()
        .map(|v| if v.is_dynamic() { 32 } else { v.head_size() })
        .sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for item in items {
        if item.is_dynamic() {
            let offset = U256::from(head_len + tail.len());
            head.extend_from_slice(&offset.to_be_bytes::<32>());
            item.encode_into(&mut tail);
        } else {
            item.encode_into(&mut head);
        }
    }
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
}

/// `abi.encode(values...)`.
pub fn encode(values: &[AbiValue]) -> Vec<u8> {
    let mut out = Vec::new();
    encode_tuple_into(values, &mut out);
    out
}

/// First four bytes of `keccak256(signature)`.
pub fn function_selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

/// `selector ‖ abi.encode(args...)`.
pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut out = function_selector(signature).to_vec();
    encode_tuple_into(args, &mut out);
    out
}

// --- Decoding ---

fn word_at(data: &[u8], offset: usize) -> Result<&[u8], CodecError> {
    offset
        .checked_add(32)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| CodecError::InvalidAbi(format!("read past end at offset {offset}")))
}

fn usize_at(data: &[u8], offset: usize) -> Result<usize, CodecError> {
    let v = U256::from_be_slice(word_at(data, offset)?);
    usize::try_from(v).map_err(|_| CodecError::InvalidAbi("offset or length overflows".into()))
}

fn static_size(ty: &PrimitiveType) -> usize {
    match ty {
        PrimitiveType::FixedArray(inner, len) if !ty.is_abi_dynamic() => len * static_size(inner),
        _ => 32,
    }
}

/// Inverse of [`encode`] for the given field types.
pub fn decode(types: &[PrimitiveType], data: &[u8]) -> Result<Vec<AbiValue>, CodecError> {
    decode_tuple(types, data, 0)
}

fn decode_tuple(
    types: &[PrimitiveType],
    data: &[u8],
    base: usize,
) -> Result<Vec<AbiValue>, CodecError> {
    let mut offset = base;
    let mut out = Vec::with_capacity(types.len());
    for ty in types {
        if ty.is_abi_dynamic() {
            let tail = base
                .checked_add(usize_at(data, offset)?)
                .ok_or_else(|| CodecError::InvalidAbi("offset overflows".into()))?;
            out.push(decode_at(ty, data, tail)?);
            offset += 32;
        } else {
            out.push(decode_at(ty, data, offset)?);
            offset += static_size(ty);
        }
    }
    Ok(out)
}

/// Decode one value of type `ty` whose encoding starts at `at`.
pub fn decode_at(ty: &PrimitiveType, data: &[u8], at: usize) -> Result<AbiValue, CodecError> {
    match ty {
        PrimitiveType::Address => {
            let word = word_at(data, at)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(CodecError::InvalidAbi("dirty address padding".into()));
            }
            Ok(AbiValue::Address(Address::from_slice(&word[12..])))
        }
        PrimitiveType::Bool => match U256::from_be_slice(word_at(data, at)?) {
            v if v == U256::ZERO => Ok(AbiValue::Bool(false)),
            v if v == U256::from(1u8) => Ok(AbiValue::Bool(true)),
            _ => Err(CodecError::InvalidAbi("bool out of range".into())),
        },
        PrimitiveType::Uint(bits) => {
            let v = U256::from_be_slice(word_at(data, at)?);
            if v.bit_len() > *bits {
                return Err(CodecError::InvalidAbi(format!("value exceeds uint{bits}")));
            }
            Ok(AbiValue::Uint(v))
        }
        PrimitiveType::Int(_) => Ok(AbiValue::Int(I256::from_raw(U256::from_be_slice(
            word_at(data, at)?,
        )))),
        PrimitiveType::FixedBytes(size) => {
            let word = word_at(data, at)?;
            if word[*size..].iter().any(|b| *b != 0) {
                return Err(CodecError::InvalidAbi(format!("dirty bytes{size} padding")));
            }
            Ok(AbiValue::FixedBytes(B256::from_slice(word)))
        }
        PrimitiveType::Bytes => read_packed_bytes(data, at).map(|b| AbiValue::Bytes(b.to_vec())),
        PrimitiveType::String => {
            let raw = read_packed_bytes(data, at)?;
            String::from_utf8(raw.to_vec())
                .map(AbiValue::String)
                .map_err(|_| CodecError::InvalidAbi("string is not utf-8".into()))
        }
        PrimitiveType::Array(inner) => {
            let len = usize_at(data, at)?;
            // Every element needs at least one word; bounds the allocation below.
            if len > data.len() / 32 {
                return Err(CodecError::InvalidAbi(format!("array length {len} too large")));
            }
            let types = vec![(**inner).clone(); len];
            decode_tuple(&types, data, at + 32).map(AbiValue::Array)
        }
        PrimitiveType::FixedArray(inner, len) => {
            let types = vec![(**inner).clone(); *len];
            decode_tuple(&types, data, at).map(AbiValue::FixedArray)
        }
    }
}

fn read_packed_bytes(data: &[u8], at: usize) -> Result<&[u8], CodecError> {
    let len = usize_at(data, at)?;
    let start = at + 32;
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| CodecError::InvalidAbi(format!("bytes of length {len} run past end")))
}

/// Read a head word holding a tail offset or length.
pub fn read_offset(data: &[u8], at: usize) -> Result<usize, CodecError> {
    usize_at(data, at)
}

/// Decode a single `uint256` return value.
pub fn decode_uint(data: &[u8]) -> Result<U256, CodecError> {
    Ok(U256::from_be_slice(word_at(data, 0)?))
}

/// Decode a single `address[]` return value.
pub fn decode_address_array(data: &[u8]) -> Result<Vec<Address>, CodecError> {
    let start = usize_at(data, 0)?;
    let len = usize_at(data, start)?;
    (0..len)
        .map(|i| {
            let word = word_at(data, start + 32 + i * 32)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(CodecError::InvalidAbi("dirty address padding".into()));
            }
            Ok(Address::from_slice(&word[12..]))
        })
        .collect()
}

/// Extract the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&REVERT_SELECTOR[..])?;
    let start = usize_at(body, 0).ok()?;
    let len = usize_at(body, start).ok()?;
    let bytes = body.get(start + 32..start.checked_add(32)?.checked_add(len)?)?;
    String::from_utf8(bytes.to_vec()).ok()
}
