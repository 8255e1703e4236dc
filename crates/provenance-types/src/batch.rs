//! Batch blob codec.
//!
//! Per element, concatenated with no separators:
//! `mode (1) ‖ target (20) ‖ value (32, always zero) ‖ length (32, big-endian) ‖ payload`.
//! There is no delimiter, so any length mismatch is corruption.

use alloy_primitives::{Address, U256};

use crate::{abi, AbiValue, CodecError};

const MODE_LEN: usize = 1;
const TARGET_LEN: usize = 20;
const VALUE_LEN: usize = 32;
const LENGTH_LEN: usize = 32;
/// Fixed bytes preceding each payload.
pub const ELEMENT_HEADER_LEN: usize = MODE_LEN + TARGET_LEN + VALUE_LEN + LENGTH_LEN;

/// Entry point of the multi-send helper the custody account delegates to.
pub const MULTI_SEND_SIGNATURE: &str = "multiSend(bytes)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BatchMode {
    /// Plain call into the target.
    Direct = 0,
    /// Delegated call executing target code in the caller's context.
    Delegated = 1,
}

impl BatchMode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Direct),
            1 => Some(Self::Delegated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOperation {
    pub mode: BatchMode,
    pub target: Address,
    pub payload: Vec<u8>,
}

impl BatchOperation {
    pub fn direct(target: Address, payload: Vec<u8>) -> Self {
        Self {
            mode: BatchMode::Direct,
            target,
            payload,
        }
    }

    pub fn encoded_len(&self) -> usize {
        ELEMENT_HEADER_LEN + self.payload.len()
    }
}

/// Serialize an ordered, non-empty batch into one blob.
pub fn encode_batch(ops: &[BatchOperation]) -> Result<Vec<u8>, CodecError> {
    if ops.is_empty() {
        return Err(CodecError::EmptyBatch);
    }
    let total: usize = ops.iter().map(BatchOperation::encoded_len).sum();
    let mut out = Vec::with_capacity(total);
    for op in ops {
        out.push(op.mode as u8);
        out.extend_from_slice(op.target.as_slice());
        out.extend_from_slice(&[0u8; VALUE_LEN]);
        out.extend_from_slice(&U256::from(op.payload.len()).to_be_bytes::<32>());
        out.extend_from_slice(&op.payload);
    }
    Ok(out)
}

/// Exact inverse of [`encode_batch`].
pub fn decode_batch(blob: &[u8]) -> Result<Vec<BatchOperation>, CodecError> {
    if blob.is_empty() {
        return Err(CodecError::EmptyBatch);
    }
    let mut ops = Vec::new();
    let mut rest = blob;
    while !rest.is_empty() {
        let offset = blob.len() - rest.len();
        if rest.len() < ELEMENT_HEADER_LEN {
            return Err(CodecError::CorruptBatch(format!(
                "truncated element header at offset {offset}"
            )));
        }
        let (header, tail) = rest.split_at(ELEMENT_HEADER_LEN);

        let mode = BatchMode::from_byte(header[0]).ok_or_else(|| {
            CodecError::CorruptBatch(format!("unknown mode {} at offset {offset}", header[0]))
        })?;
        let target = Address::from_slice(&header[MODE_LEN..MODE_LEN + TARGET_LEN]);
        let value = &header[MODE_LEN + TARGET_LEN..MODE_LEN + TARGET_LEN + VALUE_LEN];
        if value.iter().any(|b| *b != 0) {
            return Err(CodecError::CorruptBatch(format!(
                "non-zero value field at offset {offset}"
            )));
        }
        let len = U256::from_be_slice(&header[ELEMENT_HEADER_LEN - LENGTH_LEN..]);
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= tail.len())
            .ok_or_else(|| {
                CodecError::CorruptBatch(format!(
                    "payload length {len} exceeds remaining {} bytes at offset {offset}",
                    tail.len()
                ))
            })?;

        let (payload, next) = tail.split_at(len);
        ops.push(BatchOperation {
            mode,
            target,
            payload: payload.to_vec(),
        });
        rest = next;
    }
    Ok(ops)
}

/// `multiSend(blob)` calldata.
pub fn multi_send_calldata(blob: &[u8]) -> Vec<u8> {
    abi::encode_call(MULTI_SEND_SIGNATURE, &[AbiValue::Bytes(blob.to_vec())])
}
