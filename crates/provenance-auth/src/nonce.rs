//! Per-sender sequence counters held by the relay contract.
//! The contract keys counters by `(sender, channel)`; this protocol only uses channel 0.

use alloy_primitives::Address;
use provenance_types::{abi, AbiValue};

use crate::AuthError;

/// Counter channel every request is signed against.
pub const SEQUENCE_CHANNEL: u128 = 0;

pub const GET_NONCE_SIGNATURE: &str = "getNonce(address,uint128)";

/// `getNonce(sender, SEQUENCE_CHANNEL)` calldata.
pub fn get_nonce_calldata(sender: Address) -> Vec<u8> {
    abi::encode_call(
        GET_NONCE_SIGNATURE,
        &[
            AbiValue::Address(sender),
            AbiValue::Uint(alloy_primitives::U256::from(SEQUENCE_CHANNEL)),
        ],
    )
}

/// Returns `SequenceMismatch` unless `expected` equals the live counter.
pub fn assert_sequence_current(expected: u64, live: u64) -> Result<(), AuthError> {
    if expected != live {
        return Err(AuthError::SequenceMismatch { expected, live });
    }
    Ok(())
}
