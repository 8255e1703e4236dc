//! Operation-type registration against the relay registry, executed through
//! the custody account.

use alloy_primitives::{Address, B256};
use provenance_types::{abi, AbiValue, BatchOperation, CodecError, OperationType};
use std::sync::Arc;
use tracing::info;

use crate::custody::CustodyAccount;
use crate::ledger::Receipt;
use crate::Error;

pub const REGISTER_SIGNATURE: &str = "registerOperationType(string,string,address,bytes4)";
pub const UNREGISTER_SIGNATURE: &str = "unregisterOperationType(bytes32)";

/// `registerOperationType(key, typeString, targetModule, selector)` calldata.
pub fn register_calldata(op: &OperationType) -> Vec<u8> {
    abi::encode_call(
        REGISTER_SIGNATURE,
        &[
            AbiValue::String(op.key.clone()),
            AbiValue::String(op.type_string()),
            AbiValue::Address(op.target_module),
            AbiValue::selector(op.function_selector),
        ],
    )
}

pub fn unregister_calldata(type_hash: B256) -> Vec<u8> {
    abi::encode_call(UNREGISTER_SIGNATURE, &[AbiValue::FixedBytes(type_hash)])
}

/// Registers and unregisters catalog entries. No client-side idempotency
/// check: duplicates and unknown entries are reported by the registry.
pub struct Registrar {
    registry: Address,
    custody: Arc<dyn CustodyAccount>,
}

impl Registrar {
    pub fn new(registry: Address, custody: Arc<dyn CustodyAccount>) -> Self {
        Self { registry, custody }
    }

    pub async fn register<'a>(
        &self,
        ops: impl IntoIterator<Item = &'a OperationType>,
    ) -> Result<Receipt, Error> {
        let calls: Vec<_> = ops
            .into_iter()
            .inspect(|op| info!(key = %op.key, type_hash = %op.type_hash(), "Registering operation type"))
            .map(register_calldata)
            .collect();
        self.execute(calls).await
    }

    pub async fn unregister(&self, type_hashes: &[B256]) -> Result<Receipt, Error> {
        let calls: Vec<_> = type_hashes.iter().copied().map(unregister_calldata).collect();
        info!(count = calls.len(), "Unregistering operation types");
        self.execute(calls).await
    }

    /// One call goes straight through custody; several become one batch.
    async fn execute(&self, calls: Vec<Vec<u8>>) -> Result<Receipt, Error> {
        match calls.len() {
            0 => Err(CodecError::EmptyBatch.into()),
            1 => {
                let data = calls.into_iter().next().ok_or(CodecError::EmptyBatch)?;
                self.custody.execute_call(self.registry, data).await
            }
            _ => {
                let ops = calls
                    .into_iter()
                    .map(|data| BatchOperation::direct(self.registry, data))
                    .collect();
                self.custody.execute_batch(ops).await
            }
        }
    }
}
