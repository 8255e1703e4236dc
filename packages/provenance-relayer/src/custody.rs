//! Multi-owner custody account: single calls, batches and policy reads.

use alloy_primitives::Address;
use async_trait::async_trait;
use provenance_auth::AccountPolicy;
use provenance_types::{
    abi, encode_batch, multi_send_calldata, AbiValue, BatchMode, BatchOperation, CodecError,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use crate::ledger::{submit_and_confirm, Ledger, Receipt};
use crate::metrics::METRICS;
use crate::{Error, RelayContext};

pub const PROPOSE_AND_EXECUTE_SIGNATURE: &str = "proposeAndExecute(address,bytes,uint8)";
pub const GET_OWNERS_SIGNATURE: &str = "getOwners()";
pub const GET_THRESHOLD_SIGNATURE: &str = "getThreshold()";

/// Executes privileged calls through a custody account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CustodyAccount: Send + Sync {
    fn address(&self) -> Address;

    /// One direct call from the custody account.
    async fn execute_call(&self, to: Address, data: Vec<u8>) -> Result<Receipt, Error>;

    /// One all-or-nothing batch, run by delegate-calling the multi-send helper.
    async fn execute_batch(&self, ops: Vec<BatchOperation>) -> Result<Receipt, Error>;

    async fn policy(&self) -> Result<AccountPolicy, Error>;
}

/// `proposeAndExecute(to, data, mode)` calldata.
pub fn propose_and_execute_calldata(to: Address, data: &[u8], mode: BatchMode) -> Vec<u8> {
    abi::encode_call(
        PROPOSE_AND_EXECUTE_SIGNATURE,
        &[
            AbiValue::Address(to),
            AbiValue::Bytes(data.to_vec()),
            AbiValue::uint(mode as u64),
        ],
    )
}

/// Read owners and threshold of `account`. Accounts without custody code
/// answer with empty data and are treated as single-key.
pub async fn fetch_policy<L: Ledger + ?Sized>(
    ledger: &L,
    account: Address,
) -> Result<AccountPolicy, Error> {
    let raw_owners = ledger
        .call(account, abi::function_selector(GET_OWNERS_SIGNATURE).to_vec())
        .await?;
    if raw_owners.is_empty() {
        return Ok(AccountPolicy::SingleKey);
    }
    let owners = abi::decode_address_array(&raw_owners)?;
    let raw_threshold = ledger
        .call(account, abi::function_selector(GET_THRESHOLD_SIGNATURE).to_vec())
        .await?;
    let threshold = abi::decode_uint(&raw_threshold)?;
    let threshold = u64::try_from(threshold)
        .map_err(|_| {
            Error::Codec(CodecError::InvalidAbi(format!("threshold {threshold} exceeds u64")))
        })?;
    Ok(AccountPolicy::Threshold { owners, threshold })
}

/// Custody account reached through the relay context's ledger.
pub struct LedgerCustody {
    ctx: Arc<RelayContext>,
    address: Address,
    confirmations: u64,
}

impl LedgerCustody {
    /// Custody account from `config.custody_address`.
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        let address = ctx.config.custody_address;
        Self::at(ctx, address)
    }

    pub fn at(ctx: Arc<RelayContext>, address: Address) -> Self {
        let confirmations = ctx.confirmations();
        Self {
            ctx,
            address,
            confirmations,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    async fn propose(&self, to: Address, data: &[u8], mode: BatchMode) -> Result<Receipt, Error> {
        let calldata = propose_and_execute_calldata(to, data, mode);
        submit_and_confirm(
            self.ctx.ledger.as_ref(),
            self.address,
            calldata,
            self.confirmations,
            self.ctx.poll_interval(),
        )
        .await?
        .into_result()
    }
}

#[async_trait]
impl CustodyAccount for LedgerCustody {
    fn address(&self) -> Address {
        self.address
    }

    async fn execute_call(&self, to: Address, data: Vec<u8>) -> Result<Receipt, Error> {
        METRICS.custody_calls.fetch_add(1, Ordering::Relaxed);
        info!(custody = %self.address, to = %to, "Proposing custody call");
        self.propose(to, &data, BatchMode::Direct).await
    }

    async fn execute_batch(&self, ops: Vec<BatchOperation>) -> Result<Receipt, Error> {
        let blob = encode_batch(&ops)?;
        METRICS.custody_batches.fetch_add(1, Ordering::Relaxed);
        info!(
            custody = %self.address,
            operations = ops.len(),
            bytes = blob.len(),
            "Proposing custody batch"
        );
        self.propose(
            self.ctx.config.multi_send_address,
            &multi_send_calldata(&blob),
            BatchMode::Delegated,
        )
        .await
    }

    async fn policy(&self) -> Result<AccountPolicy, Error> {
        fetch_policy(self.ctx.ledger.as_ref(), self.address).await
    }
}
