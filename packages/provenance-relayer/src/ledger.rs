//! Ledger access seam and the submit → confirm loop shared by every writer.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::metrics::METRICS;
use crate::Error;

/// Inclusion result of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
    pub revert_reason: Option<String>,
}

impl Receipt {
    /// `Ok` for a successful receipt, the classified revert otherwise.
    pub fn into_result(self) -> Result<Receipt, Error> {
        if self.success {
            return Ok(self);
        }
        Err(Error::from_revert(
            self.revert_reason
                .unwrap_or_else(|| "reverted without reason".into()),
        ))
    }
}

/// Lifecycle of one relay attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Built,
    Submitted,
    Confirmed,
    Reverted,
}

/// The subset of node RPC the relay protocol needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Read-only call. A revert comes back as a classified ledger error.
    async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, Error>;

    /// Submit from the relayer account, which pays the fee. Never retried.
    async fn send_transaction(&self, to: Address, data: Vec<u8>) -> Result<B256, Error>;

    /// `None` until the transaction is included.
    async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, Error>;

    async fn block_number(&self) -> Result<u64, Error>;

    async fn chain_id(&self) -> Result<u64, Error>;
}

/// Poll until `tx_hash` is included and `confirmations` blocks deep
/// (the inclusion block counts as one; 0 and 1 both mean inclusion).
///
/// No timeout: wrap in `tokio::time::timeout` and re-query before resubmitting.
pub async fn wait_for_receipt<L: Ledger + ?Sized>(
    ledger: &L,
    tx_hash: B256,
    confirmations: u64,
    poll: Duration,
) -> Result<Receipt, Error> {
    let start = Instant::now();
    let receipt = loop {
        if let Some(receipt) = ledger.transaction_receipt(tx_hash).await? {
            break receipt;
        }
        debug!(tx_hash = %tx_hash, "Receipt not available yet");
        tokio::time::sleep(poll).await;
    };

    while confirmations > 1 {
        let head = ledger.block_number().await?;
        let depth = head.saturating_sub(receipt.block_number) + 1;
        if depth >= confirmations {
            break;
        }
        debug!(tx_hash = %tx_hash, depth, confirmations, "Waiting for confirmations");
        tokio::time::sleep(poll).await;
    }

    METRICS.record_confirm_wait(start);
    Ok(receipt)
}

/// Submit a transaction and wait for it. Failed receipts without a reason
/// get one by replaying the call read-only.
pub async fn submit_and_confirm<L: Ledger + ?Sized>(
    ledger: &L,
    to: Address,
    data: Vec<u8>,
    confirmations: u64,
    poll: Duration,
) -> Result<Receipt, Error> {
    let tx_hash = ledger.send_transaction(to, data.clone()).await?;
    info!(tx_hash = %tx_hash, to = %to, "Transaction submitted");

    let mut receipt = wait_for_receipt(ledger, tx_hash, confirmations, poll).await?;
    if receipt.success {
        info!(tx_hash = %tx_hash, block = receipt.block_number, "Transaction confirmed");
        return Ok(receipt);
    }
    if receipt.revert_reason.is_none() {
        receipt.revert_reason = Some(replay_revert_reason(ledger, to, data).await);
    }
    warn!(
        tx_hash = %tx_hash,
        reason = receipt.revert_reason.as_deref().unwrap_or_default(),
        "Transaction reverted"
    );
    Ok(receipt)
}

async fn replay_revert_reason<L: Ledger + ?Sized>(ledger: &L, to: Address, data: Vec<u8>) -> String {
    match ledger.call(to, data).await {
        Err(e) if e.is_ledger_surfaced() => e.revert_reason().unwrap_or_default().to_string(),
        Err(e) => format!("reverted; replay failed: {e}"),
        Ok(_) => "reverted without reason".into(),
    }
}
